//! `TwiML` action compiler
//!
//! Renders the engine's abstract instructions as a Twilio voice response.
//! Every continuation address (gather, record, redirect) carries the encoded
//! state the engine handed out with it.

use crate::ivr::{DialState, Instruction, StateCodec};

/// Content type of every voice webhook response
pub const CONTENT_TYPE: &str = "text/xml";

/// Presents the state's node without evaluating input
pub const ENTRY_PATH: &str = "/voice";

/// Recording-outcome callback
pub const RECORDING_PATH: &str = "/handle-recording";

/// Query parameter that carries the encoded dial state
pub const STATE_PARAM: &str = "s";

pub struct TwimlCompiler<'a> {
    base_url: &'a str,
    codec: &'a StateCodec,
}

impl<'a> TwimlCompiler<'a> {
    /// `base_url` is the public origin the provider reaches us on, without a
    /// trailing slash.
    pub fn new(base_url: &'a str, codec: &'a StateCodec) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/'),
            codec,
        }
    }

    pub fn render(&self, instructions: &[Instruction]) -> String {
        let mut builder = TwimlBuilder::new();
        self.write(&mut builder, instructions);
        builder.finish()
    }

    /// Absolute callback address for `path` carrying `state`
    pub fn callback_url(&self, path: &str, state: &DialState) -> String {
        format!(
            "{}{path}?{STATE_PARAM}={}",
            self.base_url,
            self.codec.encode(state)
        )
    }

    fn write(&self, builder: &mut TwimlBuilder, instructions: &[Instruction]) {
        // Speech is held back until we know whether a gather follows it
        let mut pending: Vec<&str> = Vec::new();

        for instruction in instructions {
            match instruction {
                Instruction::Speak(text) => pending.push(text),

                Instruction::GatherDigits {
                    count,
                    timeout_secs,
                    next_state,
                } => {
                    let action = self.callback_url(next_state.node.callback_path(), next_state);
                    builder.gather(*count, *timeout_secs, &action, pending.drain(..));
                }

                Instruction::Dial {
                    number,
                    timeout_secs,
                    on_fail,
                } => {
                    // The dial carries no `action`, so the provider runs the
                    // verbs after it whenever the dialled leg ends. That covers
                    // no-answer, busy and failure, and also a connected call
                    // hung up by the far end; `on_fail` must therefore read
                    // as a closing line and end in a hangup.
                    builder.says(pending.drain(..));
                    builder.dial(number, *timeout_secs);
                    self.write(builder, on_fail);
                }

                Instruction::Record {
                    max_length_secs,
                    finish_digit,
                    result_state,
                } => {
                    builder.says(pending.drain(..));
                    let action = self.callback_url(RECORDING_PATH, result_state);
                    builder.record(*max_length_secs, *finish_digit, &action);
                }

                Instruction::Redirect(state) => {
                    builder.says(pending.drain(..));
                    builder.redirect(&self.callback_url(ENTRY_PATH, state));
                }

                Instruction::Hangup => {
                    builder.says(pending.drain(..));
                    builder.hangup();
                }
            }
        }

        builder.says(pending.drain(..));
    }
}

/// Minimal `TwiML` writer
struct TwimlBuilder {
    xml: String,
}

impl TwimlBuilder {
    fn new() -> Self {
        Self {
            xml: String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#),
        }
    }

    fn say(&mut self, text: &str) {
        self.xml.push_str("<Say>");
        self.xml.push_str(&escape(text));
        self.xml.push_str("</Say>");
    }

    fn says<'t>(&mut self, texts: impl IntoIterator<Item = &'t str>) {
        for text in texts {
            self.say(text);
        }
    }

    fn gather<'t>(
        &mut self,
        num_digits: u8,
        timeout_secs: u32,
        action: &str,
        prompts: impl IntoIterator<Item = &'t str>,
    ) {
        self.xml.push_str(&format!(
            r#"<Gather numDigits="{num_digits}" timeout="{timeout_secs}" action="{}" method="POST" actionOnEmptyResult="true">"#,
            escape(action)
        ));
        self.says(prompts);
        self.xml.push_str("</Gather>");
    }

    fn dial(&mut self, number: &str, timeout_secs: u32) {
        self.xml.push_str(&format!(
            r#"<Dial timeout="{timeout_secs}">{}</Dial>"#,
            escape(number)
        ));
    }

    fn record(&mut self, max_length_secs: u32, finish_digit: char, action: &str) {
        self.xml.push_str(&format!(
            r#"<Record maxLength="{max_length_secs}" finishOnKey="{}" action="{}" method="POST"/>"#,
            escape(&finish_digit.to_string()),
            escape(action)
        ));
    }

    fn redirect(&mut self, url: &str) {
        self.xml.push_str(&format!(
            r#"<Redirect method="POST">{}</Redirect>"#,
            escape(url)
        ));
    }

    fn hangup(&mut self) {
        self.xml.push_str("<Hangup/>");
    }

    fn finish(mut self) -> String {
        self.xml.push_str("</Response>");
        self.xml
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ivr::clinic_engine;
    use crate::menu::NodeId;

    const BASE: &str = "https://ivr.example.org";

    #[test]
    fn test_prompt_nested_in_gather() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new(BASE, &codec);
        let initial = engine.initial_state();

        let xml = compiler.render(&engine.present(&initial).instructions);
        let action = format!("{BASE}/handle-language?s={}", codec.encode(&initial));
        let welcome = engine.locales().resolve("en", "welcome", &[]);
        assert_eq!(
            xml,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Response><Gather numDigits="1" timeout="8" action="{action}" method="POST" actionOnEmptyResult="true"><Say>{welcome}</Say></Gather></Response>"#
            )
        );
    }

    #[test]
    fn test_gather_action_follows_next_node() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new("https://ivr.example.org/", &codec);

        let result = engine.evaluate(&engine.initial_state(), "2");
        let xml = compiler.render(&result.instructions);
        let expected = compiler.callback_url("/handle-main", &result.next_state);
        assert!(expected.starts_with("https://ivr.example.org/handle-main?s="));
        assert!(xml.contains(&format!(r#"action="{expected}""#)));
    }

    #[test]
    fn test_bridge_brackets_dial_once() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new(BASE, &codec);

        let main = DialState::initial(NodeId::MainMenu, "en");
        let xml = compiler.render(&engine.evaluate(&main, "2").instructions);

        let connect = xml.find("<Say>Connecting").unwrap();
        let dial = xml.find(r#"<Dial timeout="30">+911112223334</Dial>"#).unwrap();
        let fail = xml.find("</Dial><Say>").unwrap();
        let hangup = xml.find("<Hangup/>").unwrap();
        assert!(connect < dial && dial < fail && fail < hangup);
        assert_eq!(xml.matches("<Dial").count(), 1);
        assert!(!xml.contains("<Gather"));
    }

    #[test]
    fn test_dial_has_no_action_and_fail_path_closes_call() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new(BASE, &codec);

        let main = DialState::initial(NodeId::MainMenu, "en");
        let xml = compiler.render(&engine.evaluate(&main, "2").instructions);

        let (_, after_dial) = xml.split_once("</Dial>").unwrap();
        let fail = engine.locales().resolve("en", "emergency_fail", &[]);
        assert_eq!(after_dial, format!("<Say>{fail}</Say><Hangup/></Response>"));
        assert!(!xml.contains("<Dial action"));
    }

    #[test]
    fn test_record_leaf_order() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new(BASE, &codec);

        let appointment = DialState::initial(NodeId::AppointmentDoctor, "en");
        let result = engine.evaluate(&appointment, "1");
        let xml = compiler.render(&result.instructions);

        let record_url = compiler.callback_url(RECORDING_PATH, &result.next_state);
        let record = xml
            .find(&format!(
                r##"<Record maxLength="60" finishOnKey="#" action="{record_url}" method="POST"/>"##
            ))
            .unwrap();
        let thanks = xml.find("<Say>Thank you. You selected Dental.").unwrap();
        let goodbye = xml.find("<Say>Thank you. Goodbye.</Say><Hangup/>").unwrap();
        assert!(thanks < record && record < goodbye);
    }

    #[test]
    fn test_redirect_presents_parent() {
        let engine = clinic_engine();
        let codec = engine.codec();
        let compiler = TwimlCompiler::new(BASE, &codec);

        let stale = DialState::initial(NodeId::Pathology, "en").with_retries(1);
        let result = engine.evaluate(&stale, "");
        let xml = compiler.render(&result.instructions);
        let target = compiler.callback_url(ENTRY_PATH, &result.next_state);
        assert!(xml.ends_with(&format!(
            r#"<Say>No input received. Returning to main menu.</Say><Redirect method="POST">{target}</Redirect></Response>"#
        )));
    }

    #[test]
    fn test_text_is_escaped() {
        let codec = clinic_engine().codec();
        let compiler = TwimlCompiler::new(BASE, &codec);
        let xml = compiler.render(&[
            Instruction::speak(r#"Tom & Jerry's <"clinic">"#),
            Instruction::Hangup,
        ]);
        assert!(xml.contains("<Say>Tom &amp; Jerry&apos;s &lt;&quot;clinic&quot;&gt;</Say>"));
    }

    #[test]
    fn test_trailing_speech_is_flushed() {
        let codec = clinic_engine().codec();
        let compiler = TwimlCompiler::new(BASE, &codec);
        let xml = compiler.render(&[Instruction::speak("one"), Instruction::speak("two")]);
        assert!(xml.ends_with("<Say>one</Say><Say>two</Say></Response>"));
    }
}
