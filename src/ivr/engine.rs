//! Pure dialog evaluation
//!
//! Given the caller's decoded state and the digits posted with a webhook,
//! decide what to say, what to do next, and what state to carry forward.
//! Same inputs always give the same outputs; there is no hidden context.

use super::{DialInput, DialState, Instruction, Selection, StateCodec};
use crate::locale::LocaleTable;
use crate::menu::{Exhausted, Fallback, MenuNode, MenuOption, MenuScript, ScriptError, Transition};
use std::sync::Arc;

/// Result of evaluating one webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub instructions: Vec<Instruction>,
    /// Where the caller now stands
    pub next_state: DialState,
}

impl Evaluation {
    pub fn new(state: DialState) -> Self {
        Self {
            instructions: vec![],
            next_state: state,
        }
    }

    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }
}

/// The dialog state machine. Read-only after construction and shared across
/// concurrent webhooks.
#[derive(Debug)]
pub struct DialogEngine {
    script: Arc<MenuScript>,
    locales: Arc<LocaleTable>,
}

impl DialogEngine {
    /// Fails if the script references a prompt missing from any locale.
    pub fn new(script: Arc<MenuScript>, locales: Arc<LocaleTable>) -> Result<Self, ScriptError> {
        script.validate(&locales)?;
        Ok(Self { script, locales })
    }

    pub fn script(&self) -> &MenuScript {
        &self.script
    }

    pub fn locales(&self) -> &LocaleTable {
        &self.locales
    }

    /// Codec that decodes into states this engine accepts
    pub fn codec(&self) -> StateCodec {
        StateCodec::new(self.script.entry, Arc::clone(&self.locales))
    }

    pub fn initial_state(&self) -> DialState {
        DialState::initial(self.script.entry, self.locales.base())
    }

    /// Speak the prompt for the state's node and gather a choice.
    pub fn present(&self, state: &DialState) -> Evaluation {
        let Some(node) = self.script.node(state.node) else {
            return self.missing_node(state);
        };
        Evaluation::new(state.clone()).with_instructions(self.prompt(node, state))
    }

    /// Evaluate the digits posted to the state's node.
    pub fn evaluate(&self, state: &DialState, digits: &str) -> Evaluation {
        let Some(node) = self.script.node(state.node) else {
            return self.missing_node(state);
        };

        let input = DialInput::parse(digits);
        tracing::debug!(
            node = %node.id,
            locale = %state.locale,
            retries = state.retries,
            ?input,
            "Evaluating caller input"
        );

        match input {
            DialInput::NoInput => self.recover(node, state, &node.on_no_input),
            DialInput::Key(key) if key == node.repeat_digit => self.present(&state.with_retries(0)),
            DialInput::Key(key) => match node.options.get(&key) {
                Some(option) => self.follow(node, option, state),
                None => self.recover(node, state, &node.on_invalid),
            },
            DialInput::Unrecognized(_) => self.recover(node, state, &node.on_invalid),
        }
    }

    /// Terminal acknowledgment for the recording-outcome callback.
    pub fn acknowledge_recording(&self, state: &DialState) -> Evaluation {
        Evaluation::new(state.clone())
            .with_instruction(Instruction::speak(self.say(
                state,
                &self.script.recording_saved_key,
                &[],
            )))
            .with_instruction(Instruction::Hangup)
    }

    fn follow(&self, node: &MenuNode, option: &MenuOption, state: &DialState) -> Evaluation {
        let mut next = state.with_retries(0);
        if let Some(locale) = &option.locale {
            next.locale = self.locales.effective(locale).to_string();
        }
        if let Some(spec) = &option.selection {
            let label = self.say(&next, &spec.label_key, &[]);
            next.selections.push(Selection {
                node: node.id,
                category: spec.category.clone(),
                label,
            });
        }

        match &option.target {
            Transition::Goto(target) => self.present(&next.at(*target)),

            Transition::Bridge {
                number,
                timeout_secs,
                connect_key,
                fail_key,
            } => {
                let connect = self.say(&next, connect_key, &[]);
                let fail = self.say(&next, fail_key, &[]);
                Evaluation::new(next)
                    .with_instruction(Instruction::speak(connect))
                    .with_instruction(Instruction::Dial {
                        number: number.clone(),
                        timeout_secs: *timeout_secs,
                        on_fail: vec![Instruction::speak(fail), Instruction::Hangup],
                    })
            }

            Transition::Record {
                thanks_key,
                instructions_key,
                closing_key,
                max_length_secs,
                finish_digit,
            } => {
                let label = next.last_label().unwrap_or_default().to_string();
                let thanks = self.say(&next, thanks_key, &[&label]);
                let instructions = self.say(&next, instructions_key, &[]);
                let closing = self.say(&next, closing_key, &[]);
                Evaluation::new(next.clone())
                    .with_instruction(Instruction::speak(thanks))
                    .with_instruction(Instruction::speak(instructions))
                    .with_instruction(Instruction::Record {
                        max_length_secs: *max_length_secs,
                        finish_digit: *finish_digit,
                        result_state: next,
                    })
                    .with_instruction(Instruction::speak(closing))
                    .with_instruction(Instruction::Hangup)
            }

            Transition::Terminate { message_key } => {
                let message = self.say(&next, message_key, &[]);
                Evaluation::new(next)
                    .with_instruction(Instruction::speak(message))
                    .with_instruction(Instruction::Hangup)
            }
        }
    }

    fn recover(&self, node: &MenuNode, state: &DialState, fallback: &Fallback) -> Evaluation {
        match &fallback.exhausted {
            // A non-empty answer breaks any run of timeouts
            Exhausted::Replay => self.replay_with_notice(node, &state.with_retries(0), fallback),

            _ if state.retries < fallback.max_retries => {
                self.replay_with_notice(node, &state.with_retries(state.retries + 1), fallback)
            }

            Exhausted::Escalate { parent, notice_key } => {
                let notice = self.say(state, notice_key, &[]);
                let next = state.escalated_to(*parent);
                tracing::debug!(from = %node.id, to = %parent, "Escalating to parent menu");
                Evaluation::new(next.clone())
                    .with_instruction(Instruction::speak(notice))
                    .with_instruction(Instruction::Redirect(next))
            }

            Exhausted::Hangup { farewell_key } => Evaluation::new(state.clone())
                .with_instruction(Instruction::speak(self.say(state, farewell_key, &[])))
                .with_instruction(Instruction::Hangup),
        }
    }

    fn replay_with_notice(&self, node: &MenuNode, next: &DialState, fallback: &Fallback) -> Evaluation {
        Evaluation::new(next.clone())
            .with_instruction(Instruction::speak(self.say(next, &fallback.notice_key, &[])))
            .with_instructions(self.prompt(node, next))
    }

    fn prompt(&self, node: &MenuNode, state: &DialState) -> [Instruction; 2] {
        [
            Instruction::speak(self.say(state, &node.prompt_key, &[])),
            Instruction::GatherDigits {
                count: node.expected_digits,
                timeout_secs: self.script.gather_timeout_secs,
                next_state: state.clone(),
            },
        ]
    }

    fn missing_node(&self, state: &DialState) -> Evaluation {
        // Unreachable once the script has been validated
        tracing::error!(node = %state.node, "Dial state refers to an undefined menu node");
        Evaluation::new(self.initial_state()).with_instruction(Instruction::Hangup)
    }

    fn say(&self, state: &DialState, key: &str, args: &[&str]) -> String {
        self.locales.resolve(&state.locale, key, args)
    }
}
