//! Caller input delivered by a gather callback

/// Classified `Digits` value from a gather webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialInput {
    /// Gather timed out with nothing pressed
    NoInput,
    /// A single keypad press
    Key(char),
    /// Anything else: several keys, or characters no keypad sends
    Unrecognized(String),
}

impl DialInput {
    pub fn parse(raw: &str) -> Self {
        let digits = raw.trim();
        let mut chars = digits.chars();
        match (chars.next(), chars.next()) {
            (None, _) => DialInput::NoInput,
            (Some(key), None) if is_keypad(key) => DialInput::Key(key),
            _ => DialInput::Unrecognized(digits.to_string()),
        }
    }
}

fn is_keypad(c: char) -> bool {
    c.is_ascii_digit() || c == '*' || c == '#'
}
