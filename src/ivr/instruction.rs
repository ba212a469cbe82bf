//! Abstract telephony instructions produced by the engine

use super::DialState;

/// One step of the response to a webhook. An evaluation yields an ordered
/// sequence; the action compiler renders it for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Speak(String),

    /// Collect keypad input, then call back with `next_state`
    GatherDigits {
        count: u8,
        timeout_secs: u32,
        next_state: DialState,
    },

    /// Bridge the call. `on_fail` runs if the dial does not connect.
    Dial {
        number: String,
        timeout_secs: u32,
        on_fail: Vec<Instruction>,
    },

    /// Record the caller; the outcome callback carries `result_state`
    Record {
        max_length_secs: u32,
        finish_digit: char,
        result_state: DialState,
    },

    /// Continue the call by presenting `state`
    Redirect(DialState),

    Hangup,
}

impl Instruction {
    pub fn speak(text: impl Into<String>) -> Self {
        Instruction::Speak(text.into())
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Speak(_) => "speak",
            Instruction::GatherDigits { .. } => "gather",
            Instruction::Dial { .. } => "dial",
            Instruction::Record { .. } => "record",
            Instruction::Redirect(_) => "redirect",
            Instruction::Hangup => "hangup",
        }
    }

    /// Whether the call continues with another webhook after this step
    pub fn continues(&self) -> bool {
        matches!(
            self,
            Instruction::GatherDigits { .. } | Instruction::Record { .. } | Instruction::Redirect(_)
        )
    }
}
