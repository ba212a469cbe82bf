//! Menu script table
//!
//! Static definition of every dialog node: its prompt, its digit options and
//! what happens on invalid or missing input. Built once at startup from
//! [`MenuSettings`] and checked against the locale table before the first call
//! is answered.

use crate::locale::LocaleTable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Digit that replays the current prompt on every node
pub const REPEAT_DIGIT: char = '9';

/// Replays allowed at a node before its fallback gives up
const MAX_REPLAYS: u8 = 1;

/// Identifies a node in the clinic dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    LanguageSelect,
    MainMenu,
    AppointmentDoctor,
    Pathology,
}

impl NodeId {
    pub const ALL: [NodeId; 4] = [
        NodeId::LanguageSelect,
        NodeId::MainMenu,
        NodeId::AppointmentDoctor,
        NodeId::Pathology,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::LanguageSelect => "language_select",
            NodeId::MainMenu => "main_menu",
            NodeId::AppointmentDoctor => "appointment_doctor",
            NodeId::Pathology => "pathology",
        }
    }

    /// Webhook path the provider posts this node's gathered digits to
    pub fn callback_path(self) -> &'static str {
        match self {
            NodeId::LanguageSelect => "/handle-language",
            NodeId::MainMenu => "/handle-main",
            NodeId::AppointmentDoctor => "/handle-appointment-doctor",
            NodeId::Pathology => "/handle-pathology",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a chosen option leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Present another menu node
    Goto(NodeId),
    /// Bridge the caller to a live line
    Bridge {
        number: String,
        timeout_secs: u32,
        connect_key: String,
        fail_key: String,
    },
    /// Confirm the selection, record a message, then close the call
    Record {
        thanks_key: String,
        instructions_key: String,
        closing_key: String,
        max_length_secs: u32,
        finish_digit: char,
    },
    /// Speak a message and hang up
    #[allow(dead_code)] // Not offered by the clinic script
    Terminate { message_key: String },
}

/// Selection recorded when an option is chosen. The label is rendered in the
/// caller's locale at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSpec {
    pub category: String,
    pub label_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub target: Transition,
    /// Locale the caller switches to when choosing this option
    pub locale: Option<String>,
    pub selection: Option<SelectionSpec>,
}

impl MenuOption {
    pub fn to(target: Transition) -> Self {
        Self {
            target,
            locale: None,
            selection: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn selecting(mut self, category: impl Into<String>, label_key: impl Into<String>) -> Self {
        self.selection = Some(SelectionSpec {
            category: category.into(),
            label_key: label_key.into(),
        });
        self
    }
}

/// What a node does once its replays are used up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exhausted {
    /// Never give up: keep replaying
    Replay,
    /// Announce and hand the caller back to the parent node
    Escalate { parent: NodeId, notice_key: String },
    /// Say goodbye and end the call
    Hangup { farewell_key: String },
}

/// Recovery policy for one class of bad input at a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// Spoken before the prompt is replayed
    pub notice_key: String,
    pub max_retries: u8,
    pub exhausted: Exhausted,
}

impl Fallback {
    pub fn replay(notice_key: impl Into<String>) -> Self {
        Self {
            notice_key: notice_key.into(),
            max_retries: 0,
            exhausted: Exhausted::Replay,
        }
    }

    pub fn escalate(
        notice_key: impl Into<String>,
        parent: NodeId,
        escalation_key: impl Into<String>,
    ) -> Self {
        Self {
            notice_key: notice_key.into(),
            max_retries: MAX_REPLAYS,
            exhausted: Exhausted::Escalate {
                parent,
                notice_key: escalation_key.into(),
            },
        }
    }

    pub fn hangup(notice_key: impl Into<String>, farewell_key: impl Into<String>) -> Self {
        Self {
            notice_key: notice_key.into(),
            max_retries: MAX_REPLAYS,
            exhausted: Exhausted::Hangup {
                farewell_key: farewell_key.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub id: NodeId,
    pub prompt_key: String,
    pub expected_digits: u8,
    pub options: BTreeMap<char, MenuOption>,
    pub repeat_digit: char,
    pub on_invalid: Fallback,
    pub on_no_input: Fallback,
}

impl MenuNode {
    fn new(id: NodeId, prompt_key: &str, on_invalid: Fallback, on_no_input: Fallback) -> Self {
        Self {
            id,
            prompt_key: prompt_key.to_string(),
            expected_digits: 1,
            options: BTreeMap::new(),
            repeat_digit: REPEAT_DIGIT,
            on_invalid,
            on_no_input,
        }
    }

    fn option(mut self, digit: char, option: MenuOption) -> Self {
        self.options.insert(digit, option);
        self
    }
}

/// Operator-tunable parts of the clinic script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSettings {
    pub emergency_number: String,
    pub gather_timeout_secs: u32,
    pub dial_timeout_secs: u32,
    pub record_max_secs: u32,
    /// Digit -> locale offered at language selection
    pub languages: Vec<(char, String)>,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            emergency_number: "+911112223334".to_string(),
            gather_timeout_secs: 8,
            dial_timeout_secs: 30,
            record_max_secs: 60,
            languages: vec![('1', "en".to_string()), ('2', "hi".to_string())],
        }
    }
}

/// Configuration defects in the script or its prompt table. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("menu node '{0}' is not defined")]
    MissingNode(NodeId),
    #[error("node '{node}' expects {count} digits; only single-digit menus are supported")]
    UnsupportedDigitCount { node: NodeId, count: u8 },
    #[error("node '{node}' maps '{digit}', which is not a keypad digit")]
    InvalidDigit { node: NodeId, digit: char },
    #[error("node '{node}' uses repeat digit '{digit}' as an option")]
    RepeatDigitCollision { node: NodeId, digit: char },
    #[error("node '{node}' offers locale '{locale}', which has no prompts")]
    UnknownOptionLocale { node: NodeId, locale: String },
    #[error("prompt '{key}' is missing for locale '{locale}'")]
    MissingKey { locale: String, key: String },
    #[error("node '{node}' records on '{digit}' without selecting a label to confirm")]
    RecordWithoutSelection { node: NodeId, digit: char },
}

/// The full dialog definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuScript {
    pub entry: NodeId,
    pub nodes: BTreeMap<NodeId, MenuNode>,
    pub gather_timeout_secs: u32,
    /// Spoken on the recording-outcome callback
    pub recording_saved_key: String,
}

impl MenuScript {
    /// The `HealthyCare` clinic dialog
    pub fn clinic(settings: &MenuSettings) -> Self {
        let record = |thanks_key: &str, instructions_key: &str| Transition::Record {
            thanks_key: thanks_key.to_string(),
            instructions_key: instructions_key.to_string(),
            closing_key: "thankyou_goodbye".to_string(),
            max_length_secs: settings.record_max_secs,
            finish_digit: '#',
        };

        let mut language = MenuNode::new(
            NodeId::LanguageSelect,
            "welcome",
            Fallback::hangup("invalid_selection", "invalid_goodbye"),
            Fallback::hangup("no_input_retry", "no_input_goodbye"),
        );
        for (digit, locale) in &settings.languages {
            language = language.option(
                *digit,
                MenuOption::to(Transition::Goto(NodeId::MainMenu)).with_locale(locale.clone()),
            );
        }

        let main = MenuNode::new(
            NodeId::MainMenu,
            "main_menu",
            Fallback::replay("invalid_selection"),
            Fallback::escalate("no_input_retry", NodeId::LanguageSelect, "return_language"),
        )
        .option(
            '1',
            MenuOption::to(Transition::Goto(NodeId::AppointmentDoctor))
                .selecting("department", "department_appointments"),
        )
        .option(
            '2',
            MenuOption::to(Transition::Bridge {
                number: settings.emergency_number.clone(),
                timeout_secs: settings.dial_timeout_secs,
                connect_key: "emergency_connect".to_string(),
                fail_key: "emergency_fail".to_string(),
            })
            .selecting("department", "department_emergency"),
        )
        .option(
            '3',
            MenuOption::to(Transition::Goto(NodeId::Pathology))
                .selecting("department", "department_pathology"),
        );

        let appointment = MenuNode::new(
            NodeId::AppointmentDoctor,
            "appointment_menu",
            Fallback::replay("invalid_selection"),
            Fallback::escalate("no_input_retry", NodeId::MainMenu, "return_main"),
        )
        .option(
            '1',
            MenuOption::to(record("appointment_thanks", "appointment_record"))
                .selecting("doctor", "doctor_dental"),
        )
        .option(
            '2',
            MenuOption::to(record("appointment_thanks", "appointment_record"))
                .selecting("doctor", "doctor_general"),
        )
        .option(
            '3',
            MenuOption::to(record("appointment_thanks", "appointment_record"))
                .selecting("doctor", "doctor_orthopaedic"),
        );

        let pathology = MenuNode::new(
            NodeId::Pathology,
            "pathology_menu",
            Fallback::replay("invalid_selection"),
            Fallback::escalate("no_input_retry", NodeId::MainMenu, "return_main"),
        )
        .option(
            '1',
            MenuOption::to(record("pathology_thanks", "pathology_record"))
                .selecting("test", "test_blood"),
        )
        .option(
            '2',
            MenuOption::to(record("pathology_thanks", "pathology_record"))
                .selecting("test", "test_full_body"),
        )
        .option(
            '3',
            MenuOption::to(record("pathology_thanks", "pathology_record"))
                .selecting("test", "test_heart"),
        );

        let nodes = [language, main, appointment, pathology]
            .into_iter()
            .map(|node| (node.id, node))
            .collect();

        Self {
            entry: NodeId::LanguageSelect,
            nodes,
            gather_timeout_secs: settings.gather_timeout_secs,
            recording_saved_key: "recording_saved".to_string(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&MenuNode> {
        self.nodes.get(&id)
    }

    /// Check the script's structure and that every prompt it references
    /// exists in every supported locale.
    pub fn validate(&self, locales: &LocaleTable) -> Result<(), ScriptError> {
        for id in NodeId::ALL {
            let node = self.node(id).ok_or(ScriptError::MissingNode(id))?;
            if node.expected_digits != 1 {
                return Err(ScriptError::UnsupportedDigitCount {
                    node: id,
                    count: node.expected_digits,
                });
            }
            if node.options.contains_key(&node.repeat_digit) {
                return Err(ScriptError::RepeatDigitCollision {
                    node: id,
                    digit: node.repeat_digit,
                });
            }
            for (digit, option) in &node.options {
                if !is_keypad_digit(*digit) {
                    return Err(ScriptError::InvalidDigit {
                        node: id,
                        digit: *digit,
                    });
                }
                if matches!(option.target, Transition::Record { .. }) && option.selection.is_none()
                {
                    return Err(ScriptError::RecordWithoutSelection {
                        node: id,
                        digit: *digit,
                    });
                }
                if let Some(locale) = &option.locale {
                    if !locales.supports(locale) {
                        return Err(ScriptError::UnknownOptionLocale {
                            node: id,
                            locale: locale.clone(),
                        });
                    }
                }
            }
        }

        let keys = self.referenced_keys();
        for locale in locales.locales() {
            if let Some(key) = keys.iter().find(|key| !locales.has_key(locale, key)) {
                return Err(ScriptError::MissingKey {
                    locale: locale.to_string(),
                    key: (*key).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every prompt key the script can speak
    pub fn referenced_keys(&self) -> BTreeSet<&str> {
        let mut keys = BTreeSet::from([self.recording_saved_key.as_str()]);
        for node in self.nodes.values() {
            keys.insert(node.prompt_key.as_str());
            for fallback in [&node.on_invalid, &node.on_no_input] {
                keys.insert(fallback.notice_key.as_str());
                match &fallback.exhausted {
                    Exhausted::Replay => {}
                    Exhausted::Escalate { notice_key, .. } => {
                        keys.insert(notice_key.as_str());
                    }
                    Exhausted::Hangup { farewell_key } => {
                        keys.insert(farewell_key.as_str());
                    }
                }
            }
            for option in node.options.values() {
                if let Some(selection) = &option.selection {
                    keys.insert(selection.label_key.as_str());
                }
                match &option.target {
                    Transition::Goto(_) => {}
                    Transition::Bridge {
                        connect_key,
                        fail_key,
                        ..
                    } => {
                        keys.extend([connect_key.as_str(), fail_key.as_str()]);
                    }
                    Transition::Record {
                        thanks_key,
                        instructions_key,
                        closing_key,
                        ..
                    } => {
                        keys.extend([
                            thanks_key.as_str(),
                            instructions_key.as_str(),
                            closing_key.as_str(),
                        ]);
                    }
                    Transition::Terminate { message_key } => {
                        keys.insert(message_key.as_str());
                    }
                }
            }
        }
        keys
    }
}

fn is_keypad_digit(c: char) -> bool {
    c.is_ascii_digit() || c == '*' || c == '#'
}
