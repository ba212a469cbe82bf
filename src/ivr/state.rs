//! Caller position carried between webhooks

use crate::menu::NodeId;
use serde::{Deserialize, Serialize};

/// A choice the caller made on the way down the menu tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Node the choice was made at
    #[serde(rename = "n")]
    pub node: NodeId,
    #[serde(rename = "c")]
    pub category: String,
    /// Display label, already rendered in the caller's locale
    #[serde(rename = "l")]
    pub label: String,
}

/// The caller's dialog position. Never mutated in place: every transition
/// produces a new value which is encoded into the next callback address.
///
/// Field names are single letters to keep callback URLs short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialState {
    #[serde(rename = "n")]
    pub node: NodeId,
    #[serde(rename = "l")]
    pub locale: String,
    #[serde(rename = "s", default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<Selection>,
    /// Consecutive failed attempts at `node`
    #[serde(rename = "r", default, skip_serializing_if = "is_zero")]
    pub retries: u8,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes by reference
fn is_zero(n: &u8) -> bool {
    *n == 0
}

impl DialState {
    pub fn initial(entry: NodeId, locale: impl Into<String>) -> Self {
        Self {
            node: entry,
            locale: locale.into(),
            selections: Vec::new(),
            retries: 0,
        }
    }

    pub fn with_retries(&self, retries: u8) -> Self {
        Self {
            retries,
            ..self.clone()
        }
    }

    /// Move to `node` with a fresh retry count
    pub fn at(&self, node: NodeId) -> Self {
        Self {
            node,
            retries: 0,
            ..self.clone()
        }
    }

    /// State after handing the caller back to `parent`: choices made at the
    /// parent or below it are dropped, since the caller is about to make them again.
    pub fn escalated_to(&self, parent: NodeId) -> Self {
        let keep = self
            .selections
            .iter()
            .position(|selection| selection.node == parent)
            .unwrap_or(self.selections.len());
        Self {
            node: parent,
            locale: self.locale.clone(),
            selections: self.selections[..keep].to_vec(),
            retries: 0,
        }
    }

    /// Label of the most recent choice
    pub fn last_label(&self) -> Option<&str> {
        self.selections.last().map(|s| s.label.as_str())
    }

    pub fn label_for(&self, category: &str) -> Option<&str> {
        self.selections
            .iter()
            .rev()
            .find(|s| s.category == category)
            .map(|s| s.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(node: NodeId, category: &str, label: &str) -> Selection {
        Selection {
            node,
            category: category.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_escalation_drops_choices_made_at_parent() {
        let state = DialState {
            node: NodeId::Pathology,
            locale: "hi".to_string(),
            selections: vec![selection(NodeId::MainMenu, "department", "pathology tests")],
            retries: 1,
        };

        let parent = state.escalated_to(NodeId::MainMenu);
        assert_eq!(parent.node, NodeId::MainMenu);
        assert_eq!(parent.locale, "hi");
        assert!(parent.selections.is_empty());
        assert_eq!(parent.retries, 0);
    }

    #[test]
    fn test_escalation_keeps_choices_above_parent() {
        let state = DialState {
            node: NodeId::MainMenu,
            locale: "en".to_string(),
            selections: vec![selection(NodeId::LanguageSelect, "language", "English")],
            retries: 1,
        };
        let parent = state.escalated_to(NodeId::MainMenu);
        assert_eq!(parent.selections.len(), 1);
    }

    #[test]
    fn test_labels() {
        let state = DialState {
            node: NodeId::AppointmentDoctor,
            locale: "en".to_string(),
            selections: vec![
                selection(NodeId::MainMenu, "department", "appointment booking"),
                selection(NodeId::AppointmentDoctor, "doctor", "Dental"),
            ],
            retries: 0,
        };
        assert_eq!(state.last_label(), Some("Dental"));
        assert_eq!(state.label_for("department"), Some("appointment booking"));
        assert_eq!(state.label_for("test"), None);
    }

    #[test]
    fn test_compact_serialization_omits_defaults() {
        let state = DialState::initial(NodeId::LanguageSelect, "en");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"n":"language_select","l":"en"}"#);
    }
}
