//! API request and response types

use crate::gateway::Placement;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Encoded dial state on a webhook address
#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    pub s: Option<String>,
}

/// Fields of a gather webhook we use
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatherForm {
    /// Absent or empty when the gather timed out
    pub digits: Option<String>,
    pub call_sid: Option<String>,
}

/// Recording-outcome webhook
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordingForm {
    pub recording_sid: Option<String>,
    pub recording_url: Option<String>,
    pub recording_duration: Option<String>,
    pub from: Option<String>,
    pub call_sid: Option<String>,
}

/// Request to place outbound calls
#[derive(Debug, Default)]
pub struct MakeCallRequest {
    pub to: Option<Destinations>,
    /// Where the provider fetches the first instructions; defaults to the
    /// IVR entry point
    pub callback_address: Option<String>,
}

/// Accepted spellings of the callback field
const CALLBACK_FIELDS: [&str; 3] = ["callbackAddress", "callback_address", "twiml_url"];

impl MakeCallRequest {
    /// Reads each field on its own, so a malformed optional field never
    /// hides a usable `to`. Anything that is not a JSON object is empty.
    pub fn from_slice(body: &[u8]) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };

        let callback_address = CALLBACK_FIELDS.iter().find_map(|name| {
            let value = fields.get(*name)?;
            let url = value.as_str();
            if url.is_none() {
                tracing::debug!(field = *name, value = %value, "Ignoring non-string callback field");
            }
            url.map(str::to_string)
        });

        Self {
            to: fields.get("to").and_then(Destinations::from_value),
            callback_address,
        }
    }
}

/// One number or a list of numbers
#[derive(Debug, PartialEq)]
pub enum Destinations {
    One(String),
    Many(Vec<String>),
}

impl Destinations {
    /// A string or an array. Non-string list items are kept in their JSON
    /// form and fail placement individually.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(to) => Some(Destinations::One(to.clone())),
            Value::Array(items) => Some(Destinations::Many(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(to) => to.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    /// `None` when nothing was given
    pub fn into_list(self) -> Option<Vec<String>> {
        let list = match self {
            Destinations::One(to) if to.trim().is_empty() => return None,
            Destinations::One(to) => vec![to],
            Destinations::Many(list) => list,
        };
        (!list.is_empty()).then_some(list)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Queued,
    Error,
}

/// Per-destination result of an outbound batch
#[derive(Debug, Serialize)]
pub struct CallResult {
    pub to: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Placement> for CallResult {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Queued { to, sid } => Self {
                to,
                status: CallStatus::Queued,
                sid: Some(sid),
                error: None,
            },
            Placement::Failed { to, error } => Self {
                to,
                status: CallStatus::Error,
                sid: None,
                error: Some(error.to_string()),
            },
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
