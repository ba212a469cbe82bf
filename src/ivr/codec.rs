//! State codec: `DialState` <-> callback address suffix
//!
//! The suffix is URL-safe unpadded base64 over compact JSON. Decoding never
//! fails: a missing, stale or tampered suffix restarts the caller at the
//! entry node.

use super::DialState;
use crate::locale::LocaleTable;
use crate::menu::NodeId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::sync::Arc;
use thiserror::Error;

/// Longest suffix accepted for decoding
const MAX_ENCODED_LEN: usize = 2048;

#[derive(Debug, Error)]
enum CodecError {
    #[error("encoded state is {0} bytes long")]
    TooLong(usize),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid state payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct StateCodec {
    entry: NodeId,
    locales: Arc<LocaleTable>,
}

impl StateCodec {
    pub fn new(entry: NodeId, locales: Arc<LocaleTable>) -> Self {
        Self { entry, locales }
    }

    /// Where a caller with no usable state starts
    pub fn initial(&self) -> DialState {
        DialState::initial(self.entry, self.locales.base())
    }

    pub fn encode(&self, state: &DialState) -> String {
        match serde_json::to_vec(state) {
            Ok(json) => URL_SAFE_NO_PAD.encode(json),
            Err(e) => {
                // Plain data with string keys; serialization does not fail
                tracing::error!(error = %e, "Failed to serialize dial state");
                String::new()
            }
        }
    }

    pub fn decode(&self, suffix: Option<&str>) -> DialState {
        let Some(suffix) = suffix.filter(|s| !s.is_empty()) else {
            return self.initial();
        };

        match Self::parse(suffix) {
            Ok(mut state) => {
                if !self.locales.supports(&state.locale) {
                    tracing::warn!(
                        locale = %state.locale,
                        base = %self.locales.base(),
                        "Unknown locale in dial state, using base locale"
                    );
                    state.locale = self.locales.base().to_string();
                }
                state
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed dial state, restarting call flow");
                self.initial()
            }
        }
    }

    fn parse(suffix: &str) -> Result<DialState, CodecError> {
        if suffix.len() > MAX_ENCODED_LEN {
            return Err(CodecError::TooLong(suffix.len()));
        }
        let json = URL_SAFE_NO_PAD.decode(suffix)?;
        Ok(serde_json::from_slice(&json)?)
    }
}
