//! Outbound call placement
//!
//! A batch request fans out into one independent provider request per
//! destination. A failed destination never affects the others; results come
//! back per destination in request order.

#[cfg(test)]
pub mod testing;
mod twilio;

pub use twilio::{TwilioConfig, TwilioGateway};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

/// Placement error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_destination(to: &str) -> Self {
        Self::new(
            GatewayErrorKind::InvalidDestination,
            format!("invalid destination number '{to}'"),
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Rejected, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::InvalidResponse, message)
    }

    pub fn not_configured() -> Self {
        Self::new(
            GatewayErrorKind::NotConfigured,
            "telephony gateway not configured",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Destination is not a dialable E.164 number
    InvalidDestination,
    /// Provider unreachable or timed out
    Network,
    /// Provider answered with an error status
    Rejected,
    /// Provider answered success with a body we could not read
    InvalidResponse,
    /// No provider credentials
    NotConfigured,
}

/// Telephony provider that can originate calls
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Place one call to `to`; the provider fetches its first instructions
    /// from `callback_url`. Returns the provider's call id.
    async fn place_call(&self, to: &str, callback_url: &str) -> Result<String, GatewayError>;
}

/// Stand-in used when no provider credentials are configured. Every
/// placement fails without leaving the process.
pub struct UnconfiguredGateway;

#[async_trait]
impl TelephonyGateway for UnconfiguredGateway {
    async fn place_call(&self, _to: &str, _callback_url: &str) -> Result<String, GatewayError> {
        Err(GatewayError::not_configured())
    }
}

/// Outcome for one destination of a batch
#[derive(Debug, Clone)]
pub enum Placement {
    Queued { to: String, sid: String },
    Failed { to: String, error: GatewayError },
}

impl Placement {
    pub fn to(&self) -> &str {
        match self {
            Placement::Queued { to, .. } | Placement::Failed { to, .. } => to,
        }
    }
}

/// Place a call to every destination concurrently.
pub async fn place_calls(
    gateway: &dyn TelephonyGateway,
    destinations: &[String],
    callback_url: &str,
) -> Vec<Placement> {
    let attempts = destinations.iter().map(|to| async move {
        match gateway.place_call(to, callback_url).await {
            Ok(sid) => {
                tracing::info!(to = %to, sid = %sid, "Outbound call queued");
                Placement::Queued {
                    to: to.clone(),
                    sid,
                }
            }
            Err(error) => {
                tracing::warn!(to = %to, kind = ?error.kind, error = %error, "Outbound call failed");
                Placement::Failed {
                    to: to.clone(),
                    error,
                }
            }
        }
    });
    join_all(attempts).await
}
