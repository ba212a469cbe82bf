//! Mock gateway for testing

use super::{GatewayError, TelephonyGateway};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every placement. Numbers without a leading '+' are rejected;
/// the rest get sids `CA0`, `CA1`, ... by attempt order.
#[derive(Default)]
pub struct MockGateway {
    calls: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(to, callback_url)` of every attempted placement
    pub fn recorded_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelephonyGateway for MockGateway {
    async fn place_call(&self, to: &str, callback_url: &str) -> Result<String, GatewayError> {
        let mut calls = self.calls.lock().unwrap();
        let attempt = calls.len();
        calls.push((to.to_string(), callback_url.to_string()));

        if to.starts_with('+') {
            Ok(format!("CA{attempt}"))
        } else {
            Err(GatewayError::invalid_destination(to))
        }
    }
}
