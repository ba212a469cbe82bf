//! Twilio REST implementation of [`TelephonyGateway`]

use super::{GatewayError, TelephonyGateway};
use crate::config::ConfigError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("E.164 pattern compiles"));

/// Twilio account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Caller id presented on outbound calls
    pub from_number: String,
    pub api_base: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TwilioConfig {
    /// `Ok(None)` when no credentials are set at all. A partial set is an
    /// error so a typo does not silently disable outbound calls.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let account_sid = get("TWILIO_ACCOUNT_SID");
        let auth_token = get("TWILIO_AUTH_TOKEN");
        let from_number = get("TWILIO_FROM_NUMBER");

        match (account_sid, auth_token, from_number) {
            (None, None, None) => Ok(None),
            (Some(account_sid), Some(auth_token), Some(from_number)) => Ok(Some(Self {
                account_sid,
                auth_token,
                from_number,
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            })),
            (sid, token, _) => {
                let missing = if sid.is_none() {
                    "TWILIO_ACCOUNT_SID"
                } else if token.is_none() {
                    "TWILIO_AUTH_TOKEN"
                } else {
                    "TWILIO_FROM_NUMBER"
                };
                Err(ConfigError::MissingVar(missing))
            }
        }
    }
}

pub struct TwilioGateway {
    client: Client,
    config: TwilioConfig,
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { client, config })
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base, self.config.account_sid
        )
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> GatewayError {
        match serde_json::from_str::<TwilioErrorBody>(body) {
            Ok(err) => {
                let code = err.code.map(|c| format!(" (code {c})")).unwrap_or_default();
                GatewayError::rejected(format!("{}{code}", err.message))
            }
            Err(_) => GatewayError::rejected(format!("provider returned {status}")),
        }
    }
}

#[async_trait]
impl TelephonyGateway for TwilioGateway {
    async fn place_call(&self, to: &str, callback_url: &str) -> Result<String, GatewayError> {
        if !E164.is_match(to) {
            return Err(GatewayError::invalid_destination(to));
        }

        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Url", callback_url),
            ("Method", "POST"),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::network(format!("Request timeout: {e}"))
                } else {
                    GatewayError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let call: TwilioCall = serde_json::from_str(&body)
            .map_err(|e| GatewayError::invalid_response(format!("Failed to parse response: {e}")))?;
        Ok(call.sid)
    }
}

// Twilio API types

#[derive(Debug, Deserialize)]
struct TwilioCall {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: String,
    code: Option<u32>,
}
