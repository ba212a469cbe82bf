//! Startup configuration from the environment

use crate::gateway::TwilioConfig;
use crate::menu::MenuSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Everything the server needs at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Origin the provider reaches us on. When unset, callback addresses are
    /// derived from each request's forwarded headers.
    pub public_base_url: Option<String>,
    pub base_locale: String,
    /// Prompt table to load instead of the built-in one
    pub locales_path: Option<PathBuf>,
    pub menu: MenuSettings,
    pub twilio: Option<TwilioConfig>,
}

impl Config {
    /// Loads configuration from the process environment, after merging a
    /// `.env` file from the working directory if one exists.
    ///
    /// *   `IVR_BIND_ADDRESS`: listen address, default `0.0.0.0:5000`
    /// *   `IVR_PUBLIC_BASE_URL`: public origin for callback addresses
    /// *   `IVR_BASE_LOCALE`: fallback locale, default `en`
    /// *   `IVR_LOCALES_PATH`: JSON prompt table overriding the built-in one
    /// *   `IVR_LANGUAGES`: language menu as `digit=locale` pairs, default `1=en,2=hi`
    /// *   `IVR_EMERGENCY_NUMBER`, `IVR_GATHER_TIMEOUT_SECS`, `IVR_DIAL_TIMEOUT_SECS`,
    ///     `IVR_RECORD_MAX_SECS`: menu tuning
    /// *   `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM_NUMBER`,
    ///     `TWILIO_API_BASE`: outbound calling; all three credentials or none
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = MenuSettings::default();

        let bind_address = parse_or(&get, "IVR_BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 5000)))?;

        let public_base_url = get("IVR_PUBLIC_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string());
        if let Some(url) = &public_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "IVR_PUBLIC_BASE_URL",
                    format!("'{url}' is not an http(s) URL"),
                ));
            }
        }

        let languages = match get("IVR_LANGUAGES") {
            Some(raw) => parse_languages(&raw)?,
            None => defaults.languages,
        };

        let menu = MenuSettings {
            emergency_number: get("IVR_EMERGENCY_NUMBER").unwrap_or(defaults.emergency_number),
            gather_timeout_secs: parse_or(&get, "IVR_GATHER_TIMEOUT_SECS", defaults.gather_timeout_secs)?,
            dial_timeout_secs: parse_or(&get, "IVR_DIAL_TIMEOUT_SECS", defaults.dial_timeout_secs)?,
            record_max_secs: parse_or(&get, "IVR_RECORD_MAX_SECS", defaults.record_max_secs)?,
            languages,
        };

        Ok(Self {
            bind_address,
            public_base_url,
            base_locale: get("IVR_BASE_LOCALE").unwrap_or_else(|| "en".to_string()),
            locales_path: get("IVR_LOCALES_PATH").map(PathBuf::from),
            menu,
            twilio: TwilioConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

/// Parses `1=en,2=hi`
fn parse_languages(raw: &str) -> Result<Vec<(char, String)>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("IVR_LANGUAGES", reason);

    let mut languages: Vec<(char, String)> = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((digit, locale)) = pair.split_once('=') else {
            return Err(invalid(format!("'{pair}' is not digit=locale")));
        };
        let mut chars = digit.trim().chars();
        let (Some(digit), None) = (chars.next(), chars.next()) else {
            return Err(invalid(format!("'{digit}' is not a single digit")));
        };
        let locale = locale.trim();
        if !digit.is_ascii_digit() || locale.is_empty() {
            return Err(invalid(format!("'{pair}' is not digit=locale")));
        }
        if languages.iter().any(|(d, _)| *d == digit) {
            return Err(invalid(format!("digit '{digit}' is mapped twice")));
        }
        languages.push((digit, locale.to_string()));
    }

    if languages.is_empty() {
        return Err(invalid("no languages listed".to_string()));
    }
    Ok(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:5000");
        assert_eq!(config.public_base_url, None);
        assert_eq!(config.base_locale, "en");
        assert_eq!(config.locales_path, None);
        assert_eq!(config.menu, MenuSettings::default());
        assert!(config.twilio.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("IVR_BIND_ADDRESS", "127.0.0.1:8080"),
            ("IVR_PUBLIC_BASE_URL", "https://ivr.example.org/"),
            ("IVR_LOCALES_PATH", "/etc/ivr/locales.json"),
            ("IVR_LANGUAGES", "1=hi, 2=en"),
            ("IVR_EMERGENCY_NUMBER", "+15551230000"),
            ("IVR_GATHER_TIMEOUT_SECS", "5"),
            ("IVR_DIAL_TIMEOUT_SECS", "20"),
            ("IVR_RECORD_MAX_SECS", "120"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.public_base_url.as_deref(), Some("https://ivr.example.org"));
        assert_eq!(config.locales_path, Some(PathBuf::from("/etc/ivr/locales.json")));
        assert_eq!(
            config.menu.languages,
            vec![('1', "hi".to_string()), ('2', "en".to_string())]
        );
        assert_eq!(config.menu.emergency_number, "+15551230000");
        assert_eq!(config.menu.gather_timeout_secs, 5);
        assert_eq!(config.menu.dial_timeout_secs, 20);
        assert_eq!(config.menu.record_max_secs, 120);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = from_vars(&[("IVR_GATHER_TIMEOUT_SECS", "  "), ("IVR_BASE_LOCALE", "")]).unwrap();
        assert_eq!(config.menu.gather_timeout_secs, 8);
        assert_eq!(config.base_locale, "en");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from_vars(&[("IVR_BIND_ADDRESS", "localhost")]),
            Err(ConfigError::InvalidValue("IVR_BIND_ADDRESS", _))
        ));
        assert!(matches!(
            from_vars(&[("IVR_DIAL_TIMEOUT_SECS", "-3")]),
            Err(ConfigError::InvalidValue("IVR_DIAL_TIMEOUT_SECS", _))
        ));
        assert!(matches!(
            from_vars(&[("IVR_PUBLIC_BASE_URL", "ivr.example.org")]),
            Err(ConfigError::InvalidValue("IVR_PUBLIC_BASE_URL", _))
        ));
    }

    #[test]
    fn test_invalid_languages() {
        for raw in ["1", "12=en", "a=en", "1=", "1=en,1=hi", ","] {
            assert!(
                matches!(
                    from_vars(&[("IVR_LANGUAGES", raw)]),
                    Err(ConfigError::InvalidValue("IVR_LANGUAGES", _))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_twilio_credentials() {
        let config = from_vars(&[
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "t"),
            ("TWILIO_FROM_NUMBER", "+15550001111"),
        ])
        .unwrap();
        let twilio = config.twilio.unwrap();
        assert_eq!(twilio.api_base, "https://api.twilio.com");

        assert!(matches!(
            from_vars(&[("TWILIO_ACCOUNT_SID", "AC1")]),
            Err(ConfigError::MissingVar("TWILIO_AUTH_TOKEN"))
        ));
    }
}
