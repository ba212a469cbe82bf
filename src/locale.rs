//! Locale resource provider
//!
//! Maps `(locale, key, args)` to the text spoken to a caller. Templates use
//! positional slots: `{}` takes the next argument, `{0}`, `{1}` pick one by
//! index. A locale missing from the table resolves against the base locale.
//! Missing keys are a configuration defect caught at startup by
//! [`MenuScript::validate`](crate::menu::MenuScript::validate).

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Table shipped with the binary (English and Hindi)
const BUILTIN_TABLE: &str = include_str!("../resources/locales.json");

/// `messageKey -> template` for one locale
pub type Messages = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("failed to read locale table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid locale table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("base locale '{0}' is not present in the locale table")]
    MissingBaseLocale(String),
}

/// Immutable `locale -> messageKey -> template` table
#[derive(Debug, Clone)]
pub struct LocaleTable {
    base: String,
    locales: BTreeMap<String, Messages>,
}

impl LocaleTable {
    /// The built-in clinic table
    pub fn builtin(base: &str) -> Result<Self, LocaleError> {
        Self::from_json(BUILTIN_TABLE, base)
    }

    /// Load a table from a JSON file shaped like `{"en": {"key": "text"}}`
    pub fn load(path: &Path, base: &str) -> Result<Self, LocaleError> {
        let json = std::fs::read_to_string(path).map_err(|source| LocaleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json, base)
    }

    pub fn from_json(json: &str, base: &str) -> Result<Self, LocaleError> {
        let locales: BTreeMap<String, Messages> = serde_json::from_str(json)?;
        if !locales.contains_key(base) {
            return Err(LocaleError::MissingBaseLocale(base.to_string()));
        }
        Ok(Self {
            base: base.to_string(),
            locales,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn supports(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    /// Supported locale codes, sorted
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    pub fn messages(&self) -> &BTreeMap<String, Messages> {
        &self.locales
    }

    pub fn has_key(&self, locale: &str, key: &str) -> bool {
        self.locales
            .get(locale)
            .is_some_and(|messages| messages.contains_key(key))
    }

    /// The locale actually used for `locale`: itself when supported, else the base.
    pub fn effective<'a>(&'a self, locale: &'a str) -> &'a str {
        if self.supports(locale) {
            locale
        } else {
            &self.base
        }
    }

    /// Render `key` in `locale`, substituting `args` into the template slots.
    pub fn resolve(&self, locale: &str, key: &str, args: &[&str]) -> String {
        let template = self
            .locales
            .get(self.effective(locale))
            .and_then(|messages| messages.get(key))
            .or_else(|| self.locales.get(&self.base).and_then(|m| m.get(key)));

        if let Some(template) = template {
            render_template(template, args)
        } else {
            // Validation at startup rules this out
            tracing::error!(locale, key, "prompt key missing from locale table");
            key.to_string()
        }
    }
}

fn render_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next_arg = 0;
    let mut rest = template;

    while let Some((before, after)) = rest.split_once('{') {
        out.push_str(before);
        match after.split_once('}') {
            Some((slot, tail)) if slot.chars().all(|c| c.is_ascii_digit()) => {
                let index = if slot.is_empty() {
                    next_arg += 1;
                    next_arg - 1
                } else {
                    slot.parse().unwrap_or(usize::MAX)
                };
                match args.get(index) {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('{');
                        out.push_str(slot);
                        out.push('}');
                    }
                }
                rest = tail;
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
