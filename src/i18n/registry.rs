//! Locale registry: the single source of truth for supported locales.
//!
//! The registry is built once at startup (from the site manifest) and is
//! read-only afterwards. It is an ordinary value rather than a process-wide
//! singleton so tests can construct as many independent registries as they need.

use crate::error::ResolveError;
use anyhow::{bail, Result};
use std::collections::HashSet;

/// A supported locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    /// Locale code as it appears in URLs and translation directories (e.g. "en", "pt-BR")
    pub code: String,

    /// Whether this is the default locale (exactly one is)
    pub is_default: bool,
}

/// Ordered set of supported locales with exactly one default.
#[derive(Debug, Clone)]
pub struct LocaleRegistry {
    locales: Vec<Locale>,
}

impl LocaleRegistry {
    /// Build a registry from an ordered list of codes and the default code.
    ///
    /// # Errors
    /// Fails if the list is empty, contains duplicates or blank codes, or if
    /// `default_code` is not one of `codes`.
    pub fn new<I, S>(codes: I, default_code: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut locales = Vec::new();

        for code in codes {
            let code: String = code.into();
            let code = code.trim().to_string();
            if code.is_empty() {
                bail!("Locale codes must not be empty");
            }
            if !seen.insert(code.clone()) {
                bail!("Duplicate locale code: '{}'", code);
            }
            let is_default = code == default_code;
            locales.push(Locale { code, is_default });
        }

        if locales.is_empty() {
            bail!("At least one locale must be configured");
        }
        if !locales.iter().any(|locale| locale.is_default) {
            bail!(
                "Default locale '{}' is not in the configured locales",
                default_code
            );
        }

        Ok(Self { locales })
    }

    /// All supported locales, in configuration order.
    pub fn list_locales(&self) -> &[Locale] {
        &self.locales
    }

    /// The default locale.
    pub fn default_locale(&self) -> &Locale {
        // `new` guarantees exactly one default
        self.locales
            .iter()
            .find(|locale| locale.is_default)
            .unwrap_or(&self.locales[0])
    }

    /// Check if a locale code is supported.
    pub fn is_supported(&self, code: &str) -> bool {
        self.locales.iter().any(|locale| locale.code == code)
    }

    /// Look up a locale, failing with `UnknownLocale` for codes outside the registry.
    pub fn locale(&self, code: &str) -> Result<&Locale, ResolveError> {
        self.locales
            .iter()
            .find(|locale| locale.code == code)
            .ok_or_else(|| ResolveError::UnknownLocale(code.to_string()))
    }

    /// Supported locale codes, in configuration order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.locales.iter().map(|locale| locale.code.as_str())
    }
}
