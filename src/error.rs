//! Error taxonomy for request resolution, translation loading and builds.

use thiserror::Error;

/// Why an incoming request could not be mapped onto a buildable path.
///
/// Every variant is surfaced to the requester as not-found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    #[error("no route matches '{0}'")]
    UnknownRoute(String),

    #[error("route '{slug}' is not published in locale '{locale}'")]
    LocaleNotEligible { locale: String, slug: String },

    #[error("route '{slug}' requires parameter '{param}'")]
    MissingParam { slug: String, param: String },
}

/// Failure to load one (locale, namespace) translation bundle.
///
/// Never cached: a later load of the same bundle retries the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationLoadError {
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    #[error("namespace '{namespace}' not found for locale '{locale}'")]
    NotFound { locale: String, namespace: String },

    #[error("malformed namespace '{namespace}' for locale '{locale}': {reason}")]
    Malformed {
        locale: String,
        namespace: String,
        reason: String,
    },

    #[error("failed to read namespace '{namespace}' for locale '{locale}': {reason}")]
    Io {
        locale: String,
        namespace: String,
        reason: String,
    },
}

impl TranslationLoadError {
    /// Only I/O failures are worth retrying; a missing or malformed file stays that way.
    pub fn is_transient(&self) -> bool {
        matches!(self, TranslationLoadError::Io { .. })
    }
}

/// The render function failed for a path.
///
/// Cloneable so every request coalesced onto one build observes the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("build failed for {path}: {message}")]
pub struct BuildFailure {
    pub path: String,
    pub message: String,
}
