//! Internationalization: supported locales and translation bundles.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for supported locales and the default locale
//! - `loader`: Namespaced translation bundles with caching and default-locale fallback
//! - `metrics`: Loader cache and failure counters
//!
//! # Example
//!
//! ```rust,ignore
//! use locale_pages::i18n::{FsTranslationSource, LocaleRegistry, TranslationLoader};
//!
//! let registry = Arc::new(LocaleRegistry::new(["en", "fr"], "en")?);
//! let loader = TranslationLoader::new(registry, Arc::new(FsTranslationSource::new("public/locales")));
//!
//! let bundle = loader.load("fr", "common").await?;
//! let title = loader.resolve(&bundle, "solutions.title").await;
//! ```

mod loader;
mod metrics;
mod registry;

pub use loader::{
    Entries, FsTranslationSource, StaticTranslationSource, TranslationBundle, TranslationLoader,
    TranslationSource,
};
pub use metrics::{TranslationMetrics, TranslationMetricsReport};
pub use registry::{Locale, LocaleRegistry};
