//! Translation loader: namespaced key/value bundles with default-locale fallback.
//!
//! Bundles are read from a [`TranslationSource`] and cached per
//! (locale, namespace) for the lifetime of the loader. Concurrent loads of the
//! same bundle share one source read. A failed load leaves its cache slot
//! empty, so the next call retries the source.

use crate::error::TranslationLoadError;
use crate::i18n::{LocaleRegistry, TranslationMetrics};
use crate::retry::{with_retry_if, RetryConfig};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Translated strings for one namespace, keyed by (possibly dotted) key.
pub type Entries = BTreeMap<String, String>;

/// One loaded (locale, namespace) bundle. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationBundle {
    pub locale: String,
    pub namespace: String,
    pub entries: Entries,
}

impl TranslationBundle {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Where raw namespace files come from.
///
/// `Ok(None)` means the namespace does not exist for that locale.
pub trait TranslationSource: Send + Sync {
    fn read_namespace<'a>(
        &'a self,
        locale: &'a str,
        namespace: &'a str,
    ) -> BoxFuture<'a, std::io::Result<Option<String>>>;
}

/// Reads `{root}/{locale}/{namespace}.json`.
#[derive(Debug, Clone)]
pub struct FsTranslationSource {
    root: PathBuf,
}

impl FsTranslationSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_path(&self, locale: &str, namespace: &str) -> PathBuf {
        self.root.join(locale).join(format!("{}.json", namespace))
    }
}

impl TranslationSource for FsTranslationSource {
    fn read_namespace<'a>(
        &'a self,
        locale: &'a str,
        namespace: &'a str,
    ) -> BoxFuture<'a, std::io::Result<Option<String>>> {
        Box::pin(async move {
            let path = self.namespace_path(locale, namespace);
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => Ok(Some(raw)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
    }
}

/// In-memory source, keyed by (locale, namespace).
#[derive(Debug, Clone, Default)]
pub struct StaticTranslationSource {
    files: HashMap<(String, String), String>,
}

impl StaticTranslationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, locale: &str, namespace: &str, raw: &str) -> Self {
        self.files
            .insert((locale.to_string(), namespace.to_string()), raw.to_string());
        self
    }
}

impl TranslationSource for StaticTranslationSource {
    fn read_namespace<'a>(
        &'a self,
        locale: &'a str,
        namespace: &'a str,
    ) -> BoxFuture<'a, std::io::Result<Option<String>>> {
        let raw = self
            .files
            .get(&(locale.to_string(), namespace.to_string()))
            .cloned();
        Box::pin(async move { Ok(raw) })
    }
}

type BundleSlot = Arc<OnceCell<Arc<TranslationBundle>>>;

/// Cached, fallback-aware translation loader.
pub struct TranslationLoader {
    registry: Arc<LocaleRegistry>,
    source: Arc<dyn TranslationSource>,
    retry: RetryConfig,
    cache: Mutex<HashMap<(String, String), BundleSlot>>,
    metrics: TranslationMetrics,
}

impl TranslationLoader {
    pub fn new(registry: Arc<LocaleRegistry>, source: Arc<dyn TranslationSource>) -> Self {
        Self {
            registry,
            source,
            retry: RetryConfig::translation_read(),
            cache: Mutex::new(HashMap::new()),
            metrics: TranslationMetrics::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    /// Load one bundle, from cache if it has been loaded before.
    pub async fn load(
        &self,
        locale: &str,
        namespace: &str,
    ) -> Result<Arc<TranslationBundle>, TranslationLoadError> {
        if !self.registry.is_supported(locale) {
            return Err(TranslationLoadError::UnknownLocale(locale.to_string()));
        }

        let slot = self.slot(locale, namespace);
        if let Some(bundle) = slot.get() {
            self.metrics.record_cache_hit();
            return Ok(Arc::clone(bundle));
        }

        let mut initialized_here = false;
        let result = slot
            .get_or_try_init(|| {
                initialized_here = true;
                self.metrics.record_cache_miss();
                self.fetch(locale, namespace)
            })
            .await;

        match result {
            Ok(bundle) => {
                if !initialized_here {
                    self.metrics.record_cache_hit();
                }
                Ok(Arc::clone(bundle))
            }
            Err(e) => {
                self.metrics.record_load_failure();
                warn!("Translation load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Resolve a key against a bundle.
    ///
    /// Lookup order: the bundle itself, then the default locale's bundle for the
    /// same namespace, then the literal key.
    pub async fn resolve(&self, bundle: &TranslationBundle, key: &str) -> String {
        if let Some(value) = bundle.get(key) {
            return value.to_string();
        }

        let default_code = &self.registry.default_locale().code;
        if &bundle.locale != default_code {
            match self.load(default_code, &bundle.namespace).await {
                Ok(fallback) => {
                    if let Some(value) = fallback.get(key) {
                        return value.to_string();
                    }
                }
                Err(e) => debug!("Default bundle unavailable while resolving '{}': {}", key, e),
            }
        }

        self.metrics.record_unresolved_key();
        key.to_string()
    }

    /// Entries for `namespace` as seen from `locale`: the default locale's
    /// entries overlaid with the requested locale's.
    ///
    /// Load failures are logged and degrade to whatever could be loaded; this
    /// never fails.
    pub async fn load_merged(&self, locale: &str, namespace: &str) -> Entries {
        let default_code = self.registry.default_locale().code.clone();
        let mut merged = Entries::new();

        if locale != default_code {
            if let Ok(fallback) = self.load(&default_code, namespace).await {
                merged.extend(fallback.entries.clone());
            }
        }

        if let Ok(bundle) = self.load(locale, namespace).await {
            merged.extend(bundle.entries.clone());
        }

        merged
    }

    /// Whether (locale, namespace) has been loaded successfully.
    pub fn is_cached(&self, locale: &str, namespace: &str) -> bool {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(&(locale.to_string(), namespace.to_string()))
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    fn slot(&self, locale: &str, namespace: &str) -> BundleSlot {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            cache
                .entry((locale.to_string(), namespace.to_string()))
                .or_default(),
        )
    }

    async fn fetch(
        &self,
        locale: &str,
        namespace: &str,
    ) -> Result<Arc<TranslationBundle>, TranslationLoadError> {
        let operation = format!("Load {}/{}", locale, namespace);
        let bundle = with_retry_if(
            &self.retry,
            &operation,
            || self.read_once(locale, namespace),
            TranslationLoadError::is_transient,
        )
        .await?;
        debug!(
            "Loaded {} keys for {}/{}",
            bundle.entries.len(),
            locale,
            namespace
        );
        Ok(Arc::new(bundle))
    }

    async fn read_once(
        &self,
        locale: &str,
        namespace: &str,
    ) -> Result<TranslationBundle, TranslationLoadError> {
        self.metrics.record_source_read();
        let raw = self
            .source
            .read_namespace(locale, namespace)
            .await
            .map_err(|e| TranslationLoadError::Io {
                locale: locale.to_string(),
                namespace: namespace.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| TranslationLoadError::NotFound {
                locale: locale.to_string(),
                namespace: namespace.to_string(),
            })?;

        let entries = parse_namespace(&raw).map_err(|reason| TranslationLoadError::Malformed {
            locale: locale.to_string(),
            namespace: namespace.to_string(),
            reason,
        })?;

        Ok(TranslationBundle {
            locale: locale.to_string(),
            namespace: namespace.to_string(),
            entries,
        })
    }
}

/// Parse a namespace file. Nested objects are flattened into dotted keys.
fn parse_namespace(raw: &str) -> Result<Entries, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let Value::Object(map) = value else {
        return Err("top-level value must be an object".to_string());
    };

    let mut entries = Entries::new();
    let mut stack: Vec<(String, serde_json::Map<String, Value>)> = vec![(String::new(), map)];

    while let Some((prefix, map)) = stack.pop() {
        for (key, value) in map {
            let full_key = if prefix.is_empty() {
                key
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                Value::String(text) => {
                    entries.insert(full_key, text);
                }
                Value::Object(nested) => stack.push((full_key, nested)),
                other => {
                    return Err(format!(
                        "key '{}' must be a string or object, got {}",
                        full_key, other
                    ))
                }
            }
        }
    }

    Ok(entries)
}
