//! Page data assembly: route params + locale + translations -> renderer payload.

use crate::error::ResolveError;
use crate::i18n::{Entries, TranslationLoader};
use crate::routes::{ConcretePath, ParamMap, RouteCatalogue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything the rendering layer receives for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageProps {
    pub locale: String,
    pub params: ParamMap,
    /// namespace -> entries, default-locale entries overlaid with the page locale's
    pub translations: BTreeMap<String, Entries>,
    pub revalidate_seconds: u64,
    /// When the previous render of this path was generated, if any
    pub last_generated_at: Option<DateTime<Utc>>,
}

impl PageProps {
    /// Look up a translated string, returning the key itself when unresolved.
    pub fn t<'a>(&'a self, namespace: &str, key: &'a str) -> &'a str {
        self.translations
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }
}

pub struct PageAssembler {
    catalogue: Arc<RouteCatalogue>,
    loader: Arc<TranslationLoader>,
}

impl PageAssembler {
    pub fn new(catalogue: Arc<RouteCatalogue>, loader: Arc<TranslationLoader>) -> Self {
        Self { catalogue, loader }
    }

    pub fn loader(&self) -> &TranslationLoader {
        &self.loader
    }

    /// Build the props for `path`, loading every namespace its template requires.
    ///
    /// Missing or broken namespaces degrade to the default locale (or nothing)
    /// instead of failing; only an invalid path is an error.
    pub async fn assemble(
        &self,
        path: &ConcretePath,
        last_generated_at: Option<DateTime<Utc>>,
    ) -> Result<PageProps, ResolveError> {
        let (path, template) = self
            .catalogue
            .concrete_path(&path.locale, &path.slug, &path.params)?;

        let mut translations = BTreeMap::new();
        for namespace in &template.namespaces {
            let entries = self.loader.load_merged(&path.locale, namespace).await;
            translations.insert(namespace.clone(), entries);
        }

        Ok(PageProps {
            locale: path.locale,
            params: path.params,
            translations,
            revalidate_seconds: template.revalidate_seconds,
            last_generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{LocaleRegistry, StaticTranslationSource};
    use crate::routes::RouteTemplate;

    fn assembler() -> PageAssembler {
        let registry = Arc::new(LocaleRegistry::new(["en", "fr"], "en").unwrap());
        let catalogue = Arc::new(
            RouteCatalogue::new(
                Arc::clone(&registry),
                vec![
                    RouteTemplate::new("solutions/wallets")
                        .unwrap()
                        .with_namespaces(["common", "wallets"])
                        .with_revalidate(120),
                    RouteTemplate::new("blog/[post]").unwrap().with_locales(["en"]),
                ],
            )
            .unwrap(),
        );
        let source = StaticTranslationSource::new()
            .with_namespace("en", "common", r#"{"nav": {"home": "Home"}, "cta": "Build"}"#)
            .with_namespace("fr", "common", r#"{"nav": {"home": "Accueil"}}"#)
            .with_namespace("en", "wallets", r#"{"hero": "Wallets"}"#);
        let loader = Arc::new(TranslationLoader::new(registry, Arc::new(source)));
        PageAssembler::new(catalogue, loader)
    }

    #[tokio::test]
    async fn test_assemble_loads_required_namespaces() {
        let assembler = assembler();
        let path = ConcretePath::new("fr", "solutions/wallets", ParamMap::new());
        let props = assembler.assemble(&path, None).await.unwrap();

        assert_eq!(props.locale, "fr");
        assert_eq!(props.revalidate_seconds, 120);
        assert_eq!(props.translations.len(), 2);
        assert_eq!(props.t("common", "nav.home"), "Accueil");
        assert_eq!(props.t("common", "cta"), "Build");
        assert_eq!(props.t("wallets", "hero"), "Wallets");
        assert_eq!(props.t("wallets", "missing.key"), "missing.key");
    }

    #[tokio::test]
    async fn test_assemble_passes_params_and_metadata() {
        let assembler = assembler();
        let now = Utc::now();
        let path = ConcretePath::new(
            "en",
            "blog/[post]",
            ParamMap::from([("post".to_string(), "hello".to_string())]),
        );
        let props = assembler.assemble(&path, Some(now)).await.unwrap();

        assert_eq!(props.params.get("post").map(String::as_str), Some("hello"));
        assert_eq!(props.last_generated_at, Some(now));
        // Route declares no namespace file for blog; common is still loaded
        assert_eq!(props.t("common", "cta"), "Build");
    }

    #[tokio::test]
    async fn test_assemble_rejects_ineligible_locale() {
        let assembler = assembler();
        let path = ConcretePath::new(
            "fr",
            "blog/[post]",
            ParamMap::from([("post".to_string(), "hello".to_string())]),
        );
        assert!(matches!(
            assembler.assemble(&path, None).await,
            Err(ResolveError::LocaleNotEligible { .. })
        ));
    }

    #[tokio::test]
    async fn test_assemble_is_repeatable() {
        let assembler = assembler();
        let path = ConcretePath::new("en", "solutions/wallets", ParamMap::new());
        let first = assembler.assemble(&path, None).await.unwrap();
        let second = assembler.assemble(&path, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(assembler.loader().metrics().cache_misses(), 2);
    }
}
