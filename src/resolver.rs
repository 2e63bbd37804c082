//! Request-time resolution: URL or (locale, slug, params) -> what to serve.

use crate::assembler::PageProps;
use crate::error::{BuildFailure, ResolveError};
use crate::generation::{CacheStatus, GenerationMachine, Peek, RenderedPage, Serve};
use crate::routes::{ParamMap, RouteCatalogue};
use std::sync::Arc;
use tracing::debug;

/// What the request router should send back.
#[derive(Debug, Clone)]
pub enum Resolution {
    Page {
        page: Arc<RenderedPage>,
        cache: CacheStatus,
    },
    /// `None` when the route exists but this path is not generated and the
    /// route does not build on demand
    NotFound(Option<ResolveError>),
    /// Only from [`Resolver::peek_request`]: the page is being built
    PendingBuild,
    Failed(BuildFailure),
}

impl Resolution {
    /// Props the page was rendered from, when there is a page.
    pub fn props(&self) -> Option<&PageProps> {
        match self {
            Resolution::Page { page, .. } => Some(page.props.as_ref()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound(_))
    }
}

#[derive(Clone)]
pub struct Resolver {
    catalogue: Arc<RouteCatalogue>,
    machine: GenerationMachine,
}

impl Resolver {
    pub fn new(catalogue: Arc<RouteCatalogue>, machine: GenerationMachine) -> Self {
        Self { catalogue, machine }
    }

    pub fn machine(&self) -> &GenerationMachine {
        &self.machine
    }

    pub fn catalogue(&self) -> &RouteCatalogue {
        &self.catalogue
    }

    /// Resolve a request, waiting for an on-demand build if the route blocks.
    pub async fn resolve_request(
        &self,
        locale: &str,
        slug: &str,
        raw_params: &ParamMap,
    ) -> Resolution {
        let path = match self.catalogue.concrete_path(locale, slug, raw_params) {
            Ok((path, _)) => path,
            Err(e) => return not_found(e),
        };

        match self.machine.serve(&path).await {
            Serve::Page { page, cache } => Resolution::Page { page, cache },
            Serve::NotFound => Resolution::NotFound(None),
            Serve::Failed(failure) => Resolution::Failed(failure),
        }
    }

    /// Resolve a request without ever waiting on a build.
    ///
    /// # Panics
    ///
    /// Must run inside a Tokio runtime whenever it has to start a build.
    pub fn peek_request(&self, locale: &str, slug: &str, raw_params: &ParamMap) -> Resolution {
        let path = match self.catalogue.concrete_path(locale, slug, raw_params) {
            Ok((path, _)) => path,
            Err(e) => return not_found(e),
        };

        match self.machine.peek(&path) {
            Peek::Page { page, cache } => Resolution::Page { page, cache },
            Peek::Pending => Resolution::PendingBuild,
            Peek::NotFound => Resolution::NotFound(None),
        }
    }

    /// Decompose a URL path and resolve it.
    pub async fn resolve_url(&self, url_path: &str) -> Resolution {
        match self.catalogue.decompose(url_path) {
            Ok(target) => {
                self.resolve_request(&target.locale, &target.slug, &target.params)
                    .await
            }
            Err(e) => not_found(e),
        }
    }
}

fn not_found(reason: ResolveError) -> Resolution {
    debug!("Not found: {}", reason);
    Resolution::NotFound(Some(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::PageAssembler;
    use crate::i18n::{LocaleRegistry, StaticTranslationSource, TranslationLoader};
    use crate::routes::{FallbackPolicy, RouteTemplate};

    fn resolver() -> Resolver {
        let registry = Arc::new(LocaleRegistry::new(["en", "fr"], "en").unwrap());
        let catalogue = Arc::new(
            RouteCatalogue::new(
                Arc::clone(&registry),
                vec![
                    RouteTemplate::new("solutions/loyalty").unwrap(),
                    RouteTemplate::new("events/[event]")
                        .unwrap()
                        .with_locales(["en"])
                        .with_fallback(FallbackPolicy::Unavailable),
                ],
            )
            .unwrap(),
        );
        let source = StaticTranslationSource::new()
            .with_namespace("en", "common", r#"{"loyalty": {"title": "Loyalty"}}"#)
            .with_namespace("fr", "common", r#"{"loyalty": {"title": "Fidélité"}}"#);
        let loader = Arc::new(TranslationLoader::new(registry, Arc::new(source)));
        let assembler = PageAssembler::new(Arc::clone(&catalogue), loader);
        let renderer = |props: Arc<PageProps>| async move {
            Ok::<_, anyhow::Error>(props.t("common", "loyalty.title").to_string())
        };
        let machine = GenerationMachine::new(Arc::clone(&catalogue), assembler, Arc::new(renderer));
        Resolver::new(catalogue, machine)
    }

    #[tokio::test]
    async fn test_unsupported_locale_is_not_found() {
        let resolution = resolver()
            .resolve_request("de", "solutions/loyalty", &ParamMap::new())
            .await;
        match resolution {
            Resolution::NotFound(Some(ResolveError::UnknownLocale(code))) => assert_eq!(code, "de"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let resolution = resolver()
            .resolve_request("en", "solutions/gaming", &ParamMap::new())
            .await;
        assert!(matches!(
            resolution,
            Resolution::NotFound(Some(ResolveError::UnknownRoute(_)))
        ));
    }

    #[tokio::test]
    async fn test_resolve_url_builds_and_returns_props() {
        let resolver = resolver();
        let resolution = resolver.resolve_url("/fr/solutions/loyalty").await;

        let props = resolution.props().expect("page expected");
        assert_eq!(props.locale, "fr");
        match resolution {
            Resolution::Page { page, cache } => {
                assert_eq!(page.markup, "Fidélité");
                assert_eq!(cache, CacheStatus::Miss);
            }
            other => panic!("unexpected {:?}", other),
        }

        let again = resolver.resolve_url("/fr/solutions/loyalty").await;
        assert!(matches!(
            again,
            Resolution::Page {
                cache: CacheStatus::Hit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_resolve_url_unprefixed_uses_default_locale() {
        let resolution = resolver().resolve_url("/solutions/loyalty").await;
        assert_eq!(resolution.props().map(|p| p.locale.as_str()), Some("en"));
    }

    #[tokio::test]
    async fn test_resolve_url_unknown_locale() {
        let resolution = resolver().resolve_url("/de/solutions/loyalty").await;
        assert!(matches!(
            resolution,
            Resolution::NotFound(Some(ResolveError::UnknownLocale(_)))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_route_not_generated() {
        let resolution = resolver().resolve_url("/en/events/breakpoint").await;
        assert!(matches!(resolution, Resolution::NotFound(None)));
        assert!(resolution.is_not_found());
    }

    #[tokio::test]
    async fn test_peek_signals_pending_build() {
        let resolver = resolver();
        let resolution = resolver.peek_request("en", "solutions/loyalty", &ParamMap::new());
        assert!(matches!(resolution, Resolution::PendingBuild));
    }

    #[tokio::test]
    async fn test_peek_not_eligible_locale() {
        let mut params = ParamMap::new();
        params.insert("event".to_string(), "breakpoint".to_string());
        let resolution = resolver().peek_request("fr", "events/[event]", &params);
        assert!(matches!(
            resolution,
            Resolution::NotFound(Some(ResolveError::LocaleNotEligible { .. }))
        ));
    }
}
