//! Route catalogue: which page templates exist, where they are published and
//! how incoming URLs map onto them.

use crate::error::ResolveError;
use crate::i18n::LocaleRegistry;
use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Route parameter name -> value.
pub type ParamMap = BTreeMap<String, String>;

/// Default revalidation interval for generated pages, in seconds.
pub const DEFAULT_REVALIDATE_SECONDS: u64 = 60;

/// Namespace loaded when a template declares none.
pub const DEFAULT_NAMESPACE: &str = "common";

/// Which locales a template is published in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibleLocales {
    /// Every locale in the registry, resolved at enumeration time
    All,
    /// Only these codes
    Explicit(BTreeSet<String>),
}

/// What to do with a request for a path that has never been generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Build on demand; the request waits for the build
    Blocking,
    /// Respond not-found without building
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Dynamic(String),
}

/// A page template, e.g. `solutions/wallets` or `blog/[post]`.
///
/// At most one `[name]` segment declares the dynamic parameter.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    slug_pattern: String,
    segments: Vec<Segment>,
    dynamic_param: Option<String>,
    pub eligible_locales: EligibleLocales,
    pub namespaces: Vec<String>,
    pub revalidate_seconds: u64,
    pub fallback: FallbackPolicy,
}

impl RouteTemplate {
    /// Parse a slug pattern. Leading and trailing slashes are ignored; the
    /// empty pattern is the home page.
    pub fn new(slug_pattern: &str) -> Result<Self> {
        let slug_pattern = slug_pattern.trim_matches('/').to_string();
        let mut segments = Vec::new();
        let mut dynamic_param = None;

        for raw in slug_pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if name.is_empty() {
                    bail!("Empty parameter name in route '{}'", slug_pattern);
                }
                if dynamic_param.is_some() {
                    bail!(
                        "Route '{}' declares more than one dynamic parameter",
                        slug_pattern
                    );
                }
                dynamic_param = Some(name.to_string());
                segments.push(Segment::Dynamic(name.to_string()));
            } else if raw.contains('[') || raw.contains(']') {
                bail!("Malformed segment '{}' in route '{}'", raw, slug_pattern);
            } else {
                segments.push(Segment::Static(raw.to_string()));
            }
        }

        Ok(Self {
            slug_pattern,
            segments,
            dynamic_param,
            eligible_locales: EligibleLocales::All,
            namespaces: vec![DEFAULT_NAMESPACE.to_string()],
            revalidate_seconds: DEFAULT_REVALIDATE_SECONDS,
            fallback: FallbackPolicy::Blocking,
        })
    }

    pub fn with_locales<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eligible_locales =
            EligibleLocales::Explicit(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_revalidate(mut self, seconds: u64) -> Self {
        self.revalidate_seconds = seconds;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn slug_pattern(&self) -> &str {
        &self.slug_pattern
    }

    pub fn dynamic_param(&self) -> Option<&str> {
        self.dynamic_param.as_deref()
    }

    fn static_segment_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Static(_)))
            .count()
    }

    /// Match URL segments against this template, returning captured params.
    fn match_segments(&self, segments: &[&str]) -> Option<ParamMap> {
        if segments.len() != self.segments.len() {
            return None;
        }
        let mut params = ParamMap::new();
        for (pattern, actual) in self.segments.iter().zip(segments) {
            match pattern {
                Segment::Static(expected) if expected == actual => {}
                Segment::Static(_) => return None,
                Segment::Dynamic(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

/// One buildable unit: a template instantiated for a locale and parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConcretePath {
    pub locale: String,
    /// The template's slug pattern
    pub slug: String,
    pub params: ParamMap,
}

impl ConcretePath {
    pub fn new(locale: impl Into<String>, slug: impl Into<String>, params: ParamMap) -> Self {
        Self {
            locale: locale.into(),
            slug: slug.into(),
            params,
        }
    }

    /// Public URL path, e.g. `/fr/blog/hello`.
    pub fn url(&self) -> String {
        let mut url = format!("/{}", self.locale);
        for segment in self.slug.split('/').filter(|s| !s.is_empty()) {
            let value = segment
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|name| self.params.get(name))
                .map(String::as_str)
                .unwrap_or(segment);
            url.push('/');
            url.push_str(value);
        }
        url
    }
}

impl fmt::Display for ConcretePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// An incoming URL split into (locale, template slug, params).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub locale: String,
    pub slug: String,
    pub params: ParamMap,
}

fn locale_shape() -> &'static Regex {
    static LOCALE_SHAPE: OnceLock<Regex> = OnceLock::new();
    LOCALE_SHAPE.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("locale pattern should compile")
    })
}

/// All route templates, validated against the locale registry.
#[derive(Debug, Clone)]
pub struct RouteCatalogue {
    registry: Arc<LocaleRegistry>,
    templates: Vec<RouteTemplate>,
}

impl RouteCatalogue {
    /// # Errors
    /// Fails on duplicate slugs or explicit locale sets naming unknown locales.
    pub fn new(registry: Arc<LocaleRegistry>, templates: Vec<RouteTemplate>) -> Result<Self> {
        let mut slugs = HashSet::new();
        for template in &templates {
            if !slugs.insert(template.slug_pattern.as_str()) {
                bail!("Duplicate route '{}'", template.slug_pattern);
            }
            if let EligibleLocales::Explicit(codes) = &template.eligible_locales {
                if let Some(unknown) = codes.iter().find(|code| !registry.is_supported(code)) {
                    bail!(
                        "Route '{}' lists unknown locale '{}'",
                        template.slug_pattern,
                        unknown
                    );
                }
            }
        }

        Ok(Self {
            registry,
            templates,
        })
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    pub fn list_templates(&self) -> &[RouteTemplate] {
        &self.templates
    }

    pub fn template(&self, slug: &str) -> Result<&RouteTemplate, ResolveError> {
        let slug = slug.trim_matches('/');
        self.templates
            .iter()
            .find(|template| template.slug_pattern == slug)
            .ok_or_else(|| ResolveError::UnknownRoute(slug.to_string()))
    }

    /// Locales the template is published in; `All` expands to the registry.
    pub fn eligible_locales_for(&self, template: &RouteTemplate) -> BTreeSet<String> {
        match &template.eligible_locales {
            EligibleLocales::All => self.registry.codes().map(str::to_string).collect(),
            EligibleLocales::Explicit(codes) => codes.clone(),
        }
    }

    /// Validate a (locale, slug, params) request and build its concrete path.
    ///
    /// Parameters other than the template's dynamic parameter are dropped.
    pub fn concrete_path(
        &self,
        locale: &str,
        slug: &str,
        raw_params: &ParamMap,
    ) -> Result<(ConcretePath, &RouteTemplate), ResolveError> {
        self.registry.locale(locale)?;
        let template = self.template(slug)?;

        let eligible = match &template.eligible_locales {
            EligibleLocales::All => true,
            EligibleLocales::Explicit(codes) => codes.contains(locale),
        };
        if !eligible {
            return Err(ResolveError::LocaleNotEligible {
                locale: locale.to_string(),
                slug: template.slug_pattern.clone(),
            });
        }

        let mut params = ParamMap::new();
        if let Some(name) = template.dynamic_param() {
            let value = raw_params
                .get(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ResolveError::MissingParam {
                    slug: template.slug_pattern.clone(),
                    param: name.to_string(),
                })?;
            params.insert(name.to_string(), value.clone());
        }

        Ok((
            ConcretePath::new(locale, template.slug_pattern.clone(), params),
            template,
        ))
    }

    /// Split a URL path into its request target.
    ///
    /// A leading registered locale selects that locale. Otherwise the whole
    /// path is matched under the default locale (unprefixed URLs). A leading
    /// segment shaped like a locale code that matches nothing is reported as
    /// an unknown locale.
    pub fn decompose(&self, url_path: &str) -> Result<RequestTarget, ResolveError> {
        let path = url_path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some((first, rest)) = segments.split_first() {
            if self.registry.is_supported(first) {
                return self
                    .match_path(rest)
                    .map(|(slug, params)| RequestTarget {
                        locale: (*first).to_string(),
                        slug,
                        params,
                    })
                    .ok_or_else(|| ResolveError::UnknownRoute(path.to_string()));
            }
        }

        if let Some((slug, params)) = self.match_path(&segments) {
            return Ok(RequestTarget {
                locale: self.registry.default_locale().code.clone(),
                slug,
                params,
            });
        }

        match segments.first() {
            Some(first) if locale_shape().is_match(first) => {
                Err(ResolveError::UnknownLocale((*first).to_string()))
            }
            _ => Err(ResolveError::UnknownRoute(path.to_string())),
        }
    }

    /// Most specific template matching the segments.
    fn match_path(&self, segments: &[&str]) -> Option<(String, ParamMap)> {
        self.templates
            .iter()
            .filter_map(|template| {
                template
                    .match_segments(segments)
                    .map(|params| (template, params))
            })
            .max_by_key(|(template, _)| template.static_segment_count())
            .map(|(template, params)| (template.slug_pattern.clone(), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<LocaleRegistry> {
        Arc::new(LocaleRegistry::new(["en", "fr", "ja"], "en").unwrap())
    }

    fn catalogue() -> RouteCatalogue {
        RouteCatalogue::new(
            registry(),
            vec![
                RouteTemplate::new("").unwrap(),
                RouteTemplate::new("solutions/wallets").unwrap(),
                RouteTemplate::new("solutions/depin").unwrap(),
                RouteTemplate::new("/blog/[post]/")
                    .unwrap()
                    .with_locales(["en"])
                    .with_fallback(FallbackPolicy::Unavailable),
                RouteTemplate::new("blog/archive").unwrap(),
            ],
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Templates ====================

    #[test]
    fn test_template_parses_dynamic_param() {
        let template = RouteTemplate::new("/blog/[post]/").unwrap();
        assert_eq!(template.slug_pattern(), "blog/[post]");
        assert_eq!(template.dynamic_param(), Some("post"));
        assert_eq!(template.revalidate_seconds, DEFAULT_REVALIDATE_SECONDS);
        assert_eq!(template.namespaces, vec!["common".to_string()]);
        assert_eq!(template.fallback, FallbackPolicy::Blocking);
    }

    #[test]
    fn test_template_rejects_two_dynamic_params() {
        assert!(RouteTemplate::new("docs/[a]/[b]").is_err());
    }

    #[test]
    fn test_template_rejects_malformed_segment() {
        assert!(RouteTemplate::new("docs/[]").is_err());
        assert!(RouteTemplate::new("docs/x[y").is_err());
    }

    #[test]
    fn test_catalogue_rejects_duplicate_slugs() {
        let result = RouteCatalogue::new(
            registry(),
            vec![
                RouteTemplate::new("a").unwrap(),
                RouteTemplate::new("/a").unwrap(),
            ],
        );
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_catalogue_rejects_unknown_explicit_locale() {
        let result = RouteCatalogue::new(
            registry(),
            vec![RouteTemplate::new("a").unwrap().with_locales(["de"])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_eligible_locales_all_expands_to_registry() {
        let catalogue = catalogue();
        let template = catalogue.template("solutions/wallets").unwrap();
        let eligible: Vec<_> = catalogue.eligible_locales_for(template).into_iter().collect();
        assert_eq!(eligible, vec!["en", "fr", "ja"]);
    }

    #[test]
    fn test_eligible_locales_explicit() {
        let catalogue = catalogue();
        let template = catalogue.template("blog/[post]").unwrap();
        let eligible: Vec<_> = catalogue.eligible_locales_for(template).into_iter().collect();
        assert_eq!(eligible, vec!["en"]);
    }

    // ==================== Concrete paths ====================

    #[test]
    fn test_concrete_path_url() {
        let path = ConcretePath::new("fr", "blog/[post]", params(&[("post", "hello")]));
        assert_eq!(path.url(), "/fr/blog/hello");
        assert_eq!(ConcretePath::new("en", "", ParamMap::new()).to_string(), "/en");
    }

    #[test]
    fn test_concrete_path_validation() {
        let catalogue = catalogue();

        let (path, template) = catalogue
            .concrete_path("en", "blog/[post]", &params(&[("post", "a"), ("utm", "x")]))
            .unwrap();
        assert_eq!(path.params, params(&[("post", "a")]));
        assert_eq!(template.fallback, FallbackPolicy::Unavailable);

        assert_eq!(
            catalogue
                .concrete_path("de", "solutions/wallets", &ParamMap::new())
                .unwrap_err(),
            ResolveError::UnknownLocale("de".to_string())
        );
        assert!(matches!(
            catalogue.concrete_path("fr", "blog/[post]", &params(&[("post", "a")])),
            Err(ResolveError::LocaleNotEligible { .. })
        ));
        assert!(matches!(
            catalogue.concrete_path("en", "blog/[post]", &ParamMap::new()),
            Err(ResolveError::MissingParam { .. })
        ));
        assert!(matches!(
            catalogue.concrete_path("en", "pricing", &ParamMap::new()),
            Err(ResolveError::UnknownRoute(_))
        ));
    }

    // ==================== Decomposition ====================

    #[test]
    fn test_decompose_locale_prefixed() {
        let target = catalogue().decompose("/fr/solutions/wallets").unwrap();
        assert_eq!(target.locale, "fr");
        assert_eq!(target.slug, "solutions/wallets");
        assert!(target.params.is_empty());
    }

    #[test]
    fn test_decompose_unprefixed_uses_default_locale() {
        let target = catalogue().decompose("/solutions/depin?ref=nav").unwrap();
        assert_eq!(target.locale, "en");
        assert_eq!(target.slug, "solutions/depin");
    }

    #[test]
    fn test_decompose_root_and_locale_root() {
        let catalogue = catalogue();
        assert_eq!(catalogue.decompose("/").unwrap().slug, "");
        let target = catalogue.decompose("/ja").unwrap();
        assert_eq!((target.locale.as_str(), target.slug.as_str()), ("ja", ""));
    }

    #[test]
    fn test_decompose_dynamic_and_static_precedence() {
        let catalogue = catalogue();
        let target = catalogue.decompose("/en/blog/hello").unwrap();
        assert_eq!(target.slug, "blog/[post]");
        assert_eq!(target.params, params(&[("post", "hello")]));

        let target = catalogue.decompose("/en/blog/archive").unwrap();
        assert_eq!(target.slug, "blog/archive");
    }

    #[test]
    fn test_decompose_unknown_locale() {
        assert_eq!(
            catalogue().decompose("/de/solutions/wallets").unwrap_err(),
            ResolveError::UnknownLocale("de".to_string())
        );
    }

    #[test]
    fn test_decompose_unknown_route() {
        let catalogue = catalogue();
        assert!(matches!(
            catalogue.decompose("/fr/pricing"),
            Err(ResolveError::UnknownRoute(_))
        ));
        assert!(matches!(
            catalogue.decompose("/pricing/enterprise"),
            Err(ResolveError::UnknownRoute(_))
        ));
    }
}
