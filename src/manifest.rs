//! Site manifest: the JSON file declaring locales, routes and parameter values.

use crate::enumerator::StaticParamSource;
use crate::i18n::LocaleRegistry;
use crate::routes::{
    FallbackPolicy, RouteCatalogue, RouteTemplate, DEFAULT_NAMESPACE, DEFAULT_REVALIDATE_SECONDS,
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SiteManifest {
    pub locales: Vec<String>,
    pub default_locale: String,
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RouteEntry {
    pub slug: String,
    #[serde(default)]
    pub locales: LocalesEntry,
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    #[serde(default = "default_revalidate")]
    pub revalidate: u64,
    #[serde(default = "default_fallback")]
    pub fallback: FallbackPolicy,
    /// Values of the route's dynamic parameter
    #[serde(default)]
    pub params: Vec<String>,
}

/// `"all"` or a list of locale codes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LocalesEntry {
    Keyword(String),
    List(Vec<String>),
}

impl Default for LocalesEntry {
    fn default() -> Self {
        LocalesEntry::Keyword("all".to_string())
    }
}

fn default_namespaces() -> Vec<String> {
    vec![DEFAULT_NAMESPACE.to_string()]
}

fn default_revalidate() -> u64 {
    DEFAULT_REVALIDATE_SECONDS
}

fn default_fallback() -> FallbackPolicy {
    FallbackPolicy::Blocking
}

/// Everything the manifest configures.
#[derive(Debug)]
pub struct Site {
    pub registry: Arc<LocaleRegistry>,
    pub catalogue: Arc<RouteCatalogue>,
    pub params: Arc<StaticParamSource>,
}

impl SiteManifest {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse site manifest")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site manifest {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Validate the manifest and build the registry, catalogue and parameter source.
    pub fn into_site(self) -> Result<Site> {
        let registry = Arc::new(LocaleRegistry::new(self.locales, &self.default_locale)?);

        let mut templates = Vec::with_capacity(self.routes.len());
        let mut params = StaticParamSource::new();

        for entry in self.routes {
            let mut template = RouteTemplate::new(&entry.slug)?
                .with_namespaces(entry.namespaces)
                .with_revalidate(entry.revalidate)
                .with_fallback(entry.fallback);

            match entry.locales {
                LocalesEntry::Keyword(keyword) if keyword == "all" => {}
                LocalesEntry::Keyword(other) => {
                    bail!(
                        "Route '{}': locales must be \"all\" or a list, got \"{}\"",
                        entry.slug,
                        other
                    )
                }
                LocalesEntry::List(codes) => template = template.with_locales(codes),
            }

            match template.dynamic_param() {
                Some(name) => {
                    params = params.with_values(template.slug_pattern(), name, entry.params);
                }
                None if !entry.params.is_empty() => {
                    bail!(
                        "Route '{}' lists params but has no dynamic segment",
                        entry.slug
                    )
                }
                None => {}
            }

            templates.push(template);
        }

        let catalogue = Arc::new(RouteCatalogue::new(Arc::clone(&registry), templates)?);

        Ok(Site {
            registry,
            catalogue,
            params: Arc::new(params),
        })
    }
}
