//! Path enumeration: every (locale, route, params) combination to pre-render.

use crate::routes::{ConcretePath, ParamMap, RouteCatalogue, RouteTemplate};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Supplies parameter values for templates with a dynamic segment.
pub trait ParamSource: Send + Sync {
    fn list_param_values(&self, template: &RouteTemplate) -> Result<Vec<ParamMap>>;
}

/// Parameter values fixed at configuration time, keyed by slug pattern.
#[derive(Debug, Clone, Default)]
pub struct StaticParamSource {
    values: HashMap<String, Vec<ParamMap>>,
}

impl StaticParamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register single-parameter values for `slug`'s dynamic parameter.
    pub fn with_values<I, S>(mut self, slug: &str, param: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let maps = values
            .into_iter()
            .map(|value| ParamMap::from([(param.to_string(), value.into())]))
            .collect();
        self.values.insert(slug.trim_matches('/').to_string(), maps);
        self
    }
}

impl ParamSource for StaticParamSource {
    fn list_param_values(&self, template: &RouteTemplate) -> Result<Vec<ParamMap>> {
        Ok(self
            .values
            .get(template.slug_pattern())
            .cloned()
            .unwrap_or_default())
    }
}

/// Computes the full set of concrete paths to build ahead of time.
pub struct PathEnumerator {
    catalogue: Arc<RouteCatalogue>,
    params: Arc<dyn ParamSource>,
}

impl PathEnumerator {
    pub fn new(catalogue: Arc<RouteCatalogue>, params: Arc<dyn ParamSource>) -> Self {
        Self { catalogue, params }
    }

    /// Cross product of eligible locales and parameter values for every template.
    ///
    /// A template whose parameter source fails or returns nothing contributes no
    /// paths; the rest of the catalogue is still enumerated.
    pub fn enumerate(&self) -> BTreeSet<ConcretePath> {
        let mut paths = BTreeSet::new();

        for template in self.catalogue.list_templates() {
            let locales = self.catalogue.eligible_locales_for(template);
            let param_sets = match self.param_sets_for(template) {
                Some(sets) => sets,
                None => continue,
            };

            for locale in &locales {
                for params in &param_sets {
                    paths.insert(ConcretePath::new(
                        locale.clone(),
                        template.slug_pattern(),
                        params.clone(),
                    ));
                }
            }
        }

        info!(
            "Enumerated {} paths across {} routes",
            paths.len(),
            self.catalogue.list_templates().len()
        );
        paths
    }

    /// Parameter maps for one template; a static template has exactly one, empty.
    fn param_sets_for(&self, template: &RouteTemplate) -> Option<Vec<ParamMap>> {
        let Some(name) = template.dynamic_param() else {
            return Some(vec![ParamMap::new()]);
        };

        let values = match self.params.list_param_values(template) {
            Ok(values) => values,
            Err(e) => {
                warn!(
                    "Parameter source failed for '{}', skipping route: {:#}",
                    template.slug_pattern(),
                    e
                );
                return None;
            }
        };

        let mut sets = Vec::with_capacity(values.len());
        for raw in values {
            match raw.get(name).filter(|value| !value.is_empty()) {
                Some(value) => sets.push(ParamMap::from([(name.to_string(), value.clone())])),
                None => debug!(
                    "Ignoring parameter set without '{}' for '{}'",
                    name,
                    template.slug_pattern()
                ),
            }
        }

        if sets.is_empty() {
            warn!(
                "Route '{}' has no values for parameter '{}', no paths generated",
                template.slug_pattern(),
                name
            );
            return None;
        }
        Some(sets)
    }
}
