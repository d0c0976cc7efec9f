//! Named filters compiled once at startup.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::FilterCache;
use crate::config::EngineConfig;
use crate::dsl::{ElementFilter, FilterError};

/// Outcome of compiling one configured filter.
#[derive(Debug)]
pub struct CheckReport {
    pub name: String,
    pub result: Result<Arc<ElementFilter>, FilterError>,
}

/// Every configured filter, compiled.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<ElementFilter>>,
}

impl FilterRegistry {
    /// Compile all filters from `config` through `cache`. Fails on the first
    /// invalid expression.
    pub fn from_config(config: &EngineConfig, cache: &FilterCache) -> Result<Self> {
        let mut filters = BTreeMap::new();
        for (name, source) in &config.filters {
            let filter = cache
                .get_or_compile(source)
                .with_context(|| format!("Registry: filter '{}'", name))?;
            tracing::debug!("Registry: {} -> {}", name, filter.element_types());
            filters.insert(name.clone(), filter);
        }
        tracing::info!("Registry: {} filters compiled", filters.len());
        Ok(Self { filters })
    }

    /// Compile every filter and report each result, without stopping at
    /// the first failure.
    pub fn check(config: &EngineConfig, cache: &FilterCache) -> Vec<CheckReport> {
        config
            .filters
            .iter()
            .map(|(name, source)| CheckReport {
                name: name.clone(),
                result: cache.get_or_compile(source),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ElementFilter>> {
        self.filters.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
