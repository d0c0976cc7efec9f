//! Process-wide cache of compiled filters, keyed by expression text.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::dsl::{ElementFilter, FilterError};
use crate::units::UnitTable;

/// Compiles each distinct expression at most once and hands out shared
/// handles to the result.
///
/// Lookups take a read lock. On a miss the write lock is taken and the
/// entry re-checked before compiling, so concurrent first requests for the
/// same text all receive the same `Arc`. Failed compilations are not
/// cached.
#[derive(Debug)]
pub struct FilterCache {
    units: Arc<UnitTable>,
    entries: RwLock<HashMap<String, Arc<ElementFilter>>>,
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(Arc::new(UnitTable::default()))
    }
}

impl FilterCache {
    pub fn new(units: Arc<UnitTable>) -> Self {
        Self {
            units,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_compile(&self, source: &str) -> Result<Arc<ElementFilter>, FilterError> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(filter) = entries.get(source) {
                tracing::debug!("Cache: hit for {:?}", source);
                return Ok(Arc::clone(filter));
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(filter) = entries.get(source) {
            tracing::debug!("Cache: hit for {:?} after wait", source);
            return Ok(Arc::clone(filter));
        }

        tracing::debug!("Cache: compiling {:?}", source);
        let filter = Arc::new(ElementFilter::parse_with_units(
            source,
            Arc::clone(&self.units),
        )?);
        entries.insert(source.to_string(), Arc::clone(&filter));
        Ok(filter)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
