use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::units::UnitTable;

/// Engine settings read from YAML.
///
/// ```yaml
/// units:
///   yd: { dimension: length, factor: 0.9144 }
/// filters:
///   vacant_shop: nodes, ways with shop ~ vacant|no
/// ```
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Extra or overridden unit suffixes, merged over the built-in table.
    #[serde(default = "UnitTable::empty")]
    pub units: UnitTable,
    /// Named filter expressions, sorted by name.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read {:?}", path))?;
        settings
            .try_deserialize()
            .with_context(|| format!("Config: Invalid settings in {:?}", path))
    }

    /// Built-in units with this configuration's entries applied on top.
    pub fn unit_table(&self) -> UnitTable {
        let mut table = UnitTable::default();
        table.merge(&self.units);
        table
    }
}
