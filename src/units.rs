//! Units for numeric tag comparisons.
//!
//! Numbers in OSM tags often carry a unit (`maxspeed=30 mph`,
//! `maxheight=3.5 m`). Every known unit belongs to a dimension and is
//! converted into that dimension's canonical unit with a plain
//! multiplication:
//!
//! | dimension | canonical | suffixes |
//! |-----------|-----------|----------|
//! | speed     | km/h      | km/h, kmh, kph, mph, knots |
//! | length    | m         | m, km, cm, ft, mi |
//! | weight    | t         | t, kg, lbs, st |
//!
//! The table is configuration: see [`crate::config::EngineConfig`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dsl::{CompareOp, CompileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Speed,
    Length,
    Weight,
}

/// One unit suffix: its dimension and the factor to the canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    pub dimension: Dimension,
    pub factor: f64,
}

/// A number normalized to its dimension's canonical unit.
///
/// `dimension` is `None` for bare numbers, which compare against any
/// dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub dimension: Option<Dimension>,
}

impl Quantity {
    pub fn plain(value: f64) -> Self {
        Self {
            value,
            dimension: None,
        }
    }

    /// `self <op> threshold`, false when both carry different dimensions.
    pub fn compare(&self, op: CompareOp, threshold: &Quantity) -> bool {
        if let (Some(a), Some(b)) = (self.dimension, threshold.dimension) {
            if a != b {
                return false;
            }
        }
        op.apply(self.value, threshold.value)
    }
}

/// Unit suffix table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTable {
    units: HashMap<String, UnitDef>,
}

impl Default for UnitTable {
    fn default() -> Self {
        let mut table = UnitTable::empty();
        for (suffix, factor) in [
            ("km/h", 1.0),
            ("kmh", 1.0),
            ("kph", 1.0),
            ("mph", 1.609344),
            ("knots", 1.852),
        ] {
            table.insert(suffix, Dimension::Speed, factor);
        }
        for (suffix, factor) in [
            ("m", 1.0),
            ("km", 1000.0),
            ("cm", 0.01),
            ("ft", 0.3048),
            ("mi", 1609.344),
        ] {
            table.insert(suffix, Dimension::Length, factor);
        }
        for (suffix, factor) in [
            ("t", 1.0),
            ("kg", 0.001),
            ("lbs", 0.000_453_592_37),
            ("st", 0.907_184_74),
        ] {
            table.insert(suffix, Dimension::Weight, factor);
        }
        table
    }
}

impl UnitTable {
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    pub fn insert(&mut self, suffix: &str, dimension: Dimension, factor: f64) {
        self.units
            .insert(suffix.to_string(), UnitDef { dimension, factor });
    }

    /// Add or override entries from `other`.
    pub fn merge(&mut self, other: &UnitTable) {
        for (suffix, def) in &other.units {
            self.units.insert(suffix.clone(), *def);
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a suffix, exact first, then ignoring ASCII case.
    pub fn get(&self, suffix: &str) -> Option<UnitDef> {
        if let Some(def) = self.units.get(suffix) {
            return Some(*def);
        }
        self.units
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(suffix))
            .map(|(_, def)| *def)
    }

    /// Parse a literal from a query, e.g. `60` or `30 mph`.
    pub fn parse_literal(&self, literal: &str) -> Result<Quantity, CompileError> {
        let (value, unit) = split_number(literal).ok_or_else(|| CompileError::InvalidNumber {
            literal: literal.to_string(),
        })?;
        self.normalize(value, unit)
            .ok_or_else(|| CompileError::UnknownUnit {
                literal: literal.to_string(),
                unit: unit.to_string(),
            })
    }

    /// Parse a tag value from map data. Anything that is not a number with
    /// an optional known unit yields `None`.
    pub fn parse_tag_value(&self, value: &str) -> Option<Quantity> {
        let (value, unit) = split_number(value)?;
        self.normalize(value, unit)
    }

    fn normalize(&self, value: f64, unit: &str) -> Option<Quantity> {
        if unit.is_empty() {
            return Some(Quantity::plain(value));
        }
        let def = self.get(unit)?;
        Some(Quantity {
            value: value * def.factor,
            dimension: Some(def.dimension),
        })
    }
}

/// Split `"30 mph"` into `(30.0, "mph")`. The number must come first and
/// contain at least one digit; the remainder is trimmed.
fn split_number(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    let value: f64 = s[..end].parse().ok()?;
    Some((value, s[end..].trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_number_and_unit() {
        assert_eq!(split_number("30"), Some((30.0, "")));
        assert_eq!(split_number(" 30 mph "), Some((30.0, "mph")));
        assert_eq!(split_number("3.5m"), Some((3.5, "m")));
        assert_eq!(split_number("-5"), Some((-5.0, "")));
        assert_eq!(split_number(".5"), Some((0.5, "")));
        assert_eq!(split_number("7."), Some((7.0, ".")));
        assert_eq!(split_number("none"), None);
        assert_eq!(split_number(""), None);
        assert_eq!(split_number("-"), None);
    }

    #[test]
    fn test_normalizes_mph_without_rounding() {
        let units = UnitTable::default();
        let q = units.parse_tag_value("30 mph").unwrap();
        assert_eq!(q.dimension, Some(Dimension::Speed));
        assert!((q.value - 48.28032).abs() < 1e-9);

        let q = units.parse_tag_value("45 mph").unwrap();
        assert!((q.value - 72.42048).abs() < 1e-9);
    }

    #[test]
    fn test_boundary_around_sixty_kmh() {
        let units = UnitTable::default();
        let limit = units.parse_literal("60").unwrap();
        // 37 mph = 59.546 km/h, 38 mph = 61.155 km/h
        assert!(units.parse_tag_value("37 mph").unwrap().compare(CompareOp::Le, &limit));
        assert!(!units.parse_tag_value("38 mph").unwrap().compare(CompareOp::Le, &limit));
        // exact equality survives normalization for factor 1
        assert!(units.parse_tag_value("60 km/h").unwrap().compare(CompareOp::Le, &limit));
    }

    #[test]
    fn test_unit_lookup_ignores_case() {
        let units = UnitTable::default();
        assert_eq!(units.parse_tag_value("20 MPH"), units.parse_tag_value("20 mph"));
    }

    #[test]
    fn test_unknown_units() {
        let units = UnitTable::default();
        assert_eq!(units.parse_tag_value("30 furlongs"), None);
        assert_eq!(units.parse_tag_value("30;50"), None);
        assert_eq!(
            units.parse_literal("30 furlongs"),
            Err(CompileError::UnknownUnit {
                literal: "30 furlongs".into(),
                unit: "furlongs".into()
            })
        );
        assert_eq!(
            units.parse_literal("fast"),
            Err(CompileError::InvalidNumber {
                literal: "fast".into()
            })
        );
    }

    #[test]
    fn test_dimensions_must_agree() {
        let units = UnitTable::default();
        let speed = units.parse_literal("30 mph").unwrap();
        let height = units.parse_tag_value("3 m").unwrap();
        assert!(!height.compare(CompareOp::Lt, &speed));
        assert!(!height.compare(CompareOp::Ge, &speed));
        // bare numbers compare against anything
        let bare = units.parse_tag_value("40").unwrap();
        assert!(bare.compare(CompareOp::Lt, &speed));
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let mut units = UnitTable::default();
        let mut extra = UnitTable::empty();
        extra.insert("mph", Dimension::Speed, 1.6);
        extra.insert("yd", Dimension::Length, 0.9144);
        units.merge(&extra);
        assert_eq!(units.get("mph").unwrap().factor, 1.6);
        assert_eq!(units.get("yd").unwrap().dimension, Dimension::Length);
    }
}
