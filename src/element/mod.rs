//! OSM elements as seen by the filter engine.
//!
//! The engine only ever reads tags through [`TagView`], so the same compiled
//! filter can run against stored elements, borrowed elements, or synthetic
//! views such as [`LifecycleView`].

mod lifecycle;

pub use lifecycle::{LifecycleView, as_if_it_wasnt, matches_as_if_it_wasnt};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// OSM element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub const ALL: [ElementType; 3] = [ElementType::Node, ElementType::Way, ElementType::Relation];

    fn bit(self) -> u8 {
        match self {
            ElementType::Node => 0b001,
            ElementType::Way => 0b010,
            ElementType::Relation => 0b100,
        }
    }

    /// Plural keyword used in filter expressions.
    pub fn keyword(self) -> &'static str {
        match self {
            ElementType::Node => "nodes",
            ElementType::Way => "ways",
            ElementType::Relation => "relations",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Node => write!(f, "node"),
            ElementType::Way => write!(f, "way"),
            ElementType::Relation => write!(f, "relation"),
        }
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "node" | "n" => Ok(ElementType::Node),
            "way" | "w" => Ok(ElementType::Way),
            "relation" | "r" => Ok(ElementType::Relation),
            _ => Err(format!("invalid element type: {value}")),
        }
    }
}

/// Non-empty set of element types, the leading clause of a filter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementTypes(u8);

impl ElementTypes {
    pub fn empty() -> Self {
        ElementTypes(0)
    }

    pub fn all() -> Self {
        ElementTypes(0b111)
    }

    pub fn insert(&mut self, element_type: ElementType) {
        self.0 |= element_type.bit();
    }

    #[inline]
    pub fn contains(&self, element_type: ElementType) -> bool {
        self.0 & element_type.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementType> + '_ {
        ElementType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

impl FromIterator<ElementType> for ElementTypes {
    fn from_iter<I: IntoIterator<Item = ElementType>>(iter: I) -> Self {
        let mut types = ElementTypes::empty();
        for element_type in iter {
            types.insert(element_type);
        }
        types
    }
}

impl fmt::Debug for ElementTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ElementTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keywords: Vec<&str> = self.iter().map(ElementType::keyword).collect();
        write!(f, "{}", keywords.join(", "))
    }
}

/// Read-only access to a set of tags.
pub trait TagView {
    /// Value of `key`, if present.
    fn tag(&self, key: &str) -> Option<&str>;

    /// All tags, in no particular order.
    fn tags(&self) -> impl Iterator<Item = (&str, &str)>;
}

/// An element the filter can be evaluated against.
pub trait Element: TagView {
    fn element_type(&self) -> ElementType;

    fn id(&self) -> i64;

    /// Time of the last edit, when the storage layer knows it.
    fn timestamp(&self) -> Option<OffsetDateTime> {
        None
    }
}

impl TagView for HashMap<String, String> {
    fn tag(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }

    fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<T: TagView + ?Sized> TagView for &T {
    fn tag(&self, key: &str) -> Option<&str> {
        (**self).tag(key)
    }

    fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        (**self).tags()
    }
}

impl<T: Element + ?Sized> Element for &T {
    fn element_type(&self) -> ElementType {
        (**self).element_type()
    }

    fn id(&self) -> i64 {
        (**self).id()
    }

    fn timestamp(&self) -> Option<OffsetDateTime> {
        (**self).timestamp()
    }
}

/// Owned element with a fully materialized tag map.
///
/// This is also the JSON-lines record format read and written by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub id: i64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl OsmElement {
    pub fn new<'a, I>(element_type: ElementType, id: i64, tags: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            element_type,
            id,
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timestamp: None,
        }
    }

    pub fn node<'a, I>(id: i64, tags: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(ElementType::Node, id, tags)
    }

    pub fn way<'a, I>(id: i64, tags: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(ElementType::Way, id, tags)
    }

    pub fn relation<'a, I>(id: i64, tags: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(ElementType::Relation, id, tags)
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl TagView for OsmElement {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.tag(key)
    }

    fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Element for OsmElement {
    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_types_membership() {
        let types: ElementTypes = [ElementType::Node, ElementType::Relation].into_iter().collect();
        assert!(types.contains(ElementType::Node));
        assert!(!types.contains(ElementType::Way));
        assert!(types.contains(ElementType::Relation));
        assert_eq!(types.to_string(), "nodes, relations");
    }

    #[test]
    fn test_element_json_round_trip_keeps_type_and_tags() {
        let line = r#"{"type":"way","id":42,"tags":{"highway":"residential"}}"#;
        let element: OsmElement = serde_json::from_str(line).unwrap();
        assert_eq!(element.element_type, ElementType::Way);
        assert_eq!(element.tag("highway"), Some("residential"));
        assert_eq!(element.timestamp, None);
    }

    #[test]
    fn test_element_json_reads_rfc3339_timestamp() {
        let line = r#"{"type":"node","id":1,"timestamp":"2021-03-04T05:06:07Z"}"#;
        let element: OsmElement = serde_json::from_str(line).unwrap();
        let ts = element.timestamp.unwrap();
        assert_eq!(ts.year(), 2021);
        assert!(element.tags.is_empty());
    }

    #[test]
    fn test_element_type_parses_short_forms() {
        assert_eq!("n".parse::<ElementType>().unwrap(), ElementType::Node);
        assert_eq!("Relation".parse::<ElementType>().unwrap(), ElementType::Relation);
        assert!("area".parse::<ElementType>().is_err());
    }
}
