//! Views of an element "as if it wasn't" in a lifecycle state.
//!
//! OSM marks former or inactive features with a lifecycle prefix on the key,
//! e.g. `disused:shop=bakery`. A filter written for `shop` can be reused for
//! disused shops by evaluating it against a view that exposes
//! `disused:shop` as `shop`.

use super::{Element, ElementType, TagView};
use crate::dsl::ElementFilter;
use time::OffsetDateTime;

/// Read-only projection of an element's tags with one lifecycle prefix
/// stripped.
///
/// Keys of the form `<prefix>:<rest>` are exposed as `<rest>` and are not
/// reachable under their original name. Other keys pass through unless a
/// stripped key shadows them. The underlying element is never modified.
#[derive(Debug, Clone)]
pub struct LifecycleView<'a, E: ?Sized> {
    element: &'a E,
    // Sorted by key, unique keys.
    tags: Vec<(&'a str, &'a str)>,
    stripped: usize,
}

impl<'a, E: Element + ?Sized> LifecycleView<'a, E> {
    pub fn new(prefix: &str, element: &'a E) -> Self {
        let mut tags: Vec<(&'a str, &'a str)> = Vec::new();
        let mut plain: Vec<(&'a str, &'a str)> = Vec::new();

        for (key, value) in element.tags() {
            match strip_lifecycle(prefix, key) {
                Some(rest) => tags.push((rest, value)),
                None => plain.push((key, value)),
            }
        }

        let stripped = tags.len();
        tags.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (key, value) in plain {
            if tags[..stripped].binary_search_by(|t| t.0.cmp(key)).is_err() {
                tags.push((key, value));
            }
        }
        tags.sort_unstable_by(|a, b| a.0.cmp(b.0));

        Self {
            element,
            tags,
            stripped,
        }
    }

    /// Number of keys that carried the prefix.
    pub fn stripped_count(&self) -> usize {
        self.stripped
    }
}

fn strip_lifecycle<'k>(prefix: &str, key: &'k str) -> Option<&'k str> {
    key.strip_prefix(prefix)?
        .strip_prefix(':')
        .filter(|rest| !rest.is_empty())
}

impl<E: Element + ?Sized> TagView for LifecycleView<'_, E> {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|t| t.0.cmp(key))
            .ok()
            .map(|idx| self.tags[idx].1)
    }

    fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|&(k, v)| (k, v))
    }
}

impl<E: Element + ?Sized> Element for LifecycleView<'_, E> {
    fn element_type(&self) -> ElementType {
        self.element.element_type()
    }

    fn id(&self) -> i64 {
        self.element.id()
    }

    fn timestamp(&self) -> Option<OffsetDateTime> {
        self.element.timestamp()
    }
}

/// The element as if it wasn't in the `prefix` lifecycle state, or `None`
/// if none of its keys carry that prefix.
pub fn as_if_it_wasnt<'a, E: Element + ?Sized>(
    prefix: &str,
    element: &'a E,
) -> Option<LifecycleView<'a, E>> {
    let view = LifecycleView::new(prefix, element);
    (view.stripped_count() > 0).then_some(view)
}

/// Whether `filter` matches the element once the `prefix` lifecycle state is
/// stripped, e.g. "is a disused shop" from an "is a shop" filter.
pub fn matches_as_if_it_wasnt<E: Element + ?Sized>(
    filter: &ElementFilter,
    prefix: &str,
    element: &E,
) -> bool {
    as_if_it_wasnt(prefix, element).is_some_and(|view| filter.matches(&view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::OsmElement;

    #[test]
    fn test_strips_prefixed_keys() {
        let element = OsmElement::node(1, [("disused:shop", "bakery"), ("name", "Bob's")]);
        let view = LifecycleView::new("disused", &element);
        assert_eq!(view.tag("shop"), Some("bakery"));
        assert_eq!(view.tag("name"), Some("Bob's"));
        assert_eq!(view.tag("disused:shop"), None);
        assert_eq!(view.stripped_count(), 1);
    }

    #[test]
    fn test_prefixed_value_shadows_plain_key() {
        let element = OsmElement::node(1, [("disused:amenity", "bench"), ("amenity", "waste_basket")]);
        let view = LifecycleView::new("disused", &element);
        assert_eq!(view.tag("amenity"), Some("bench"));
        assert_eq!(view.tags().count(), 1);
    }

    #[test]
    fn test_other_prefixes_pass_through() {
        let element = OsmElement::node(1, [("abandoned:shop", "yes"), ("disusedshop", "x")]);
        let view = LifecycleView::new("disused", &element);
        assert_eq!(view.tag("abandoned:shop"), Some("yes"));
        assert_eq!(view.tag("disusedshop"), Some("x"));
        assert_eq!(view.tag("shop"), None);
        assert!(as_if_it_wasnt("disused", &element).is_none());
    }

    #[test]
    fn test_view_keeps_identity_of_element() {
        let element = OsmElement::way(7, [("disused:railway", "rail")]);
        let view = as_if_it_wasnt("disused", &element).unwrap();
        assert_eq!(view.element_type(), ElementType::Way);
        assert_eq!(view.id(), 7);
        // underlying element untouched
        assert_eq!(element.tag("disused:railway"), Some("rail"));
        assert_eq!(element.tag("railway"), None);
    }

    #[test]
    fn test_bare_prefix_key_is_not_stripped() {
        let element = OsmElement::node(1, [("disused:", "yes"), ("disused", "yes")]);
        let view = LifecycleView::new("disused", &element);
        assert_eq!(view.stripped_count(), 0);
        assert_eq!(view.tag("disused"), Some("yes"));
    }
}
