use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use elfilter::{
    Element, ElementFilter, ElementType, EngineConfig, FilterCache, FilterRegistry, OsmElement,
    TagView, as_if_it_wasnt, matches_as_if_it_wasnt,
};

fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn node(pairs: &[(&str, &str)]) -> OsmElement {
    OsmElement::node(1, pairs.iter().copied())
}

/// Element that records every key the evaluator asks for.
struct Recording {
    tags: HashMap<String, String>,
    looked_up: RefCell<Vec<String>>,
}

impl TagView for Recording {
    fn tag(&self, key: &str) -> Option<&str> {
        self.looked_up.borrow_mut().push(key.to_string());
        self.tags.get(key).map(String::as_str)
    }

    fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Element for Recording {
    fn element_type(&self) -> ElementType {
        ElementType::Node
    }

    fn id(&self) -> i64 {
        1
    }
}

const IS_SHOP: &str = "nodes, ways, relations with shop and shop !~ no|vacant|mall";

#[test]
fn compiling_twice_gives_the_same_answers() {
    let query = "nodes with (highway = bus_stop or public_transport) and shelter != no";
    let a = ElementFilter::parse(query).unwrap();
    let b = ElementFilter::parse(query).unwrap();
    let samples = [
        node(&[("highway", "bus_stop")]),
        node(&[("highway", "bus_stop"), ("shelter", "no")]),
        node(&[("public_transport", "platform"), ("shelter", "yes")]),
        node(&[("amenity", "bench")]),
    ];
    for element in &samples {
        assert_eq!(a.matches(element), b.matches(element));
    }
}

#[test]
fn de_morgan_holds_for_all_inputs() {
    let pairs = [
        (
            "nodes with not (shop and name)",
            "nodes with not shop or not name",
        ),
        (
            "nodes with not (shop or name)",
            "nodes with not shop and not name",
        ),
        (
            "nodes with not (lanes >= 2 and oneway != yes)",
            "nodes with not lanes >= 2 or not oneway != yes",
        ),
    ];
    let samples = [
        node(&[]),
        node(&[("shop", "bakery")]),
        node(&[("name", "Bob")]),
        node(&[("shop", "bakery"), ("name", "Bob")]),
        node(&[("lanes", "2")]),
        node(&[("lanes", "3"), ("oneway", "yes")]),
        node(&[("lanes", "many"), ("oneway", "no")]),
    ];

    for (left, right) in pairs {
        let left = ElementFilter::parse(left).unwrap();
        let right = ElementFilter::parse(right).unwrap();
        for element in &samples {
            assert_eq!(left.matches(element), right.matches(element), "{:?}", element);
        }
    }
}

#[test]
fn false_left_operand_skips_the_right() {
    let filter = ElementFilter::parse("nodes with highway and (never_a and never_b)").unwrap();
    let element = Recording {
        tags: tags(&[("amenity", "bench")]),
        looked_up: RefCell::new(Vec::new()),
    };
    assert!(!filter.matches(&element));
    assert_eq!(*element.looked_up.borrow(), vec!["highway".to_string()]);

    let filter = ElementFilter::parse("nodes with amenity or never_c").unwrap();
    element.looked_up.borrow_mut().clear();
    assert!(filter.matches(&element));
    assert_eq!(*element.looked_up.borrow(), vec!["amenity".to_string()]);
}

#[test]
fn absent_keys() {
    let element = node(&[("amenity", "bench")]);
    assert!(!ElementFilter::parse("nodes with backrest").unwrap().matches(&element));
    assert!(ElementFilter::parse("nodes with !backrest").unwrap().matches(&element));
}

#[test]
fn value_lists_are_anchored() {
    let filter = ElementFilter::parse("nodes with shop ~ no|vacant|mall").unwrap();
    assert!(!filter.matches(&node(&[("shop", "no_frills")])));
    assert!(!filter.matches(&node(&[("shop", "small_mall")])));
    assert!(filter.matches(&node(&[("shop", "mall")])));
}

#[test]
fn speeds_are_normalized_before_comparing() {
    let filter = ElementFilter::parse("ways with maxspeed <= 60").unwrap();
    let way = |speed: &str| OsmElement::way(1, [("maxspeed", speed)]);
    assert!(filter.matches(&way("50")));
    assert!(filter.matches(&way("30 mph")));
    assert!(!filter.matches(&way("45 mph")));
}

#[test]
fn disused_shop_matches_only_through_the_view() {
    let filter = ElementFilter::parse(IS_SHOP).unwrap();
    let element = node(&[("disused:shop", "bakery")]);

    assert!(!filter.matches(&element));
    let view = as_if_it_wasnt("disused", &element).unwrap();
    assert!(filter.matches(&view));
    assert!(matches_as_if_it_wasnt(&filter, "disused", &element));
    // viewing didn't change anything
    assert!(!filter.matches(&element));
    assert_eq!(element.tag("shop"), None);
}

#[test]
fn flagpole_filter_keeps_matching_nodes_in_order() {
    let filter = ElementFilter::parse("nodes with man_made = flagpole").unwrap();
    let elements = vec![
        OsmElement::node(1, [("man_made", "flagpole")]),
        OsmElement::way(2, [("man_made", "flagpole")]),
        OsmElement::node(3, [("man_made", "street_lamp")]),
    ];
    let matched: Vec<&OsmElement> = filter.filter(&elements).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, 1);
    assert_eq!(matched[0].element_type, ElementType::Node);
}

#[test]
fn matching_is_idempotent_and_pure() {
    let filter = ElementFilter::parse(IS_SHOP).unwrap();
    let element = node(&[("shop", "bakery"), ("name", "Bob's")]);
    let before = element.clone();
    let source = filter.source().to_string();

    let first = filter.matches(&element);
    let second = filter.matches(&element);
    assert!(first);
    assert_eq!(first, second);
    assert_eq!(element, before);
    assert_eq!(filter.source(), source);
}

#[test]
fn shared_filter_across_threads() {
    let cache = FilterCache::default();
    let filter = cache.get_or_compile(IS_SHOP).unwrap();
    let elements: Vec<OsmElement> = (0..100)
        .map(|i| {
            let shop = if i % 2 == 0 { "bakery" } else { "vacant" };
            OsmElement::node(i, [("shop", shop)])
        })
        .collect();

    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let filter = Arc::clone(&filter);
                let elements = &elements;
                scope.spawn(move || filter.filter(elements).count())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![50; 4]);
}

#[test]
fn every_bundled_filter_compiles() {
    let config = EngineConfig::load(Path::new("filters/default.yaml")).unwrap();
    assert!(!config.filters.is_empty());

    let cache = FilterCache::new(Arc::new(config.unit_table()));
    for report in FilterRegistry::check(&config, &cache) {
        if let Err(err) = &report.result {
            panic!("filter '{}' does not compile: {}", report.name, err);
        }
    }
}

#[test]
fn bundled_street_parking_filter() {
    let config = EngineConfig::load(Path::new("filters/default.yaml")).unwrap();
    let cache = FilterCache::new(Arc::new(config.unit_table()));
    let registry = FilterRegistry::from_config(&config, &cache).unwrap();
    let filter = registry.get("street_parking").unwrap();

    let road = |pairs: &[(&str, &str)]| OsmElement::way(1, pairs.iter().copied());
    assert!(filter.matches(&road(&[("highway", "residential")])));
    assert!(filter.matches(&road(&[("highway", "tertiary"), ("maxspeed", "30 mph")])));
    assert!(filter.matches(&road(&[("highway", "tertiary"), ("zone:maxspeed", "DE:urban")])));
    assert!(!filter.matches(&road(&[("highway", "tertiary"), ("maxspeed", "100")])));
    assert!(!filter.matches(&road(&[("highway", "residential"), ("parking:lane:both", "no")])));
    assert!(!filter.matches(&road(&[("highway", "residential"), ("access", "private")])));
    assert!(filter.matches(&road(&[
        ("highway", "residential"),
        ("access", "private"),
        ("foot", "yes"),
    ])));
}

#[test]
fn bundled_furniture_filters() {
    let config = EngineConfig::load(Path::new("filters/default.yaml")).unwrap();
    let cache = FilterCache::new(Arc::new(config.unit_table()));
    let registry = FilterRegistry::from_config(&config, &cache).unwrap();
    let regular = registry.get("street_furniture").unwrap();
    let disused = registry.get("disused_street_furniture").unwrap();

    let bench = node(&[("disused:amenity", "bench")]);
    assert!(!regular.matches(&bench));
    assert!(disused.matches(&bench));
    assert!(matches_as_if_it_wasnt(regular, "disused", &bench));

    let flagpole = node(&[
        ("country", "PL"),
        ("flag:name", "Poland"),
        ("flag:type", "national"),
        ("man_made", "flagpole"),
        ("subject", "Poland"),
    ]);
    assert!(regular.matches(&flagpole));
    assert!(!disused.matches(&flagpole));
}
