//! Filter expressions over OSM elements.
//!
//! ```
//! use elfilter::{ElementFilter, OsmElement};
//!
//! let filter = ElementFilter::parse("nodes, ways with shop and !name").unwrap();
//! let element = OsmElement::node(1, [("shop", "bakery")]);
//! assert!(filter.matches(&element));
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod dates;
pub mod dsl;
pub mod element;
pub mod registry;
pub mod sinks;
pub mod units;
pub mod utils;

pub use cache::FilterCache;
pub use config::EngineConfig;
pub use dsl::{CompileError, ElementFilter, FilterError, LexError, SyntaxError};
pub use element::{
    Element, ElementType, ElementTypes, LifecycleView, OsmElement, TagView, as_if_it_wasnt,
    matches_as_if_it_wasnt,
};
pub use registry::FilterRegistry;
pub use units::UnitTable;
