use anyhow::Result;

use crate::element::OsmElement;

pub mod jsonl;

pub use self::jsonl::JsonlSink;

/// Destination for matched elements.
pub trait DataSink: Send {
    fn add_element(&mut self, element: &OsmElement) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
