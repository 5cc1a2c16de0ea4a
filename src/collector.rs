//! Result collectors.
//!
//! A search scans the matching documents of each segment once. Every
//! collector the query needs sees every match in that one pass through
//! [`multi::MultiCollector`]; [`pipeline::CollectorPipeline`] decides which
//! collectors a query needs and extracts their outputs afterwards.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::index::segment::SegmentReader;

pub mod external;
pub mod facets;
pub mod function;
pub mod multi;
pub mod pipeline;
pub mod top_docs;
pub mod total_hits;

pub use pipeline::{CollectorPipeline, PipelineOutput};

/// Receives matching documents during a scan.
pub trait Collector: Send + Debug {
    /// Called before the first document of each segment. `doc_base` is the
    /// global number of the segment's first document.
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, doc_base: u64) -> Result<()>;

    /// Collect one live matching document of the current segment.
    fn collect(&mut self, doc: u32, score: f32) -> Result<()>;

    /// Whether the collector reads scores.
    fn needs_scores(&self) -> bool {
        false
    }
}
