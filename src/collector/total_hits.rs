use std::sync::Arc;

use crate::collector::Collector;
use crate::error::Result;
use crate::index::segment::SegmentReader;

/// Counts matches exactly and does nothing else.
#[derive(Debug, Default)]
pub struct TotalHitsCollector {
    count: u64,
}

impl TotalHitsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Collector for TotalHitsCollector {
    fn set_segment(&mut self, _segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: u32, _score: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}
