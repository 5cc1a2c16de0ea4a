use std::sync::Arc;

use crate::collector::Collector;
use crate::error::Result;
use crate::index::segment::SegmentReader;

/// Fans each call out to several collectors in order.
#[derive(Debug)]
pub struct MultiCollector<'a> {
    collectors: Vec<&'a mut dyn Collector>,
}

impl<'a> MultiCollector<'a> {
    pub fn new() -> Self {
        MultiCollector {
            collectors: Vec::new(),
        }
    }

    pub fn add(&mut self, collector: &'a mut dyn Collector) {
        self.collectors.push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl Collector for MultiCollector<'_> {
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, doc_base: u64) -> Result<()> {
        for collector in self.collectors.iter_mut() {
            collector.set_segment(segment, doc_base)?;
        }
        Ok(())
    }

    fn collect(&mut self, doc: u32, score: f32) -> Result<()> {
        for collector in self.collectors.iter_mut() {
            collector.collect(doc, score)?;
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.collectors.iter().any(|c| c.needs_scores())
    }
}
