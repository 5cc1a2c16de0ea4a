use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::Collector;
use crate::error::Result;
use crate::index::segment::SegmentReader;

/// Counts, per facet dimension, the matching documents holding each label.
#[derive(Debug, Default)]
pub struct FacetsCollector {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
    segment: Option<Arc<SegmentReader>>,
}

impl FacetsCollector {
    pub fn new<I, S>(dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FacetsCollector {
            counts: dims.into_iter().map(|d| (d.into(), BTreeMap::new())).collect(),
            segment: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn into_counts(self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.counts
    }
}

impl Collector for FacetsCollector {
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, _doc_base: u64) -> Result<()> {
        self.segment = Some(Arc::clone(segment));
        Ok(())
    }

    fn collect(&mut self, doc: u32, _score: f32) -> Result<()> {
        let Some(segment) = &self.segment else {
            return Ok(());
        };
        for (dim, counts) in self.counts.iter_mut() {
            for label in segment.facet_labels(dim, doc) {
                *counts.entry(label.clone()).or_insert(0) += 1;
            }
        }
        Ok(())
    }
}
