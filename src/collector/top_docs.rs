//! Bounded top-N collection by score or by sort fields.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::collector::Collector;
use crate::error::{PikeError, Result};
use crate::index::segment::SegmentReader;
use crate::query::definition::{SortDirection, SortField};
use crate::query::result::{SortKey, compare_keys};
use crate::schema::{FieldMap, FieldTypeInstance};

#[derive(Debug, Clone)]
enum SortSource {
    Score,
    Field(Arc<FieldTypeInstance>),
}

/// A collected document.
#[derive(Debug, Clone)]
pub struct RankedDoc {
    /// Global doc number within the snapshot.
    pub doc: u64,
    pub score: f32,
    pub keys: Vec<SortKey>,
    directions: Arc<[SortDirection]>,
}

impl PartialEq for RankedDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedDoc {}

impl PartialOrd for RankedDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedDoc {
    // Less ranks first, so the heap's top is the worst kept document.
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&self.keys, &other.keys, &self.directions).then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Keeps the best `size` documents and counts every match.
#[derive(Debug)]
pub struct TopDocsCollector {
    size: usize,
    sources: Vec<SortSource>,
    directions: Arc<[SortDirection]>,
    heap: BinaryHeap<RankedDoc>,
    total_hits: u64,
    segment: Option<Arc<SegmentReader>>,
    doc_base: u64,
}

impl TopDocsCollector {
    /// Rank by descending score.
    pub fn by_score(size: usize) -> Self {
        Self::with_sources(size, vec![SortSource::Score], vec![SortDirection::Desc])
    }

    /// Rank by `sort`; unknown or unsortable fields are query errors.
    pub fn by_fields(size: usize, sort: &[SortField], field_map: &FieldMap) -> Result<Self> {
        if sort.is_empty() {
            return Ok(Self::by_score(size));
        }
        let mut sources = Vec::with_capacity(sort.len());
        for field in sort {
            if field.is_score() {
                sources.push(SortSource::Score);
                continue;
            }
            let instance = field_map.require(&field.field)?;
            if !instance.is_sortable() {
                return Err(PikeError::query(format!(
                    "The field {} is not sortable",
                    field.field
                )));
            }
            sources.push(SortSource::Field(Arc::clone(instance)));
        }
        let directions = sort.iter().map(SortField::effective_direction).collect();
        Ok(Self::with_sources(size, sources, directions))
    }

    fn with_sources(size: usize, sources: Vec<SortSource>, directions: Vec<SortDirection>) -> Self {
        TopDocsCollector {
            size,
            sources,
            directions: directions.into(),
            heap: BinaryHeap::with_capacity(size.min(1024) + 1),
            total_hits: 0,
            segment: None,
            doc_base: 0,
        }
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Kept documents, best first.
    pub fn into_ranked(self) -> Vec<RankedDoc> {
        self.heap.into_sorted_vec()
    }
}

impl Collector for TopDocsCollector {
    fn set_segment(&mut self, segment: &Arc<SegmentReader>, doc_base: u64) -> Result<()> {
        self.segment = Some(Arc::clone(segment));
        self.doc_base = doc_base;
        Ok(())
    }

    fn collect(&mut self, doc: u32, score: f32) -> Result<()> {
        self.total_hits += 1;
        if self.size == 0 {
            return Ok(());
        }
        let segment = self
            .segment
            .as_ref()
            .ok_or_else(|| PikeError::other("collect called before set_segment"))?;

        let keys = self
            .sources
            .iter()
            .map(|source| match source {
                SortSource::Score => SortKey::Score(score),
                SortSource::Field(instance) => SortKey::Value(
                    segment
                        .doc_value(instance.name(), doc)
                        .and_then(|value| instance.sort_key(value)),
                ),
            })
            .collect();
        let candidate = RankedDoc {
            doc: self.doc_base + doc as u64,
            score,
            keys,
            directions: Arc::clone(&self.directions),
        };

        if self.heap.len() < self.size {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.sources.iter().any(|s| matches!(s, SortSource::Score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::catalog::AnalyzerCatalog;
    use crate::document::indexable::{DocValue, IndexableField};
    use crate::index::manifest::SegmentMeta;
    use crate::index::segment::SegmentBuilder;
    use crate::schema::{FieldDeclaration, FieldTemplate};

    fn segment(prices: &[Option<i64>]) -> Arc<SegmentReader> {
        let mut builder = SegmentBuilder::new();
        for (i, price) in prices.iter().enumerate() {
            let fields: Vec<IndexableField> = price
                .iter()
                .map(|p| IndexableField::DocValue {
                    field: "price".into(),
                    value: DocValue::Long(*p),
                })
                .collect();
            builder.add_document(&format!("d{i}"), &fields);
        }
        let data = builder.build();
        Arc::new(SegmentReader::new(SegmentMeta::new(1, prices.len() as u32), Arc::new(data)))
    }

    #[test]
    fn test_top_by_score() {
        let mut collector = TopDocsCollector::by_score(2);
        collector.set_segment(&segment(&[None; 4]), 10).unwrap();
        for (doc, score) in [(0, 0.5), (1, 2.0), (2, 1.0), (3, 2.0)] {
            collector.collect(doc, score).unwrap();
        }

        assert_eq!(collector.total_hits(), 4);
        let docs: Vec<u64> = collector.into_ranked().iter().map(|d| d.doc).collect();
        // equal scores rank by doc number
        assert_eq!(docs, vec![11, 13]);
    }

    #[test]
    fn test_top_by_field_missing_last() {
        let map = FieldMap::compile(
            vec![
                FieldDeclaration::new("price", FieldTemplate::LongValue),
                FieldDeclaration::new("title", FieldTemplate::Text),
            ],
            AnalyzerCatalog::new(),
        )
        .unwrap();

        let mut collector = TopDocsCollector::by_fields(3, &[SortField::desc("price")], &map).unwrap();
        assert!(!collector.needs_scores());
        collector
            .set_segment(&segment(&[Some(3), None, Some(9), Some(1)]), 0)
            .unwrap();
        for doc in 0..4 {
            collector.collect(doc, 0.0).unwrap();
        }
        let docs: Vec<u64> = collector.into_ranked().iter().map(|d| d.doc).collect();
        assert_eq!(docs, vec![2, 0, 3]);

        assert!(matches!(
            TopDocsCollector::by_fields(3, &[SortField::asc("title")], &map),
            Err(PikeError::Query(_))
        ));
        assert!(TopDocsCollector::by_fields(3, &[SortField::asc("nope")], &map).is_err());
    }
}
