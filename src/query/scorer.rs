//! BM25 relevance scoring and the collection statistics it needs.
//!
//! Statistics are gathered per query, over live documents only, and can be
//! summed across engines. Searching every shard with the summed statistics
//! gives the scores a single index holding all documents would give.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Bm25Params;
use crate::index::segment::SegmentReader;
use crate::query::resolved::ResolvedQuery;

/// Per-field statistics of a tokenized field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Live documents with at least one token in the field.
    pub doc_count: u64,

    /// Tokens in the field over those documents.
    pub sum_total_term_freq: u64,
}

impl FieldStats {
    pub fn avg_field_length(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.sum_total_term_freq as f32 / self.doc_count as f32
    }
}

/// Statistics for the scored terms of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionStats {
    fields: BTreeMap<String, FieldStats>,
    doc_freqs: BTreeMap<(String, Vec<u8>), u64>,
}

impl CollectionStats {
    /// Gather the statistics of `query`'s scored terms over `segments`.
    pub fn gather(query: &ResolvedQuery, segments: &[Arc<SegmentReader>]) -> Self {
        let mut terms = Vec::new();
        query.scored_terms(&mut terms);

        let mut stats = CollectionStats::default();
        for (field, term) in terms {
            if !stats.fields.contains_key(&field) {
                let mut field_stats = FieldStats::default();
                for segment in segments {
                    for (doc, length) in segment.norms(&field).iter().enumerate() {
                        if *length > 0 && segment.is_live(doc as u32) {
                            field_stats.doc_count += 1;
                            field_stats.sum_total_term_freq += *length as u64;
                        }
                    }
                }
                stats.fields.insert(field.clone(), field_stats);
            }

            let doc_freq = segments
                .iter()
                .map(|segment| {
                    segment
                        .postings(&field, &term)
                        .iter()
                        .filter(|p| segment.is_live(p.doc))
                        .count() as u64
                })
                .sum();
            stats.doc_freqs.insert((field, term), doc_freq);
        }
        stats
    }

    /// Add another shard's statistics.
    pub fn merge(&mut self, other: &CollectionStats) {
        for (field, stats) in &other.fields {
            let entry = self.fields.entry(field.clone()).or_default();
            entry.doc_count += stats.doc_count;
            entry.sum_total_term_freq += stats.sum_total_term_freq;
        }
        for (key, doc_freq) in &other.doc_freqs {
            *self.doc_freqs.entry(key.clone()).or_default() += doc_freq;
        }
    }

    pub fn field(&self, field: &str) -> FieldStats {
        self.fields.get(field).copied().unwrap_or_default()
    }

    pub fn doc_freq(&self, field: &str, term: &[u8]) -> u64 {
        self.doc_freqs
            .get(&(field.to_string(), term.to_vec()))
            .copied()
            .unwrap_or(0)
    }
}

/// BM25 with the `1 + ...` IDF, which never goes negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25 {
    k1: f32,
    b: f32,
}

impl Bm25 {
    pub fn new(params: Bm25Params) -> Self {
        Bm25 {
            k1: params.k1,
            b: params.b,
        }
    }

    pub fn idf(&self, doc_freq: u64, doc_count: u64) -> f32 {
        if doc_freq == 0 || doc_count == 0 {
            return 0.0;
        }
        let n = doc_count as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn tf(&self, freq: u32, field_length: u32, avg_field_length: f32) -> f32 {
        if freq == 0 {
            return 0.0;
        }
        let freq = freq as f32;
        let norm = if avg_field_length > 0.0 {
            1.0 - self.b + self.b * (field_length as f32 / avg_field_length)
        } else {
            1.0
        };
        (freq * (self.k1 + 1.0)) / (freq + self.k1 * norm)
    }

    pub fn score(&self, freq: u32, field_length: u32, doc_freq: u64, field: FieldStats) -> f32 {
        self.idf(doc_freq, field.doc_count) * self.tf(freq, field_length, field.avg_field_length())
    }
}

impl Default for Bm25 {
    fn default() -> Self {
        Bm25::new(Bm25Params::default())
    }
}
