//! Per-segment evaluation of resolved queries.

use std::collections::BTreeMap;

use crate::index::segment::SegmentReader;
use crate::query::resolved::ResolvedQuery;
use crate::query::scorer::{Bm25, CollectionStats};

/// Matching documents of one segment, doc to score.
pub type DocScores = BTreeMap<u32, f32>;

/// Evaluates queries against one segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentMatcher<'a> {
    segment: &'a SegmentReader,
    /// `None` skips relevance scoring; terms then score their boost.
    stats: Option<&'a CollectionStats>,
    bm25: Bm25,
}

impl<'a> SegmentMatcher<'a> {
    pub fn new(segment: &'a SegmentReader, stats: &'a CollectionStats, bm25: Bm25) -> Self {
        SegmentMatcher {
            segment,
            stats: Some(stats),
            bm25,
        }
    }

    /// A matcher for callers that ignore scores: counting, sorting by field.
    pub fn unscored(segment: &'a SegmentReader) -> Self {
        SegmentMatcher {
            segment,
            stats: None,
            bm25: Bm25::default(),
        }
    }

    /// Live matching documents in doc order, with scores.
    pub fn matches(&self, query: &ResolvedQuery) -> Vec<(u32, f32)> {
        self.evaluate(query)
            .into_iter()
            .filter(|(doc, _)| self.segment.is_live(*doc))
            .collect()
    }

    fn all_docs(&self, score: f32) -> DocScores {
        (0..self.segment.doc_count()).map(|doc| (doc, score)).collect()
    }

    fn evaluate(&self, query: &ResolvedQuery) -> DocScores {
        match query {
            ResolvedQuery::MatchAll { boost } => self.all_docs(*boost),
            ResolvedQuery::MatchNone => DocScores::new(),
            ResolvedQuery::Term {
                field,
                term,
                boost,
                scored,
            } => {
                let postings = self.segment.postings(field, term);
                let stats = match self.stats {
                    Some(stats) if *scored => stats,
                    _ => return postings.iter().map(|p| (p.doc, *boost)).collect(),
                };
                let doc_freq = stats.doc_freq(field, term);
                let field_stats = stats.field(field);
                postings
                    .iter()
                    .map(|p| {
                        let length = self.segment.norm(field, p.doc);
                        let score = self.bm25.score(p.freq, length, doc_freq, field_stats);
                        (p.doc, score * boost)
                    })
                    .collect()
            }
            ResolvedQuery::Range {
                field,
                min,
                max,
                boost,
            } => {
                let points = self.segment.points(field);
                let start = points.partition_point(|(value, _)| value < min);
                let end = points.partition_point(|(value, _)| value <= max);
                if start >= end {
                    return DocScores::new();
                }
                points[start..end].iter().map(|(_, doc)| (*doc, *boost)).collect()
            }
            ResolvedQuery::Bool {
                must,
                should,
                must_not,
                filter,
                minimum_should_match,
                boost,
            } => {
                let mut required: Option<DocScores> = None;
                for clause in must {
                    let matched = self.evaluate(clause);
                    required = Some(match required {
                        None => matched,
                        Some(acc) => acc
                            .into_iter()
                            .filter_map(|(doc, score)| matched.get(&doc).map(|s| (doc, score + s)))
                            .collect(),
                    });
                }
                for clause in filter {
                    let matched = self.evaluate(clause);
                    required = Some(match required {
                        None => matched.into_keys().map(|doc| (doc, 0.0)).collect(),
                        Some(acc) => acc
                            .into_iter()
                            .filter(|(doc, _)| matched.contains_key(doc))
                            .collect(),
                    });
                }

                let mut optional: BTreeMap<u32, (f32, usize)> = BTreeMap::new();
                for clause in should {
                    for (doc, score) in self.evaluate(clause) {
                        let entry = optional.entry(doc).or_insert((0.0, 0));
                        entry.0 += score;
                        entry.1 += 1;
                    }
                }

                let mut result: DocScores = match required {
                    Some(required) => required
                        .into_iter()
                        .filter_map(|(doc, score)| {
                            let (extra, count) = optional.get(&doc).copied().unwrap_or((0.0, 0));
                            (count >= *minimum_should_match).then_some((doc, score + extra))
                        })
                        .collect(),
                    None if !should.is_empty() => optional
                        .into_iter()
                        .filter(|(_, (_, count))| *count >= (*minimum_should_match).max(1))
                        .map(|(doc, (score, _))| (doc, score))
                        .collect(),
                    // only exclusions: everything else matches
                    None => self.all_docs(0.0),
                };

                for clause in must_not {
                    let excluded = self.evaluate(clause);
                    result.retain(|doc, _| !excluded.contains_key(doc));
                }
                if *boost != 1.0 {
                    for score in result.values_mut() {
                        *score *= boost;
                    }
                }
                result
            }
        }
    }
}
