//! Builds the collectors a query needs and runs them in one scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::collector::Collector;
use crate::collector::external::{self, ExternalCollector};
use crate::collector::facets::FacetsCollector;
use crate::collector::function::FunctionCollector;
use crate::collector::multi::MultiCollector;
use crate::collector::top_docs::{RankedDoc, TopDocsCollector};
use crate::collector::total_hits::TotalHitsCollector;
use crate::error::{PikeError, Result};
use crate::index::segment::SegmentReader;
use crate::query::definition::{CollectorRequest, QueryDefinition};
use crate::query::matcher::SegmentMatcher;
use crate::query::resolved::{QueryResolver, ResolvedQuery};
use crate::query::result::FunctionResult;
use crate::query::scorer::{Bm25, CollectionStats};
use crate::schema::FieldMap;

#[derive(Debug)]
enum Ranking {
    Count(TotalHitsCollector),
    Top(TopDocsCollector),
}

#[derive(Debug)]
struct RestrictedFacet {
    dim: String,
    label: String,
    query: ResolvedQuery,
}

#[derive(Debug)]
struct NamedExternal {
    names: Vec<String>,
    request: CollectorRequest,
    collector: Box<dyn ExternalCollector>,
}

/// Everything a scan produced.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub total_hits: u64,

    /// Best documents first.
    pub ranked: Vec<RankedDoc>,

    /// dim -> label -> count.
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,

    pub functions: Vec<FunctionResult>,

    pub collectors: BTreeMap<String, Value>,
}

/// The collectors of one query over one snapshot.
#[derive(Debug)]
pub struct CollectorPipeline {
    ranking: Ranking,
    facets: FacetsCollector,
    restricted: Vec<RestrictedFacet>,
    restricted_counts: BTreeMap<String, BTreeMap<String, u64>>,
    functions: Vec<FunctionCollector>,
    externals: Vec<NamedExternal>,
}

impl CollectorPipeline {
    /// Validate the definition against the schema and create its collectors.
    /// `size` is the number of ranked documents to keep; zero only counts.
    /// Nothing is read from any segment here, so every invalid request fails
    /// before the scan starts.
    pub fn build(
        definition: &QueryDefinition,
        size: usize,
        query: &ResolvedQuery,
        field_map: &FieldMap,
    ) -> Result<Self> {
        let top_docs = TopDocsCollector::by_fields(size, &definition.sort, field_map)?;
        let ranking = if size == 0 {
            Ranking::Count(TotalHitsCollector::new())
        } else {
            Ranking::Top(top_docs)
        };

        let resolver = QueryResolver::new(field_map);
        let mut unrestricted = Vec::new();
        let mut restricted = Vec::new();
        for (dim, request) in &definition.facets {
            let instance = field_map.require(dim)?;
            if !instance.is_facet() {
                return Err(PikeError::query(format!("The field {dim} is not a facet field")));
            }
            match &request.queries {
                None => unrestricted.push(dim.clone()),
                Some(queries) => {
                    for (label, candidate) in queries {
                        restricted.push(RestrictedFacet {
                            dim: dim.clone(),
                            label: label.clone(),
                            query: query.clone().filtered_by(resolver.resolve(candidate)?),
                        });
                    }
                }
            }
        }

        let functions = definition
            .functions
            .iter()
            .map(|request| FunctionCollector::new(request, field_map))
            .collect::<Result<Vec<_>>>()?;

        let mut externals: Vec<NamedExternal> = Vec::new();
        for (name, request) in &definition.collectors {
            if let Some(shared) = externals.iter_mut().find(|e| e.request == *request) {
                shared.names.push(name.clone());
                continue;
            }
            externals.push(NamedExternal {
                names: vec![name.clone()],
                request: request.clone(),
                collector: external::create(request, field_map)?,
            });
        }

        log::debug!(
            "collector pipeline: size {size}, {} facet dims, {} restricted labels, {} functions, {} external",
            unrestricted.len(),
            restricted.len(),
            functions.len(),
            externals.len()
        );

        Ok(CollectorPipeline {
            ranking,
            facets: FacetsCollector::new(unrestricted),
            restricted,
            restricted_counts: BTreeMap::new(),
            functions,
            externals,
        })
    }

    fn multi(&mut self) -> MultiCollector<'_> {
        let mut multi = MultiCollector::new();
        match &mut self.ranking {
            Ranking::Count(c) => multi.add(c),
            Ranking::Top(c) => multi.add(c),
        }
        if !self.facets.is_empty() {
            multi.add(&mut self.facets);
        }
        for function in self.functions.iter_mut() {
            multi.add(function);
        }
        for external in self.externals.iter_mut() {
            multi.add(external.collector.as_collector());
        }
        multi
    }

    /// Whether any collector reads scores.
    pub fn needs_scores(&mut self) -> bool {
        self.multi().needs_scores()
    }

    /// Feed every live match of `query` in `segments` to the collectors.
    /// Matches are scored only when `stats` is given and a collector reads
    /// scores.
    pub fn scan(
        &mut self,
        query: &ResolvedQuery,
        segments: &[Arc<SegmentReader>],
        doc_bases: &[u64],
        stats: Option<&CollectionStats>,
        bm25: Bm25,
    ) -> Result<()> {
        let scoring = self.needs_scores();
        let stats = stats.filter(|_| scoring);
        for (segment, doc_base) in segments.iter().zip(doc_bases) {
            let hits = match stats {
                Some(stats) => SegmentMatcher::new(segment, stats, bm25).matches(query),
                None => SegmentMatcher::unscored(segment).matches(query),
            };

            let mut multi = self.multi();
            multi.set_segment(segment, *doc_base)?;
            for (doc, score) in hits {
                multi.collect(doc, score)?;
            }

            let counter = SegmentMatcher::unscored(segment);
            for facet in &self.restricted {
                let count = counter.matches(&facet.query).len() as u64;
                *self
                    .restricted_counts
                    .entry(facet.dim.clone())
                    .or_default()
                    .entry(facet.label.clone())
                    .or_insert(0) += count;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> PipelineOutput {
        let (total_hits, ranked) = match self.ranking {
            Ranking::Count(c) => (c.count(), Vec::new()),
            Ranking::Top(c) => (c.total_hits(), c.into_ranked()),
        };

        let mut facets = self.facets.into_counts();
        for facet in &self.restricted {
            facets.entry(facet.dim.clone()).or_default().entry(facet.label.clone()).or_insert(0);
        }
        for (dim, counts) in self.restricted_counts {
            facets.entry(dim).or_default().extend(counts);
        }

        let mut collectors = BTreeMap::new();
        for external in &self.externals {
            let output = external.collector.output();
            for name in &external.names {
                collectors.insert(name.clone(), output.clone());
            }
        }

        PipelineOutput {
            total_hits,
            ranked,
            facets,
            functions: self.functions.into_iter().map(FunctionCollector::result).collect(),
            collectors,
        }
    }
}
