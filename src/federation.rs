//! Search across a group of engines.
//!
//! A [`FederationCoordinator`] fans one query out to every registered engine
//! on a shared rayon pool and merges the shard results so they equal what a
//! single index holding all the documents would return:
//!
//! 1. when the query reads scores, every engine reports the term statistics
//!    of the query, which are summed so each shard scores with the same
//!    document frequencies;
//! 2. every engine returns its best `start + rows` documents, which are merged
//!    by ranking key (ties by registration order, then engine-local doc id);
//! 3. totals and facet counts are summed, function extremes are compared with
//!    the same key order, pluggable collector outputs go through their
//!    registered merge.
//!
//! Any failing engine fails the whole query.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::collector::external;
use crate::config::EngineConfig;
use crate::document::indexable::SortValue;
use crate::error::{PikeError, Result};
use crate::index::IndexEngine;
use crate::query::definition::{QueryDefinition, SortDirection, SortField};
use crate::query::result::{FunctionResult, ResultDefinition, ResultDocument, compare_keys, top_facets};
use crate::query::FunctionKind;

/// Build the worker pool shared by federated searches.
pub fn build_pool(threads: Option<usize>) -> Result<Arc<ThreadPool>> {
    let threads = threads.unwrap_or_else(num_cpus::get);
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pike-federation-{i}"))
        .build()
        .map_err(|e| PikeError::other(format!("Failed to create thread pool: {e}")))?;
    Ok(Arc::new(pool))
}

/// The engines of a federation at one registration generation.
#[derive(Debug)]
pub struct FederationContext {
    generation: u64,
    engines: Vec<Arc<IndexEngine>>,
}

impl FederationContext {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn engines(&self) -> &[Arc<IndexEngine>] {
        &self.engines
    }
}

/// A named group of engines searched as one index.
///
/// Registration changes are visible to the next search; a search that is
/// already running keeps the engines it started with.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use pike::config::EngineConfig;
/// use pike::document::document::Document;
/// use pike::federation::{FederationCoordinator, build_pool};
/// use pike::index::IndexEngine;
/// use pike::query::QueryDefinition;
/// use pike::schema::{FieldDeclaration, FieldTemplate};
/// use pike::storage::memory::MemoryStorage;
///
/// # fn main() -> pike::error::Result<()> {
/// let federation = FederationCoordinator::new("library", build_pool(Some(2))?);
/// for (name, title) in [("books", "rust in action"), ("papers", "rust ownership")] {
///     let engine = IndexEngine::open(name, Arc::new(MemoryStorage::new()), EngineConfig::default())?;
///     engine.update_schema(vec![FieldDeclaration::new("title", FieldTemplate::Text)])?;
///     engine.write(&[Document::with_id(name).field("title", title)])?;
///     federation.register(Arc::new(engine))?;
/// }
///
/// let result = federation.search(&QueryDefinition::new().query_string("rust", "title"))?;
/// assert_eq!(result.total_hits, 2);
/// assert_eq!(federation.engine_names(), vec!["books", "papers"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FederationCoordinator {
    name: String,
    pool: Arc<ThreadPool>,
    registry: Mutex<Vec<Arc<IndexEngine>>>,
    generation: AtomicU64,
    context: ArcSwap<FederationContext>,
}

impl FederationCoordinator {
    /// An empty federation fanning out on `pool`.
    pub fn new<S: Into<String>>(name: S, pool: Arc<ThreadPool>) -> Self {
        FederationCoordinator {
            name: name.into(),
            pool,
            registry: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            context: ArcSwap::from_pointee(FederationContext {
                generation: 0,
                engines: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an engine. Engine names are unique within a federation.
    pub fn register(&self, engine: Arc<IndexEngine>) -> Result<()> {
        let mut registry = self.registry.lock();
        if registry.iter().any(|e| e.name() == engine.name()) {
            return Err(PikeError::index(format!(
                "The index {} is already part of the federation {}",
                engine.name(),
                self.name
            )));
        }
        log::info!("federation {}: registered {}", self.name, engine.name());
        registry.push(engine);
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    /// Remove an engine by name. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.len();
        registry.retain(|e| e.name() != name);
        let removed = registry.len() != before;
        if removed {
            log::info!("federation {}: unregistered {name}", self.name);
            self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        }
        removed
    }

    /// Registered engine names, in registration order.
    pub fn engine_names(&self) -> Vec<String> {
        self.context().engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// The current context. Rebuilt under the registry lock only when a
    /// registration changed since the last build.
    pub fn context(&self) -> Arc<FederationContext> {
        let current = self.context.load_full();
        if current.generation == self.generation.load(AtomicOrdering::SeqCst) {
            return current;
        }

        let registry = self.registry.lock();
        let generation = self.generation.load(AtomicOrdering::SeqCst);
        let current = self.context.load_full();
        if current.generation == generation {
            return current;
        }
        log::debug!("federation {}: rebuilding context at generation {generation}", self.name);
        let rebuilt = Arc::new(FederationContext {
            generation,
            engines: registry.clone(),
        });
        self.context.store(Arc::clone(&rebuilt));
        rebuilt
    }

    /// Search every registered engine and merge the results as if one index
    /// held all their documents. Documents name the engine they came from.
    pub fn search(&self, definition: &QueryDefinition) -> Result<ResultDefinition> {
        let context = self.context();
        let engines = context.engines();
        let started = Instant::now();
        let mut timer = BTreeMap::new();

        let searchers = engines
            .iter()
            .map(|engine| engine.searcher())
            .collect::<Result<Vec<_>>>()?;

        let default_rows = engines
            .first()
            .map_or_else(|| EngineConfig::default().default_rows, |e| e.config().default_rows);
        let rows = definition.effective_rows(default_rows);
        let window = definition.window(default_rows);
        let mut shard_definition = definition.clone();
        shard_definition.start = 0;
        shard_definition.rows = Some(window);

        let shard_stats = self.pool.install(|| {
            searchers
                .par_iter()
                .map(|searcher| searcher.collection_stats(&shard_definition))
                .collect::<Result<Vec<_>>>()
        })?;
        let stats = shard_stats.into_iter().flatten().reduce(|mut stats, shard| {
            stats.merge(&shard);
            stats
        });
        timer.insert("stats".to_string(), started.elapsed().as_millis() as u64);

        let search_started = Instant::now();
        let shards = self.pool.install(|| {
            searchers
                .par_iter()
                .map(|searcher| searcher.search_shard(&shard_definition, stats.as_ref()))
                .collect::<Result<Vec<_>>>()
        })?;
        timer.insert("search".to_string(), search_started.elapsed().as_millis() as u64);

        let merge_started = Instant::now();
        let names: Vec<&str> = engines.iter().map(|e| e.name()).collect();
        let mut merged = merge_shards(definition, &names, shards, window)?;
        timer.insert("merge".to_string(), merge_started.elapsed().as_millis() as u64);
        timer.insert("total".to_string(), started.elapsed().as_millis() as u64);
        merged.timer = timer;

        log::debug!(
            "federation {}: {} engines, {} hits",
            self.name,
            engines.len(),
            merged.total_hits
        );
        Ok(merged.finalize(definition, rows))
    }
}

fn directions(definition: &QueryDefinition) -> Arc<[SortDirection]> {
    if definition.sort.is_empty() {
        return Arc::from([SortDirection::Desc]);
    }
    definition.sort.iter().map(SortField::effective_direction).collect()
}

struct Head {
    document: ResultDocument,
    engine: usize,
    directions: Arc<[SortDirection]>,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&self.document.sort_keys, &other.document.sort_keys, &self.directions)
            .then_with(|| self.engine.cmp(&other.engine))
            .then_with(|| self.document.doc_id.cmp(&other.document.doc_id))
    }
}

/// Merge shard results, keeping the best `size` documents.
fn merge_shards(
    definition: &QueryDefinition,
    names: &[&str],
    shards: Vec<ResultDefinition>,
    size: usize,
) -> Result<ResultDefinition> {
    let directions = directions(definition);
    let mut merged = ResultDefinition::default();

    let mut facets: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut functions: Vec<FunctionResult> = Vec::new();
    let mut outputs: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
    let mut queues = Vec::with_capacity(shards.len());

    for (engine, shard) in shards.into_iter().enumerate() {
        merged.total_hits += shard.total_hits;

        for (dim, labels) in shard.facets {
            let counts = facets.entry(dim).or_default();
            for facet in labels {
                *counts.entry(facet.label).or_insert(0) += facet.count;
            }
        }

        for (index, function) in shard.functions.into_iter().enumerate() {
            match functions.get_mut(index) {
                None => functions.push(function),
                Some(best) => {
                    if improves(function.function, function.key.as_ref(), best.key.as_ref()) {
                        *best = function;
                    }
                }
            }
        }

        for (name, output) in shard.collectors {
            outputs.entry(name).or_default().push(output);
        }

        let mut documents = shard.documents.into_iter();
        queues.push((engine, documents.next(), documents));
    }

    let mut heap = BinaryHeap::new();
    let mut rest = Vec::with_capacity(queues.len());
    for (engine, first, documents) in queues {
        if let Some(document) = first {
            heap.push(Reverse(Head {
                document,
                engine,
                directions: Arc::clone(&directions),
            }));
        }
        rest.push(documents);
    }
    while merged.documents.len() < size {
        let Some(Reverse(head)) = heap.pop() else {
            break;
        };
        if let Some(next) = rest[head.engine].next() {
            heap.push(Reverse(Head {
                document: next,
                engine: head.engine,
                directions: Arc::clone(&directions),
            }));
        }
        let mut document = head.document;
        document.engine = names.get(head.engine).map(|n| n.to_string());
        merged.documents.push(document);
    }

    merged.facets = facets
        .iter()
        .map(|(dim, counts)| (dim.clone(), top_facets(counts, usize::MAX)))
        .collect();
    merged.functions = functions;

    for (name, outputs) in outputs {
        let request = definition
            .collectors
            .get(&name)
            .ok_or_else(|| PikeError::query(format!("Unknown collector output: {name}")))?;
        merged
            .collectors
            .insert(name, external::merge_outputs(&request.collector, &outputs)?);
    }
    Ok(merged)
}

/// Whether `candidate` beats `best`; the earlier engine keeps ties.
fn improves(
    function: FunctionKind,
    candidate: Option<&SortValue>,
    best: Option<&SortValue>,
) -> bool {
    match (candidate, best) {
        (Some(_), None) => true,
        (Some(candidate), Some(best)) => match function {
            FunctionKind::Min => candidate < best,
            FunctionKind::Max => candidate > best,
        },
        _ => false,
    }
}
