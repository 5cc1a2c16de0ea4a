//! The per-index engine.
//!
//! An [`IndexEngine`] owns one writer, one snapshot manager and the current
//! [`FieldMap`]. Every write commits and refreshes before it returns, so a
//! document is searchable as soon as `write` succeeds. Reads go through a
//! [`Searcher`], which holds one snapshot and one schema for its whole life.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pike::config::EngineConfig;
//! use pike::document::document::Document;
//! use pike::index::IndexEngine;
//! use pike::query::QueryDefinition;
//! use pike::schema::{FieldDeclaration, FieldTemplate};
//! use pike::storage::memory::MemoryStorage;
//!
//! # fn main() -> pike::error::Result<()> {
//! let engine = IndexEngine::open("books", Arc::new(MemoryStorage::new()), EngineConfig::default())?;
//! engine.update_schema(vec![FieldDeclaration::new("title", FieldTemplate::Text).stored(true)])?;
//!
//! engine.write(&[Document::with_id("1").field("title", "The Rust book")])?;
//!
//! let result = engine.search(&QueryDefinition::new().query_string("rust", "title"))?;
//! assert_eq!(result.total_hits, 1);
//! assert_eq!(result.documents[0].identity, "1");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::analysis::catalog::AnalyzerCatalog;
use crate::collector::CollectorPipeline;
use crate::config::EngineConfig;
use crate::document::codec::{DocumentCodec, EncodeMode};
use crate::document::document::Document;
use crate::error::{PikeError, Result};
use crate::index::replication::ReplicationSession;
use crate::index::segment::SegmentReader;
use crate::index::snapshot::{SnapshotGuard, SnapshotManager};
use crate::index::status::IndexStatus;
use crate::index::writer::{IndexWriter, WriteOp};
use crate::query::definition::QueryDefinition;
use crate::query::resolved::{QueryResolver, ResolvedQuery};
use crate::query::result::{ResultDefinition, ResultDocument, top_facets};
use crate::query::scorer::{Bm25, CollectionStats};
use crate::schema::{FieldDeclaration, FieldMap};
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};

/// Persisted field declarations.
pub const FIELDS_FILE: &str = "fields.json";

/// Persisted custom analyzer definitions.
pub const ANALYZERS_FILE: &str = "analyzers.json";

/// One index: a single writer, the published reader snapshots and the
/// current schema.
///
/// Writes from any number of threads serialize at the writer; reads never
/// wait for writes. Every method takes `&self`, so an engine is shared as an
/// `Arc<IndexEngine>`.
#[derive(Debug)]
pub struct IndexEngine {
    name: String,
    storage: Arc<dyn Storage>,
    config: EngineConfig,
    codec: DocumentCodec,
    writer: Mutex<IndexWriter>,
    snapshots: Arc<SnapshotManager>,
    field_map: ArcSwap<FieldMap>,
    schema_lock: Mutex<()>,
    closed: AtomicBool,
}

impl IndexEngine {
    /// Open the index held by `storage`, creating it if empty.
    pub fn open<S: Into<String>>(name: S, storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self> {
        let name = name.into();

        let catalog = if storage.file_exists(ANALYZERS_FILE) {
            serde_json::from_slice(&storage.read_all(ANALYZERS_FILE)?)?
        } else {
            AnalyzerCatalog::new()
        };
        let declarations: Vec<FieldDeclaration> = if storage.file_exists(FIELDS_FILE) {
            serde_json::from_slice(&storage.read_all(FIELDS_FILE)?)?
        } else {
            Vec::new()
        };
        let field_map = FieldMap::compile(declarations, catalog)?;

        let writer = IndexWriter::open(Arc::clone(&storage), config.clone())?;
        let snapshots = SnapshotManager::new(Arc::clone(&storage), writer.snapshot());

        log::info!(
            "opened index {name} ({}): version {}, {} docs, {} fields",
            writer.manifest().index_uuid,
            writer.manifest().generation,
            writer.manifest().num_docs(),
            field_map.len()
        );

        Ok(IndexEngine {
            name,
            storage,
            config,
            codec: DocumentCodec::new(),
            writer: Mutex::new(writer),
            snapshots,
            field_map: ArcSwap::from_pointee(field_map),
            schema_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Open an index stored in a directory.
    pub fn open_in_dir<S: Into<String>, P: AsRef<Path>>(name: S, directory: P, config: EngineConfig) -> Result<Self> {
        let storage = FileStorage::new(
            directory,
            FileStorageConfig {
                sync_writes: config.sync_writes,
                ..FileStorageConfig::default()
            },
        )?;
        Self::open(name, Arc::new(storage), config)
    }

    /// The registered name, unique within a manager or a federation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop accepting operations. Searchers already handed out keep working.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::info!("closed index {}", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PikeError::index(format!("The index {} is closed", self.name)));
        }
        Ok(())
    }

    /// Commit under the writer lock and publish the new snapshot before
    /// releasing it, so snapshots are published in commit order.
    fn commit(&self, ops: Vec<WriteOp>) -> Result<u64> {
        let mut writer = self.writer.lock();
        let outcome = writer.commit(ops)?;
        self.snapshots.refresh(outcome.snapshot);
        Ok(outcome.deleted)
    }

    /// Insert or replace documents. Returns their identities in input order.
    /// Every document is validated before anything is written.
    pub fn write(&self, documents: &[Document]) -> Result<Vec<String>> {
        self.ensure_open()?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let field_map = self.field_map.load_full();
        let encoded = documents
            .iter()
            .map(|doc| self.codec.encode(doc, &field_map, EncodeMode::Full))
            .collect::<Result<Vec<_>>>()?;

        let identities = encoded.iter().map(|e| e.identity.clone()).collect();
        self.commit(encoded.into_iter().map(WriteOp::Upsert).collect())?;
        log::debug!("{}: wrote {} documents", self.name, documents.len());
        Ok(identities)
    }

    /// Overwrite column values of existing documents, leaving their indexed
    /// text untouched. Each document must carry its identity.
    pub fn update_values(&self, documents: &[Document]) -> Result<()> {
        self.ensure_open()?;
        if documents.is_empty() {
            return Ok(());
        }
        let field_map = self.field_map.load_full();
        let ops = documents
            .iter()
            .map(|doc| {
                self.codec
                    .encode(doc, &field_map, EncodeMode::Partial)
                    .map(WriteOp::UpdateValues)
            })
            .collect::<Result<Vec<_>>>()?;
        self.commit(ops)?;
        Ok(())
    }

    /// Delete documents by identity. Returns how many were live.
    pub fn delete<S: AsRef<str>>(&self, identities: &[S]) -> Result<u64> {
        self.ensure_open()?;
        if identities.is_empty() {
            return Ok(0);
        }
        let ops = identities
            .iter()
            .map(|id| WriteOp::Delete(id.as_ref().to_string()))
            .collect();
        self.commit(ops)
    }

    /// Delete every document. Returns how many were live.
    pub fn delete_all(&self) -> Result<u64> {
        self.ensure_open()?;
        let deleted = self.commit(vec![WriteOp::DeleteAll])?;
        log::info!("{}: deleted all {deleted} documents", self.name);
        Ok(deleted)
    }

    /// A reader on the current snapshot and schema.
    pub fn searcher(&self) -> Result<Searcher> {
        self.ensure_open()?;
        Ok(Searcher {
            snapshot: self.snapshots.acquire(),
            field_map: self.field_map.load_full(),
            config: self.config.clone(),
        })
    }

    /// Run one query on the current snapshot. The snapshot is released on
    /// return, whether the query succeeded or not.
    pub fn search(&self, definition: &QueryDefinition) -> Result<ResultDefinition> {
        self.searcher()?.search(definition)
    }

    /// The live document with `identity`, or `None`.
    pub fn get_document(&self, identity: &str) -> Result<Option<Document>> {
        self.searcher()?.get_document(identity)
    }

    /// The schema new operations use.
    pub fn field_map(&self) -> Arc<FieldMap> {
        self.field_map.load_full()
    }

    /// Replace the field declarations. The new schema is compiled with the
    /// current analyzers and persisted before it becomes visible.
    pub fn update_schema(&self, declarations: Vec<FieldDeclaration>) -> Result<()> {
        self.ensure_open()?;
        let _schema = self.schema_lock.lock();
        let catalog = self.field_map.load().catalog().clone();
        let field_map = FieldMap::compile(declarations, catalog)?;
        self.storage
            .write_atomic(FIELDS_FILE, &serde_json::to_vec_pretty(field_map.declarations())?)?;
        log::debug!("{}: schema updated to {} fields", self.name, field_map.len());
        self.field_map.store(Arc::new(field_map));
        Ok(())
    }

    /// Replace the custom analyzer definitions and recompile the schema.
    pub fn update_analyzers(&self, catalog: AnalyzerCatalog) -> Result<()> {
        self.ensure_open()?;
        let _schema = self.schema_lock.lock();
        let declarations = self.field_map.load().declarations().to_vec();
        let field_map = FieldMap::compile(declarations, catalog)?;
        self.storage
            .write_atomic(ANALYZERS_FILE, &serde_json::to_vec_pretty(field_map.catalog())?)?;
        log::debug!(
            "{}: {} custom analyzers",
            self.name,
            field_map.catalog().definitions().len()
        );
        self.field_map.store(Arc::new(field_map));
        Ok(())
    }

    /// Counts, version and schema of the current snapshot.
    pub fn status(&self) -> Result<IndexStatus> {
        let searcher = self.searcher()?;
        let manifest = searcher.snapshot.manifest();
        Ok(IndexStatus {
            name: self.name.clone(),
            index_uuid: manifest.index_uuid.clone(),
            version: manifest.generation,
            num_docs: manifest.num_docs(),
            num_deleted_docs: manifest.num_deleted_docs(),
            segments: manifest.segments.len(),
            field_map: searcher.field_map.declarations().to_vec(),
            analyzers: searcher.field_map.catalog().clone(),
        })
    }

    /// Pin the current snapshot for a replica to copy.
    pub fn replication_session(&self) -> Result<ReplicationSession> {
        self.ensure_open()?;
        let _schema = self.schema_lock.lock();
        let field_map = self.field_map.load();
        let metadata = vec![
            (
                FIELDS_FILE.to_string(),
                serde_json::to_vec_pretty(field_map.declarations())?,
            ),
            (
                ANALYZERS_FILE.to_string(),
                serde_json::to_vec_pretty(field_map.catalog())?,
            ),
        ];
        ReplicationSession::new(self.snapshots.acquire(), Arc::clone(&self.storage), metadata)
    }

    /// The identity of this index, fixed at creation. Replicas compare it
    /// with [`check_master_identity`](crate::index::replication::check_master_identity).
    pub fn index_uuid(&self) -> String {
        self.writer.lock().manifest().index_uuid.clone()
    }

    /// The generation of the last commit; 0 before the first write.
    pub fn version(&self) -> u64 {
        self.snapshots.current_version()
    }

    /// Snapshot holders not yet released.
    pub fn active_snapshot_holders(&self) -> usize {
        self.snapshots.active_holders()
    }
}

/// A point-in-time reader. Holds its snapshot until dropped.
///
/// Commits and schema changes made after the searcher was created are
/// invisible to it, and the files of its snapshot stay on storage until it
/// and every other holder are gone.
#[derive(Debug)]
pub struct Searcher {
    snapshot: SnapshotGuard,
    field_map: Arc<FieldMap>,
    config: EngineConfig,
}

impl Searcher {
    /// Commit generation of the held snapshot.
    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Live documents in the held snapshot.
    pub fn num_docs(&self) -> u64 {
        self.snapshot.num_docs()
    }

    /// The schema the searcher was created with.
    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// Resolve the query part of `definition` against this searcher's schema.
    pub fn resolve(&self, definition: &QueryDefinition) -> Result<ResolvedQuery> {
        QueryResolver::new(&self.field_map).resolve_definition(definition)
    }

    /// Term statistics of the query's scored terms in this snapshot, or
    /// `None` when no collector of the query reads scores.
    pub fn collection_stats(&self, definition: &QueryDefinition) -> Result<Option<CollectionStats>> {
        let query = self.resolve(definition)?;
        let size = definition.window(self.config.default_rows);
        let mut pipeline = CollectorPipeline::build(definition, size, &query, &self.field_map)?;
        if !pipeline.needs_scores() {
            return Ok(None);
        }
        Ok(Some(CollectionStats::gather(&query, self.snapshot.segments())))
    }

    /// Run a query and return the best `start + rows` documents, untrimmed.
    /// `stats` replaces the local term statistics, for scoring several shards
    /// alike. Documents carry a score only when the query ranks by relevance
    /// or a collector reads scores.
    pub fn search_shard(
        &self,
        definition: &QueryDefinition,
        stats: Option<&CollectionStats>,
    ) -> Result<ResultDefinition> {
        let mut timer = BTreeMap::new();
        let started = Instant::now();

        let query = self.resolve(definition)?;
        let mut pipeline = CollectorPipeline::build(
            definition,
            definition.window(self.config.default_rows),
            &query,
            &self.field_map,
        )?;
        let scored = pipeline.needs_scores();
        timer.insert("prepare".to_string(), started.elapsed().as_millis() as u64);

        let collect_started = Instant::now();
        let local_stats;
        let stats = match stats {
            Some(stats) => Some(stats),
            None if scored => {
                local_stats = CollectionStats::gather(&query, self.snapshot.segments());
                Some(&local_stats)
            }
            None => None,
        };
        pipeline.scan(
            &query,
            self.snapshot.segments(),
            self.snapshot.doc_bases(),
            stats,
            Bm25::new(self.config.bm25),
        )?;
        let output = pipeline.finish();
        timer.insert("collect".to_string(), collect_started.elapsed().as_millis() as u64);

        let retrieve_started = Instant::now();
        let returned = definition.returned_fields.as_deref();
        let mut documents = Vec::with_capacity(output.ranked.len());
        for ranked in output.ranked {
            let (index, doc) = self.snapshot.locate(ranked.doc).ok_or_else(|| {
                PikeError::index(format!("Document {} is outside the snapshot", ranked.doc))
            })?;
            let segment = &self.snapshot.segments()[index];
            documents.push(ResultDocument {
                doc_id: ranked.doc,
                identity: segment.identity(doc).to_string(),
                score: scored.then_some(ranked.score),
                engine: None,
                fields: self.retrieve(segment, doc, returned),
                sort_keys: ranked.keys,
            });
        }
        timer.insert("retrieve".to_string(), retrieve_started.elapsed().as_millis() as u64);

        let facets = output
            .facets
            .iter()
            .map(|(dim, counts)| (dim.clone(), top_facets(counts, usize::MAX)))
            .collect();

        timer.insert("total".to_string(), started.elapsed().as_millis() as u64);
        Ok(ResultDefinition {
            total_hits: output.total_hits,
            documents,
            facets,
            functions: output.functions,
            collectors: output.collectors,
            timer,
        })
    }

    /// Run a query and cut the requested page.
    pub fn search(&self, definition: &QueryDefinition) -> Result<ResultDefinition> {
        let rows = definition.effective_rows(self.config.default_rows);
        Ok(self.search_shard(definition, None)?.finalize(definition, rows))
    }

    /// The live document with `identity`, as stored plus updated values.
    pub fn get_document(&self, identity: &str) -> Result<Option<Document>> {
        for segment in self.snapshot.segments() {
            if let Some(doc) = segment.find_live(identity) {
                let mut document = Document::with_id(identity);
                for (name, value) in segment.stored(doc) {
                    document.add_field(name.clone(), value.clone());
                }
                for (name, value) in segment.overlay_values(doc) {
                    document.add_field(name.clone(), value.clone());
                }
                return Ok(Some(document));
            }
        }
        Ok(None)
    }

    fn retrieve(&self, segment: &SegmentReader, doc: u32, returned: Option<&[String]>) -> BTreeMap<String, Value> {
        let mut fields: BTreeMap<String, Value> = segment
            .stored(doc)
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        for (name, value) in segment.overlay_values(doc) {
            fields.insert(name.clone(), value.to_json());
        }
        if let Some(returned) = returned {
            fields.retain(|name, _| returned.iter().any(|r| r == name));
        }
        fields
    }
}
