//! The single index writer.
//!
//! A commit applies a batch of [`WriteOp`]s on top of the last committed
//! state, writes the new files, then atomically replaces the manifest. If any
//! step fails the files written so far are removed and the writer keeps its
//! previous state.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use bit_vec::BitVec;

use crate::config::EngineConfig;
use crate::document::codec::{EncodedDocument, WriteInstruction};
use crate::document::document::ID_FIELD;
use crate::document::field_value::FieldValue;
use crate::document::indexable::IndexableField;
use crate::error::{PikeError, Result};
use crate::index::manifest::{CommitManifest, SegmentMeta, is_segment_file};
use crate::index::segment::{SegmentBuilder, SegmentData, SegmentReader, UpdatedValue, ValueOverlay};
use crate::index::snapshot::ReaderSnapshot;
use crate::storage::Storage;

/// One operation of a commit batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert, or replace the live document with the same identity.
    Upsert(EncodedDocument),
    /// Overwrite column values of an existing document.
    UpdateValues(EncodedDocument),
    Delete(String),
    DeleteAll,
}

#[derive(Debug)]
pub struct CommitOutcome {
    pub snapshot: ReaderSnapshot,
    /// Documents removed by deletes and replacements.
    pub deleted: u64,
}

/// Batch state on top of the committed segments.
struct PendingCommit<'a> {
    base: &'a [Arc<SegmentReader>],
    lives: Vec<Option<BitVec>>,
    overlays: Vec<Option<ValueOverlay>>,
    docs: Vec<Option<EncodedDocument>>,
    by_identity: AHashMap<String, usize>,
    deleted: u64,
}

impl<'a> PendingCommit<'a> {
    fn new(base: &'a [Arc<SegmentReader>]) -> Self {
        PendingCommit {
            base,
            lives: vec![None; base.len()],
            overlays: vec![None; base.len()],
            docs: Vec::new(),
            by_identity: AHashMap::new(),
            deleted: 0,
        }
    }

    fn is_live(&self, segment: usize, doc: u32) -> bool {
        match &self.lives[segment] {
            Some(live) => live.get(doc as usize).unwrap_or(false),
            None => self.base[segment].is_live(doc),
        }
    }

    fn find_committed(&self, identity: &str) -> Option<(usize, u32)> {
        self.base.iter().enumerate().find_map(|(segment, reader)| {
            reader
                .postings(ID_FIELD, identity.as_bytes())
                .iter()
                .map(|p| p.doc)
                .find(|doc| self.is_live(segment, *doc))
                .map(|doc| (segment, doc))
        })
    }

    fn delete(&mut self, identity: &str) -> u64 {
        let mut count = 0;
        if let Some(index) = self.by_identity.remove(identity) {
            if self.docs[index].take().is_some() {
                count += 1;
            }
        }
        while let Some((segment, doc)) = self.find_committed(identity) {
            let base = self.base;
            self.lives[segment]
                .get_or_insert_with(|| base[segment].live().clone())
                .set(doc as usize, false);
            count += 1;
        }
        self.deleted += count;
        count
    }

    fn upsert(&mut self, document: EncodedDocument) {
        if document.instruction == WriteInstruction::Update {
            self.delete(&document.identity);
        }
        self.by_identity
            .insert(document.identity.clone(), self.docs.len());
        self.docs.push(Some(document));
    }

    fn update_values(&mut self, update: EncodedDocument) -> Result<()> {
        if let Some(pending) = self
            .by_identity
            .get(&update.identity)
            .and_then(|index| self.docs[*index].as_mut())
        {
            let replaced: AHashSet<&str> = update.fields.iter().map(|f| f.field_name()).collect();
            pending.fields.retain(|f| {
                let rewritten = f.is_doc_value() || matches!(f, IndexableField::Stored { .. });
                !(rewritten && replaced.contains(f.field_name()))
            });
            pending.fields.extend(update.fields.iter().cloned());
            return Ok(());
        }

        let (segment, doc) = self.find_committed(&update.identity).ok_or_else(|| {
            PikeError::document(format!("No document with the identity: {}", update.identity))
        })?;

        let mut stored: AHashMap<String, FieldValue> = AHashMap::new();
        let mut columns = Vec::new();
        for field in update.fields {
            match field {
                IndexableField::DocValue { field, value } => columns.push((field, value)),
                IndexableField::Stored { field, value } => {
                    stored.insert(field, value);
                }
                _ => {}
            }
        }

        let base = self.base;
        let overlay = self.overlays[segment].get_or_insert_with(|| base[segment].overlay().clone());
        for (field, column) in columns {
            let value = UpdatedValue {
                column,
                stored: stored.remove(&field),
            };
            overlay.entry(field).or_default().insert(doc, value);
        }
        Ok(())
    }

    fn delete_all(&mut self) {
        for (segment, reader) in self.base.iter().enumerate() {
            let live = self.lives[segment].get_or_insert_with(|| reader.live().clone());
            self.deleted += live.iter().filter(|l| *l).count() as u64;
            *live = BitVec::from_elem(live.len(), false);
        }
        self.deleted += self.docs.iter().filter(|d| d.is_some()).count() as u64;
        self.docs.clear();
        self.by_identity.clear();
    }
}

/// Owns the committed state of one index. Callers serialize access.
#[derive(Debug)]
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    config: EngineConfig,
    manifest: CommitManifest,
    segments: Vec<Arc<SegmentReader>>,
}

impl IndexWriter {
    /// Open the index in `storage`, creating it when no manifest exists.
    pub fn open(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self> {
        let manifest = match CommitManifest::load(storage.as_ref())? {
            Some(manifest) => manifest,
            None => {
                let manifest = CommitManifest::create();
                manifest.save(storage.as_ref())?;
                log::info!("created index {}", manifest.index_uuid);
                manifest
            }
        };

        let segments = manifest
            .segments
            .iter()
            .map(|meta| SegmentReader::load(storage.as_ref(), meta).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let referenced = manifest.files();
        for name in storage.list_files()? {
            let orphan = is_segment_file(&name) && !referenced.contains(&name);
            if orphan || name.ends_with(".tmp") {
                log::debug!("removing unreferenced file {name}");
                storage.delete_file(&name)?;
            }
        }

        Ok(IndexWriter {
            storage,
            config,
            manifest,
            segments,
        })
    }

    pub fn manifest(&self) -> &CommitManifest {
        &self.manifest
    }

    /// A snapshot of the last commit.
    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot::new(self.manifest.clone(), self.segments.clone())
    }

    /// Apply `ops` in order and commit them as one generation.
    pub fn commit(&mut self, ops: Vec<WriteOp>) -> Result<CommitOutcome> {
        let mut written = Vec::new();
        match self.commit_files(ops, &mut written) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                for name in &written {
                    if let Err(cleanup) = self.storage.delete_file(name) {
                        log::warn!("failed to remove {name} after a failed commit: {cleanup}");
                    }
                }
                Err(e)
            }
        }
    }

    fn commit_files(&mut self, ops: Vec<WriteOp>, written: &mut Vec<String>) -> Result<CommitOutcome> {
        let storage = self.storage.as_ref();
        let generation = self.manifest.generation + 1;
        let mut next_segment = self.manifest.next_segment;

        let mut pending = PendingCommit::new(&self.segments);
        for op in ops {
            match op {
                WriteOp::Upsert(document) => pending.upsert(document),
                WriteOp::UpdateValues(document) => pending.update_values(document)?,
                WriteOp::Delete(identity) => {
                    pending.delete(&identity);
                }
                WriteOp::DeleteAll => pending.delete_all(),
            }
        }

        let PendingCommit {
            base,
            lives,
            overlays,
            docs,
            deleted,
            ..
        } = pending;

        let mut readers = Vec::with_capacity(base.len() + 1);
        for ((reader, live), overlay) in base.iter().zip(lives).zip(overlays) {
            let mut reader = Arc::clone(reader);
            let mut meta = reader.meta().clone();
            if let Some(live) = live {
                let live_count = live.iter().filter(|l| *l).count() as u32;
                if live_count == 0 {
                    continue;
                }
                meta.deleted = meta.doc_count - live_count;
                meta.deletes_gen = generation;
                written.extend(meta.deletes_file());
                reader = Arc::new(reader.with_deletes(storage, meta.clone(), live)?);
            }
            if let Some(overlay) = overlay {
                meta.values_gen = generation;
                written.extend(meta.values_file());
                reader = Arc::new(reader.with_overlay(storage, meta, overlay)?);
            }
            readers.push(reader);
        }

        let mut builder = SegmentBuilder::new();
        for document in docs.into_iter().flatten() {
            builder.add_document(&document.identity, &document.fields);
        }
        if !builder.is_empty() {
            let data = builder.build();
            let meta = SegmentMeta::new(next_segment, data.ids.len() as u32);
            next_segment += 1;
            written.push(meta.segment_file());
            SegmentReader::write_data(storage, &meta, &data)?;
            readers.push(Arc::new(SegmentReader::new(meta, Arc::new(data))));
        }

        if readers.len() > self.config.max_segments {
            log::debug!("merging {} segments", readers.len());
            let data = SegmentData::merge(&readers);
            readers.clear();
            if !data.ids.is_empty() {
                let meta = SegmentMeta::new(next_segment, data.ids.len() as u32);
                next_segment += 1;
                written.push(meta.segment_file());
                SegmentReader::write_data(storage, &meta, &data)?;
                readers.push(Arc::new(SegmentReader::new(meta, Arc::new(data))));
            }
        }

        let manifest = CommitManifest {
            index_uuid: self.manifest.index_uuid.clone(),
            generation,
            next_segment,
            segments: readers.iter().map(|r| r.meta().clone()).collect(),
        };
        manifest.save(storage)?;
        if self.config.sync_writes {
            storage.sync()?;
        }
        log::debug!(
            "committed generation {generation}: {} segments, {} docs",
            manifest.segments.len(),
            manifest.num_docs()
        );

        self.manifest = manifest;
        self.segments = readers;
        Ok(CommitOutcome {
            snapshot: self.snapshot(),
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::indexable::DocValue;
    use crate::storage::memory::MemoryStorage;

    fn doc(identity: &str, instruction: WriteInstruction, price: i64) -> EncodedDocument {
        EncodedDocument {
            identity: identity.to_string(),
            instruction,
            fields: vec![IndexableField::DocValue {
                field: "price".into(),
                value: DocValue::Long(price),
            }],
        }
    }

    fn writer(max_segments: usize) -> (Arc<dyn Storage>, IndexWriter) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            max_segments,
            ..EngineConfig::default()
        };
        let writer = IndexWriter::open(Arc::clone(&storage), config).unwrap();
        (storage, writer)
    }

    #[test]
    fn test_upsert_replaces() {
        let (_, mut writer) = writer(10);
        writer
            .commit(vec![WriteOp::Upsert(doc("a", WriteInstruction::Update, 1))])
            .unwrap();
        let outcome = writer
            .commit(vec![
                WriteOp::Upsert(doc("a", WriteInstruction::Update, 2)),
                WriteOp::Upsert(doc("a", WriteInstruction::Update, 3)),
            ])
            .unwrap();

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.snapshot.num_docs(), 1);
        let segment = outcome.snapshot.segments().last().unwrap();
        let local = segment.find_live("a").unwrap();
        assert_eq!(segment.doc_value("price", local), Some(&DocValue::Long(3)));
    }

    #[test]
    fn test_update_values_and_reopen() {
        let (storage, mut writer) = writer(10);
        writer
            .commit(vec![WriteOp::Upsert(doc("a", WriteInstruction::Update, 1))])
            .unwrap();
        writer
            .commit(vec![WriteOp::UpdateValues(doc("a", WriteInstruction::Update, 42))])
            .unwrap();

        let missing = writer.commit(vec![WriteOp::UpdateValues(doc("zz", WriteInstruction::Update, 0))]);
        assert!(matches!(missing, Err(PikeError::Document(_))));
        assert_eq!(writer.manifest().generation, 2);

        let reopened = IndexWriter::open(storage, EngineConfig::default()).unwrap();
        let snapshot = reopened.snapshot();
        let segment = &snapshot.segments()[0];
        assert_eq!(segment.doc_value("price", 0), Some(&DocValue::Long(42)));
    }

    #[test]
    fn test_update_values_of_pending_document() {
        let (_, mut writer) = writer(10);
        let stored = |price: i64| IndexableField::Stored {
            field: "price".into(),
            value: FieldValue::Integer(price),
        };
        let mut original = doc("a", WriteInstruction::Update, 1);
        original.fields.push(stored(1));
        let mut update = doc("a", WriteInstruction::Update, 5);
        update.fields.push(stored(5));

        let outcome = writer
            .commit(vec![WriteOp::Upsert(original), WriteOp::UpdateValues(update)])
            .unwrap();
        let segment = &outcome.snapshot.segments()[0];
        assert_eq!(segment.doc_value("price", 0), Some(&DocValue::Long(5)));
        assert_eq!(segment.stored(0)["price"], FieldValue::Integer(5));
    }

    #[test]
    fn test_merge_and_delete_all() {
        let (storage, mut writer) = writer(2);
        for i in 0..3 {
            writer
                .commit(vec![WriteOp::Upsert(doc(&format!("d{i}"), WriteInstruction::Insert, i))])
                .unwrap();
        }
        assert_eq!(writer.manifest().segments.len(), 1);
        assert_eq!(writer.manifest().num_docs(), 3);

        let outcome = writer.commit(vec![WriteOp::DeleteAll]).unwrap();
        assert_eq!(outcome.deleted, 3);
        assert_eq!(outcome.snapshot.num_docs(), 0);
        assert!(writer.manifest().segments.is_empty());

        // nothing references the old files, but only snapshot release deletes them
        assert!(storage.list_files().unwrap().iter().any(|f| is_segment_file(f)));
    }

    #[test]
    fn test_open_removes_orphans() {
        let (storage, _writer) = writer(10);
        storage.write_all("seg_9.seg", b"junk").unwrap();
        storage.write_all("manifest.json.tmp", b"{}").unwrap();

        IndexWriter::open(Arc::clone(&storage), EngineConfig::default()).unwrap();
        assert!(!storage.file_exists("seg_9.seg"));
        assert!(!storage.file_exists("manifest.json.tmp"));
    }
}
