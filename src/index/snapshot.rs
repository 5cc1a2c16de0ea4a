//! Near-real-time reader snapshots.
//!
//! [`SnapshotManager::acquire`] hands out a [`SnapshotGuard`] on the current
//! snapshot and counts it as a holder; dropping the guard releases it.
//! [`SnapshotManager::refresh`] only changes what later acquisitions see.
//! Files of a replaced snapshot are deleted once no holder is left and the
//! current commit no longer references them.

use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashSet;
use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::index::manifest::CommitManifest;
use crate::index::segment::SegmentReader;
use crate::storage::Storage;

/// A consistent point-in-time view of one index.
#[derive(Debug)]
pub struct ReaderSnapshot {
    manifest: CommitManifest,
    segments: Vec<Arc<SegmentReader>>,
    doc_bases: Vec<u64>,
    holders: AtomicUsize,
}

impl ReaderSnapshot {
    pub fn new(manifest: CommitManifest, segments: Vec<Arc<SegmentReader>>) -> Self {
        let mut doc_bases = Vec::with_capacity(segments.len());
        let mut base = 0u64;
        for segment in &segments {
            doc_bases.push(base);
            base += segment.doc_count() as u64;
        }
        ReaderSnapshot {
            manifest,
            segments,
            doc_bases,
            holders: AtomicUsize::new(0),
        }
    }

    /// Commit generation this snapshot was opened on.
    pub fn version(&self) -> u64 {
        self.manifest.generation
    }

    pub fn manifest(&self) -> &CommitManifest {
        &self.manifest
    }

    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    /// First global doc id of each segment.
    pub fn doc_bases(&self) -> &[u64] {
        &self.doc_bases
    }

    /// Segment index and local doc of a global doc id.
    pub fn locate(&self, global: u64) -> Option<(usize, u32)> {
        let index = self.doc_bases.partition_point(|base| *base <= global).checked_sub(1)?;
        let local = global - self.doc_bases[index];
        (local < self.segments[index].doc_count() as u64).then_some((index, local as u32))
    }

    pub fn num_docs(&self) -> u64 {
        self.manifest.num_docs()
    }

    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::SeqCst)
    }

    pub fn files(&self) -> Vec<String> {
        self.manifest.files()
    }
}

/// Publishes snapshots and tracks their holders.
#[derive(Debug)]
pub struct SnapshotManager {
    storage: Arc<dyn Storage>,
    current: ArcSwap<ReaderSnapshot>,
    retired: Mutex<Vec<Arc<ReaderSnapshot>>>,
}

impl SnapshotManager {
    pub fn new(storage: Arc<dyn Storage>, initial: ReaderSnapshot) -> Arc<Self> {
        Arc::new(SnapshotManager {
            storage,
            current: ArcSwap::from_pointee(initial),
            retired: Mutex::new(Vec::new()),
        })
    }

    /// Acquire the current snapshot. The guard releases it on drop.
    pub fn acquire(self: &Arc<Self>) -> SnapshotGuard {
        let _retired = self.retired.lock();
        let snapshot = self.current.load_full();
        snapshot.holders.fetch_add(1, Ordering::SeqCst);
        SnapshotGuard {
            manager: Arc::clone(self),
            snapshot,
        }
    }

    /// Make `snapshot` the one new acquisitions see.
    pub fn refresh(&self, snapshot: ReaderSnapshot) {
        let mut retired = self.retired.lock();
        log::debug!("refreshing reader snapshot to version {}", snapshot.version());
        let previous = self.current.swap(Arc::new(snapshot));
        retired.push(previous);
        self.sweep(&mut retired);
    }

    pub fn current_version(&self) -> u64 {
        self.current.load().version()
    }

    /// Holders across the current and every replaced snapshot.
    pub fn active_holders(&self) -> usize {
        let retired = self.retired.lock();
        self.current.load().holders() + retired.iter().map(|s| s.holders()).sum::<usize>()
    }

    fn release(&self, snapshot: &ReaderSnapshot) {
        let mut retired = self.retired.lock();
        snapshot.holders.fetch_sub(1, Ordering::SeqCst);
        if !retired.is_empty() {
            self.sweep(&mut retired);
        }
    }

    fn sweep(&self, retired: &mut Vec<Arc<ReaderSnapshot>>) {
        let mut referenced: AHashSet<String> = self.current.load().files().into_iter().collect();
        let mut obsolete = BTreeSet::new();
        retired.retain(|snapshot| {
            if snapshot.holders() > 0 {
                referenced.extend(snapshot.files());
                true
            } else {
                obsolete.extend(snapshot.files());
                false
            }
        });

        for name in obsolete.iter().filter(|name| !referenced.contains(*name)) {
            match self.storage.delete_file(name) {
                Ok(()) => log::debug!("deleted obsolete file {name}"),
                Err(e) => log::warn!("failed to delete obsolete file {name}: {e}"),
            }
        }
    }
}

/// A held snapshot.
#[derive(Debug)]
pub struct SnapshotGuard {
    manager: Arc<SnapshotManager>,
    snapshot: Arc<ReaderSnapshot>,
}

impl Deref for SnapshotGuard {
    type Target = ReaderSnapshot;

    fn deref(&self) -> &ReaderSnapshot {
        &self.snapshot
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        self.manager.release(&self.snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::manifest::SegmentMeta;
    use crate::index::segment::SegmentBuilder;
    use crate::storage::memory::MemoryStorage;

    fn commit(storage: &dyn Storage, generation: u64, ids: &[u64]) -> ReaderSnapshot {
        let mut manifest = CommitManifest::create();
        manifest.generation = generation;
        let mut segments = Vec::new();
        for id in ids {
            let mut builder = SegmentBuilder::new();
            builder.add_document(&format!("doc{id}"), &[]);
            let meta = SegmentMeta::new(*id, 1);
            let data = builder.build();
            SegmentReader::write_data(storage, &meta, &data).unwrap();
            manifest.segments.push(meta.clone());
            segments.push(Arc::new(SegmentReader::new(meta, Arc::new(data))));
        }
        ReaderSnapshot::new(manifest, segments)
    }

    #[test]
    fn test_refresh_keeps_held_snapshot() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let manager = SnapshotManager::new(Arc::clone(&storage), commit(storage.as_ref(), 1, &[1]));

        let held = manager.acquire();
        assert_eq!(held.version(), 1);
        assert_eq!(manager.active_holders(), 1);

        manager.refresh(commit(storage.as_ref(), 2, &[2]));
        assert_eq!(held.version(), 1);
        assert_eq!(manager.acquire().version(), 2);
        // still held, so its file survives the refresh
        assert!(storage.file_exists("seg_1.seg"));

        drop(held);
        assert_eq!(manager.active_holders(), 0);
        assert!(!storage.file_exists("seg_1.seg"));
        assert!(storage.file_exists("seg_2.seg"));
    }

    #[test]
    fn test_shared_files_survive() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let manager = SnapshotManager::new(Arc::clone(&storage), commit(storage.as_ref(), 1, &[1]));
        manager.refresh(commit(storage.as_ref(), 2, &[1, 2]));
        assert!(storage.file_exists("seg_1.seg"));
    }

    #[test]
    fn test_locate() {
        let storage = MemoryStorage::new();
        let snapshot = commit(&storage, 1, &[1, 2, 3]);
        assert_eq!(snapshot.doc_bases(), &[0, 1, 2]);
        assert_eq!(snapshot.locate(2), Some((2, 0)));
        assert_eq!(snapshot.locate(3), None);
    }
}
