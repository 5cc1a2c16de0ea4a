//! The commit manifest: which segment files make up the durable index.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Storage;

pub const MANIFEST_FILE: &str = "manifest.json";

pub const SEGMENT_EXTENSION: &str = "seg";
pub const DELETES_EXTENSION: &str = "del";
pub const VALUES_EXTENSION: &str = "dvu";

/// One committed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: u64,

    /// Documents written to the segment, live or not.
    pub doc_count: u32,

    /// Documents deleted since the segment was written.
    #[serde(default)]
    pub deleted: u32,

    /// Generation of the current deletion file, 0 when there is none.
    #[serde(default)]
    pub deletes_gen: u64,

    /// Generation of the current value-overlay file, 0 when there is none.
    #[serde(default)]
    pub values_gen: u64,
}

impl SegmentMeta {
    pub fn new(id: u64, doc_count: u32) -> Self {
        SegmentMeta {
            id,
            doc_count,
            deleted: 0,
            deletes_gen: 0,
            values_gen: 0,
        }
    }

    pub fn segment_file(&self) -> String {
        format!("seg_{}.{SEGMENT_EXTENSION}", self.id)
    }

    pub fn deletes_file(&self) -> Option<String> {
        (self.deletes_gen > 0).then(|| format!("seg_{}_{}.{DELETES_EXTENSION}", self.id, self.deletes_gen))
    }

    pub fn values_file(&self) -> Option<String> {
        (self.values_gen > 0).then(|| format!("seg_{}_{}.{VALUES_EXTENSION}", self.id, self.values_gen))
    }

    pub fn live_docs(&self) -> u32 {
        self.doc_count - self.deleted
    }

    /// Every file this segment needs, segment file first.
    pub fn files(&self) -> Vec<String> {
        let mut files = vec![self.segment_file()];
        files.extend(self.deletes_file());
        files.extend(self.values_file());
        files
    }
}

/// Whether a file name belongs to a segment (as opposed to schema or manifest
/// files).
pub fn is_segment_file(name: &str) -> bool {
    name.starts_with("seg_")
        && [SEGMENT_EXTENSION, DELETES_EXTENSION, VALUES_EXTENSION]
            .iter()
            .any(|ext| name.ends_with(&format!(".{ext}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitManifest {
    /// Stable identity of the index, fixed at creation.
    pub index_uuid: String,

    /// Incremented by every commit.
    pub generation: u64,

    /// Id given to the next new segment.
    pub next_segment: u64,

    pub segments: Vec<SegmentMeta>,
}

impl CommitManifest {
    /// The manifest of a newly created index.
    pub fn create() -> Self {
        CommitManifest {
            index_uuid: uuid::Uuid::new_v4().to_string(),
            generation: 0,
            next_segment: 1,
            segments: Vec::new(),
        }
    }

    /// Load the manifest, `None` for a storage holding no index yet.
    pub fn load(storage: &dyn Storage) -> Result<Option<Self>> {
        if !storage.file_exists(MANIFEST_FILE) {
            return Ok(None);
        }
        let bytes = storage.read_all(MANIFEST_FILE)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        storage.write_atomic(MANIFEST_FILE, &self.to_bytes()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.live_docs() as u64).sum()
    }

    pub fn num_deleted_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.deleted as u64).sum()
    }

    /// Segment files referenced by this commit.
    pub fn files(&self) -> Vec<String> {
        self.segments.iter().flat_map(SegmentMeta::files).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_file_names() {
        let mut meta = SegmentMeta::new(3, 10);
        assert_eq!(meta.files(), vec!["seg_3.seg"]);

        meta.deletes_gen = 5;
        meta.values_gen = 7;
        assert_eq!(meta.files(), vec!["seg_3.seg", "seg_3_5.del", "seg_3_7.dvu"]);
        assert!(meta.files().iter().all(|f| is_segment_file(f)));
        assert!(!is_segment_file(MANIFEST_FILE));
        assert!(!is_segment_file("seg_3.seg.tmp"));
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        assert_eq!(CommitManifest::load(&storage).unwrap(), None);

        let mut manifest = CommitManifest::create();
        manifest.generation = 2;
        manifest.segments.push(SegmentMeta {
            deleted: 1,
            ..SegmentMeta::new(1, 4)
        });
        manifest.save(&storage).unwrap();

        let loaded = CommitManifest::load(&storage).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.num_docs(), 3);
        assert_eq!(loaded.num_deleted_docs(), 1);
    }
}
