//! The replication boundary.
//!
//! A [`ReplicationSession`] pins one snapshot and lists every file a replica
//! needs to reproduce it. Pinned files are not deleted while the session
//! lives, so they can be streamed while the master keeps committing. The
//! manifest and the schema files are captured at session start, as they are
//! replaced in place by later commits.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PikeError, Result};
use crate::index::manifest::MANIFEST_FILE;
use crate::index::snapshot::SnapshotGuard;
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug)]
pub struct ReplicationSession {
    snapshot: SnapshotGuard,
    storage: Arc<dyn Storage>,
    captured: BTreeMap<String, Vec<u8>>,
    files: Vec<ReplicatedFile>,
}

impl ReplicationSession {
    /// `metadata` holds the schema files as they are at session start.
    pub fn new(
        snapshot: SnapshotGuard,
        storage: Arc<dyn Storage>,
        metadata: Vec<(String, Vec<u8>)>,
    ) -> Result<Self> {
        let mut files = Vec::new();
        for name in snapshot.files() {
            let size = storage.file_size(&name)?;
            files.push(ReplicatedFile { name, size });
        }

        let mut captured: BTreeMap<String, Vec<u8>> = metadata.into_iter().collect();
        captured.insert(MANIFEST_FILE.to_string(), snapshot.manifest().to_bytes()?);
        for (name, bytes) in &captured {
            files.push(ReplicatedFile {
                name: name.clone(),
                size: bytes.len() as u64,
            });
        }

        log::debug!(
            "replication session on version {}: {} files",
            snapshot.version(),
            files.len()
        );
        Ok(ReplicationSession {
            snapshot,
            storage,
            captured,
            files,
        })
    }

    pub fn index_uuid(&self) -> &str {
        &self.snapshot.manifest().index_uuid
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    pub fn files(&self) -> &[ReplicatedFile] {
        &self.files
    }

    /// Stream one listed file.
    pub fn open_file(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        if let Some(bytes) = self.captured.get(name) {
            return Ok(Box::new(Cursor::new(bytes.clone())));
        }
        if !self.files.iter().any(|f| f.name == name) {
            return Err(PikeError::not_found(format!(
                "{name} is not part of version {}",
                self.version()
            )));
        }
        Ok(Box::new(self.storage.open_input(name)?))
    }
}

/// A replica may only pull from the master it was cloned from.
pub fn check_master_identity(local: &str, remote: &str) -> Result<()> {
    if local != remote {
        return Err(PikeError::consistency(format!(
            "The master index identity {remote} does not match the local identity {local}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_master_identity() {
        assert!(check_master_identity("a", "a").is_ok());
        assert!(matches!(
            check_master_identity("a", "b"),
            Err(PikeError::Consistency(_))
        ));
    }
}
