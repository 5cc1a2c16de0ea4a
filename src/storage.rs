//! Storage abstraction layer for pike.
//!
//! Index files (segments, deletion sets, value overlays, commit manifests) are
//! written through the [`Storage`] trait, so an engine can run on disk with
//! [`file::FileStorage`] or entirely in memory with [`memory::MemoryStorage`].
//!
//! Files are write-once: a file is created, written, synced and closed, and
//! from then on only read or deleted. Replacing a file goes through
//! [`Storage::write_atomic`].
//!
//! # Example
//!
//! ```
//! use pike::storage::Storage;
//! use pike::storage::memory::MemoryStorage;
//!
//! # fn main() -> pike::error::Result<()> {
//! let storage = MemoryStorage::new();
//! storage.write_atomic("manifest.json", b"{}")?;
//! assert_eq!(storage.read_all("manifest.json")?, b"{}");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};

use crate::error::Result;

pub mod file;
pub mod memory;

/// A trait for storage backends that can store and retrieve index files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a file, replacing any existing target.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make previously completed renames and deletions durable.
    fn sync(&self) -> Result<()>;

    /// Read a whole file into memory.
    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut input = self.open_input(name)?;
        let mut buffer = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Write a whole file.
    fn write_all(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut output = self.create_output(name)?;
        output.write_all(bytes)?;
        output.close()
    }

    /// Replace a file atomically: write a temporary file, sync it, rename it
    /// over the target.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let temp_name = format!("{name}.tmp");
        self.write_all(&temp_name, bytes)?;
        self.rename_file(&temp_name, name)?;
        self.sync()
    }
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Size of the underlying file.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffers and sync to the medium.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Bytes written so far.
    fn position(&self) -> u64;

    /// Finish the file. Must be called for the content to be durable.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::{FileStorage, FileStorageConfig};
    use crate::storage::memory::MemoryStorage;

    fn exercise(storage: &dyn Storage) {
        storage.write_all("a.seg", b"segment").unwrap();
        assert!(storage.file_exists("a.seg"));
        assert_eq!(storage.file_size("a.seg").unwrap(), 7);

        storage.write_atomic("manifest", b"v1").unwrap();
        storage.write_atomic("manifest", b"v2").unwrap();
        assert_eq!(storage.read_all("manifest").unwrap(), b"v2");
        assert!(!storage.file_exists("manifest.tmp"));

        assert_eq!(storage.list_files().unwrap(), vec!["a.seg", "manifest"]);

        storage.delete_file("a.seg").unwrap();
        storage.delete_file("a.seg").unwrap();
        assert!(!storage.file_exists("a.seg"));
        assert!(storage.open_input("a.seg").is_err());
    }

    #[test]
    fn test_memory_storage_contract() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn test_file_storage_contract() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path(), FileStorageConfig::default()).unwrap();
        exercise(&storage);
    }
}
