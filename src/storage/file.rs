//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{PikeError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Configuration for [`FileStorage`].
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Buffer size for readers and writers.
    pub buffer_size: usize,

    /// Whether closed files and directory changes are fsynced.
    pub sync_writes: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        FileStorageConfig {
            buffer_size: 64 * 1024,
            sync_writes: true,
        }
    }
}

#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
    config: FileStorageConfig,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(directory: P, config: FileStorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            std::fs::create_dir_all(&directory)
                .map_err(|e| PikeError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !directory.is_dir() {
            return Err(PikeError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn not_found_or_io(name: &str, e: std::io::Error) -> PikeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PikeError::storage(format!("File not found: {name}"))
        } else {
            PikeError::storage(format!("{name}: {e}"))
        }
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file =
            File::open(self.file_path(name)).map_err(|e| Self::not_found_or_io(name, e))?;
        Ok(Box::new(FileInput::new(file, self.config.buffer_size)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(name))
            .map_err(|e| PikeError::storage(format!("Failed to create {name}: {e}")))?;

        Ok(Box::new(FileOutput {
            writer: BufWriter::with_capacity(self.config.buffer_size, file),
            sync_writes: self.config.sync_writes,
            position: 0,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| PikeError::storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata = self
            .file_path(name)
            .metadata()
            .map_err(|e| Self::not_found_or_io(name, e))?;
        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name))
            .map_err(|e| PikeError::storage(format!("Failed to rename file: {e}")))
    }

    fn sync(&self) -> Result<()> {
        if !self.config.sync_writes {
            return Ok(());
        }
        // Directory fsync persists renames and deletions on unix.
        if cfg!(unix) {
            File::open(&self.directory)?
                .sync_all()
                .map_err(|e| PikeError::storage(format!("Failed to sync directory: {e}")))?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File, buffer_size: usize) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| PikeError::storage(format!("Failed to get file metadata: {e}")))?
            .len();

        Ok(FileInput {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    sync_writes: bool,
    position: u64,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.position += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PikeError::storage(format!("Failed to flush: {e}")))?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| PikeError::storage(format!("Failed to sync: {e}")))?;

        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        if self.sync_writes {
            self.flush_and_sync()
        } else {
            self.writer
                .flush()
                .map_err(|e| PikeError::storage(format!("Failed to flush: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = FileStorage::new(&nested, FileStorageConfig::default()).unwrap();

        assert!(nested.is_dir());
        assert!(storage.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_output_position() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path(), FileStorageConfig::default()).unwrap();

        let mut output = storage.create_output("x.bin").unwrap();
        output.write_all(b"12345").unwrap();
        assert_eq!(output.position(), 5);
        output.close().unwrap();

        let mut input = storage.open_input("x.bin").unwrap();
        assert_eq!(input.size().unwrap(), 5);
        input.seek(SeekFrom::Start(2)).unwrap();
        let mut rest = String::new();
        input.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "345");
    }

    #[test]
    fn test_rejects_file_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(FileStorage::new(&file, FileStorageConfig::default()).is_err());
    }
}
