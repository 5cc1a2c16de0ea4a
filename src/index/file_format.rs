//! Binary file framing for segment, deletion and value files.
//!
//! Layout (little endian):
//!
//! ```text
//! magic: u32 | version: u32 | crc32(payload): u32 | payload length: u64 | payload
//! ```
//!
//! The payload is the bincode encoding of the file's value.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PikeError, Result};
use crate::storage::Storage;

/// "PSEG"
pub const SEGMENT_MAGIC: u32 = 0x5053_4547;
/// "PDEL"
pub const DELETES_MAGIC: u32 = 0x5044_454C;
/// "PDVU"
pub const VALUES_MAGIC: u32 = 0x5044_5655;

pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 20;

/// Encode `value` into a framed byte buffer.
pub fn encode<T: Serialize>(magic: u32, value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())?;

    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len());
    buffer.write_u32::<LittleEndian>(magic)?;
    buffer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    buffer.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    buffer.write_u64::<LittleEndian>(payload.len() as u64)?;
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Decode a framed buffer, verifying magic, version and checksum.
pub fn decode<T: DeserializeOwned>(magic: u32, bytes: &[u8]) -> Result<T> {
    let mut reader = Cursor::new(bytes);
    let found = reader.read_u32::<LittleEndian>()?;
    if found != magic {
        return Err(PikeError::storage(format!(
            "Invalid file magic: expected {magic:#x}, found {found:#x}"
        )));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PikeError::storage(format!(
            "Unsupported file format version: {version}"
        )));
    }
    let checksum = reader.read_u32::<LittleEndian>()?;
    let length = reader.read_u64::<LittleEndian>()? as usize;

    let mut payload = Vec::with_capacity(length);
    reader.read_to_end(&mut payload)?;
    if payload.len() != length {
        return Err(PikeError::storage(format!(
            "Truncated file: expected {length} payload bytes, found {}",
            payload.len()
        )));
    }
    if crc32fast::hash(&payload) != checksum {
        return Err(PikeError::storage("Checksum mismatch"));
    }

    let (value, _) = bincode::serde::decode_from_slice(&payload, bincode::config::standard())?;
    Ok(value)
}

/// Write one framed file.
pub fn write_file<T: Serialize>(storage: &dyn Storage, name: &str, magic: u32, value: &T) -> Result<()> {
    let bytes = encode(magic, value)?;
    storage.write_all(name, &bytes)
}

/// Read one framed file.
pub fn read_file<T: DeserializeOwned>(storage: &dyn Storage, name: &str, magic: u32) -> Result<T> {
    let bytes = storage.read_all(name)?;
    decode(magic, &bytes).map_err(|e| PikeError::storage(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_framing() {
        let storage = MemoryStorage::new();
        let value = vec![(1u32, "a".to_string()), (2, "b".to_string())];
        write_file(&storage, "x.seg", SEGMENT_MAGIC, &value).unwrap();

        let read: Vec<(u32, String)> = read_file(&storage, "x.seg", SEGMENT_MAGIC).unwrap();
        assert_eq!(read, value);
        assert!(read_file::<Vec<(u32, String)>>(&storage, "x.seg", DELETES_MAGIC).is_err());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = encode(VALUES_MAGIC, &vec![7u64; 16]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode::<Vec<u64>>(VALUES_MAGIC, &bytes),
            Err(PikeError::Storage(_))
        ));
        assert!(decode::<Vec<u64>>(VALUES_MAGIC, &bytes[..10]).is_err());
    }
}
