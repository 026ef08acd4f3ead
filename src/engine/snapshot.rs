//! Snapshot persistence for the embedded engine
//!
//! The whole `documents` table is written as one framed snapshot:
//!
//! ```text
//! +------------------+
//! | Magic            | (4 bytes, "GDS1")
//! +------------------+
//! | Payload Length   | (u32 LE)
//! +------------------+
//! | Payload          | (JSON array of rows)
//! +------------------+
//! | Checksum         | (u32 LE, crc32 of magic + length + payload)
//! +------------------+
//! ```
//!
//! Corruption is an explicit load error, never ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{EngineError, EngineResult, StoredRow};

const MAGIC: &[u8; 4] = b"GDS1";

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Writes the table to `path`, replacing any previous snapshot.
pub(crate) fn save(path: &Path, rows: &BTreeMap<String, StoredRow>) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let payload = serde_json::to_vec(&rows.values().collect::<Vec<_>>())?;

    let mut data = Vec::with_capacity(4 + 4 + payload.len() + 4);
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&payload);
    let crc = checksum(&data);
    data.extend_from_slice(&crc.to_le_bytes());

    fs::write(path, data)?;
    Ok(())
}

/// Loads the table from `path`. Returns `None` if no snapshot exists yet.
pub(crate) fn load(path: &Path) -> EngineResult<Option<BTreeMap<String, StoredRow>>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read(path)?;
    if data.len() < 4 + 4 + 4 {
        return Err(EngineError::Corruption(format!(
            "snapshot too short: {} bytes",
            data.len()
        )));
    }
    if &data[0..4] != MAGIC {
        return Err(EngineError::Corruption("bad magic".to_string()));
    }

    let payload_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let expected_len = 4 + 4 + payload_len + 4;
    if data.len() != expected_len {
        return Err(EngineError::Corruption(format!(
            "length mismatch: header says {expected_len} bytes, file has {}",
            data.len()
        )));
    }

    let crc_offset = expected_len - 4;
    let stored_crc = u32::from_le_bytes([
        data[crc_offset],
        data[crc_offset + 1],
        data[crc_offset + 2],
        data[crc_offset + 3],
    ]);
    let computed_crc = checksum(&data[..crc_offset]);
    if stored_crc != computed_crc {
        return Err(EngineError::Corruption(format!(
            "checksum mismatch: computed {computed_crc:08x}, stored {stored_crc:08x}"
        )));
    }

    let rows: Vec<StoredRow> = serde_json::from_slice(&data[8..crc_offset])?;
    Ok(Some(
        rows.into_iter().map(|row| (row.id.clone(), row)).collect(),
    ))
}
