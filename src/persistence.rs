// ---------------------------------------------------------------------------
// Index persistence — gzipped JSON artifact with a binary vector block
// ---------------------------------------------------------------------------
//
// One artifact per index:
//
// ```json
// {
//   "version": 1,
//   "dimension": 512,
//   "count": 42,
//   "vectors": "<base64 of count*dimension f32 little-endian>",
//   "slots": ["active", "tombstoned", ...],
//   "items": [{ "itemId": ..., "slotId": ..., ... }, ...]
// }
// ```
//
// The JSON is gzipped on disk (level 6). Writes go to a `.tmp` sibling and
// are renamed over the previous artifact, so a reload after a crash observes
// either all effects of a prior save or none.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::SlotState;
use crate::types::ItemRecord;

pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Corruption: {0}")]
	Corruption(String),
	#[error("Serialization: {0}")]
	Serialization(String),
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the index needs persisted: the vector block, the liveness
/// tags, and the item records. Secondary indices are rebuilt on load.
#[derive(Debug)]
pub struct IndexSnapshot {
	pub dimension: usize,
	pub vectors: Vec<f32>,
	pub states: Vec<SlotState>,
	pub items: Vec<ItemRecord>,
}

// ---------------------------------------------------------------------------
// Vector block encode / decode
// ---------------------------------------------------------------------------

/// Encode an f32 slice as base64 of little-endian bytes.
pub fn encode_vector_block(block: &[f32]) -> String {
	let bytes: Vec<u8> = block.iter().flat_map(|f| f.to_le_bytes()).collect();
	STANDARD.encode(&bytes)
}

/// Decode a base64 f32-LE byte string back to `Vec<f32>`.
pub fn decode_vector_block(encoded: &str) -> Result<Vec<f32>, PersistenceError> {
	let bytes = STANDARD
		.decode(encoded)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid base64: {}", e)))?;
	if bytes.len() % 4 != 0 {
		return Err(PersistenceError::Corruption(
			"Invalid vector block length".into(),
		));
	}
	let mut block = Vec::with_capacity(bytes.len() / 4);
	for chunk in bytes.chunks_exact(4) {
		block.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
	}
	Ok(block)
}

// ---------------------------------------------------------------------------
// Gzip compress / decompress
// ---------------------------------------------------------------------------

/// Gzip-compress a byte slice (level 6).
pub fn compress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
	let mut encoder = GzEncoder::new(data, Compression::new(6));
	let mut compressed = Vec::new();
	encoder
		.read_to_end(&mut compressed)
		.map_err(PersistenceError::Io)?;
	Ok(compressed)
}

/// Gunzip-decompress a byte slice.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
	let mut decoder = GzDecoder::new(data);
	let mut decompressed = Vec::new();
	decoder
		.read_to_end(&mut decompressed)
		.map_err(PersistenceError::Io)?;
	Ok(decompressed)
}

/// Check if data starts with gzip magic bytes (0x1f, 0x8b).
pub fn is_gzipped(data: &[u8]) -> bool {
	data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

// ---------------------------------------------------------------------------
// On-disk structure
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct IndexFileV1 {
	version: u32,
	dimension: usize,
	count: usize,
	vectors: String,
	slots: Vec<SlotState>,
	items: Vec<ItemRecord>,
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

fn temp_path(path: &Path) -> PathBuf {
	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	PathBuf::from(tmp)
}

/// Write a snapshot to `path`: gzipped JSON via a `.tmp` sibling and an
/// atomic rename.
pub fn save_index(path: &Path, snapshot: &IndexSnapshot) -> Result<(), PersistenceError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent).map_err(PersistenceError::Io)?;
		}
	}

	let file = IndexFileV1 {
		version: FORMAT_VERSION,
		dimension: snapshot.dimension,
		count: snapshot.states.len(),
		vectors: encode_vector_block(&snapshot.vectors),
		slots: snapshot.states.clone(),
		items: snapshot.items.clone(),
	};

	let json = serde_json::to_string(&file)
		.map_err(|e| PersistenceError::Serialization(format!("Failed to serialize index: {}", e)))?;
	let compressed = compress(json.as_bytes())?;

	let tmp = temp_path(path);
	std::fs::write(&tmp, &compressed).map_err(PersistenceError::Io)?;
	std::fs::rename(&tmp, path).map_err(PersistenceError::Io)?;

	Ok(())
}

/// Load a snapshot from `path`. Returns `Ok(None)` when no artifact exists.
/// Gzipped and plain JSON are both accepted; anything malformed, length-
/// inconsistent, or of an unknown version is a `Corruption` error.
pub fn load_index(path: &Path) -> Result<Option<IndexSnapshot>, PersistenceError> {
	let raw_bytes = match std::fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(PersistenceError::Io(e)),
	};

	let json_bytes = if is_gzipped(&raw_bytes) {
		decompress(&raw_bytes)?
	} else {
		raw_bytes
	};

	let json_str = std::str::from_utf8(&json_bytes)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid UTF-8 in index: {}", e)))?;

	let file: IndexFileV1 = serde_json::from_str(json_str)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid index JSON: {}", e)))?;

	if file.version != FORMAT_VERSION {
		return Err(PersistenceError::Corruption(format!(
			"Unsupported index version: {}",
			file.version
		)));
	}
	if file.dimension == 0 {
		return Err(PersistenceError::Corruption(
			"Index header has zero dimension".into(),
		));
	}
	if file.slots.len() != file.count {
		return Err(PersistenceError::Corruption(format!(
			"Header count {} does not match {} slot tags",
			file.count,
			file.slots.len()
		)));
	}

	let vectors = decode_vector_block(&file.vectors)?;
	if vectors.len() != file.dimension * file.count {
		return Err(PersistenceError::Corruption(format!(
			"Vector block holds {} components, expected {} slots x {} dimensions",
			vectors.len(),
			file.count,
			file.dimension
		)));
	}

	validate_items(&file.items, &file.slots)?;

	Ok(Some(IndexSnapshot {
		dimension: file.dimension,
		vectors,
		states: file.slots,
		items: file.items,
	}))
}

/// Item records must map 1:1 onto the active slots: every record points at
/// an in-range active slot, no slot or item id appears twice, and no active
/// slot is left without an identity.
fn validate_items(items: &[ItemRecord], slots: &[SlotState]) -> Result<(), PersistenceError> {
	let mut seen_slots = HashSet::new();
	let mut seen_ids = HashSet::new();

	for item in items {
		let slot = item.slot_id as usize;
		match slots.get(slot) {
			Some(SlotState::Active) => {}
			Some(SlotState::Tombstoned) => {
				return Err(PersistenceError::Corruption(format!(
					"Item '{}' points at tombstoned slot {}",
					item.item_id, item.slot_id
				)));
			}
			None => {
				return Err(PersistenceError::Corruption(format!(
					"Item '{}' points at out-of-range slot {}",
					item.item_id, item.slot_id
				)));
			}
		}
		if !seen_slots.insert(item.slot_id) {
			return Err(PersistenceError::Corruption(format!(
				"Slot {} is bound to more than one item",
				item.slot_id
			)));
		}
		if !seen_ids.insert(item.item_id.as_str()) {
			return Err(PersistenceError::Corruption(format!(
				"Item id '{}' appears more than once",
				item.item_id
			)));
		}
	}

	let active = slots.iter().filter(|s| **s == SlotState::Active).count();
	if active != items.len() {
		return Err(PersistenceError::Corruption(format!(
			"{} active slots but {} item records",
			active,
			items.len()
		)));
	}

	Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
