// ---------------------------------------------------------------------------
// VectorStore — append-structured embedding storage with slot liveness
// ---------------------------------------------------------------------------
//
// Owns a flat f32 block of `slot_count * dimension` components plus one
// liveness tag per slot. Slots are only appended; removal tombstones the
// tag and leaves the vector memory in place until an explicit compaction
// rebuilds the store. No knowledge of item identity or recommendation
// semantics lives here.
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::error::WardrobeError;

/// Liveness tag of a storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
	Active,
	Tombstoned,
}

#[derive(Debug)]
pub struct VectorStore {
	dimension: usize,
	data: Vec<f32>,
	states: Vec<SlotState>,
}

impl VectorStore {
	pub fn new(dimension: usize) -> Self {
		Self {
			dimension,
			data: Vec::new(),
			states: Vec::new(),
		}
	}

	/// Reassemble a store from a persisted vector block and liveness tags.
	pub fn from_parts(
		dimension: usize,
		data: Vec<f32>,
		states: Vec<SlotState>,
	) -> Result<Self, WardrobeError> {
		if dimension == 0 {
			return Err(WardrobeError::Corruption(
				"vector block has zero dimension".into(),
			));
		}
		if data.len() != dimension * states.len() {
			return Err(WardrobeError::Corruption(format!(
				"vector block holds {} components, expected {} slots x {} dimensions",
				data.len(),
				states.len(),
				dimension
			)));
		}
		Ok(Self {
			dimension,
			data,
			states,
		})
	}

	pub fn dimension(&self) -> usize {
		self.dimension
	}

	/// Total slots, active and tombstoned.
	pub fn slot_count(&self) -> usize {
		self.states.len()
	}

	pub fn active_count(&self) -> usize {
		self.states
			.iter()
			.filter(|s| **s == SlotState::Active)
			.count()
	}

	/// Append a vector into a fresh active slot.
	pub fn push(&mut self, vector: &[f32]) -> Result<u32, WardrobeError> {
		if vector.len() != self.dimension {
			return Err(WardrobeError::InvalidArgument(format!(
				"embedding has {} dimensions, index expects {}",
				vector.len(),
				self.dimension
			)));
		}
		let slot = self.states.len() as u32;
		self.data.extend_from_slice(vector);
		self.states.push(SlotState::Active);
		Ok(slot)
	}

	/// The vector stored at `slot`, regardless of liveness.
	pub fn vector(&self, slot: u32) -> Option<&[f32]> {
		let start = slot as usize * self.dimension;
		let end = start + self.dimension;
		if end > self.data.len() {
			return None;
		}
		Some(&self.data[start..end])
	}

	pub fn state(&self, slot: u32) -> Option<SlotState> {
		self.states.get(slot as usize).copied()
	}

	pub fn is_active(&self, slot: u32) -> bool {
		self.state(slot) == Some(SlotState::Active)
	}

	/// Mark a slot tombstoned. Returns `false` if the slot does not exist
	/// or was already tombstoned.
	pub fn tombstone(&mut self, slot: u32) -> bool {
		match self.states.get_mut(slot as usize) {
			Some(state @ SlotState::Active) => {
				*state = SlotState::Tombstoned;
				true
			}
			_ => false,
		}
	}

	/// Iterate `(slot_id, vector)` over active slots in slot order.
	pub fn iter_active(&self) -> impl Iterator<Item = (u32, &[f32])> + '_ {
		self.states
			.iter()
			.enumerate()
			.filter(|(_, s)| **s == SlotState::Active)
			.map(|(i, _)| {
				let start = i * self.dimension;
				(i as u32, &self.data[start..start + self.dimension])
			})
	}

	/// The raw vector block, `slot_count * dimension` components.
	pub fn raw_data(&self) -> &[f32] {
		&self.data
	}

	pub fn states(&self) -> &[SlotState] {
		&self.states
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
