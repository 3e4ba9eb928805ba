// ---------------------------------------------------------------------------
// SlotMap — item identity to storage slot mapping
// ---------------------------------------------------------------------------
//
// Bidirectional mapping between external item ids and internal slot ids,
// holding the item records for active slots. Invariant: exactly one active
// slot per item id. Tombstoned slots keep no record here; the vector store
// tracks their liveness.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::types::ItemRecord;

#[derive(Debug, Default)]
pub struct SlotMap {
	active: HashMap<String, u32>,
	records: HashMap<u32, ItemRecord>,
}

impl SlotMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bind an item record to its slot. If the item id was already bound,
	/// the previous binding is dropped and its slot id returned so the
	/// caller can tombstone it.
	pub fn bind(&mut self, record: ItemRecord) -> Option<u32> {
		let displaced = self.active.insert(record.item_id.clone(), record.slot_id);
		if let Some(old_slot) = displaced {
			self.records.remove(&old_slot);
		}
		self.records.insert(record.slot_id, record);
		displaced
	}

	/// Drop the binding for `item_id`, returning its record.
	pub fn release(&mut self, item_id: &str) -> Option<ItemRecord> {
		let slot = self.active.remove(item_id)?;
		self.records.remove(&slot)
	}

	pub fn slot_of(&self, item_id: &str) -> Option<u32> {
		self.active.get(item_id).copied()
	}

	pub fn record(&self, item_id: &str) -> Option<&ItemRecord> {
		let slot = self.active.get(item_id)?;
		self.records.get(slot)
	}

	pub fn record_at(&self, slot: u32) -> Option<&ItemRecord> {
		self.records.get(&slot)
	}

	pub fn contains(&self, item_id: &str) -> bool {
		self.active.contains_key(item_id)
	}

	pub fn len(&self) -> usize {
		self.active.len()
	}

	pub fn is_empty(&self) -> bool {
		self.active.is_empty()
	}

	pub fn records(&self) -> impl Iterator<Item = &ItemRecord> {
		self.records.values()
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
