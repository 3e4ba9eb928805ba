// ---------------------------------------------------------------------------
// Secondary indices — category and owner slot sets
// ---------------------------------------------------------------------------
//
// Keep predicate evaluation sub-linear when filters are selective. Both
// indices hold active slots only and are mutated exclusively by the index
// manager, in the same path that mutates the slot map. They are not
// persisted; the manager rebuilds them from the slot map on load.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

use crate::types::Category;

/// category -> set of active slot ids
#[derive(Debug, Default)]
pub struct CategoryIndex {
	slots: HashMap<Category, HashSet<u32>>,
}

impl CategoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, category: Category, slot: u32) {
		self.slots.entry(category).or_default().insert(slot);
	}

	pub fn remove(&mut self, category: Category, slot: u32) {
		if let Some(set) = self.slots.get_mut(&category) {
			set.remove(&slot);
			if set.is_empty() {
				self.slots.remove(&category);
			}
		}
	}

	pub fn get(&self, category: Category) -> Option<&HashSet<u32>> {
		self.slots.get(&category)
	}

	pub fn clear(&mut self) {
		self.slots.clear();
	}
}

/// user id -> set of active slot ids
#[derive(Debug, Default)]
pub struct OwnerIndex {
	slots: HashMap<String, HashSet<u32>>,
}

impl OwnerIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, owner: &str, slot: u32) {
		self.slots.entry(owner.to_string()).or_default().insert(slot);
	}

	pub fn remove(&mut self, owner: &str, slot: u32) {
		if let Some(set) = self.slots.get_mut(owner) {
			set.remove(&slot);
			if set.is_empty() {
				self.slots.remove(owner);
			}
		}
	}

	pub fn get(&self, owner: &str) -> Option<&HashSet<u32>> {
		self.slots.get(owner)
	}

	pub fn owner_count(&self) -> usize {
		self.slots.len()
	}

	pub fn clear(&mut self) {
		self.slots.clear();
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
