// ---------------------------------------------------------------------------
// WardrobeIndex — vector index manager
// ---------------------------------------------------------------------------
//
// Composes the vector store, the slot map, and the secondary indices into
// one stateful manager with add/remove/search, compaction, and persistence.
// Exclusive owner of all of that state: every mutation flows through here,
// so the slot map and the secondary indices can never drift apart.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cataloging::{CategoryIndex, OwnerIndex};
use crate::cosine;
use crate::error::WardrobeError;
use crate::persistence::{self, IndexSnapshot, PersistenceError};
use crate::slot_map::SlotMap;
use crate::store::VectorStore;
use crate::types::{Category, IndexStats, ItemRecord, Neighbor, SearchFilter};

// ---------------------------------------------------------------------------
// Search backend seam
// ---------------------------------------------------------------------------

/// A ranked candidate slot.
#[derive(Debug, Clone, Copy)]
pub struct ScoredSlot {
	pub slot: u32,
	pub score: f64,
}

/// Ranking strategy behind `search`. The manager narrows the candidate set
/// from the predicate; the backend ranks those candidates against the query.
/// This is the seam where an approximate index (graph- or tree-based) can be
/// substituted without changing any caller: implement `rank` and hand the
/// backend to [`WardrobeIndex::with_backend`].
pub trait SearchBackend: Send + Sync {
	fn rank(
		&self,
		store: &VectorStore,
		query: &[f32],
		candidates: &[u32],
		k: usize,
	) -> Vec<ScoredSlot>;
}

/// Exact brute-force reference backend: scores every candidate, O(n * D) per
/// query. Liveness and dimension are re-checked per candidate; ties break by
/// ascending slot id so rankings are deterministic.
pub struct LinearScan;

impl SearchBackend for LinearScan {
	fn rank(
		&self,
		store: &VectorStore,
		query: &[f32],
		candidates: &[u32],
		k: usize,
	) -> Vec<ScoredSlot> {
		let mut scored: Vec<ScoredSlot> = candidates
			.iter()
			.filter_map(|&slot| {
				if !store.is_active(slot) {
					return None;
				}
				let vector = store.vector(slot)?;
				if vector.len() != query.len() {
					return None;
				}
				Some(ScoredSlot {
					slot,
					score: cosine::inner_product(query, vector),
				})
			})
			.collect();

		scored.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.slot.cmp(&b.slot))
		});
		scored.truncate(k);
		scored
	}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn current_timestamp_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}

fn map_persistence(e: PersistenceError) -> WardrobeError {
	match e {
		PersistenceError::Io(io) => WardrobeError::Io(io),
		PersistenceError::Corruption(msg) => WardrobeError::Corruption(msg),
		PersistenceError::Serialization(msg) => WardrobeError::Serialization(msg),
	}
}

// ---------------------------------------------------------------------------
// WardrobeIndex
// ---------------------------------------------------------------------------

pub struct WardrobeIndex {
	store: VectorStore,
	slots: SlotMap,
	by_category: CategoryIndex,
	by_owner: OwnerIndex,
	backend: Box<dyn SearchBackend>,
	dirty: bool,
}

impl std::fmt::Debug for WardrobeIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WardrobeIndex")
			.field("store", &self.store)
			.field("slots", &self.slots)
			.field("by_category", &self.by_category)
			.field("by_owner", &self.by_owner)
			.field("backend", &"<dyn SearchBackend>")
			.field("dirty", &self.dirty)
			.finish()
	}
}

impl WardrobeIndex {
	/// Fresh empty index using the exact [`LinearScan`] backend.
	pub fn new(dimension: usize) -> Self {
		Self::with_backend(dimension, Box::new(LinearScan))
	}

	pub fn with_backend(dimension: usize, backend: Box<dyn SearchBackend>) -> Self {
		Self {
			store: VectorStore::new(dimension),
			slots: SlotMap::new(),
			by_category: CategoryIndex::new(),
			by_owner: OwnerIndex::new(),
			backend,
			dirty: false,
		}
	}

	/// Open an index from `path`, or start fresh when no artifact exists.
	/// A failed load builds nothing: the error carries no partial state.
	pub fn open(dimension: usize, path: &Path) -> Result<Self, WardrobeError> {
		let snapshot = persistence::load_index(path).map_err(map_persistence)?;
		let snapshot = match snapshot {
			Some(s) => s,
			None => {
				tracing::info!(dimension, "no index artifact found, starting fresh");
				return Ok(Self::new(dimension));
			}
		};

		if snapshot.dimension != dimension {
			return Err(WardrobeError::Corruption(format!(
				"index artifact has dimension {}, engine is configured for {}",
				snapshot.dimension, dimension
			)));
		}

		let store = VectorStore::from_parts(snapshot.dimension, snapshot.vectors, snapshot.states)?;
		let mut slots = SlotMap::new();
		let mut by_category = CategoryIndex::new();
		let mut by_owner = OwnerIndex::new();
		for item in snapshot.items {
			by_category.add(item.category, item.slot_id);
			by_owner.add(&item.user_id, item.slot_id);
			slots.bind(item);
		}

		tracing::info!(
			items = slots.len(),
			slots = store.slot_count(),
			"loaded index artifact"
		);

		Ok(Self {
			store,
			slots,
			by_category,
			by_owner,
			backend: Box::new(LinearScan),
			dirty: false,
		})
	}

	pub fn dimension(&self) -> usize {
		self.store.dimension()
	}

	pub fn active_count(&self) -> usize {
		self.slots.len()
	}

	pub fn slot_count(&self) -> usize {
		self.store.slot_count()
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	pub fn contains(&self, item_id: &str) -> bool {
		self.slots.contains(item_id)
	}

	pub fn record(&self, item_id: &str) -> Option<&ItemRecord> {
		self.slots.record(item_id)
	}

	/// The stored vector for an active item.
	pub fn vector_of(&self, item_id: &str) -> Option<&[f32]> {
		let slot = self.slots.slot_of(item_id)?;
		if !self.store.is_active(slot) {
			return None;
		}
		self.store.vector(slot)
	}

	// -- Mutation ------------------------------------------------------------

	/// Add an item's embedding under `item_id`. The vector is re-normalized
	/// to unit length before storage. Re-adding an existing `item_id`
	/// replaces it: the old slot is tombstoned and a fresh slot bound, never
	/// a conflict error.
	pub fn add(
		&mut self,
		vector: Vec<f32>,
		item_id: &str,
		user_id: &str,
		category: Category,
	) -> Result<u32, WardrobeError> {
		if vector.len() != self.store.dimension() {
			return Err(WardrobeError::InvalidArgument(format!(
				"embedding has {} dimensions, index expects {}",
				vector.len(),
				self.store.dimension()
			)));
		}
		let mut vector = vector;
		if !cosine::normalize(&mut vector) {
			return Err(WardrobeError::InvalidArgument(
				"embedding has zero norm".into(),
			));
		}

		if let Some(old_slot) = self.slots.slot_of(item_id) {
			if let Some(old) = self.slots.record_at(old_slot).cloned() {
				self.by_category.remove(old.category, old_slot);
				self.by_owner.remove(&old.user_id, old_slot);
			}
			self.store.tombstone(old_slot);
			tracing::debug!(item_id, old_slot, "replacing existing item");
		}

		let slot = self.store.push(&vector)?;
		self.slots.bind(ItemRecord {
			item_id: item_id.to_string(),
			user_id: user_id.to_string(),
			category,
			slot_id: slot,
			created_at: current_timestamp_ms(),
		});
		self.by_category.add(category, slot);
		self.by_owner.add(user_id, slot);
		self.dirty = true;

		Ok(slot)
	}

	/// Tombstone the active slot for `item_id`. Removing an unknown or
	/// already-removed item is a `NotFound` error.
	pub fn remove(&mut self, item_id: &str) -> Result<(), WardrobeError> {
		let record = self
			.slots
			.release(item_id)
			.ok_or_else(|| WardrobeError::NotFound(item_id.to_string()))?;
		self.store.tombstone(record.slot_id);
		self.by_category.remove(record.category, record.slot_id);
		self.by_owner.remove(&record.user_id, record.slot_id);
		self.dirty = true;
		Ok(())
	}

	// -- Search --------------------------------------------------------------

	/// Exact top-k among the active slots satisfying `filter`, ranked by
	/// descending cosine similarity. Candidates are narrowed through the
	/// secondary indices before ranking, so the returned top-k are the true
	/// top-k among qualifying items. An empty result is not an error.
	pub fn search(
		&self,
		query: &[f32],
		k: usize,
		filter: &SearchFilter,
	) -> Result<Vec<Neighbor>, WardrobeError> {
		if query.len() != self.store.dimension() {
			return Err(WardrobeError::InvalidArgument(format!(
				"query has {} dimensions, index expects {}",
				query.len(),
				self.store.dimension()
			)));
		}
		if k == 0 {
			return Ok(Vec::new());
		}

		let candidates = self.candidate_slots(filter);
		let ranked = self.backend.rank(&self.store, query, &candidates, k);

		Ok(ranked
			.into_iter()
			.filter_map(|s| {
				let record = self.slots.record_at(s.slot)?;
				Some(Neighbor {
					item_id: record.item_id.clone(),
					score: s.score,
				})
			})
			.collect())
	}

	fn candidate_slots(&self, filter: &SearchFilter) -> Vec<u32> {
		let mut narrowed: Option<HashSet<u32>> = None;

		if let Some(categories) = &filter.categories {
			let mut set = HashSet::new();
			for category in categories {
				if let Some(slots) = self.by_category.get(*category) {
					set.extend(slots);
				}
			}
			narrowed = Some(set);
		}

		if let Some(owner) = &filter.owner {
			let owned = self.by_owner.get(owner).cloned().unwrap_or_default();
			narrowed = Some(match narrowed {
				Some(set) => set.intersection(&owned).copied().collect(),
				None => owned,
			});
		}

		let mut candidates: Vec<u32> = match narrowed {
			Some(set) => set.into_iter().collect(),
			None => self.store.iter_active().map(|(slot, _)| slot).collect(),
		};

		if !filter.exclude.is_empty() {
			candidates.retain(|slot| {
				self.slots
					.record_at(*slot)
					.map_or(false, |r| !filter.exclude.contains(&r.item_id))
			});
		}

		candidates
	}

	// -- Maintenance ---------------------------------------------------------

	/// Rebuild the vector store, slot map, and secondary indices without
	/// tombstoned slots, reassigning slot ids. Offline maintenance, not part
	/// of the hot read/write path. Returns the number of reclaimed slots.
	pub fn compact(&mut self) -> usize {
		let reclaimed = self.store.slot_count() - self.slots.len();
		if reclaimed == 0 {
			return 0;
		}

		let mut records: Vec<ItemRecord> = self.slots.records().cloned().collect();
		records.sort_by_key(|r| r.slot_id);

		let mut store = VectorStore::new(self.store.dimension());
		let mut slots = SlotMap::new();
		let mut by_category = CategoryIndex::new();
		let mut by_owner = OwnerIndex::new();

		for mut record in records {
			let vector = match self.store.vector(record.slot_id) {
				Some(v) => v,
				None => continue,
			};
			let slot = match store.push(vector) {
				Ok(s) => s,
				Err(_) => continue,
			};
			record.slot_id = slot;
			by_category.add(record.category, slot);
			by_owner.add(&record.user_id, slot);
			slots.bind(record);
		}

		self.store = store;
		self.slots = slots;
		self.by_category = by_category;
		self.by_owner = by_owner;
		self.dirty = true;

		tracing::info!(reclaimed, "compacted index");
		reclaimed
	}

	// -- Persistence ---------------------------------------------------------

	/// Persist the full index state to `path`. In-memory state stays valid
	/// and queryable when this fails.
	pub fn save(&mut self, path: &Path) -> Result<(), WardrobeError> {
		let mut items: Vec<ItemRecord> = self.slots.records().cloned().collect();
		items.sort_by_key(|r| r.slot_id);

		let snapshot = IndexSnapshot {
			dimension: self.store.dimension(),
			vectors: self.store.raw_data().to_vec(),
			states: self.store.states().to_vec(),
			items,
		};

		persistence::save_index(path, &snapshot).map_err(map_persistence)?;
		self.dirty = false;
		Ok(())
	}

	// -- Stats ---------------------------------------------------------------

	pub fn stats(&self) -> IndexStats {
		let mut categories = std::collections::BTreeMap::new();
		for record in self.slots.records() {
			*categories.entry(record.category.to_string()).or_insert(0) += 1;
		}
		IndexStats {
			total_items: self.slots.len(),
			tombstoned_slots: self.store.slot_count() - self.slots.len(),
			dimension: self.store.dimension(),
			categories,
			unique_users: self.by_owner.owner_count(),
		}
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
