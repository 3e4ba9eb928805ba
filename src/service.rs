// ---------------------------------------------------------------------------
// WardrobeService — upload / recommend / remove glue
// ---------------------------------------------------------------------------
//
// Owns the index behind a single reader/writer lock: searches and
// recommendations take the shared lock, add/remove/compact/save take the
// exclusive lock. The embedding producer runs entirely before any lock is
// taken, so the unbounded-latency step never blocks readers.
//
// Persistence after a mutation is reported independently of the mutation
// itself: a failed save is logged and surfaces as `persisted: false`, it
// never rolls back the in-memory change.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use uuid::Uuid;

use crate::error::WardrobeError;
use crate::index::WardrobeIndex;
use crate::metadata::MetadataProvider;
use crate::producer::EmbeddingProducer;
use crate::recommend::RecommendationEngine;
use crate::types::{Category, IndexStats, Recommendation};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub struct ServiceConfig {
	pub dimension: usize,
	pub storage_path: Option<PathBuf>,
	pub autosave: bool,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			dimension: 512,
			storage_path: None,
			autosave: true,
		}
	}
}

// ---------------------------------------------------------------------------
// Requests and receipts
// ---------------------------------------------------------------------------

pub struct UploadRequest {
	/// Minted as a fresh UUID when absent (standalone uploads).
	pub item_id: Option<String>,
	pub user_id: String,
	pub category: Category,
	pub image: Vec<u8>,
	pub name: Option<String>,
	pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
	#[serde(rename = "itemId")]
	pub item_id: String,
	#[serde(rename = "slotId")]
	pub slot_id: u32,
	pub dimension: usize,
	pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveReceipt {
	#[serde(rename = "itemId")]
	pub item_id: String,
	pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactReceipt {
	pub reclaimed: usize,
	pub persisted: bool,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct WardrobeService {
	index: Arc<RwLock<WardrobeIndex>>,
	engine: RecommendationEngine,
	producer: Arc<dyn EmbeddingProducer>,
	metadata: Arc<dyn MetadataProvider>,
	storage_path: Option<PathBuf>,
	autosave: bool,
}

impl std::fmt::Debug for WardrobeService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WardrobeService")
			.field("index", &self.index)
			.field("producer", &"<dyn EmbeddingProducer>")
			.field("metadata", &"<dyn MetadataProvider>")
			.field("storage_path", &self.storage_path)
			.field("autosave", &self.autosave)
			.finish()
	}
}

impl WardrobeService {
	pub fn new(
		config: ServiceConfig,
		producer: Arc<dyn EmbeddingProducer>,
		metadata: Arc<dyn MetadataProvider>,
	) -> Result<Self, WardrobeError> {
		if producer.dimension() != config.dimension {
			return Err(WardrobeError::InvalidArgument(format!(
				"producer yields {}-dimensional embeddings, service is configured for {}",
				producer.dimension(),
				config.dimension
			)));
		}

		let index = match &config.storage_path {
			Some(path) => WardrobeIndex::open(config.dimension, path)?,
			None => WardrobeIndex::new(config.dimension),
		};
		tracing::info!(
			dimension = config.dimension,
			items = index.active_count(),
			persistent = config.storage_path.is_some(),
			"wardrobe service ready"
		);

		let index = Arc::new(RwLock::new(index));
		let engine = RecommendationEngine::new(Arc::clone(&index), Arc::clone(&metadata));

		Ok(Self {
			index,
			engine,
			producer,
			metadata,
			storage_path: config.storage_path,
			autosave: config.autosave,
		})
	}

	/// Process an uploaded item: produce the embedding, store it under the
	/// item id, remember its attributes. Re-uploading an item id replaces
	/// the previous embedding.
	pub fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, WardrobeError> {
		let embedding = self.producer.produce(&request.image)?;
		let item_id = request
			.item_id
			.unwrap_or_else(|| Uuid::new_v4().to_string());

		let slot_id = {
			let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
			index.add(embedding, &item_id, &request.user_id, request.category)?
		};

		let mut attributes = HashMap::new();
		attributes.insert(
			"name".to_string(),
			request
				.name
				.unwrap_or_else(|| format!("{} item", request.category)),
		);
		if let Some(url) = request.image_url {
			attributes.insert("imageUrl".to_string(), url);
		}
		self.metadata.remember(&item_id, attributes);

		let persisted = self.autosave_after_mutation();
		tracing::info!(item_id = %item_id, slot_id, "item uploaded");

		Ok(UploadReceipt {
			item_id,
			slot_id,
			dimension: self.producer.dimension(),
			persisted,
		})
	}

	pub fn remove(&self, item_id: &str) -> Result<RemoveReceipt, WardrobeError> {
		{
			let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
			index.remove(item_id)?;
		}
		self.metadata.forget(item_id);

		let persisted = self.autosave_after_mutation();
		tracing::info!(item_id, "item removed");

		Ok(RemoveReceipt {
			item_id: item_id.to_string(),
			persisted,
		})
	}

	pub fn recommend(
		&self,
		item_id: &str,
		user_id: &str,
		k: usize,
		target_categories: Option<&[Category]>,
		min_similarity: Option<f64>,
	) -> Result<Vec<Recommendation>, WardrobeError> {
		self.engine
			.recommend_for_item(item_id, user_id, k, target_categories, min_similarity)
	}

	pub fn recommend_outfit(
		&self,
		base_item_ids: &[String],
		user_id: &str,
		k_per_category: usize,
		target_categories: Option<&[Category]>,
	) -> Result<std::collections::BTreeMap<Category, Vec<Recommendation>>, WardrobeError> {
		self.engine
			.recommend_outfit(base_item_ids, user_id, k_per_category, target_categories)
	}

	/// Persist the index now. Returns `false` when no storage path is
	/// configured.
	pub fn save(&self) -> Result<bool, WardrobeError> {
		let path = match &self.storage_path {
			Some(p) => p.clone(),
			None => return Ok(false),
		};
		let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
		index.save(&path)?;
		Ok(true)
	}

	pub fn compact(&self) -> Result<CompactReceipt, WardrobeError> {
		let reclaimed = {
			let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
			index.compact()
		};
		let persisted = self.autosave_after_mutation();
		Ok(CompactReceipt {
			reclaimed,
			persisted,
		})
	}

	pub fn stats(&self) -> IndexStats {
		let index = self.index.read().unwrap_or_else(|e| e.into_inner());
		index.stats()
	}

	pub fn is_dirty(&self) -> bool {
		let index = self.index.read().unwrap_or_else(|e| e.into_inner());
		index.is_dirty()
	}

	/// Save if dirty. Returns whether anything was written.
	pub fn dispose(&self) -> Result<bool, WardrobeError> {
		if self.is_dirty() {
			self.save()
		} else {
			Ok(false)
		}
	}

	fn autosave_after_mutation(&self) -> bool {
		if !self.autosave {
			return false;
		}
		let path = match &self.storage_path {
			Some(p) => p.clone(),
			None => return false,
		};
		let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
		match index.save(&path) {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!("index save failed after mutation: {}", e);
				false
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
