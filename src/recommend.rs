// ---------------------------------------------------------------------------
// Recommendation engine — style matching on top of the wardrobe index
// ---------------------------------------------------------------------------
//
// Single-item recommendation resolves the source item's vector and searches
// the owner's wardrobe under a category predicate. Outfit recommendation
// composes a normalized mean of several base vectors and fills in the
// missing categories, one ranked group per category.
//
// Each operation holds one read lock for its whole span, so the vector
// resolve and the search observe a single consistent index state.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use crate::cosine;
use crate::error::WardrobeError;
use crate::index::WardrobeIndex;
use crate::metadata::MetadataProvider;
use crate::types::{Category, Neighbor, Recommendation, SearchFilter};

pub struct RecommendationEngine {
	index: Arc<RwLock<WardrobeIndex>>,
	metadata: Arc<dyn MetadataProvider>,
}

impl RecommendationEngine {
	pub fn new(index: Arc<RwLock<WardrobeIndex>>, metadata: Arc<dyn MetadataProvider>) -> Self {
		Self { index, metadata }
	}

	/// Items from `user_id`'s wardrobe that match `item_id` stylistically,
	/// ranked by descending similarity. `min_similarity` truncates AFTER
	/// ranking and may legitimately return fewer than `k` results; it never
	/// re-ranks or backfills.
	pub fn recommend_for_item(
		&self,
		item_id: &str,
		user_id: &str,
		k: usize,
		target_categories: Option<&[Category]>,
		min_similarity: Option<f64>,
	) -> Result<Vec<Recommendation>, WardrobeError> {
		if k == 0 {
			return Err(WardrobeError::InvalidArgument(
				"k must be positive".into(),
			));
		}

		let index = self.index.read().unwrap_or_else(|e| e.into_inner());
		let query = index
			.vector_of(item_id)
			.ok_or_else(|| WardrobeError::NotFound(item_id.to_string()))?;

		let mut filter = SearchFilter::any().with_owner(user_id).without(item_id);
		if let Some(categories) = target_categories {
			filter = filter.with_categories(categories.iter().copied());
		}

		let neighbors = index.search(query, k, &filter)?;
		let kept = neighbors
			.into_iter()
			.filter(|n| min_similarity.map_or(true, |min| n.score >= min));
		Ok(self.enrich(&index, kept))
	}

	/// Per-category ranked lists completing an outfit around the base items.
	/// The query is the unit-normalized component-wise mean of the base
	/// vectors. Target categories default to the complements of the base
	/// categories minus the base categories themselves; an explicitly
	/// supplied set is used as-is. A category with no qualifying candidates
	/// yields an empty group, not an error.
	pub fn recommend_outfit(
		&self,
		base_item_ids: &[String],
		user_id: &str,
		k_per_category: usize,
		target_categories: Option<&[Category]>,
	) -> Result<BTreeMap<Category, Vec<Recommendation>>, WardrobeError> {
		if base_item_ids.is_empty() {
			return Err(WardrobeError::InvalidArgument(
				"base items must not be empty".into(),
			));
		}
		if k_per_category == 0 {
			return Err(WardrobeError::InvalidArgument(
				"kPerCategory must be positive".into(),
			));
		}

		let index = self.index.read().unwrap_or_else(|e| e.into_inner());

		let mut base_vectors: Vec<&[f32]> = Vec::with_capacity(base_item_ids.len());
		let mut base_categories: BTreeSet<Category> = BTreeSet::new();
		for id in base_item_ids {
			let vector = index
				.vector_of(id)
				.ok_or_else(|| WardrobeError::NotFound(id.clone()))?;
			let record = index
				.record(id)
				.ok_or_else(|| WardrobeError::NotFound(id.clone()))?;
			base_vectors.push(vector);
			base_categories.insert(record.category);
		}

		let composite = cosine::normalized_mean(&base_vectors).ok_or_else(|| {
			WardrobeError::InvalidArgument("base item embeddings cancel out".into())
		})?;

		let targets: BTreeSet<Category> = match target_categories {
			Some(explicit) => explicit.iter().copied().collect(),
			None => base_categories
				.iter()
				.flat_map(|c| c.complements().iter().copied())
				.filter(|c| !base_categories.contains(c))
				.collect(),
		};

		let excluded: HashSet<String> = base_item_ids.iter().cloned().collect();

		let mut groups = BTreeMap::new();
		for category in targets {
			let mut filter = SearchFilter::any()
				.with_categories([category])
				.with_owner(user_id);
			filter.exclude = excluded.clone();

			let neighbors = index.search(&composite, k_per_category, &filter)?;
			groups.insert(category, self.enrich(&index, neighbors));
		}

		Ok(groups)
	}

	fn enrich(
		&self,
		index: &WardrobeIndex,
		neighbors: impl IntoIterator<Item = Neighbor>,
	) -> Vec<Recommendation> {
		neighbors
			.into_iter()
			.filter_map(|n| {
				let item = index.record(&n.item_id)?.clone();
				Some(Recommendation {
					attributes: self.metadata.attributes(&n.item_id),
					item,
					score: n.score,
				})
			})
			.collect()
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
