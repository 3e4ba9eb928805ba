use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Clothing category of a wardrobe item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	Top,
	Bottom,
	Shoes,
	Dress,
	Outerwear,
}

impl Category {
	/// Categories that pair with this one when completing an outfit.
	pub fn complements(self) -> &'static [Category] {
		match self {
			Category::Top => &[Category::Bottom, Category::Shoes, Category::Outerwear],
			Category::Bottom => &[Category::Top, Category::Shoes, Category::Outerwear],
			Category::Shoes => &[Category::Top, Category::Bottom, Category::Shoes],
			Category::Dress => &[Category::Shoes, Category::Outerwear],
			Category::Outerwear => &[Category::Top, Category::Bottom, Category::Shoes],
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Category::Top => "top",
			Category::Bottom => "bottom",
			Category::Shoes => "shoes",
			Category::Dress => "dress",
			Category::Outerwear => "outerwear",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// ---------------------------------------------------------------------------
// Records and results
// ---------------------------------------------------------------------------

/// A wardrobe item bound to a storage slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
	#[serde(rename = "itemId")]
	pub item_id: String,
	#[serde(rename = "userId")]
	pub user_id: String,
	pub category: Category,
	#[serde(rename = "slotId")]
	pub slot_id: u32,
	#[serde(rename = "createdAt")]
	pub created_at: u64,
}

/// A single nearest-neighbor hit: item identity and cosine score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighbor {
	#[serde(rename = "itemId")]
	pub item_id: String,
	pub score: f64,
}

/// A recommendation result enriched with item metadata attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
	pub item: ItemRecord,
	pub score: f64,
	pub attributes: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Search predicate
// ---------------------------------------------------------------------------

/// Candidate filter applied before ranking.
///
/// All clauses are conjunctive: a slot qualifies only if its category is in
/// `categories` (when set), its owner equals `owner` (when set), and its
/// item id is not in `exclude`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
	pub categories: Option<HashSet<Category>>,
	pub owner: Option<String>,
	pub exclude: HashSet<String>,
}

impl SearchFilter {
	/// A filter that matches every active item.
	pub fn any() -> Self {
		Self::default()
	}

	pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
		self.categories = Some(categories.into_iter().collect());
		self
	}

	pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
		self.owner = Some(owner.into());
		self
	}

	pub fn without(mut self, item_id: impl Into<String>) -> Self {
		self.exclude.insert(item_id.into());
		self
	}
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Snapshot of index occupancy, reported by `wardrobe/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
	#[serde(rename = "totalItems")]
	pub total_items: usize,
	#[serde(rename = "tombstonedSlots")]
	pub tombstoned_slots: usize,
	pub dimension: usize,
	pub categories: std::collections::BTreeMap<String, usize>,
	#[serde(rename = "uniqueUsers")]
	pub unique_users: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn category_serde_lowercase() {
		let json = serde_json::to_string(&Category::Outerwear).unwrap();
		assert_eq!(json, "\"outerwear\"");
		let back: Category = serde_json::from_str("\"top\"").unwrap();
		assert_eq!(back, Category::Top);
	}

	#[test]
	fn category_unknown_rejected() {
		let result: Result<Category, _> = serde_json::from_str("\"hat\"");
		assert!(result.is_err());
	}

	#[test]
	fn complements_exclude_self_except_shoes_fallback() {
		assert!(!Category::Top.complements().contains(&Category::Top));
		assert!(!Category::Dress.complements().contains(&Category::Dress));
		// Shoes use the generic fallback set; the engine subtracts base
		// categories afterwards.
		assert!(Category::Shoes.complements().contains(&Category::Top));
	}

	#[test]
	fn filter_builder() {
		let filter = SearchFilter::any()
			.with_categories([Category::Bottom])
			.with_owner("user-1")
			.without("item-1");
		assert!(filter.categories.unwrap().contains(&Category::Bottom));
		assert_eq!(filter.owner.as_deref(), Some("user-1"));
		assert!(filter.exclude.contains("item-1"));
	}
}
