// ---------------------------------------------------------------------------
// Metadata provider — optional external item metadata as a capability
// ---------------------------------------------------------------------------
//
// The engine works with or without a backing metadata database. Callers
// depend on this trait, not on a concrete backend, so business logic never
// branches on "is a database configured". `InMemoryMetadata` satisfies the
// standalone case.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Mutex;

pub trait MetadataProvider: Send + Sync {
	/// Attributes for an item (name, image URL, ...). Unknown items yield
	/// an empty map.
	fn attributes(&self, item_id: &str) -> HashMap<String, String>;

	/// Store or replace the attributes for an item.
	fn remember(&self, item_id: &str, attributes: HashMap<String, String>);

	/// Drop all attributes for an item.
	fn forget(&self, item_id: &str);
}

/// Standalone in-memory provider.
#[derive(Default)]
pub struct InMemoryMetadata {
	entries: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryMetadata {
	pub fn new() -> Self {
		Self::default()
	}
}

impl MetadataProvider for InMemoryMetadata {
	fn attributes(&self, item_id: &str) -> HashMap<String, String> {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.get(item_id).cloned().unwrap_or_default()
	}

	fn remember(&self, item_id: &str, attributes: HashMap<String, String>) {
		let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.insert(item_id.to_string(), attributes);
	}

	fn forget(&self, item_id: &str) {
		let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.remove(item_id);
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remember_and_recall() {
		let provider = InMemoryMetadata::new();
		let mut attrs = HashMap::new();
		attrs.insert("name".to_string(), "blue shirt".to_string());
		provider.remember("shirt", attrs);

		let recalled = provider.attributes("shirt");
		assert_eq!(recalled.get("name").unwrap(), "blue shirt");
	}

	#[test]
	fn unknown_item_is_empty() {
		let provider = InMemoryMetadata::new();
		assert!(provider.attributes("ghost").is_empty());
	}

	#[test]
	fn forget_drops_attributes() {
		let provider = InMemoryMetadata::new();
		let mut attrs = HashMap::new();
		attrs.insert("name".to_string(), "boots".to_string());
		provider.remember("shoes", attrs);
		provider.forget("shoes");
		assert!(provider.attributes("shoes").is_empty());
	}
}
