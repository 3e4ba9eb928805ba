// ---------------------------------------------------------------------------
// Integration tests for wardrobe-engine JSON-RPC 2.0 / NDJSON protocol
// ---------------------------------------------------------------------------
//
// Each test spawns a fresh wardrobe-engine binary and communicates via
// stdin/stdout using newline-delimited JSON-RPC 2.0 messages.
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

struct WardrobeProcess {
	child: Child,
	reader: BufReader<std::process::ChildStdout>,
	next_id: AtomicU64,
}

impl WardrobeProcess {
	fn spawn() -> Self {
		let bin = env!("CARGO_BIN_EXE_wardrobe-engine");
		let mut child = Command::new(bin)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.expect("failed to spawn wardrobe-engine");

		let stdout = child.stdout.take().expect("no stdout");
		let reader = BufReader::new(stdout);

		Self {
			child,
			reader,
			next_id: AtomicU64::new(1),
		}
	}

	fn send(&mut self, method: &str, params: Value) -> RpcResponse {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let request = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		let stdin = self.child.stdin.as_mut().expect("no stdin");
		let mut line = serde_json::to_string(&request).unwrap();
		line.push('\n');
		stdin.write_all(line.as_bytes()).unwrap();
		stdin.flush().unwrap();

		loop {
			let mut buf = String::new();
			let bytes_read = self
				.reader
				.read_line(&mut buf)
				.expect("failed to read from stdout");
			if bytes_read == 0 {
				panic!("unexpected EOF while waiting for response to id={}", id);
			}
			let buf = buf.trim();
			if buf.is_empty() {
				continue;
			}
			let parsed: Value = serde_json::from_str(buf)
				.unwrap_or_else(|e| panic!("invalid JSON from engine: {e}\nline: {buf}"));
			if parsed.get("id").is_none() {
				continue;
			}
			let resp_id = parsed["id"].as_u64().expect("response id is not u64");
			assert_eq!(resp_id, id, "response id mismatch");
			if let Some(error) = parsed.get("error") {
				return RpcResponse::Error(error.clone());
			}
			return RpcResponse::Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
		}
	}

	fn call(&mut self, method: &str, params: Value) -> Value {
		match self.send(method, params) {
			RpcResponse::Ok(v) => v,
			RpcResponse::Error(e) => panic!("expected success, got error: {e}"),
		}
	}

	fn call_err(&mut self, method: &str, params: Value) -> Value {
		match self.send(method, params) {
			RpcResponse::Error(e) => e,
			RpcResponse::Ok(v) => panic!("expected error, got success: {v}"),
		}
	}

	/// Initialize with the given dimension, no persistence.
	fn initialize(&mut self, dimension: usize) -> Value {
		self.call("wardrobe/initialize", json!({ "dimension": dimension }))
	}

	/// Initialize with a storage path for persistence.
	fn initialize_with_path(&mut self, dimension: usize, path: &str) -> Value {
		self.call(
			"wardrobe/initialize",
			json!({ "dimension": dimension, "storagePath": path }),
		)
	}

	fn upload(&mut self, item_id: &str, user_id: &str, category: &str, vector: &[f32]) -> Value {
		self.call(
			"wardrobe/upload",
			json!({
				"itemId": item_id,
				"userId": user_id,
				"category": category,
				"image": image_payload(vector),
			}),
		)
	}
}

impl Drop for WardrobeProcess {
	fn drop(&mut self) {
		drop(self.child.stdin.take());
		let _ = self.child.wait();
	}
}

#[derive(Debug)]
enum RpcResponse {
	Ok(Value),
	Error(Value),
}

/// Base64 f32-LE payload, as the standalone embedding producer expects.
fn image_payload(vector: &[f32]) -> String {
	let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
	STANDARD.encode(&bytes)
}

fn wardrobe_code(error: &Value) -> &str {
	error["data"]["wardrobeCode"].as_str().unwrap_or("")
}

fn rec_ids(result: &Value) -> Vec<&str> {
	result["recommendations"]
		.as_array()
		.unwrap()
		.iter()
		.map(|r| r["item"]["itemId"].as_str().unwrap())
		.collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn initialize_reports_dimension_and_emptiness() {
	let mut engine = WardrobeProcess::spawn();
	let result = engine.initialize(4);
	assert_eq!(result["dimension"], 4);
	assert_eq!(result["items"], 0);
	assert_eq!(result["persistent"], false);
}

#[test]
fn calls_before_initialize_are_rejected() {
	let mut engine = WardrobeProcess::spawn();
	let error = engine.call_err("wardrobe/stats", json!({}));
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_INITIALIZED");
}

#[test]
fn unknown_method_is_method_not_found() {
	let mut engine = WardrobeProcess::spawn();
	let error = engine.call_err("wardrobe/doesNotExist", json!({}));
	assert_eq!(error["code"], -32601);
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[test]
fn upload_returns_receipt() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let receipt = engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	assert_eq!(receipt["itemId"], "shirt1");
	assert_eq!(receipt["dimension"], 4);
	assert_eq!(receipt["persisted"], false);
}

#[test]
fn upload_without_item_id_mints_one() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let receipt = engine.call(
		"wardrobe/upload",
		json!({
			"userId": "u1",
			"category": "top",
			"image": image_payload(&[1.0, 0.0, 0.0, 0.0]),
		}),
	);
	assert!(!receipt["itemId"].as_str().unwrap().is_empty());
}

#[test]
fn upload_with_unknown_category_is_invalid() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let error = engine.call_err(
		"wardrobe/upload",
		json!({
			"itemId": "hat1",
			"userId": "u1",
			"category": "hat",
			"image": image_payload(&[1.0, 0.0, 0.0, 0.0]),
		}),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_INVALID_ARGUMENT");
}

#[test]
fn upload_with_wrong_payload_size_is_producer_error() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let error = engine.call_err(
		"wardrobe/upload",
		json!({
			"itemId": "shirt1",
			"userId": "u1",
			"category": "top",
			"image": image_payload(&[1.0, 0.0]),
		}),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_PRODUCER");
}

#[test]
fn reupload_replaces_not_duplicates() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("shirt1", "u1", "top", &[0.0, 1.0, 0.0, 0.0]);
	engine.upload("probe", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);

	let stats = engine.call("wardrobe/stats", json!({}));
	assert_eq!(stats["totalItems"], 2);
	assert_eq!(stats["tombstonedSlots"], 1);

	// Search from the probe reflects only the latest shirt vector.
	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "probe", "userId": "u1", "k": 1, "targetCategories": ["top"] }),
	);
	let recs = result["recommendations"].as_array().unwrap();
	assert_eq!(recs[0]["item"]["itemId"], "shirt1");
	assert!((recs[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[test]
fn recommend_ranks_by_similarity() {
	// shirt1 top [1,0,0,0]; pants1 bottom [1,0,0,0]; pants2 bottom
	// [0,1,0,0]. Expect [(pants1, 1.0), (pants2, 0.0)].
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants2", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 2, "targetCategories": ["bottom"] }),
	);

	assert_eq!(result["count"], 2);
	assert_eq!(rec_ids(&result), vec!["pants1", "pants2"]);
	let recs = result["recommendations"].as_array().unwrap();
	assert!((recs[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-6);
	assert!(recs[1]["score"].as_f64().unwrap().abs() < 1e-6);
}

#[test]
fn recommend_unknown_item_is_not_found() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let error = engine.call_err(
		"wardrobe/recommend",
		json!({ "itemId": "ghost", "userId": "u1" }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_FOUND");
}

#[test]
fn recommend_zero_k_is_invalid() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	let error = engine.call_err(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 0 }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_INVALID_ARGUMENT");
}

#[test]
fn min_similarity_drops_low_scores() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants2", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommend",
		json!({
			"itemId": "shirt1",
			"userId": "u1",
			"k": 10,
			"targetCategories": ["bottom"],
			"minSimilarity": 0.5,
		}),
	);
	// Fewer than k results, nothing backfilled.
	assert_eq!(rec_ids(&result), vec!["pants1"]);
}

#[test]
fn recommend_never_crosses_users() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants-mine", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants-theirs", "u2", "bottom", &[1.0, 0.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 10 }),
	);
	assert_eq!(rec_ids(&result), vec!["pants-mine"]);
}

// ---------------------------------------------------------------------------
// Outfit recommendation
// ---------------------------------------------------------------------------

#[test]
fn outfit_scores_against_normalized_composite() {
	// shirt1=[1,0,0,0], pants1=[0,1,0,0]: the query must be
	// normalize([0.5,0.5,0,0]) = [0.7071,0.7071,0,0].
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);
	engine.upload("shoes1", "u1", "shoes", &[1.0, 0.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": ["shirt1", "pants1"], "userId": "u1", "kPerCategory": 1 }),
	);

	let shoes = result["recommendations"]["shoes"].as_array().unwrap();
	assert_eq!(shoes[0]["item"]["itemId"], "shoes1");
	let score = shoes[0]["score"].as_f64().unwrap();
	assert!((score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4);
}

#[test]
fn outfit_fills_missing_categories_only() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);
	engine.upload("pants2", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("shoes1", "u1", "shoes", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("coat1", "u1", "outerwear", &[0.0, 1.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": ["shirt1", "pants1"], "userId": "u1", "kPerCategory": 2 }),
	);

	let groups = result["recommendations"].as_object().unwrap();
	// Base categories top and bottom are never filled in.
	assert!(!groups.contains_key("top"));
	assert!(!groups.contains_key("bottom"));
	assert!(groups.contains_key("shoes"));
	assert!(groups.contains_key("outerwear"));
}

#[test]
fn outfit_with_no_candidates_yields_empty_groups() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);

	let result = engine.call(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": ["shirt1"], "userId": "u1", "kPerCategory": 3 }),
	);
	for (_, group) in result["recommendations"].as_object().unwrap() {
		assert!(group.as_array().unwrap().is_empty());
	}
}

#[test]
fn outfit_empty_base_is_invalid() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let error = engine.call_err(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": [], "userId": "u1", "kPerCategory": 3 }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_INVALID_ARGUMENT");
}

#[test]
fn outfit_zero_k_per_category_is_invalid() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	let error = engine.call_err(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": ["shirt1"], "userId": "u1", "kPerCategory": 0 }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_INVALID_ARGUMENT");
}

#[test]
fn outfit_missing_base_item_is_not_found() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	let error = engine.call_err(
		"wardrobe/recommendOutfit",
		json!({ "baseItems": ["shirt1", "ghost"], "userId": "u1", "kPerCategory": 3 }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

#[test]
fn removed_item_disappears_from_results() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants2", "u1", "bottom", &[0.9, 0.1, 0.0, 0.0]);

	engine.call("wardrobe/remove", json!({ "itemId": "pants1" }));

	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 10 }),
	);
	assert_eq!(rec_ids(&result), vec!["pants2"]);
}

#[test]
fn remove_unknown_item_is_not_found() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	let error = engine.call_err("wardrobe/remove", json!({ "itemId": "ghost" }));
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_FOUND");

	// Removing twice is also an error, not idempotent success.
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.call("wardrobe/remove", json!({ "itemId": "shirt1" }));
	let error = engine.call_err("wardrobe/remove", json!({ "itemId": "shirt1" }));
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_FOUND");
}

#[test]
fn removed_source_item_cannot_recommend() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.call("wardrobe/remove", json!({ "itemId": "shirt1" }));
	let error = engine.call_err(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1" }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn state_survives_process_restart() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("wardrobe.idx");
	let path = path.to_str().unwrap();

	{
		let mut engine = WardrobeProcess::spawn();
		let result = engine.initialize_with_path(4, path);
		assert_eq!(result["persistent"], true);
		engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
		engine.upload("pants1", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
		engine.upload("pants2", "u1", "bottom", &[0.0, 1.0, 0.0, 0.0]);
		engine.call("wardrobe/remove", json!({ "itemId": "pants2" }));
	}

	let mut engine = WardrobeProcess::spawn();
	let result = engine.initialize_with_path(4, path);
	assert_eq!(result["items"], 2);

	// Identical search results after reload.
	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 10, "targetCategories": ["bottom"] }),
	);
	assert_eq!(rec_ids(&result), vec!["pants1"]);
	let recs = result["recommendations"].as_array().unwrap();
	assert!((recs[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn corrupt_artifact_fails_initialize() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("wardrobe.idx");
	std::fs::write(&path, b"definitely not an index").unwrap();

	let mut engine = WardrobeProcess::spawn();
	let error = engine.call_err(
		"wardrobe/initialize",
		json!({ "dimension": 4, "storagePath": path.to_str().unwrap() }),
	);
	assert_eq!(wardrobe_code(&error), "WARDROBE_CORRUPT");
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[test]
fn compact_reclaims_and_preserves_behavior() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("pants1", "u1", "bottom", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("gone", "u1", "shoes", &[0.0, 0.0, 1.0, 0.0]);
	engine.call("wardrobe/remove", json!({ "itemId": "gone" }));

	let receipt = engine.call("wardrobe/compact", json!({}));
	assert_eq!(receipt["reclaimed"], 1);

	let stats = engine.call("wardrobe/stats", json!({}));
	assert_eq!(stats["totalItems"], 2);
	assert_eq!(stats["tombstonedSlots"], 0);

	let result = engine.call(
		"wardrobe/recommend",
		json!({ "itemId": "shirt1", "userId": "u1", "k": 10 }),
	);
	assert_eq!(rec_ids(&result), vec!["pants1"]);
}

#[test]
fn stats_report_categories_and_users() {
	let mut engine = WardrobeProcess::spawn();
	engine.initialize(4);
	engine.upload("shirt1", "u1", "top", &[1.0, 0.0, 0.0, 0.0]);
	engine.upload("shirt2", "u1", "top", &[0.0, 1.0, 0.0, 0.0]);
	engine.upload("boots", "u2", "shoes", &[0.0, 0.0, 1.0, 0.0]);

	let stats = engine.call("wardrobe/stats", json!({}));
	assert_eq!(stats["dimension"], 4);
	assert_eq!(stats["categories"]["top"], 2);
	assert_eq!(stats["categories"]["shoes"], 1);
	assert_eq!(stats["uniqueUsers"], 2);
}
