// ---------------------------------------------------------------------------
// WardrobeServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (NDJSON over stdin) to
// WardrobeService operations: a main `run()` loop, a `dispatch()` match, a
// `with_service` helper, and free-standing handler functions per method.
// The service is created lazily by `wardrobe/initialize`.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::WardrobeError;
use crate::metadata::InMemoryMetadata;
use crate::producer::RawVectorProducer;
use crate::protocol::*;
use crate::service::{ServiceConfig, UploadRequest, WardrobeService};
use crate::transport::NdjsonTransport;
use crate::types::Category;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC server that dispatches requests to a [`WardrobeService`].
pub struct WardrobeServer {
	transport: NdjsonTransport,
	service: Option<WardrobeService>,
}

impl WardrobeServer {
	pub fn new(transport: NdjsonTransport) -> Self {
		Self {
			transport,
			service: None,
		}
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to handlers.
	pub fn run(&mut self) -> Result<(), WardrobeError> {
		let stdin = io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"wardrobe/initialize" => self.handle_initialize(req.params),
			"wardrobe/dispose" => self.with_service(|s| {
				let persisted = s.dispose()?;
				Ok(serde_json::json!({ "persisted": persisted }))
			}),
			"wardrobe/save" => self.with_service(|s| {
				let persisted = s.save()?;
				Ok(serde_json::json!({ "persisted": persisted }))
			}),

			// -- Items ---------------------------------------------------
			"wardrobe/upload" => self.with_service(|s| handle_upload(s, req.params)),
			"wardrobe/remove" => self.with_service(|s| handle_remove(s, req.params)),

			// -- Recommendation ------------------------------------------
			"wardrobe/recommend" => self.with_service(|s| handle_recommend(s, req.params)),
			"wardrobe/recommendOutfit" => {
				self.with_service(|s| handle_recommend_outfit(s, req.params))
			}

			// -- Maintenance ---------------------------------------------
			"wardrobe/compact" => self.with_service(|s| {
				let receipt = s.compact()?;
				to_value(&receipt)
			}),
			"wardrobe/stats" => self.with_service(|s| to_value(&s.stats())),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => self.transport.write_error(
				id,
				WARDROBE_ERROR,
				e.to_string(),
				Some(e.to_json_rpc_error()),
			),
		}
	}

	// ── Service accessor ──────────────────────────────────────────────────

	fn with_service<F>(&self, f: F) -> Result<serde_json::Value, WardrobeError>
	where
		F: FnOnce(&WardrobeService) -> Result<serde_json::Value, WardrobeError>,
	{
		match &self.service {
			Some(s) => f(s),
			None => Err(WardrobeError::NotInitialized),
		}
	}

	// ── Initialize ────────────────────────────────────────────────────────

	fn handle_initialize(
		&mut self,
		params: serde_json::Value,
	) -> Result<serde_json::Value, WardrobeError> {
		let p: InitializeParams = parse_params(params)?;

		let dimension = p.dimension.unwrap_or(512);
		let config = ServiceConfig {
			dimension,
			storage_path: p.storage_path.map(PathBuf::from),
			autosave: p.autosave.unwrap_or(true),
		};
		let persistent = config.storage_path.is_some();

		let service = WardrobeService::new(
			config,
			Arc::new(RawVectorProducer::new(dimension)),
			Arc::new(InMemoryMetadata::new()),
		)?;
		let items = service.stats().total_items;
		self.service = Some(service);

		Ok(serde_json::json!({
			"dimension": dimension,
			"items": items,
			"persistent": persistent,
		}))
	}
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_upload(
	service: &WardrobeService,
	params: serde_json::Value,
) -> Result<serde_json::Value, WardrobeError> {
	let p: UploadParams = parse_params(params)?;
	let image = STANDARD
		.decode(&p.image)
		.map_err(|e| WardrobeError::InvalidArgument(format!("Invalid image base64: {}", e)))?;

	let receipt = service.upload(UploadRequest {
		item_id: p.item_id,
		user_id: p.user_id,
		category: p.category,
		image,
		name: p.name,
		image_url: p.image_url,
	})?;
	to_value(&receipt)
}

fn handle_remove(
	service: &WardrobeService,
	params: serde_json::Value,
) -> Result<serde_json::Value, WardrobeError> {
	let p: RemoveParams = parse_params(params)?;
	let receipt = service.remove(&p.item_id)?;
	to_value(&receipt)
}

fn handle_recommend(
	service: &WardrobeService,
	params: serde_json::Value,
) -> Result<serde_json::Value, WardrobeError> {
	let p: RecommendParams = parse_params(params)?;
	let recommendations = service.recommend(
		&p.item_id,
		&p.user_id,
		p.k.unwrap_or(10),
		p.target_categories.as_deref(),
		p.min_similarity,
	)?;

	Ok(serde_json::json!({
		"itemId": p.item_id,
		"count": recommendations.len(),
		"recommendations": recommendations,
	}))
}

fn handle_recommend_outfit(
	service: &WardrobeService,
	params: serde_json::Value,
) -> Result<serde_json::Value, WardrobeError> {
	let p: RecommendOutfitParams = parse_params(params)?;
	let groups = service.recommend_outfit(
		&p.base_items,
		&p.user_id,
		p.k_per_category.unwrap_or(3),
		p.target_categories.as_deref(),
	)?;

	Ok(serde_json::json!({
		"baseItems": p.base_items,
		"recommendations": groups,
	}))
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, WardrobeError> {
	serde_json::from_value(params)
		.map_err(|e| WardrobeError::InvalidArgument(format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, WardrobeError> {
	serde_json::to_value(value).map_err(|e| WardrobeError::Serialization(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
	dimension: Option<usize>,
	storage_path: Option<String>,
	autosave: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
	item_id: Option<String>,
	user_id: String,
	category: Category,
	/// Base64 payload handed to the embedding producer.
	image: String,
	name: Option<String>,
	image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveParams {
	item_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendParams {
	item_id: String,
	user_id: String,
	k: Option<usize>,
	target_categories: Option<Vec<Category>>,
	min_similarity: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendOutfitParams {
	base_items: Vec<String>,
	user_id: String,
	k_per_category: Option<usize>,
	target_categories: Option<Vec<Category>>,
}
