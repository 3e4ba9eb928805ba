use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardrobeError {
	#[error("Service not initialized: call wardrobe/initialize first")]
	NotInitialized,
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Item not found: {0}")]
	NotFound(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Storage corruption: {0}")]
	Corruption(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Embedding producer error: {0}")]
	Producer(String),
}

impl WardrobeError {
	pub fn code(&self) -> &str {
		match self {
			Self::NotInitialized => "WARDROBE_NOT_INITIALIZED",
			Self::InvalidArgument(_) => "WARDROBE_INVALID_ARGUMENT",
			Self::NotFound(_) => "WARDROBE_NOT_FOUND",
			Self::Io(_) => "WARDROBE_IO",
			Self::Corruption(_) => "WARDROBE_CORRUPT",
			Self::Serialization(_) => "WARDROBE_SERIALIZATION",
			Self::Producer(_) => "WARDROBE_PRODUCER",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"wardrobeCode": self.code(),
			"message": self.to_string(),
		})
	}
}
