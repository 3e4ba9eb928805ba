// ---------------------------------------------------------------------------
// Embedding producer — the external "image bytes -> vector" collaborator
// ---------------------------------------------------------------------------
//
// The model that turns an item image into a style embedding lives outside
// this crate. The engine only requires the contract: a fixed dimension and
// a unit-normalized vector per payload. Producer failures are surfaced
// unchanged as `WardrobeError::Producer`.
// ---------------------------------------------------------------------------

use crate::cosine;
use crate::error::WardrobeError;

pub trait EmbeddingProducer: Send + Sync {
	/// Dimension of every vector this producer yields.
	fn dimension(&self) -> usize;

	/// Produce a unit-normalized embedding from raw payload bytes.
	fn produce(&self, payload: &[u8]) -> Result<Vec<f32>, WardrobeError>;
}

/// Standalone producer: the payload is the embedding itself, as f32
/// little-endian bytes. Stands in for the external model when callers
/// precompute embeddings; the wire payload mirrors the persisted vector
/// block encoding.
pub struct RawVectorProducer {
	dimension: usize,
}

impl RawVectorProducer {
	pub fn new(dimension: usize) -> Self {
		Self { dimension }
	}
}

impl EmbeddingProducer for RawVectorProducer {
	fn dimension(&self) -> usize {
		self.dimension
	}

	fn produce(&self, payload: &[u8]) -> Result<Vec<f32>, WardrobeError> {
		if payload.len() != self.dimension * 4 {
			return Err(WardrobeError::Producer(format!(
				"payload of {} bytes does not encode a {}-dimensional embedding",
				payload.len(),
				self.dimension
			)));
		}

		let mut vector = Vec::with_capacity(self.dimension);
		for chunk in payload.chunks_exact(4) {
			vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
		}

		if !cosine::normalize(&mut vector) {
			return Err(WardrobeError::Producer(
				"payload encodes a zero-norm embedding".into(),
			));
		}
		Ok(vector)
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn payload(vector: &[f32]) -> Vec<u8> {
		vector.iter().flat_map(|f| f.to_le_bytes()).collect()
	}

	#[test]
	fn decodes_and_normalizes() {
		let producer = RawVectorProducer::new(2);
		let vector = producer.produce(&payload(&[3.0, 4.0])).unwrap();
		assert!(cosine::is_unit(&vector));
		assert!((vector[0] - 0.6).abs() < 1e-6);
		assert!((vector[1] - 0.8).abs() < 1e-6);
	}

	#[test]
	fn rejects_wrong_length() {
		let producer = RawVectorProducer::new(4);
		let err = producer.produce(&payload(&[1.0, 0.0])).unwrap_err();
		assert!(matches!(err, WardrobeError::Producer(_)));
	}

	#[test]
	fn rejects_zero_vector() {
		let producer = RawVectorProducer::new(2);
		let err = producer.produce(&payload(&[0.0, 0.0])).unwrap_err();
		assert!(matches!(err, WardrobeError::Producer(_)));
	}
}
