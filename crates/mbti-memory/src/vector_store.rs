use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    /// The embedding model changed since the collection was created; re-index.
    #[error("{collection} stores {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
    /// Present only when the search asked for vectors.
    pub vector: Option<Vec<f32>>,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorStore: Send + Sync {
    /// Create the collection if missing. Idempotent.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert or overwrite points by id.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Top `limit` points by cosine similarity, best first.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        with_vectors: bool,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_identical() {
        let a = [0.3, 0.4];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_or_mismatched() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn dimension_mismatch_display() {
        let err = VectorStoreError::DimensionMismatch {
            collection: "mbti_infp".into(),
            expected: 1536,
            actual: 26,
        };
        assert_eq!(err.to_string(), "mbti_infp stores 1536-dimensional vectors, got 26");
    }

    #[test]
    fn not_found_display() {
        let err = VectorStoreError::CollectionNotFound("mbti_infp".into());
        assert_eq!(err.to_string(), "collection not found: mbti_infp");
    }
}
