//! Persona reference documents: chunking, vector storage, indexing and retrieval.

use std::sync::Arc;

pub mod document;
pub mod error;
pub mod indexer;
pub mod local_store;
pub mod qdrant_ops;
pub mod retriever;
pub mod vector_store;

pub use error::RetrievalError;
pub use indexer::{IndexReport, Indexer, point_id};
pub use local_store::LocalVectorStore;
pub use qdrant_ops::QdrantOps;
pub use retriever::{RetrievalStrategy, RetrievedChunk, Retriever};
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

/// Shared embedding function, usually built from `AnyProvider::embed_fn`.
pub type EmbedFn = Arc<dyn Fn(&str) -> mbti_llm::EmbedFuture + Send + Sync>;

/// Collection holding a persona's chunks: `{prefix}{persona_lowercase}`.
#[must_use]
pub fn collection_name(prefix: &str, persona: &str) -> String {
    format!("{prefix}{}", persona.to_ascii_lowercase())
}
