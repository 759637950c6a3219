#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("no reference collection for persona {0}")]
    CollectionNotFound(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] mbti_llm::LlmError),

    #[error("vector store error: {0}")]
    Store(#[from] crate::vector_store::VectorStoreError),
}

impl RetrievalError {
    /// Whether the failure is a timeout of the embedding call.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Embedding(mbti_llm::LlmError::Timeout))
    }
}
