use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid chunking configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} is not a .txt or .md file", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("{} is {size} bytes, limit is {limit}", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),

    #[error("embedding failed: {0}")]
    Embedding(#[from] mbti_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::vector_store::VectorStoreError),
}
