//! Reference documents: loading persona text files and splitting them into chunks.

pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{DEFAULT_MAX_FILE_SIZE, TextLoader};
pub use splitter::{SplitterConfig, TextSplitter, split};
pub use types::{Chunk, Document, DocumentMetadata};
