use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::EmbedFn;
use crate::collection_name;
use crate::document::{Chunk, Document, DocumentError, TextLoader, TextSplitter};
use crate::vector_store::{VectorPoint, VectorStore};

/// Namespace for chunk point ids. Changing it orphans every indexed point.
const POINT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x62, 0x74, 0x69, 0x2d, 0x63, 0x68, 0x61, 0x74, 0x2d, 0x63, 0x68, 0x75, 0x6e, 0x6b, 0x73,
]);

/// Stable point id for a persona's chunk, so re-indexing overwrites in place.
#[must_use]
pub fn point_id(persona: &str, chunk_index: usize) -> String {
    Uuid::new_v5(&POINT_NAMESPACE, format!("{persona}:{chunk_index}").as_bytes()).to_string()
}

/// Outcome of indexing one persona's reference document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub persona: String,
    pub chunks: usize,
}

/// Splits, embeds and stores persona reference documents, one collection per persona.
pub struct Indexer {
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    embed_fn: EmbedFn,
    collection_prefix: String,
    loader: TextLoader,
    fresh: bool,
}

impl Indexer {
    pub fn new(
        splitter: TextSplitter,
        store: Arc<dyn VectorStore>,
        embed_fn: EmbedFn,
        collection_prefix: impl Into<String>,
    ) -> Self {
        Self {
            splitter,
            store,
            embed_fn,
            collection_prefix: collection_prefix.into(),
            loader: TextLoader::default(),
            fresh: false,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: TextLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Drop each persona's collection before writing its chunks. Clears chunks left over
    /// from a longer document and vectors from a previous embedding model.
    #[must_use]
    pub fn with_fresh_collections(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Embed `chunks` and upsert them into the persona's collection. Returns the stored count.
    ///
    /// Every chunk is embedded before anything is written, so an embedding failure
    /// leaves the collection untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Embedding`] or [`DocumentError::Storage`].
    pub async fn index(&self, persona: &str, chunks: &[Chunk]) -> Result<usize, DocumentError> {
        let collection = collection_name(&self.collection_prefix, persona);

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.content.trim().is_empty() {
                tracing::debug!(persona, chunk_index = chunk.chunk_index, "skipping blank chunk");
                continue;
            }
            let vector = (self.embed_fn)(&chunk.content).await?;
            let payload = HashMap::from([
                ("persona".to_owned(), json!(persona)),
                ("source".to_owned(), json!(chunk.metadata.source)),
                ("chunk_index".to_owned(), json!(chunk.chunk_index)),
                ("start".to_owned(), json!(chunk.start)),
                ("end".to_owned(), json!(chunk.end)),
                ("content".to_owned(), json!(chunk.content)),
            ]);
            points.push(VectorPoint {
                id: point_id(persona, chunk.chunk_index),
                vector,
                payload,
            });
        }

        if self.fresh && self.store.collection_exists(&collection).await? {
            self.store.delete_collection(&collection).await?;
            tracing::info!(persona, %collection, "dropped collection before re-indexing");
        }

        let Some(first) = points.first() else {
            return Ok(0);
        };
        self.store
            .ensure_collection(&collection, first.vector.len() as u64)
            .await?;

        let count = points.len();
        self.store.upsert(&collection, points).await?;
        tracing::info!(persona, %collection, chunks = count, "indexed chunks");
        Ok(count)
    }

    /// Split a document and index its chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails.
    pub async fn index_document(
        &self,
        persona: &str,
        document: &Document,
    ) -> Result<usize, DocumentError> {
        let chunks = self.splitter.split(document);
        self.index(persona, &chunks).await
    }

    /// Load a text file and index it for `persona`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn index_file(&self, persona: &str, path: &Path) -> Result<usize, DocumentError> {
        let document = self.loader.load(path).await?.with_persona(persona);
        self.index_document(persona, &document).await
    }

    /// Index every `(persona, path)` pair. Missing files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first file that exists but fails to load, embed, or store.
    pub async fn index_all<'a, I>(&self, sources: I) -> Result<Vec<IndexReport>, DocumentError>
    where
        I: IntoIterator<Item = (&'a str, &'a Path)>,
    {
        let mut reports = Vec::new();
        for (persona, path) in sources {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                tracing::warn!(persona, path = %path.display(), "reference document missing, skipping");
                continue;
            }
            let chunks = self.index_file(persona, path).await?;
            reports.push(IndexReport {
                persona: persona.to_owned(),
                chunks,
            });
        }
        Ok(reports)
    }
}
