//! In-process vector store, optionally persisted as one JSON file per collection.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, cosine_similarity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalCollection {
    vector_size: u64,
    points: BTreeMap<String, StoredPoint>,
}

pub struct LocalVectorStore {
    dir: Option<PathBuf>,
    collections: RwLock<HashMap<String, LocalCollection>>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl LocalVectorStore {
    /// Purely in-memory store. Contents are lost on drop.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: None,
            collections: RwLock::new(HashMap::new()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open (or create) a store rooted at `dir`, loading every `*.json` collection file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a collection file is corrupt.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, VectorStoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
            else {
                continue;
            };
            let raw = tokio::fs::read_to_string(&path).await?;
            let collection: LocalCollection = serde_json::from_str(&raw).map_err(|e| {
                VectorStoreError::Serialization(format!("{}: {e}", path.display()))
            })?;
            tracing::debug!(
                collection = %name,
                points = collection.points.len(),
                "loaded local collection"
            );
            collections.insert(name, collection);
        }

        Ok(Self {
            dir: Some(dir),
            collections: RwLock::new(collections),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn file_for(dir: &Path, collection: &str) -> PathBuf {
        dir.join(format!("{collection}.json"))
    }

    /// Write the current state of `collection` to disk, or remove its file if it is gone.
    async fn persist(&self, collection: &str) -> Result<(), VectorStoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let snapshot = {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.get(collection)
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?
        };

        let path = Self::file_for(dir, collection);
        match snapshot {
            Some(json) => {
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, json).await?;
                tokio::fs::rename(&tmp, &path).await?;
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn validate_name(collection: &str) -> Result<(), VectorStoreError> {
    if collection.is_empty()
        || !collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(VectorStoreError::Collection(format!(
            "invalid collection name: {collection:?}"
        )));
    }
    Ok(())
}

impl VectorStore for LocalVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            validate_name(&collection)?;
            let _guard = self.persist_lock.lock().await;
            let created = {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                if cols.contains_key(&collection) {
                    false
                } else {
                    cols.insert(
                        collection.clone(),
                        LocalCollection {
                            vector_size,
                            points: BTreeMap::new(),
                        },
                    );
                    true
                }
            };
            if created {
                tracing::info!(%collection, vector_size, "created local collection");
                self.persist(&collection).await?;
            }
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let _guard = self.persist_lock.lock().await;
            {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                cols.remove(&collection);
            }
            self.persist(&collection).await
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let _guard = self.persist_lock.lock().await;
            {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
                let col = cols
                    .get_mut(&collection)
                    .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.clone()))?;
                for p in points {
                    if p.vector.len() as u64 != col.vector_size {
                        return Err(VectorStoreError::DimensionMismatch {
                            collection: collection.clone(),
                            expected: col.vector_size,
                            actual: p.vector.len() as u64,
                        });
                    }
                    col.points.insert(
                        p.id,
                        StoredPoint {
                            vector: p.vector,
                            payload: p.payload,
                        },
                    );
                }
            }
            self.persist(&collection).await
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        with_vectors: bool,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.clone()))?;
            if vector.len() as u64 != col.vector_size {
                return Err(VectorStoreError::DimensionMismatch {
                    collection,
                    expected: col.vector_size,
                    actual: vector.len() as u64,
                });
            }

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                    vector: with_vectors.then(|| sp.vector.clone()),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or(VectorStoreError::CollectionNotFound(collection))?;
            Ok(col.points.len() as u64)
        })
    }
}
