//! Query-time context retrieval: plain similarity or maximum marginal relevance.

use std::collections::HashSet;
use std::sync::Arc;

use crate::EmbedFn;
use crate::collection_name;
use crate::error::RetrievalError;
use crate::vector_store::{ScoredVectorPoint, VectorStore, VectorStoreError, cosine_similarity};

/// How candidates are ranked before the top `k` are returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalStrategy {
    /// Top `k` distinct chunks by cosine score, drawn from `fetch_k` candidates.
    Similarity { fetch_k: usize },
    /// Fetch `fetch_k` candidates, then greedily pick `k` balancing relevance against
    /// redundancy. `lambda = 1.0` is pure relevance, `0.0` pure diversity.
    Mmr { fetch_k: usize, lambda: f32 },
}

impl Default for RetrievalStrategy {
    fn default() -> Self {
        Self::Mmr {
            fetch_k: 10,
            lambda: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f32,
    pub source: Option<String>,
    pub chunk_index: Option<u64>,
}

impl RetrievedChunk {
    fn from_point(point: &ScoredVectorPoint) -> Option<Self> {
        let content = point.payload.get("content")?.as_str()?.to_owned();
        Some(Self {
            content,
            score: point.score,
            source: point
                .payload
                .get("source")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
            chunk_index: point.payload.get("chunk_index").and_then(serde_json::Value::as_u64),
        })
    }
}

struct Candidate {
    chunk: RetrievedChunk,
    vector: Option<Vec<f32>>,
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embed_fn: EmbedFn,
    collection_prefix: String,
    score_threshold: Option<f32>,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embed_fn: EmbedFn,
        collection_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embed_fn,
            collection_prefix: collection_prefix.into(),
            score_threshold: None,
        }
    }

    /// Drop candidates scoring below `threshold` before ranking.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Retrieve up to `k` distinct chunks from the persona's collection.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::CollectionNotFound`] if the persona was never indexed,
    /// or an embedding/store error.
    pub async fn retrieve(
        &self,
        persona: &str,
        query: &str,
        k: usize,
        strategy: &RetrievalStrategy,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let collection = collection_name(&self.collection_prefix, persona);
        if !self.store.collection_exists(&collection).await? {
            return Err(RetrievalError::CollectionNotFound(persona.to_owned()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = (self.embed_fn)(query).await?;

        // Candidates beyond `k` leave room for duplicates removed below.
        let (limit, with_vectors) = match strategy {
            RetrievalStrategy::Similarity { fetch_k } => ((*fetch_k).max(k), false),
            RetrievalStrategy::Mmr { fetch_k, .. } => ((*fetch_k).max(k), true),
        };

        let points = self
            .store
            .search(&collection, query_vector, limit as u64, with_vectors)
            .await
            .map_err(|e| match e {
                VectorStoreError::CollectionNotFound(_) => {
                    RetrievalError::CollectionNotFound(persona.to_owned())
                }
                other => RetrievalError::Store(other),
            })?;

        let candidates = self.filter_candidates(points);

        let selected: Vec<RetrievedChunk> = match strategy {
            RetrievalStrategy::Similarity { .. } => {
                candidates.into_iter().take(k).map(|c| c.chunk).collect()
            }
            RetrievalStrategy::Mmr { lambda, .. } => {
                mmr_select(candidates, k, lambda.clamp(0.0, 1.0))
            }
        };

        tracing::debug!(
            persona,
            %collection,
            retrieved = selected.len(),
            "retrieved context"
        );
        Ok(selected)
    }

    /// Apply the score threshold and drop repeated content, keeping the best-scored copy.
    fn filter_candidates(&self, points: Vec<ScoredVectorPoint>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        points
            .into_iter()
            .filter(|p| self.score_threshold.is_none_or(|t| p.score >= t))
            .filter_map(|p| {
                let chunk = RetrievedChunk::from_point(&p)?;
                seen.insert(chunk.content.clone()).then_some(Candidate {
                    chunk,
                    vector: p.vector,
                })
            })
            .collect()
    }
}

/// Greedy maximum marginal relevance over candidates sorted best-first.
fn mmr_select(candidates: Vec<Candidate>, k: usize, lambda: f32) -> Vec<RetrievedChunk> {
    let mut remaining = candidates;
    let mut selected: Vec<Candidate> = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best = f32::NEG_INFINITY;
        for (idx, cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| match (&cand.vector, &s.vector) {
                    (Some(a), Some(b)) => cosine_similarity(a, b),
                    _ => 0.0,
                })
                .fold(0.0_f32, f32::max);
            let score = lambda * cand.chunk.score - (1.0 - lambda) * redundancy;
            if score > best {
                best = score;
                best_idx = idx;
            }
        }
        selected.push(remaining.remove(best_idx));
    }

    selected.into_iter().map(|c| c.chunk).collect()
}
