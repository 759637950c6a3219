use std::collections::HashMap;
use std::path::PathBuf;

use mbti_memory::RetrievalStrategy;
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Per-code overrides keyed by MBTI code, e.g. `[personas.INFP]`.
    #[serde(default)]
    pub personas: HashMap<String, PersonaConfig>,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_temperature() -> f32 {
    0.1
}

/// Vector store backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Qdrant,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Qdrant => "qdrant",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory of the local backend's collection files.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            qdrant_url: default_qdrant_url(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/vectors")
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection_prefix() -> String {
    "mbti_".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    /// Where `{CODE}.txt` reference documents live unless a persona overrides it.
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("mbti_texts")
}

fn default_max_file_size() -> u64 {
    mbti_memory::document::DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_separators() -> Vec<String> {
    mbti_memory::document::splitter::default_separators()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Mmr,
    Similarity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    #[serde(default = "default_lambda")]
    pub lambda: f32,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            strategy: StrategyKind::default(),
            fetch_k: default_fetch_k(),
            lambda: default_lambda(),
            score_threshold: None,
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub fn strategy(&self) -> RetrievalStrategy {
        match self.strategy {
            StrategyKind::Similarity => RetrievalStrategy::Similarity {
                fetch_k: self.fetch_k,
            },
            StrategyKind::Mmr => RetrievalStrategy::Mmr {
                fetch_k: self.fetch_k,
                lambda: self.lambda,
            },
        }
    }
}

fn default_k() -> usize {
    3
}

fn default_fetch_k() -> usize {
    10
}

fn default_lambda() -> f32 {
    0.6
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    12_000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
        }
    }
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
    /// Sessions untouched for this long are dropped from memory.
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            max_body_size: default_gateway_max_body(),
            session_idle_seconds: default_session_idle_seconds(),
        }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_max_body() -> usize {
    64 * 1024
}

fn default_session_idle_seconds() -> u64 {
    30 * 60
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PersonaConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub document: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
