//! Application bootstrap: config resolution, provider/store/pipeline construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mbti_llm::{AnyProvider, LlmProvider};
use mbti_llm::openai::OpenAiProvider;
use mbti_memory::document::{SplitterConfig, TextLoader, TextSplitter};
use mbti_memory::{EmbedFn, Indexer, LocalVectorStore, QdrantOps, Retriever, VectorStore};

use crate::config::{Config, StoreBackend, resolve_config_path};
use crate::orchestrator::TurnOrchestrator;
use crate::persona::PersonaCatalog;

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Resolve the config path, load the file and env overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed or validated.
    pub fn load(cli_path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(cli_path);
        let config = Config::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self {
            config,
            config_path,
        })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: PathBuf::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// # Errors
    ///
    /// Returns an error if no API key was resolved.
    pub fn build_provider(&self) -> anyhow::Result<AnyProvider> {
        create_provider(&self.config)
    }

    /// # Errors
    ///
    /// Returns an error if the local store directory cannot be read or the Qdrant
    /// client cannot be created.
    pub async fn build_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        create_store(&self.config).await
    }

    /// # Errors
    ///
    /// Returns an error if the provider cannot embed or the chunking settings are invalid.
    pub fn build_indexer(
        &self,
        provider: &AnyProvider,
        store: Arc<dyn VectorStore>,
    ) -> anyhow::Result<Indexer> {
        anyhow::ensure!(
            provider.supports_embeddings(),
            "provider {} has no embedding model configured",
            provider.name()
        );
        let chunking = &self.config.chunking;
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            separators: chunking.separators.clone(),
        })
        .context("invalid chunking configuration")?;
        Ok(Indexer::new(
            splitter,
            store,
            embed_fn(provider),
            &self.config.store.collection_prefix,
        )
        .with_loader(TextLoader {
            max_file_size: self.config.documents.max_file_size,
        }))
    }

    #[must_use]
    pub fn build_retriever(
        &self,
        provider: &AnyProvider,
        store: Arc<dyn VectorStore>,
    ) -> Retriever {
        Retriever::new(
            store,
            embed_fn(provider),
            &self.config.store.collection_prefix,
        )
        .with_score_threshold(self.config.retrieval.score_threshold)
    }

    /// # Errors
    ///
    /// Returns an error if a persona override names an unknown type.
    pub fn build_orchestrator(
        &self,
        provider: AnyProvider,
        retriever: Retriever,
    ) -> anyhow::Result<TurnOrchestrator> {
        TurnOrchestrator::from_config(&self.config, Arc::new(provider), Arc::new(retriever))
            .context("invalid persona configuration")
    }

    /// # Errors
    ///
    /// Returns an error if a persona override names an unknown type.
    pub fn persona_catalog(&self) -> anyhow::Result<PersonaCatalog> {
        self.config
            .persona_catalog()
            .context("invalid persona configuration")
    }
}

/// # Errors
///
/// Returns an error if no API key was resolved.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let api_key = config
        .secrets
        .openai_api_key
        .as_ref()
        .context("MBTI_OPENAI_API_KEY (or OPENAI_API_KEY) is not set")?;
    let llm = &config.llm;
    let provider = OpenAiProvider::new(
        api_key.expose().to_owned(),
        llm.base_url.clone(),
        llm.model.clone(),
        llm.max_tokens,
        llm.temperature,
        Some(llm.embedding_model.clone()),
    );
    tracing::info!(
        model = %llm.model,
        embedding_model = %llm.embedding_model,
        base_url = %llm.base_url,
        "using OpenAI-compatible provider"
    );
    Ok(AnyProvider::OpenAi(provider))
}

/// # Errors
///
/// Returns an error if the backend cannot be opened.
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Local => {
            let store = LocalVectorStore::open(&config.store.path)
                .await
                .with_context(|| {
                    format!("opening local vector store at {}", config.store.path.display())
                })?;
            Arc::new(store)
        }
        StoreBackend::Qdrant => Arc::new(
            QdrantOps::new(&config.store.qdrant_url)
                .with_context(|| format!("connecting to Qdrant at {}", config.store.qdrant_url))?,
        ),
    };
    tracing::info!(backend = %config.store.backend, "vector store ready");
    Ok(store)
}

fn embed_fn(provider: &AnyProvider) -> EmbedFn {
    Arc::new(provider.embed_fn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;

    fn config_with_key() -> Config {
        let mut config = Config::default();
        config.secrets.openai_api_key = Some(Secret::new("sk-test"));
        config
    }

    #[test]
    fn provider_requires_api_key() {
        let err = create_provider(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn provider_uses_configured_model() {
        let mut config = config_with_key();
        config.llm.model = "gpt-4o-mini".into();
        let AnyProvider::OpenAi(p) = create_provider(&config).unwrap() else {
            panic!("expected OpenAI provider");
        };
        assert_eq!(p.model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn local_store_opens_under_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = dir.path().join("vectors");
        let store = create_store(&config).await.unwrap();
        assert!(!store.collection_exists("mbti_infp").await.unwrap());
    }

    #[test]
    fn indexer_rejects_bad_chunking() {
        let mut config = config_with_key();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        let builder = AppBuilder::from_config(config);
        let provider = builder.build_provider().unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new());
        assert!(builder.build_indexer(&provider, store).is_err());
    }

    #[test]
    fn indexer_requires_embedding_support() {
        let builder = AppBuilder::from_config(Config::default());
        let provider = AnyProvider::Mock(mbti_llm::mock::MockProvider::without_embeddings());
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new());
        let err = builder.build_indexer(&provider, store).err().unwrap();
        assert!(err.to_string().contains("no embedding model"));
    }

    #[test]
    fn orchestrator_builds_from_defaults() {
        let builder = AppBuilder::from_config(config_with_key());
        let provider = builder.build_provider().unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new());
        let retriever = builder.build_retriever(&provider, store);
        let orch = builder.build_orchestrator(provider, retriever).unwrap();
        assert_eq!(orch.personas().len(), 16);
    }
}
