mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::persona::{PersonaCatalog, UnknownPersona};
use crate::secret::Secret;

/// Used when neither `--config` nor `MBTI_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    UnknownPersona(#[from] UnknownPersona),
}

/// Pick the config file: explicit CLI path, then `MBTI_CONFIG`, then the default.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("MBTI_CONFIG")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// resulting values are inconsistent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Read the API key from `MBTI_OPENAI_API_KEY`, falling back to `OPENAI_API_KEY`.
    pub fn resolve_secrets(&mut self) {
        if let Some(key) = Secret::from_env(&["MBTI_OPENAI_API_KEY", "OPENAI_API_KEY"]) {
            self.secrets.openai_api_key = Some(key);
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first inconsistent value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunking.chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.lambda) {
            return Err(ConfigError::Invalid(format!(
                "retrieval.lambda ({}) must be within 0.0..=1.0",
                self.retrieval.lambda
            )));
        }
        if self.prompt.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "prompt.max_chars must be greater than zero".into(),
            ));
        }
        if self.timeouts.llm_seconds == 0 || self.timeouts.embedding_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be at least one second".into(),
            ));
        }
        if self.gateway.session_idle_seconds == 0 {
            return Err(ConfigError::Invalid(
                "gateway.session_idle_seconds must be at least one second".into(),
            ));
        }
        let prefix_ok = self
            .store
            .collection_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !prefix_ok {
            return Err(ConfigError::Invalid(format!(
                "store.collection_prefix {:?} may only contain [A-Za-z0-9_-]",
                self.store.collection_prefix
            )));
        }
        self.persona_catalog()?;
        Ok(())
    }

    /// Persona catalog with `[personas.*]` overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPersona`] for an override key that is not an MBTI code.
    pub fn persona_catalog(&self) -> Result<PersonaCatalog, UnknownPersona> {
        PersonaCatalog::from_config(&self.documents.dir, &self.personas)
    }
}
