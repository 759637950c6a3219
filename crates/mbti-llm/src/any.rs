use std::sync::Arc;

#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatStream, EmbedFuture, LlmProvider, Message};

macro_rules! dispatch {
    ($self:expr, $p:ident => $call:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $call,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $call,
        }
    };
}

/// The provider selected at startup. The mock variant exists only with the `mock` feature.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Embedding closure for the indexer and retriever, sharing one provider clone.
    pub fn embed_fn(&self) -> impl Fn(&str) -> EmbedFuture + Send + Sync + 'static {
        let provider = Arc::new(self.clone());
        move |text: &str| -> EmbedFuture {
            let provider = Arc::clone(&provider);
            let text = text.to_owned();
            Box::pin(async move { provider.embed(&text).await })
        }
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        dispatch!(self, p => p.chat(messages).await)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, crate::LlmError> {
        dispatch!(self, p => p.chat_stream(messages).await)
    }

    fn supports_streaming(&self) -> bool {
        dispatch!(self, p => p.supports_streaming())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        dispatch!(self, p => p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        dispatch!(self, p => p.supports_embeddings())
    }

    fn name(&self) -> &str {
        dispatch!(self, p => p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(embedding_model: Option<&str>) -> AnyProvider {
        AnyProvider::OpenAi(OpenAiProvider::new(
            "key".into(),
            "https://api.openai.com/v1".into(),
            "gpt-3.5-turbo".into(),
            200,
            0.1,
            embedding_model.map(str::to_owned),
        ))
    }

    #[test]
    fn delegates_capabilities() {
        let p = openai(Some("text-embedding-ada-002"));
        assert_eq!(p.name(), "openai");
        assert!(p.supports_streaming());
        assert!(p.supports_embeddings());
        assert!(!openai(None).supports_embeddings());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let dbg = format!("{:?}", openai(None));
        assert!(!dbg.contains("\"key\""));
    }

    #[tokio::test]
    async fn embed_fn_reports_missing_embedding_model() {
        let embed = openai(None).embed_fn();
        let err = embed("hello").await.unwrap_err();
        assert!(matches!(err, crate::LlmError::EmbedUnsupported { .. }));
    }
}
