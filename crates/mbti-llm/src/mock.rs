//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

/// Dimension of the vectors produced by [`MockProvider::with_letter_embeddings`].
pub const LETTER_EMBEDDING_DIM: usize = 26;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    captured: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    /// Embed text as per-letter frequency counts instead of the fixed vector.
    pub letter_embeddings: bool,
    pub supports_embeddings: bool,
    pub streaming: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Yield this many stream chunks, then an error.
    pub stream_error_after: Option<usize>,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    /// Milliseconds to sleep before returning an embedding.
    pub embed_delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            captured: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.1; 8],
            letter_embeddings: false,
            supports_embeddings: true,
            streaming: false,
            fail_chat: false,
            fail_embed: false,
            stream_error_after: None,
            delay_ms: 0,
            embed_delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    /// A provider that reports no embedding model and rejects `embed`.
    #[must_use]
    pub fn without_embeddings() -> Self {
        Self {
            supports_embeddings: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn with_letter_embeddings(mut self) -> Self {
        self.letter_embeddings = true;
        self
    }

    #[must_use]
    pub fn with_stream_error_after(mut self, chunks: usize) -> Self {
        self.streaming = true;
        self.stream_error_after = Some(chunks);
        self
    }

    /// Every message list passed to `chat` or `chat_stream`, in call order.
    #[must_use]
    pub fn captured(&self) -> Vec<Vec<Message>> {
        self.captured.lock().unwrap().clone()
    }

    fn next_response(&self, messages: &[Message]) -> String {
        self.captured.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.default_response.clone()
        } else {
            responses.remove(0)
        }
    }

    async fn pause(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

/// Lowercase ASCII letter counts. Texts sharing vocabulary land close together.
#[must_use]
pub fn letter_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0_f32; LETTER_EMBEDDING_DIM];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        let idx = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        v[idx] += 1.0;
    }
    v
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.pause().await;
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        Ok(self.next_response(messages))
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.pause().await;
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let response = self.next_response(messages);
        let mut chunks: Vec<Result<String, LlmError>> =
            response.chars().map(|c| Ok(c.to_string())).collect();
        if let Some(n) = self.stream_error_after {
            chunks.truncate(n);
            chunks.push(Err(LlmError::Other("mock stream error".into())));
        }
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.embed_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.embed_delay_ms)).await;
        }
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported { provider: "mock" });
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if self.letter_embeddings {
            Ok(letter_embedding(text))
        } else {
            Ok(self.embedding.clone())
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn responses_consumed_in_order_then_default() {
        let p = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        let msgs = [Message::user("q")];
        assert_eq!(p.chat(&msgs).await.unwrap(), "one");
        assert_eq!(p.chat(&msgs).await.unwrap(), "two");
        assert_eq!(p.chat(&msgs).await.unwrap(), "mock response");
        assert_eq!(p.captured().len(), 3);
    }

    #[tokio::test]
    async fn stream_error_after_truncates() {
        let p = MockProvider::with_responses(vec!["abcdef".into()]).with_stream_error_after(2);
        let mut stream = p.chat_stream(&[Message::user("q")]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn letter_embedding_counts_case_insensitively() {
        let v = letter_embedding("Aab!");
        assert_eq!(v.len(), LETTER_EMBEDDING_DIM);
        assert!((v[0] - 2.0).abs() < f32::EPSILON);
        assert!((v[1] - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn embed_fails_when_configured() {
        let p = MockProvider {
            fail_embed: true,
            ..MockProvider::default()
        };
        assert!(p.embed("x").await.is_err());
    }

    #[tokio::test]
    async fn without_embeddings_rejects_embed() {
        let p = MockProvider::without_embeddings();
        assert!(!p.supports_embeddings());
        assert!(matches!(
            p.embed("x").await,
            Err(LlmError::EmbedUnsupported { provider: "mock" })
        ));
    }
}
