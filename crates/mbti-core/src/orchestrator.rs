//! The chat-turn lifecycle: persona selection, retrieval, prompt, completion, history.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_core::Stream;
use mbti_llm::{AnyProvider, ChatStream, LlmError, LlmProvider, Message};
use mbti_memory::{RetrievalStrategy, RetrievedChunk, Retriever};
use tokio_stream::StreamExt as _;

use crate::config::{Config, TimeoutConfig};
use crate::error::{TurnError, TurnStage};
use crate::persona::{Mbti, PersonaCatalog, UnknownPersona};
use crate::prompt::PromptComposer;
use crate::session::{Session, SessionState};

/// Runs chat turns against shared, read-only collaborators. One orchestrator serves
/// every session; per-conversation state lives in [`Session`].
pub struct TurnOrchestrator<P: LlmProvider = AnyProvider> {
    provider: Arc<P>,
    retriever: Arc<Retriever>,
    personas: Arc<PersonaCatalog>,
    composer: PromptComposer,
    k: usize,
    strategy: RetrievalStrategy,
    llm_timeout: Duration,
    retrieval_timeout: Duration,
}

impl<P: LlmProvider> TurnOrchestrator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, retriever: Arc<Retriever>, personas: PersonaCatalog) -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            provider,
            retriever,
            personas: Arc::new(personas),
            composer: PromptComposer::default(),
            k: 3,
            strategy: RetrievalStrategy::default(),
            llm_timeout: Duration::from_secs(timeouts.llm_seconds),
            retrieval_timeout: Duration::from_secs(timeouts.embedding_seconds),
        }
    }

    /// Wire an orchestrator from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPersona`] if a `[personas.*]` key is not an MBTI code.
    pub fn from_config(
        config: &Config,
        provider: Arc<P>,
        retriever: Arc<Retriever>,
    ) -> Result<Self, UnknownPersona> {
        Ok(Self::new(provider, retriever, config.persona_catalog()?)
            .with_composer(PromptComposer::new(config.prompt.max_chars))
            .with_retrieval(config.retrieval.k, config.retrieval.strategy())
            .with_timeouts(
                Duration::from_secs(config.timeouts.llm_seconds),
                Duration::from_secs(config.timeouts.embedding_seconds),
            ))
    }

    #[must_use]
    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    #[must_use]
    pub fn with_retrieval(mut self, k: usize, strategy: RetrievalStrategy) -> Self {
        self.k = k;
        self.strategy = strategy;
        self
    }

    /// `llm` bounds the completion call (per chunk when streaming), `retrieval` bounds
    /// query embedding plus vector search.
    #[must_use]
    pub fn with_timeouts(mut self, llm: Duration, retrieval: Duration) -> Self {
        self.llm_timeout = llm;
        self.retrieval_timeout = retrieval;
        self
    }

    #[must_use]
    pub fn personas(&self) -> &PersonaCatalog {
        &self.personas
    }

    /// Select the persona for `session`. History is cleared every time, including when
    /// the same persona is chosen again.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::UnknownPersona`] if `code` is not one of the sixteen types.
    pub fn set_persona(&self, session: &mut Session, code: &str) -> Result<String, TurnError> {
        let code: Mbti = code.parse()?;
        Ok(self.select_persona(session, code))
    }

    /// [`Self::set_persona`] for a code that is already parsed.
    pub fn select_persona(&self, session: &mut Session, code: Mbti) -> String {
        session.select_persona(code);
        tracing::info!(session = session.id(), persona = %code, "persona selected");
        format!("Persona set to {code}.")
    }

    /// Clear the conversation but keep the selected persona.
    pub fn reset(&self, session: &mut Session) {
        session.clear_history();
        tracing::info!(session = session.id(), "history cleared");
    }

    /// Run one turn and return the reply.
    ///
    /// Infrastructure failures (missing collection, embedding, store, completion,
    /// timeouts) come back as `Ok` with user-facing text and leave history unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::PersonaNotSet`] or [`TurnError::EmptyInput`]; history is
    /// untouched in both cases.
    pub async fn send_message(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<String, TurnError> {
        let (code, text) = validate(session, text)?;
        let started = Instant::now();

        match self.complete_turn(session, code, text).await {
            Ok(reply) => {
                session.push_exchange(text.to_owned(), reply.clone());
                tracing::info!(
                    session = session.id(),
                    persona = %code,
                    history = session.history().len(),
                    latency_ms = elapsed_ms(started),
                    "turn completed"
                );
                Ok(reply)
            }
            Err(e) => {
                log_turn_failure(session.id(), code, &e, started);
                Ok(e.user_message())
            }
        }
    }

    /// Like [`Self::send_message`] but never fails: validation errors are rendered as
    /// user-facing text too.
    pub async fn reply(&self, session: &mut Session, text: &str) -> String {
        match self.send_message(session, text).await {
            Ok(reply) => reply,
            Err(e) => e.user_message(),
        }
    }

    /// Run one turn and stream the reply as text deltas.
    ///
    /// The exchange is committed to history only when the stream ends cleanly;
    /// dropping the stream early or hitting an error leaves history unchanged.
    ///
    /// # Errors
    ///
    /// Returns any [`TurnError`] raised before the first delta, including
    /// retrieval failures and a timed-out or rejected completion request.
    pub async fn send_message_stream<'a>(
        &'a self,
        session: &'a mut Session,
        text: &str,
    ) -> Result<ReplyStream<'a>, TurnError> {
        let (code, text) = validate(session, text)?;
        let started = Instant::now();

        let inner = match self.open_stream(session, code, text).await {
            Ok(inner) => inner,
            Err(e) => {
                log_turn_failure(session.id(), code, &e, started);
                return Err(e);
            }
        };

        Ok(ReplyStream {
            inner,
            session,
            persona: code,
            query: text.to_owned(),
            buffer: String::new(),
            llm_timeout: self.llm_timeout,
            started,
            done: false,
        })
    }

    async fn complete_turn(
        &self,
        session: &Session,
        code: Mbti,
        query: &str,
    ) -> Result<String, TurnError> {
        let messages = self.prepare(session, code, query).await?;
        tokio::time::timeout(self.llm_timeout, self.provider.chat(&messages))
            .await
            .map_err(|_| TurnError::Timeout {
                stage: TurnStage::Completion,
                after: self.llm_timeout,
            })?
            .map_err(|e| self.completion_error(e))
    }

    async fn open_stream(
        &self,
        session: &Session,
        code: Mbti,
        query: &str,
    ) -> Result<ChatStream, TurnError> {
        let messages = self.prepare(session, code, query).await?;
        let timed_out = || TurnError::Timeout {
            stage: TurnStage::Completion,
            after: self.llm_timeout,
        };

        if !self.provider.supports_streaming() {
            let reply = tokio::time::timeout(self.llm_timeout, self.provider.chat(&messages))
                .await
                .map_err(|_| timed_out())?
                .map_err(|e| self.completion_error(e))?;
            let single: ChatStream = Box::pin(tokio_stream::once(Ok(reply)));
            return Ok(single);
        }

        let stream = tokio::time::timeout(self.llm_timeout, self.provider.chat_stream(&messages))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| self.completion_error(e))?;
        let per_chunk: ChatStream = Box::pin(
            stream
                .timeout(self.llm_timeout)
                .map(|item| item.unwrap_or(Err(LlmError::Timeout))),
        );
        Ok(per_chunk)
    }

    /// Retrieve context and compose the single user message sent to the model.
    async fn prepare(
        &self,
        session: &Session,
        code: Mbti,
        query: &str,
    ) -> Result<Vec<Message>, TurnError> {
        let chunks = self.retrieve(code, query).await?;
        let description = self
            .personas
            .get(code)
            .map_or_else(|| code.default_description(), |p| p.description.as_str());
        let prompt = self
            .composer
            .compose(code, description, session.history(), &chunks, query);

        tracing::debug!(
            session = session.id(),
            persona = %code,
            retrieved = chunks.len(),
            dropped_history = prompt.dropped_history,
            prompt_chars = prompt.text.chars().count(),
            "prompt composed"
        );
        Ok(vec![Message::user(prompt.text)])
    }

    async fn retrieve(&self, code: Mbti, query: &str) -> Result<Vec<RetrievedChunk>, TurnError> {
        let timed_out = TurnError::Timeout {
            stage: TurnStage::Retrieval,
            after: self.retrieval_timeout,
        };
        let result = tokio::time::timeout(
            self.retrieval_timeout,
            self.retriever
                .retrieve(code.as_str(), query, self.k, &self.strategy),
        )
        .await
        .map_err(|_| timed_out)?;

        match result {
            Ok(chunks) => {
                if chunks.is_empty() {
                    tracing::debug!(persona = %code, "no reference chunks matched");
                }
                Ok(chunks)
            }
            Err(e) if e.is_timeout() => Err(TurnError::Timeout {
                stage: TurnStage::Retrieval,
                after: self.retrieval_timeout,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn completion_error(&self, e: LlmError) -> TurnError {
        match e {
            LlmError::Timeout => TurnError::Timeout {
                stage: TurnStage::Completion,
                after: self.llm_timeout,
            },
            other => TurnError::Completion(other),
        }
    }
}

impl<P: LlmProvider> std::fmt::Debug for TurnOrchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("provider", &self.provider.name())
            .field("k", &self.k)
            .field("strategy", &self.strategy)
            .field("llm_timeout", &self.llm_timeout)
            .field("retrieval_timeout", &self.retrieval_timeout)
            .finish_non_exhaustive()
    }
}

/// Check the session can take a turn and return its persona with the trimmed query.
fn validate<'t>(session: &Session, text: &'t str) -> Result<(Mbti, &'t str), TurnError> {
    let SessionState::PersonaReady(code) = session.state() else {
        return Err(TurnError::PersonaNotSet);
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(TurnError::EmptyInput);
    }
    Ok((code, text))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_turn_failure(session: &str, code: Mbti, e: &TurnError, started: Instant) {
    if matches!(e, TurnError::CollectionNotFound(_)) {
        tracing::warn!(session, persona = %code, "no reference collection for persona");
    } else {
        tracing::error!(
            session,
            persona = %code,
            latency_ms = elapsed_ms(started),
            transient = e.is_transient(),
            "turn failed: {e}"
        );
    }
}

/// Reply deltas for one streamed turn. Holds the session until dropped.
pub struct ReplyStream<'a> {
    inner: ChatStream,
    session: &'a mut Session,
    persona: Mbti,
    query: String,
    buffer: String,
    llm_timeout: Duration,
    started: Instant,
    done: bool,
}

impl ReplyStream<'_> {
    /// Text received so far.
    #[must_use]
    pub fn partial(&self) -> &str {
        &self.buffer
    }

    fn commit(&mut self) {
        let reply = self.buffer.trim().to_owned();
        self.session
            .push_exchange(std::mem::take(&mut self.query), reply);
        tracing::info!(
            session = self.session.id(),
            persona = %self.persona,
            history = self.session.history().len(),
            latency_ms = elapsed_ms(self.started),
            "streamed turn completed"
        );
    }
}

impl Stream for ReplyStream<'_> {
    type Item = Result<String, TurnError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(delta))) => {
                this.buffer.push_str(&delta);
                Poll::Ready(Some(Ok(delta)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                let err = match e {
                    LlmError::Timeout => TurnError::Timeout {
                        stage: TurnStage::Completion,
                        after: this.llm_timeout,
                    },
                    other => TurnError::Completion(other),
                };
                log_turn_failure(this.session.id(), this.persona, &err, this.started);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.commit();
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for ReplyStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("persona", &self.persona)
            .field("received", &self.buffer.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
