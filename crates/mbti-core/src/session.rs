//! Per-conversation state and the registry that hands sessions to front ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::persona::Mbti;

/// One completed user/assistant round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Where a session is in the turn lifecycle.
///
/// There is no `Responding` variant: a turn in progress holds the session through
/// `&mut Session` (or its registry mutex) until the reply is committed or dropped,
/// so nothing else can observe or change the session while it responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoPersonaSelected,
    PersonaReady(Mbti),
}

/// Conversation context for one user. Mutated only through `&mut`, so a running
/// turn owns it exclusively.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
    persona: Option<Mbti>,
    history: Vec<Exchange>,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            persona: None,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn persona(&self) -> Option<Mbti> {
        self.persona
    }

    #[must_use]
    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.persona {
            Some(code) => SessionState::PersonaReady(code),
            None => SessionState::NoPersonaSelected,
        }
    }

    /// Switch persona. History is always cleared, even when `code` is unchanged.
    pub(crate) fn select_persona(&mut self, code: Mbti) {
        self.persona = Some(code);
        self.history.clear();
    }

    pub(crate) fn clear_history(&mut self) {
        self.history.clear();
    }

    pub(crate) fn push_exchange(&mut self, user: String, assistant: String) {
        self.history.push(Exchange { user, assistant });
    }
}

/// Shared handle to a session. Requests for the same session queue on the mutex.
pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_used: Instant,
}

impl Entry {
    fn touch(&mut self) -> SessionHandle {
        self.last_used = Instant::now();
        Arc::clone(&self.handle)
    }
}

/// Maps session ids to their state. Distinct sessions never share a lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session for `id`, or a fresh one registered under it.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_owned())
            .or_insert_with(|| Entry {
                handle: Arc::new(Mutex::new(Session::new(id))),
                last_used: Instant::now(),
            })
            .touch()
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.get_mut(id).map(Entry::touch)
    }

    /// Drop sessions unused for at least `max_idle`. A session whose handle is still
    /// held by a request is kept. Returns the number removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_used.elapsed() < max_idle || Arc::strong_count(&entry.handle) > 1;
            if !keep {
                tracing::debug!(session = %id, "evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
