use std::time::Duration;

use crate::persona::UnknownPersona;

/// Which part of a turn ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Retrieval,
    Completion,
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Retrieval => "retrieval",
            Self::Completion => "completion",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no persona selected")]
    PersonaNotSet,

    #[error("empty message")]
    EmptyInput,

    #[error(transparent)]
    UnknownPersona(#[from] UnknownPersona),

    #[error("no reference data indexed for {0}")]
    CollectionNotFound(String),

    #[error("retrieval failed: {0}")]
    Retrieval(mbti_memory::RetrievalError),

    #[error("completion failed: {0}")]
    Completion(#[from] mbti_llm::LlmError),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: TurnStage, after: Duration },
}

impl From<mbti_memory::RetrievalError> for TurnError {
    fn from(e: mbti_memory::RetrievalError) -> Self {
        match e {
            mbti_memory::RetrievalError::CollectionNotFound(persona) => {
                Self::CollectionNotFound(persona)
            }
            other => Self::Retrieval(other),
        }
    }
}

impl TurnError {
    /// Whether the same turn could succeed if the user simply tried again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Completion(e) | Self::Retrieval(mbti_memory::RetrievalError::Embedding(e)) => {
                e.is_transient()
            }
            _ => false,
        }
    }

    /// Text shown to the user in place of a reply.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PersonaNotSet => "Please select an MBTI type first.".into(),
            Self::EmptyInput => "Please enter a message.".into(),
            Self::UnknownPersona(e) => {
                format!("{:?} is not an MBTI type. Try one like INFP or ESTJ.", e.0)
            }
            Self::CollectionNotFound(persona) => format!(
                "There is no reference data for {persona} yet. Run the indexer and try again."
            ),
            Self::Retrieval(e) => format!("Could not look up reference data: {e}"),
            Self::Completion(e) => format!("AI response error: {e}"),
            Self::Timeout { stage, after } => {
                format!("AI response error: {stage} timed out after {after:?}")
            }
        }
    }
}
