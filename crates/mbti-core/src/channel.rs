//! Front-end abstraction for the conversation loop.

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub text: String,
}

impl ChannelMessage {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Where user text comes from and replies go to.
///
/// A streamed reply is a run of `send_chunk` calls closed by one `flush_chunks`;
/// `send` always carries a complete message.
pub trait Channel: Send {
    /// Next user message, or `None` once input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn recv(&mut self)
    -> impl Future<Output = Result<Option<ChannelMessage>, ChannelError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn send_chunk(&mut self, chunk: &str) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// End the streamed reply started by `send_chunk`. A no-op when nothing was streamed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    fn flush_chunks(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn supports_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ChannelError::from(std::io::Error::other("broken pipe"));
        assert_eq!(err.to_string(), "I/O error: broken pipe");
    }
}
