//! Drives a [`Channel`] through chat turns for a single session.

use mbti_llm::LlmProvider;
use tokio_stream::StreamExt as _;

use crate::channel::{Channel, ChannelError};
use crate::orchestrator::TurnOrchestrator;
use crate::session::Session;

/// What a line of user input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Exit,
    Reset,
    Persona(&'a str),
    Say(&'a str),
}

impl<'a> Command<'a> {
    /// `exit`/`quit` end the conversation, `/reset` clears history,
    /// `/persona CODE` switches persona. Anything else is a message.
    #[must_use]
    pub fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            return Self::Exit;
        }
        if trimmed == "/reset" {
            return Self::Reset;
        }
        if let Some(rest) = trimmed.strip_prefix("/persona")
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            return Self::Persona(rest.trim());
        }
        Self::Say(input)
    }
}

/// Read messages from `channel` until EOF or an exit command, answering each one.
///
/// # Errors
///
/// Returns an error only if the channel itself fails; turn failures are sent to
/// the user as text.
pub async fn run<P, C>(
    orchestrator: &TurnOrchestrator<P>,
    channel: &mut C,
    session: &mut Session,
) -> Result<(), ChannelError>
where
    P: LlmProvider,
    C: Channel,
{
    while let Some(msg) = channel.recv().await? {
        match Command::parse(&msg.text) {
            Command::Exit => break,
            Command::Reset => {
                orchestrator.reset(session);
                channel.send("Conversation cleared.").await?;
            }
            Command::Persona(code) => {
                let reply = orchestrator
                    .set_persona(session, code)
                    .unwrap_or_else(|e| e.user_message());
                channel.send(&reply).await?;
            }
            Command::Say(text) => {
                if channel.supports_streaming() {
                    stream_turn(orchestrator, channel, session, text).await?;
                } else {
                    let reply = orchestrator.reply(session, text).await;
                    channel.send(&reply).await?;
                }
            }
        }
    }
    tracing::debug!(session = session.id(), "conversation ended");
    Ok(())
}

async fn stream_turn<P, C>(
    orchestrator: &TurnOrchestrator<P>,
    channel: &mut C,
    session: &mut Session,
    text: &str,
) -> Result<(), ChannelError>
where
    P: LlmProvider,
    C: Channel,
{
    let mut stream = match orchestrator.send_message_stream(session, text).await {
        Ok(stream) => stream,
        Err(e) => return channel.send(&e.user_message()).await,
    };

    let mut failure = None;
    while let Some(delta) = stream.next().await {
        match delta {
            Ok(delta) => channel.send_chunk(&delta).await?,
            Err(e) => failure = Some(e),
        }
    }
    drop(stream);

    channel.flush_chunks().await?;
    if let Some(e) = failure {
        channel.send(&e.user_message()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Arc;

    use mbti_llm::EmbedFuture;
    use mbti_llm::mock::MockProvider;
    use mbti_memory::{LocalVectorStore, Retriever, VectorPoint, VectorStore};

    use super::*;
    use crate::channel::ChannelMessage;
    use crate::persona::{Mbti, PersonaCatalog};

    #[derive(Default)]
    struct ScriptedChannel {
        inbox: VecDeque<String>,
        sent: Vec<String>,
        chunks: String,
        streaming: bool,
    }

    impl ScriptedChannel {
        fn new(lines: &[&str], streaming: bool) -> Self {
            Self {
                inbox: lines.iter().map(|s| (*s).to_owned()).collect(),
                streaming,
                ..Self::default()
            }
        }
    }

    impl Channel for ScriptedChannel {
        async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
            Ok(self.inbox.pop_front().map(ChannelMessage::new))
        }

        async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
            self.sent.push(text.to_owned());
            Ok(())
        }

        async fn send_chunk(&mut self, chunk: &str) -> Result<(), ChannelError> {
            self.chunks.push_str(chunk);
            Ok(())
        }

        async fn flush_chunks(&mut self) -> Result<(), ChannelError> {
            if !self.chunks.is_empty() {
                self.sent.push(std::mem::take(&mut self.chunks));
            }
            Ok(())
        }

        fn supports_streaming(&self) -> bool {
            self.streaming
        }
    }

    async fn orchestrator(provider: MockProvider) -> TurnOrchestrator<MockProvider> {
        let store = Arc::new(LocalVectorStore::new());
        store.ensure_collection("mbti_infp", 2).await.unwrap();
        store
            .upsert(
                "mbti_infp",
                vec![VectorPoint {
                    id: "p".into(),
                    vector: vec![1.0, 0.0],
                    payload: [("content".to_owned(), serde_json::json!("INFPs dream."))]
                        .into_iter()
                        .collect(),
                }],
            )
            .await
            .unwrap();
        let embed: mbti_memory::EmbedFn = Arc::new(|_text: &str| -> EmbedFuture {
            Box::pin(async move { Ok(vec![1.0, 0.0]) })
        });
        TurnOrchestrator::new(
            Arc::new(provider),
            Arc::new(Retriever::new(store, embed, "mbti_")),
            PersonaCatalog::with_defaults(Path::new("t")),
        )
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("  QUIT \n"), Command::Exit);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/persona infp"), Command::Persona("infp"));
        assert_eq!(Command::parse("/persona"), Command::Persona(""));
        assert_eq!(Command::parse("/personality"), Command::Say("/personality"));
        assert_eq!(Command::parse("hello"), Command::Say("hello"));
    }

    #[tokio::test]
    async fn scripted_conversation() {
        let orch = orchestrator(MockProvider::with_responses(vec!["hi!".into()])).await;
        let mut channel = ScriptedChannel::new(
            &["hello", "/persona INFP", "hello", "/persona XYZ", "exit", "ignored"],
            false,
        );
        let mut session = Session::new("cli");

        run(&orch, &mut channel, &mut session).await.unwrap();

        assert_eq!(channel.sent[0], "Please select an MBTI type first.");
        assert_eq!(channel.sent[1], "Persona set to INFP.");
        assert_eq!(channel.sent[2], "hi!");
        assert!(channel.sent[3].contains("not an MBTI type"));
        assert_eq!(channel.sent.len(), 4);
        assert_eq!(channel.inbox.len(), 1);
        assert_eq!(session.persona(), Some(Mbti::Infp));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn streamed_reply_is_flushed_and_committed() {
        let provider = MockProvider::with_responses(vec!["streamed".into()]).with_streaming();
        let orch = orchestrator(provider).await;
        let mut channel = ScriptedChannel::new(&["/persona infp", "tell me", "/reset"], true);
        let mut session = Session::new("cli");

        run(&orch, &mut channel, &mut session).await.unwrap();

        assert_eq!(channel.sent[1], "streamed");
        assert_eq!(channel.sent[2], "Conversation cleared.");
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn stream_failure_reported_after_partial_output() {
        let provider = MockProvider::with_responses(vec!["abcdef".into()]).with_stream_error_after(3);
        let orch = orchestrator(provider).await;
        let mut channel = ScriptedChannel::new(&["/persona INFP", "go"], true);
        let mut session = Session::new("cli");

        run(&orch, &mut channel, &mut session).await.unwrap();

        assert_eq!(channel.sent[1], "abc");
        assert!(channel.sent[2].starts_with("AI response error"));
        assert!(session.history().is_empty());
    }
}
