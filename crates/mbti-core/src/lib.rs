//! Configuration, personas, prompt assembly and the chat-turn lifecycle.

pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod secret;
pub mod session;

pub use channel::{Channel, ChannelError, ChannelMessage};
pub use config::Config;
pub use error::{TurnError, TurnStage};
pub use orchestrator::{ReplyStream, TurnOrchestrator};
pub use persona::{Mbti, Persona, PersonaCatalog, UnknownPersona};
pub use prompt::{ComposedPrompt, PromptComposer};
pub use session::{Exchange, Session, SessionRegistry, SessionState};
