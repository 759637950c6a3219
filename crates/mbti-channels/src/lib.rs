//! Front-end channels for mbti-chat.

pub mod cli;

pub use cli::CliChannel;
