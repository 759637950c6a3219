//! HTTP front end for persona chat sessions.

mod error;
mod handlers;
mod router;
mod server;

#[cfg(test)]
mod test_support;

pub use error::GatewayError;
pub use server::GatewayServer;
