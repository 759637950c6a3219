use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid bind address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
