use awc::error::{WsClientError, WsProtocolError};

use crate::session::ConnectionStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Handshake failure. Kept as text, awc's error is not `Send`.
    #[error("Client error: {0}")]
    Connect(String),

    #[error("Websocket protocol error: {0}")]
    Protocol(#[from] WsProtocolError),

    #[error("Received text frame that is not valid UTF-8")]
    Malformed(#[from] std::str::Utf8Error),

    #[error("Cannot {action} while {status:?}")]
    InvalidState {
        action: &'static str,
        status: ConnectionStatus,
    },

    #[error("Invalid value {value:?} for {name}")]
    Setting { name: &'static str, value: String },
}

impl From<WsClientError> for Error {
    fn from(e: WsClientError) -> Self {
        Self::Connect(e.to_string())
    }
}
