//! Error types for qpop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("POP3 error on {command}: {message}")]
    Protocol { command: String, message: String },

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Cannot decode {content_type} payload as {charset}")]
    Decode {
        content_type: String,
        charset: String,
    },

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Whether a reconnect followed by another attempt may succeed.
    ///
    /// Server-side `-ERR` replies and a stream that went away under us
    /// (idle timeouts, TLS end-of-stream) qualify. Credential, parsing and
    /// configuration failures never do.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::ConnectionClosed | Self::NotConnected
        )
    }

    pub(crate) fn protocol(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            command: command.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
