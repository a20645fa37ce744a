//! Error types for the tunnel client.

use thiserror::Error;

/// Result type alias for tunnel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or running a tunnel session.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level connection failure
    #[error("dial failed: {0}")]
    Dial(String),

    /// TLS handshake or record-layer error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Gateway certificate could not be parsed
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Unexpected acknowledgement byte in a handshake response
    #[error("protocol mismatch: expected ack {expected:#04x}, got {actual:#04x}")]
    ProtocolMismatch {
        /// Ack byte the channel role requires
        expected: u8,
        /// Ack byte the gateway answered with
        actual: u8,
    },

    /// Malformed frame or response
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Handshake timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// I/O error on a channel or the virtual interface
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session token acquisition or validation failure
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new dial error
    pub fn dial(msg: impl Into<String>) -> Self {
        Error::Dial(msg.into())
    }

    /// Create a new TLS error
    pub fn tls(msg: impl Into<String>) -> Self {
        Error::Tls(msg.into())
    }

    /// Create a new certificate error
    pub fn certificate(msg: impl Into<String>) -> Self {
        Error::Certificate(msg.into())
    }

    /// Create a new frame error
    pub fn frame(msg: impl Into<String>) -> Self {
        Error::InvalidFrame(msg.into())
    }

    /// Create a new authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Check if this error is fatal to the session.
    ///
    /// Every failure tears the session down in the baseline design; a
    /// supervisor that adds reconnection would carve out the retryable
    /// cases here (dial failures and timeouts being the candidates).
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Check if this error indicates a corrupted channel handshake
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, Error::ProtocolMismatch { .. })
    }
}
