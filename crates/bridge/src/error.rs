use std::path::PathBuf;

use shared::domain::RangeError;
use thiserror::Error;
use trigger::DeviceError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid password")]
    InvalidPassword,
    #[error("session token is missing, unknown or expired")]
    InvalidToken,
    #[error("failed to generate session token: {0}")]
    Entropy(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("config must have exactly {expected} buttons, got {found}")]
    ButtonCount { expected: usize, found: usize },
    #[error("invalid {location}: {source}")]
    OutOfRange {
        location: String,
        #[source]
        source: RangeError,
    },
    #[error("server.port must be a TCP port, got {0}")]
    Port(i64),
    #[error("midi.hold_ms must not be negative, got {0}")]
    Hold(i64),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("button index {index} out of range (0..{available})")]
    IndexOutOfRange { index: i64, available: usize },
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer went away without a clean close handshake (going-away or
    /// abnormal closure). Expected on mobile clients and page reloads.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] BoxError),
    #[error("read failed: {0}")]
    Read(#[source] BoxError),
    #[error("write failed: {0}")]
    Write(#[source] BoxError),
}

impl TransportError {
    pub fn is_expected_close(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Why a single inbound frame produced no acknowledgment.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}
