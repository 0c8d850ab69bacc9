//! Error types for the `RChat` session engine.

use rchat_crypto::CryptoError;
use rchat_proto::ProtoError;
use thiserror::Error;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session and configuration operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key derivation, encryption or signing failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Payload or wire codec error
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// Operation needs an active chat
    #[error("Not in a chat")]
    NotInChat,

    /// Create or join attempted while a chat is active
    #[error("Already in a chat; leave it first")]
    AlreadyInChat,

    /// Background derivation task failed to complete
    #[error("Background task failed: {0}")]
    Task(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
