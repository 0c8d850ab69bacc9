//! Crypto error types.

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid chat code")]
    InvalidChatCode,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed: ciphertext rejected")]
    AuthenticationFailed,

    #[error("Cannot sign: identity holds no private key")]
    CannotSign,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
