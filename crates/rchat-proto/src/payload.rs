//! Plaintext message structure sealed inside every `SendMessage`.
//!
//! Field order is fixed:
//!
//! | field | encoding |
//! |---|---|
//! | username | u64 length + UTF-8 |
//! | content | u64 length + UTF-8 |
//! | timestamp | i64 (unix seconds) |
//! | sequence_number | u64 |
//! | sender_public_key | u64 length + bytes (32) |
//! | signature | u64 length + bytes (64) |
//! | chain_key_index | u64 |

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// A signed chat message, before encryption and after decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub username: String,
    pub content: String,
    pub timestamp: i64,
    pub sequence_number: u64,
    pub sender_public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub chain_key_index: u64,
}

impl MessagePayload {
    /// Serialize to the fixed binary layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        bincode::serialize(self).map_err(|e| ProtoError::encode(&e))
    }

    /// Parse the fixed binary layout. Bytes after the last field are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        bincode::deserialize(data).map_err(|e| ProtoError::payload(&e))
    }
}
