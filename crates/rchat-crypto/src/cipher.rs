//! Authenticated encryption with one-time message keys.
//!
//! XChaCha20-Poly1305 AEAD keyed by a ratchet [`MessageKey`]. Every call
//! draws a fresh 24-byte nonce from the OS RNG; the sealed blob is laid out as
//! `nonce || ciphertext || tag`.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::ratchet::MessageKey;

/// Nonce size for XChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &MessageKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Encrypt `plaintext` under `key`.
///
/// Returns `nonce(24) || ciphertext || tag(16)`. A message key must seal
/// exactly one plaintext; the ratchet hands out a new key per message.
pub fn encrypt(plaintext: &[u8], key: &MessageKey) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let sealed = cipher_for(key)
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + sealed.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Split `blob` at the nonce boundary, authenticate and decrypt.
///
/// Any failure (short input, bad tag, wrong key) is reported as
/// [`CryptoError::AuthenticationFailed`].
pub fn decrypt(blob: &[u8], key: &MessageKey) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_SIZE);
    cipher_for(key)
        .decrypt(XNonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// A random message key, for tests that do not need a real ratchet.
#[cfg(any(test, feature = "test-utils"))]
pub fn random_message_key() -> MessageKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    MessageKey::from_bytes(bytes)
}
