//! Key material derived from a shared chat code.
//!
//! Three independent, deterministic derivations:
//!
//! - **Room id**: `SHA3-512("rchat-v3-double-hash-domain:" || BLAKE3("rchat-v3-room-id-domain-sep:" || code))`,
//!   base64url without padding. Safe to hand to the server.
//! - **Session key**: 64-byte chat secret (Argon2id expansion of a 6-digit
//!   code, or the base64url-decoded 512-bit code), salted with
//!   `BLAKE3("rchat-v3-e2ee-salt-domain:" || secret)` and hardened with a
//!   second Argon2id pass.
//! - **Ratchet base**: Argon2id over the raw code bytes with a constant salt.
//!
//! Every parameter here is part of the wire contract with other clients.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha3::{Digest, Sha3_512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::chat_code::{CODE_SECRET_LEN, is_numeric_code};
use crate::error::CryptoError;
use crate::ratchet::{KEY_SIZE, RatchetBase};

const ROOM_ID_DOMAIN: &[u8] = b"rchat-v3-room-id-domain-sep:";
const ROOM_ID_SECOND_DOMAIN: &[u8] = b"rchat-v3-double-hash-domain:";
const NUMERIC_SALT: &[u8] = b"rchat-v3-numeric-extreme-salt";
const SESSION_SALT_DOMAIN: &[u8] = b"rchat-v3-e2ee-salt-domain:";
const RATCHET_BASE_SALT: &[u8] = b"rchat-v3-chain-key-init";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub t_cost: u32,
    pub m_cost_kib: u32,
    pub p_cost: u32,
    pub output_len: usize,
}

/// Expansion of a low-entropy 6-digit code into a 64-byte secret.
pub const NUMERIC_EXPANSION_PARAMS: KdfParams = KdfParams {
    t_cost: 3,
    m_cost_kib: 64 * 1024,
    p_cost: 4,
    output_len: CODE_SECRET_LEN,
};

/// Final session key hardening.
pub const SESSION_KEY_PARAMS: KdfParams = KdfParams {
    t_cost: 4,
    m_cost_kib: 128 * 1024,
    p_cost: 8,
    output_len: KEY_SIZE,
};

/// Ratchet base derivation.
pub const RATCHET_BASE_PARAMS: KdfParams = KdfParams {
    t_cost: 4,
    m_cost_kib: 128 * 1024,
    p_cost: 8,
    output_len: KEY_SIZE,
};

fn argon2id(params: KdfParams, secret: &[u8], salt: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    let params = Params::new(
        params.m_cost_kib,
        params.t_cost,
        params.p_cost,
        Some(params.output_len),
    )
    .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(secret, salt, out)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
}

/// Server-side routing key for a chat. Reveals nothing about the code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a room id received from the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte symmetric key owned by one chat session. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Derive the room id. Pure and infallible.
pub fn derive_room_id(code: &str) -> RoomId {
    let mut first = blake3::Hasher::new();
    first.update(ROOM_ID_DOMAIN);
    first.update(code.as_bytes());
    let first = first.finalize();

    let mut second = Sha3_512::new();
    second.update(ROOM_ID_SECOND_DOMAIN);
    second.update(first.as_bytes());
    let digest = second.finalize();

    RoomId(URL_SAFE_NO_PAD.encode(digest))
}

/// Turn a chat code into the 64-byte chat secret.
fn chat_secret(code: &str) -> Result<Zeroizing<[u8; CODE_SECRET_LEN]>, CryptoError> {
    let mut secret = Zeroizing::new([0u8; CODE_SECRET_LEN]);
    if is_numeric_code(code) {
        argon2id(
            NUMERIC_EXPANSION_PARAMS,
            code.as_bytes(),
            NUMERIC_SALT,
            secret.as_mut_slice(),
        )?;
        return Ok(secret);
    }

    let decoded = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(code)
            .map_err(|_| CryptoError::InvalidChatCode)?,
    );
    if decoded.len() != CODE_SECRET_LEN {
        return Err(CryptoError::InvalidChatCode);
    }
    secret.copy_from_slice(&decoded);
    Ok(secret)
}

/// Derive the session key.
///
/// Fails with [`CryptoError::InvalidChatCode`] when a non-numeric code is not
/// unpadded base64url of exactly 64 bytes.
pub fn derive_session_key(code: &str) -> Result<SessionKey, CryptoError> {
    let secret = chat_secret(code)?;

    let mut salt_hasher = blake3::Hasher::new();
    salt_hasher.update(SESSION_SALT_DOMAIN);
    salt_hasher.update(secret.as_slice());
    let salt = salt_hasher.finalize();

    let mut key = SessionKey([0u8; KEY_SIZE]);
    argon2id(SESSION_KEY_PARAMS, secret.as_slice(), salt.as_bytes(), &mut key.0)?;
    Ok(key)
}

/// Derive the ratchet base key from the raw code bytes.
pub fn derive_ratchet_base(code: &str) -> Result<RatchetBase, CryptoError> {
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    argon2id(
        RATCHET_BASE_PARAMS,
        code.as_bytes(),
        RATCHET_BASE_SALT,
        out.as_mut_slice(),
    )?;
    Ok(RatchetBase::from_bytes(*out))
}

/// Everything a session needs from a chat code, derived once.
#[derive(Clone)]
pub struct ChatSecrets {
    pub room_id: RoomId,
    pub session_key: SessionKey,
    pub ratchet_base: RatchetBase,
}

impl std::fmt::Debug for ChatSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSecrets")
            .field("room_id", &self.room_id)
            .field("session_key", &"[REDACTED]")
            .field("ratchet_base", &"[REDACTED]")
            .finish()
    }
}

impl ChatSecrets {
    /// Run all three derivations. The code is validated first so a malformed
    /// code fails before the ratchet base is computed.
    pub fn derive(code: &str) -> Result<Self, CryptoError> {
        let session_key = derive_session_key(code)?;
        let ratchet_base = derive_ratchet_base(code)?;
        let room_id = derive_room_id(code);
        tracing::debug!(room_id = %room_id, "Derived chat secrets");
        Ok(Self {
            room_id,
            session_key,
            ratchet_base,
        })
    }
}
