//! `RChat` E2E Encryption Library
//!
//! Everything a chat participant derives from the shared chat code, plus the
//! per-message primitives. All functions are pure: no I/O, no global state.
//!
//! ## Crypto primitives
//!
//! - **Derivation**: BLAKE3 + SHA3-512 room id; Argon2id session key and ratchet base
//! - **Ratchet**: BLAKE3 hash chain, one 32-byte key per message, forward-only
//! - **Encryption**: XChaCha20-Poly1305 AEAD, 24-byte random nonce, `nonce || ct || tag`
//! - **Identity**: Ed25519 signatures over `content || seq || chain_index`

pub mod chat_code;
pub mod cipher;
pub mod derivation;
pub mod error;
pub mod identity;
pub mod ratchet;

pub use chat_code::{generate_chat_code, generate_numeric_chat_code, is_numeric_code};
#[cfg(any(test, feature = "test-utils"))]
pub use cipher::random_message_key;
pub use cipher::{NONCE_SIZE, TAG_SIZE, decrypt, encrypt};
pub use derivation::{
    ChatSecrets, KdfParams, RoomId, SessionKey, derive_ratchet_base, derive_room_id,
    derive_session_key,
};
pub use error::CryptoError;
pub use identity::{
    PUBLIC_KEY_SIZE, SIGNATURE_SIZE, SigningIdentity, constant_time_eq, fingerprint_of,
    signing_message, verify_signature,
};
pub use ratchet::{MessageKey, RatchetBase, RatchetChain};
