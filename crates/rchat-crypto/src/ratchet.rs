//! Forward-secret hash ratchet.
//!
//! Each step computes `BLAKE3(domain || key || index_le64)`, replaces the
//! chain key with the result, bumps the index and hands the same 32 bytes out
//! as the message key for the old index. The previous key is overwritten, so
//! a chain sitting at index `n` cannot reproduce any key below `n`; going back
//! requires rebuilding from the [`RatchetBase`].

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain separation prefix for ratchet steps.
const RATCHET_DOMAIN: &[u8] = b"rchat-v3-chain-ratchet-forward-secrecy:";

/// Size of chain and message keys.
pub const KEY_SIZE: usize = 32;

/// One-time key for a single message.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct MessageKey([u8; KEY_SIZE]);

impl MessageKey {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageKey([REDACTED])")
    }
}

/// Starting key of a chat's ratchet, derived once from the chat code.
///
/// Cached by the session so trial chains can be rebuilt without rerunning
/// the memory-hard derivation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RatchetBase([u8; KEY_SIZE]);

impl RatchetBase {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for RatchetBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RatchetBase([REDACTED])")
    }
}

/// Ratchet state: current chain key and the index of the next message key.
///
/// Deliberately not `Clone`: speculative work goes through
/// [`RatchetChain::clone_for_trial`] so the canonical chain is never probed
/// in place.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RatchetChain {
    key: [u8; KEY_SIZE],
    index: u64,
}

impl std::fmt::Debug for RatchetChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatchetChain")
            .field("index", &self.index)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl RatchetChain {
    /// Start a chain at index 0 from the base key.
    pub fn new(base: &RatchetBase) -> Self {
        Self {
            key: *base.as_bytes(),
            index: 0,
        }
    }

    /// Index of the key the next call to [`next`](Self::next) will produce.
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Step the chain and return the message key for the pre-step index.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> MessageKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(RATCHET_DOMAIN);
        hasher.update(&self.key);
        hasher.update(&self.index.to_le_bytes());
        let next_key = *hasher.finalize().as_bytes();

        self.key.zeroize();
        self.key = next_key;
        self.index += 1;

        MessageKey(next_key)
    }

    /// Step forward until `index == target`. No-op when `target <= index`.
    pub fn advance_to(&mut self, target: u64) {
        while self.index < target {
            let _ = self.next();
        }
    }

    /// Detached copy for trial decryption.
    pub fn clone_for_trial(&self) -> Self {
        Self {
            key: self.key,
            index: self.index,
        }
    }
}
