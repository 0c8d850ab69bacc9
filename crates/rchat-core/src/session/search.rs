//! Receive-side ratchet index search.
//!
//! A received ciphertext does not say which ratchet key sealed it. The
//! receiver walks a detached trial chain across a bounded window of indices
//! around its own position and accepts the first candidate whose key
//! authenticates the ciphertext and whose payload names that same index.

use std::ops::Range;

use rchat_crypto::{RatchetBase, RatchetChain, decrypt};
use rchat_proto::MessagePayload;
use tracing::trace;

/// Indices tried around the canonical ratchet index: `[index - behind,
/// index + ahead)`, clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub behind: u64,
    pub ahead: u64,
}

impl SearchWindow {
    pub const fn bounds(&self, current: u64) -> Range<u64> {
        current.saturating_sub(self.behind)..current.saturating_add(self.ahead)
    }
}

/// A candidate index that decrypted and parsed consistently.
#[derive(Debug)]
pub(crate) struct SearchHit {
    pub index: u64,
    pub payload: MessagePayload,
}

/// Find the ratchet index that sealed `ciphertext`.
///
/// `canonical` is only read. When the window starts behind it, the trial
/// chain is rebuilt from `base`, since a chain cannot step backwards.
pub(crate) fn find_message(
    base: &RatchetBase,
    canonical: &RatchetChain,
    window: SearchWindow,
    ciphertext: &[u8],
) -> Option<SearchHit> {
    let range = window.bounds(canonical.index());

    let mut trial = if range.start < canonical.index() {
        RatchetChain::new(base)
    } else {
        canonical.clone_for_trial()
    };
    trial.advance_to(range.start);

    for candidate in range {
        let key = trial.next();
        let Ok(plaintext) = decrypt(ciphertext, &key) else {
            trace!(candidate, "Candidate key did not authenticate");
            continue;
        };
        match MessagePayload::from_bytes(&plaintext) {
            Ok(payload) if payload.chain_key_index == candidate => {
                trace!(candidate, "Candidate key matched");
                return Some(SearchHit {
                    index: candidate,
                    payload,
                });
            }
            Ok(payload) => {
                trace!(
                    candidate,
                    embedded = payload.chain_key_index,
                    "Chain index mismatch"
                );
            }
            Err(e) => {
                trace!(candidate, error = %e, "Decrypted payload did not parse");
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rchat_crypto::{MessageKey, encrypt};

    const WINDOW: SearchWindow = SearchWindow {
        behind: 5,
        ahead: 20,
    };

    fn base() -> RatchetBase {
        RatchetBase::from_bytes([7u8; 32])
    }

    fn key_at(index: u64) -> MessageKey {
        let mut chain = RatchetChain::new(&base());
        chain.advance_to(index);
        chain.next()
    }

    fn payload(chain_key_index: u64) -> MessagePayload {
        MessagePayload {
            username: "alice".into(),
            content: format!("message {chain_key_index}"),
            timestamp: 0,
            sequence_number: 0,
            sender_public_key: vec![0; 32],
            signature: vec![0; 64],
            chain_key_index,
        }
    }

    fn sealed_at(index: u64) -> Vec<u8> {
        encrypt(&payload(index).to_bytes().unwrap(), &key_at(index)).unwrap()
    }

    fn canonical_at(index: u64) -> RatchetChain {
        let mut chain = RatchetChain::new(&base());
        chain.advance_to(index);
        chain
    }

    #[test]
    fn window_bounds_clamp_at_zero() {
        assert_eq!(WINDOW.bounds(0), 0..20);
        assert_eq!(WINDOW.bounds(3), 0..23);
        assert_eq!(WINDOW.bounds(10), 5..30);
        assert_eq!(WINDOW.bounds(u64::MAX), u64::MAX - 5..u64::MAX);
    }

    #[test]
    fn finds_current_index() {
        let hit = find_message(&base(), &canonical_at(0), WINDOW, &sealed_at(0)).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.payload.content, "message 0");
    }

    #[test]
    fn finds_index_ahead_of_canonical() {
        let hit = find_message(&base(), &canonical_at(2), WINDOW, &sealed_at(15)).unwrap();
        assert_eq!(hit.index, 15);
    }

    #[test]
    fn finds_index_behind_canonical() {
        let hit = find_message(&base(), &canonical_at(10), WINDOW, &sealed_at(6)).unwrap();
        assert_eq!(hit.index, 6);
    }

    #[test]
    fn out_of_window_is_not_found() {
        assert!(find_message(&base(), &canonical_at(0), WINDOW, &sealed_at(20)).is_none());
        assert!(find_message(&base(), &canonical_at(10), WINDOW, &sealed_at(4)).is_none());
    }

    #[test]
    fn canonical_chain_is_not_advanced() {
        let canonical = canonical_at(3);
        let _ = find_message(&base(), &canonical, WINDOW, &sealed_at(9)).unwrap();
        assert_eq!(canonical.index(), 3);
    }

    #[test]
    fn mismatched_embedded_index_is_skipped() {
        // Sealed with the key for 4 but claiming index 9
        let ciphertext = encrypt(&payload(9).to_bytes().unwrap(), &key_at(4)).unwrap();
        assert!(find_message(&base(), &canonical_at(0), WINDOW, &ciphertext).is_none());
    }

    #[test]
    fn unparseable_plaintext_is_skipped() {
        let ciphertext = encrypt(b"not a payload", &key_at(1)).unwrap();
        assert!(find_message(&base(), &canonical_at(0), WINDOW, &ciphertext).is_none());
    }

    #[test]
    fn garbage_ciphertext_is_not_found() {
        assert!(find_message(&base(), &canonical_at(0), WINDOW, &[0u8; 10]).is_none());
        assert!(find_message(&base(), &canonical_at(0), WINDOW, &[0u8; 80]).is_none());
    }
}
