//! Signing identity management.
//!
//! Each running participant holds an ephemeral Ed25519 keypair used to sign
//! the messages it sends. The public half travels inside every payload so
//! receivers can verify authorship; a receiver builds a verifier-only
//! identity from those bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Ed25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 identity, with or without the private half.
pub struct SigningIdentity {
    signing: Option<SigningKey>,
    verifying: VerifyingKey,
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("public", &hex::encode(self.verifying.as_bytes()))
            .field(
                "secret",
                &if self.signing.is_some() {
                    "[REDACTED]"
                } else {
                    "<none>"
                },
            )
            .finish()
    }
}

impl SigningIdentity {
    /// Generate a new random signing identity.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self {
            signing: Some(signing),
            verifying,
        }
    }

    /// Reconstruct from raw 32-byte secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        let signing = SigningKey::from_bytes(&arr);
        arr.zeroize();
        let verifying = signing.verifying_key();
        Ok(Self {
            signing: Some(signing),
            verifying,
        })
    }

    /// Build a verifier-only identity from a sender's public key.
    pub fn from_public_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_SIZE,
                    actual: bytes.len(),
                })?;
        let verifying = VerifyingKey::from_bytes(&arr)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self {
            signing: None,
            verifying,
        })
    }

    /// Whether this identity holds a private key.
    pub const fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    /// Get the public key as raw bytes.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.verifying.to_bytes()
    }

    /// Human-readable fingerprint of the public key.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(self.verifying.as_bytes())
    }

    /// Sign `message`. Fails with [`CryptoError::CannotSign`] on a
    /// verifier-only identity.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE], CryptoError> {
        let signing = self.signing.as_ref().ok_or(CryptoError::CannotSign)?;
        Ok(signing.sign(message).to_bytes())
    }

    /// Verify `signature` over `message` against this identity's public key.
    ///
    /// Never errors: a signature of the wrong length or one that does not
    /// verify yields `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig_bytes) = <[u8; SIGNATURE_SIZE]>::try_from(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);
        self.verifying.verify(message, &signature).is_ok()
    }
}

/// The byte string a message signature covers:
/// `content || sequence_number(le64) || chain_index(le64)`.
pub fn signing_message(content: &str, sequence_number: u64, chain_index: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(content.len() + 16);
    message.extend_from_slice(content.as_bytes());
    message.extend_from_slice(&sequence_number.to_le_bytes());
    message.extend_from_slice(&chain_index.to_le_bytes());
    message
}

/// Verify a signature against raw public key bytes. Malformed keys or
/// signatures verify `false`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    SigningIdentity::from_public_bytes(public_key)
        .is_ok_and(|identity| identity.verify(message, signature))
}

/// Compute a colon-separated hex fingerprint from raw public key bytes.
pub fn fingerprint_of(pubkey_bytes: &[u8; PUBLIC_KEY_SIZE]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(pubkey_bytes);
    hash.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Constant-time byte comparison. Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
