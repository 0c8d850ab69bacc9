//! Chat code generation.
//!
//! Two flavours of out-of-band secret:
//! - full: 512 random bits, base64url without padding (86 characters)
//! - numeric: 6 decimal digits, easy to read aloud but only ~20 bits of
//!   entropy, which is why numeric codes get an extra Argon2id expansion

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use zeroize::Zeroizing;

/// Length of the decoded secret behind a full chat code.
pub const CODE_SECRET_LEN: usize = 64;

/// Number of digits in a numeric chat code.
pub const NUMERIC_CODE_LEN: usize = 6;

/// Generate a full 512-bit chat code.
pub fn generate_chat_code() -> String {
    let mut bytes = Zeroizing::new([0u8; CODE_SECRET_LEN]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes.as_slice())
}

/// Generate a 6-digit numeric chat code in `100000..=999999`.
pub fn generate_numeric_chat_code() -> String {
    let code: u32 = OsRng.gen_range(100_000..=999_999);
    format!("{code:06}")
}

/// Whether `code` is a numeric (6 ASCII digits) chat code.
pub fn is_numeric_code(code: &str) -> bool {
    code.len() == NUMERIC_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
