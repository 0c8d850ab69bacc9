//! `RChat` binary messages
//!
//! Two layers, both encoded with bincode's default options: fixed-width
//! little-endian integers, `u64` length prefixes on strings and byte arrays,
//! `u32` enum variant numbers.
//!
//! - [`MessagePayload`]: the signed plaintext sealed inside each message
//! - [`ClientMessage`] / [`ServerMessage`]: the control and data frames
//!   exchanged with the relay server

pub mod error;
pub mod payload;
pub mod wire;

pub use error::ProtoError;
pub use payload::MessagePayload;
pub use wire::{ChatType, ClientMessage, ServerMessage};
