//! `RChat` Core Library
//!
//! The session engine embedded by `RChat` clients:
//! - Session lifecycle, encrypted send and receive-side ratchet search
//! - Pending-send tracking and retry sweeps
//! - Configuration resolution and hierarchy
//! - Tracing initialisation and common error types
//!
//! No I/O happens here. The transport hands in raw server frames and sends
//! whatever bytes come back out.

pub mod clock;
pub mod config;
pub mod error;
pub mod session;
pub mod tracing_init;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use session::{
    DecryptedMessage, Outbound, RetrySweep, SessionController, SessionEvent, SharedSession,
};
