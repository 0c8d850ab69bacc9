//! Chat session engine.
//!
//! [`SessionController`] owns one chat at a time and turns user actions and
//! inbound server frames into outbound frames and [`SessionEvent`]s. It never
//! performs I/O; [`SharedSession`] serializes access to it for async callers.

mod controller;
mod event;
mod pending;
mod search;
mod shared;

pub use controller::{Outbound, RetrySweep, SessionController};
pub use event::{DecryptedMessage, SessionEvent};
pub use pending::{PendingMessage, PendingQueue, RetryPolicy, Sweep};
pub use search::SearchWindow;
pub use shared::SharedSession;
