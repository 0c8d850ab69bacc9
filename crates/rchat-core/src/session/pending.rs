//! Unacknowledged sends awaiting a server ack.
//!
//! Each send is kept until the server acks its message id. A periodic sweep
//! resends entries whose last attempt is older than the retry timeout and
//! abandons those that have used up their retries.

use tracing::{debug, warn};

use crate::config::SessionConfig;

/// When to resend and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Seconds since the last attempt before a resend is due.
    pub timeout_secs: i64,
    /// Resends allowed before the message is abandoned.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for RetryPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            timeout_secs: i64::try_from(config.retry_timeout_secs).unwrap_or(i64::MAX),
            max_retries: config.max_retries,
        }
    }
}

/// A sent message awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Unique message ID, reused by every resend.
    pub message_id: String,
    /// Plaintext content, kept for UI status display.
    pub content: String,
    /// When the message was first sent.
    pub send_timestamp: i64,
    /// When the message was last (re)sent.
    pub last_attempt: i64,
    pub sequence_number: u64,
    /// Encrypted payload, resent byte-for-byte.
    pub ciphertext: Vec<u8>,
    pub retry_count: u32,
}

impl PendingMessage {
    pub fn new(
        message_id: String,
        content: String,
        sequence_number: u64,
        ciphertext: Vec<u8>,
        now: i64,
    ) -> Self {
        Self {
            message_id,
            content,
            send_timestamp: now,
            last_attempt: now,
            sequence_number,
            ciphertext,
            retry_count: 0,
        }
    }

    fn is_due(&self, now: i64, policy: RetryPolicy) -> bool {
        now.saturating_sub(self.last_attempt) >= policy.timeout_secs
    }
}

/// Outcome of one sweep over the queue.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Entries to send again, already updated with the new attempt.
    pub resend: Vec<PendingMessage>,
    /// Entries removed after exhausting their retries.
    pub abandoned: Vec<PendingMessage>,
}

/// Pending sends in send order.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Vec<PendingMessage>,
}

impl PendingQueue {
    pub fn push(&mut self, message: PendingMessage) {
        self.entries.push(message);
    }

    /// Remove the entry for an acked message id.
    pub fn acknowledge(&mut self, message_id: &str) -> Option<PendingMessage> {
        let pos = self
            .entries
            .iter()
            .position(|m| m.message_id == message_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, message_id: &str) -> Option<&PendingMessage> {
        self.entries.iter().find(|m| m.message_id == message_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resend or abandon every entry whose last attempt is at least
    /// `policy.timeout_secs` old.
    pub fn sweep(&mut self, now: i64, policy: RetryPolicy) -> Sweep {
        let mut sweep = Sweep::default();
        let mut kept = Vec::with_capacity(self.entries.len());

        for mut message in self.entries.drain(..) {
            if !message.is_due(now, policy) {
                kept.push(message);
            } else if message.retry_count < policy.max_retries {
                message.retry_count += 1;
                message.last_attempt = now;
                debug!(
                    message_id = %message.message_id,
                    attempt = message.retry_count,
                    "Retrying unacknowledged message"
                );
                sweep.resend.push(message.clone());
                kept.push(message);
            } else {
                warn!(
                    message_id = %message.message_id,
                    retries = message.retry_count,
                    "Abandoning message after max retries"
                );
                sweep.abandoned.push(message);
            }
        }

        self.entries = kept;
        sweep
    }
}
