//! Serialized access to a controller from async tasks.

use std::sync::Arc;
use std::time::Duration;

use rchat_crypto::ChatSecrets;
use rchat_proto::ChatType;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::controller::{Outbound, RetrySweep, SessionController};
use super::event::SessionEvent;
use crate::error::{Error, Result};

/// Cloneable handle to one [`SessionController`].
///
/// Sends, receives, retry sweeps and lifecycle calls all take the same lock,
/// so ratchet advances never interleave and a sweep never races the ack that
/// clears a message. Key derivation for `create`/`join` runs on the blocking
/// pool without holding the lock.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionController>>,
}

impl SharedSession {
    pub fn new(controller: SessionController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Direct access for reads and batched operations.
    pub async fn lock(&self) -> MutexGuard<'_, SessionController> {
        self.inner.lock().await
    }

    pub async fn create(&self, code: String, chat_type: ChatType) -> Result<Vec<u8>> {
        let secrets = self.derive_secrets(code).await?;
        self.inner.lock().await.create_with_secrets(secrets, chat_type)
    }

    pub async fn join(&self, code: String) -> Result<Vec<u8>> {
        let secrets = self.derive_secrets(code).await?;
        self.inner.lock().await.join_with_secrets(secrets)
    }

    pub async fn send(&self, content: &str) -> Result<Outbound> {
        self.inner.lock().await.send(content)
    }

    pub async fn on_receive(&self, bytes: &[u8]) -> Option<SessionEvent> {
        self.inner.lock().await.on_receive(bytes)
    }

    pub async fn leave(&self) -> Result<Vec<u8>> {
        self.inner.lock().await.leave()
    }

    pub async fn retry_due(&self) -> RetrySweep {
        self.inner.lock().await.retry_due()
    }

    /// Run [`retry_due`](Self::retry_due) every `interval`, forwarding resend
    /// frames into `sink`. Stops once the receiving side of `sink` is dropped.
    ///
    /// Forwarding happens outside the lock. Each frame is re-checked against
    /// the pending queue just before it is handed to the sink, so one acked
    /// or left behind while earlier frames were waiting on a full sink is
    /// skipped. A frame already handed over is not recalled.
    pub fn spawn_retry_task(&self, interval: Duration, sink: mpsc::Sender<Vec<u8>>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    break;
                }
                let sweep = session.retry_due().await;
                for frame in sweep.resend {
                    if !session.is_pending(&frame.message_id).await {
                        debug!(message_id = %frame.message_id, "Resend no longer pending");
                        continue;
                    }
                    if sink.send(frame.bytes).await.is_err() {
                        debug!("Retry sink closed mid-sweep");
                        return;
                    }
                }
            }
            info!("Retry task stopped");
        })
    }

    async fn is_pending(&self, message_id: &str) -> bool {
        self.inner
            .lock()
            .await
            .pending()
            .is_some_and(|p| p.get(message_id).is_some())
    }

    async fn derive_secrets(&self, code: String) -> Result<ChatSecrets> {
        if self.inner.lock().await.is_active() {
            return Err(Error::AlreadyInChat);
        }
        tokio::task::spawn_blocking(move || ChatSecrets::derive(&code))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
            .map_err(Error::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;

    #[tokio::test]
    async fn invalid_code_surfaces_crypto_error() {
        let session = SharedSession::new(SessionController::new(&Config::default()));
        let err = session.join("not a code".into()).await.unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
        assert!(!session.lock().await.is_active());
    }

    #[tokio::test]
    async fn idle_session_has_nothing_to_retry() {
        let clock = ManualClock::new(0);
        let session = SharedSession::new(SessionController::with_clock(
            &Config::default(),
            Arc::new(clock.clone()),
        ));
        clock.advance(60);
        let sweep = session.retry_due().await;
        assert!(sweep.resend.is_empty());
        assert!(matches!(session.send("x").await, Err(Error::NotInChat)));
    }

    #[tokio::test]
    async fn retry_task_stops_when_sink_dropped() {
        let session = SharedSession::new(SessionController::new(&Config::default()));
        let (tx, rx) = mpsc::channel(4);
        let handle = session.spawn_retry_task(Duration::from_millis(5), tx);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("retry task did not stop")
            .unwrap();
    }
}
