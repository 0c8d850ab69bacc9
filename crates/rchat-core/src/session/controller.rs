//! Session lifecycle: create/join, send, receive, retry, leave.

use std::sync::Arc;

use rchat_crypto::{
    ChatSecrets, RatchetBase, RatchetChain, RoomId, SessionKey, SigningIdentity,
    constant_time_eq, encrypt, fingerprint_of, generate_chat_code, generate_numeric_chat_code,
    signing_message, verify_signature,
};
use rchat_proto::{ChatType, ClientMessage, MessagePayload, ServerMessage};
use tracing::{debug, info, warn};

use super::event::{DecryptedMessage, SessionEvent};
use super::pending::{PendingMessage, PendingQueue, RetryPolicy};
use super::search::{SearchWindow, find_message};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};

/// An encoded `SendMessage` frame and the id the server will ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub message_id: String,
    pub bytes: Vec<u8>,
}

/// Result of a retry sweep.
#[derive(Debug, Default)]
pub struct RetrySweep {
    /// Frames to send again, identical to the original sends.
    pub resend: Vec<Outbound>,
    /// Message ids given up on.
    pub abandoned: Vec<String>,
}

/// Secrets and counters of the chat in progress. Key material is wiped when
/// this is dropped.
struct ActiveChat {
    room_id: RoomId,
    /// Unknown to a joiner until the server confirms the join.
    chat_type: Option<ChatType>,
    session_key: SessionKey,
    ratchet_base: RatchetBase,
    ratchet: RatchetChain,
    sequence: u64,
    pending: PendingQueue,
}

impl ActiveChat {
    fn new(secrets: ChatSecrets, chat_type: Option<ChatType>) -> Self {
        let ChatSecrets {
            room_id,
            session_key,
            ratchet_base,
        } = secrets;
        let ratchet = RatchetChain::new(&ratchet_base);
        Self {
            room_id,
            chat_type,
            session_key,
            ratchet_base,
            ratchet,
            sequence: 0,
            pending: PendingQueue::default(),
        }
    }

    fn is_room(&self, room_id: &str) -> bool {
        constant_time_eq(room_id.as_bytes(), self.room_id.as_str().as_bytes())
    }

    fn send_frame(&self, message_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let frame = ClientMessage::SendMessage {
            room_id: self.room_id.as_str().to_owned(),
            encrypted_payload: ciphertext.to_vec(),
            message_id: message_id.to_owned(),
        }
        .to_bytes()?;
        Ok(frame)
    }
}

/// Encrypted chat session for one participant.
///
/// Holds at most one active chat. All methods are synchronous and pure with
/// respect to I/O: inbound frames go in, outbound frames and events come out.
/// Callers sharing a controller across tasks must serialize access, see
/// [`SharedSession`](super::SharedSession).
pub struct SessionController {
    username: String,
    numeric_codes: bool,
    window: SearchWindow,
    retry: RetryPolicy,
    max_inbound_bytes: usize,
    identity: SigningIdentity,
    clock: Arc<dyn Clock>,
    active: Option<ActiveChat>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("username", &self.username)
            .field("identity", &self.identity)
            .field("room_id", &self.room_id())
            .field("chain_index", &self.chain_index())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Create an idle controller with a fresh signing identity.
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_identity(config, SigningIdentity::generate(), clock)
    }

    /// Create an idle controller around an existing identity.
    pub fn with_identity(config: &Config, identity: SigningIdentity, clock: Arc<dyn Clock>) -> Self {
        Self {
            username: config.client.username.clone(),
            numeric_codes: config.client.numeric_codes,
            window: config.session.search_window(),
            retry: RetryPolicy::from(&config.session),
            max_inbound_bytes: config.session.max_inbound_bytes,
            identity,
            clock,
            active: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub const fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub fn fingerprint(&self) -> String {
        self.identity.fingerprint()
    }

    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.active.as_ref().map(|a| &a.room_id)
    }

    pub fn chat_type(&self) -> Option<ChatType> {
        self.active.as_ref().and_then(|a| a.chat_type)
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.active.as_ref().map(|a| &a.session_key)
    }

    /// Canonical ratchet index: the chain position of the next send.
    pub fn chain_index(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.ratchet.index())
    }

    /// Sequence number the next send will carry.
    pub fn sequence_number(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.sequence)
    }

    pub fn pending(&self) -> Option<&PendingQueue> {
        self.active.as_ref().map(|a| &a.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().map_or(0, PendingQueue::len)
    }

    /// Fresh chat code in the configured flavour.
    pub fn generate_chat_code(&self) -> String {
        if self.numeric_codes {
            generate_numeric_chat_code()
        } else {
            generate_chat_code()
        }
    }

    /// Derive secrets from `code` and start a new chat.
    ///
    /// Returns the encoded `CreateChat` frame.
    pub fn create(&mut self, code: &str, chat_type: ChatType) -> Result<Vec<u8>> {
        self.ensure_idle()?;
        let secrets = ChatSecrets::derive(code)?;
        self.create_with_secrets(secrets, chat_type)
    }

    /// Start a new chat from precomputed secrets.
    pub fn create_with_secrets(&mut self, secrets: ChatSecrets, chat_type: ChatType) -> Result<Vec<u8>> {
        self.ensure_idle()?;
        let frame = ClientMessage::CreateChat {
            room_id: secrets.room_id.as_str().to_owned(),
            chat_type,
            username: self.username.clone(),
        }
        .to_bytes()?;
        info!(room_id = %secrets.room_id, ?chat_type, "Creating chat");
        self.active = Some(ActiveChat::new(secrets, Some(chat_type)));
        Ok(frame)
    }

    /// Derive secrets from `code` and join an existing chat.
    ///
    /// Returns the encoded `JoinChat` frame.
    pub fn join(&mut self, code: &str) -> Result<Vec<u8>> {
        self.ensure_idle()?;
        let secrets = ChatSecrets::derive(code)?;
        self.join_with_secrets(secrets)
    }

    /// Join a chat from precomputed secrets.
    pub fn join_with_secrets(&mut self, secrets: ChatSecrets) -> Result<Vec<u8>> {
        self.ensure_idle()?;
        let frame = ClientMessage::JoinChat {
            room_id: secrets.room_id.as_str().to_owned(),
            username: self.username.clone(),
        }
        .to_bytes()?;
        info!(room_id = %secrets.room_id, "Joining chat");
        self.active = Some(ActiveChat::new(secrets, None));
        Ok(frame)
    }

    /// Encrypt, sign and frame `content` with the next ratchet key.
    ///
    /// The message stays pending until the server acks its id. The key is
    /// drawn from a detached chain and committed only once the frame is
    /// built, so a failed send leaves the ratchet where it was.
    pub fn send(&mut self, content: &str) -> Result<Outbound> {
        let now = self.clock.now_unix();
        let active = self.active.as_mut().ok_or(Error::NotInChat)?;

        let mut advanced = active.ratchet.clone_for_trial();
        let chain_index = advanced.index();
        let key = advanced.next();
        let sequence_number = active.sequence;

        let signature = self
            .identity
            .sign(&signing_message(content, sequence_number, chain_index))?;
        let payload = MessagePayload {
            username: self.username.clone(),
            content: content.to_owned(),
            timestamp: now,
            sequence_number,
            sender_public_key: self.identity.public_bytes().to_vec(),
            signature: signature.to_vec(),
            chain_key_index: chain_index,
        };
        let ciphertext = encrypt(&payload.to_bytes()?, &key)?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let bytes = active.send_frame(&message_id, &ciphertext)?;

        active.ratchet = advanced;
        active.pending.push(PendingMessage::new(
            message_id.clone(),
            content.to_owned(),
            sequence_number,
            ciphertext,
            now,
        ));
        active.sequence += 1;

        debug!(
            room_id = %active.room_id,
            message_id = %message_id,
            chain_index,
            sequence_number,
            "Sending message"
        );
        Ok(Outbound { message_id, bytes })
    }

    /// Decode one inbound server frame into an event.
    ///
    /// Undecodable frames become [`SessionEvent::Error`]. Messages for another
    /// room, messages outside the search window and acks for unknown ids
    /// produce no event.
    pub fn on_receive(&mut self, bytes: &[u8]) -> Option<SessionEvent> {
        if bytes.len() > self.max_inbound_bytes {
            warn!(
                len = bytes.len(),
                limit = self.max_inbound_bytes,
                "Rejecting oversized server frame"
            );
            return Some(SessionEvent::Error {
                message: format!(
                    "Malformed wire message: frame of {} bytes exceeds the {} byte limit",
                    bytes.len(),
                    self.max_inbound_bytes
                ),
            });
        }

        let message = match ServerMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Dropping malformed server frame");
                return Some(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        };

        match message {
            ServerMessage::ChatCreated { room_id, chat_type } => {
                self.record_chat_type(&room_id, chat_type);
                info!(room_id = %room_id, "Chat created");
                Some(SessionEvent::ChatCreated { room_id, chat_type })
            }
            ServerMessage::JoinedChat {
                room_id,
                chat_type,
                participant_count,
            } => {
                self.record_chat_type(&room_id, chat_type);
                info!(room_id = %room_id, participant_count, "Joined chat");
                Some(SessionEvent::JoinedChat {
                    room_id,
                    chat_type,
                    participant_count,
                })
            }
            ServerMessage::Error { message } => {
                warn!(error = %message, "Server reported error");
                Some(SessionEvent::Error { message })
            }
            ServerMessage::MessageReceived {
                room_id,
                encrypted_payload,
                timestamp,
                message_id,
            } => self
                .decrypt_received(&room_id, &encrypted_payload, timestamp, message_id)
                .map(SessionEvent::MessageDecrypted),
            ServerMessage::MessageAck { message_id } => {
                let acked = self
                    .active
                    .as_mut()
                    .and_then(|a| a.pending.acknowledge(&message_id));
                if acked.is_some() {
                    debug!(message_id = %message_id, "Message acknowledged");
                    Some(SessionEvent::MessageAck { message_id })
                } else {
                    debug!(message_id = %message_id, "Ack for unknown message");
                    None
                }
            }
            ServerMessage::UserJoined { room_id, username } => {
                debug!(room_id = %room_id, username = %username, "User joined");
                Some(SessionEvent::UserJoined { room_id, username })
            }
            ServerMessage::UserLeft { room_id, username } => {
                debug!(room_id = %room_id, username = %username, "User left");
                Some(SessionEvent::UserLeft { room_id, username })
            }
        }
    }

    /// Leave the active chat, wiping its secrets and pending sends.
    ///
    /// Returns the encoded `LeaveChat` frame.
    pub fn leave(&mut self) -> Result<Vec<u8>> {
        let room_id = self.room_id().ok_or(Error::NotInChat)?;
        let frame = ClientMessage::LeaveChat {
            room_id: room_id.as_str().to_owned(),
        }
        .to_bytes()?;
        let active = self.active.take().ok_or(Error::NotInChat)?;
        info!(
            room_id = %active.room_id,
            dropped_pending = active.pending.len(),
            "Leaving chat"
        );
        Ok(frame)
    }

    /// Resend or abandon pending messages as of `now`. A no-op while idle.
    pub fn retry_pending(&mut self, now: i64) -> RetrySweep {
        let Some(active) = self.active.as_mut() else {
            return RetrySweep::default();
        };
        let sweep = active.pending.sweep(now, self.retry);
        RetrySweep {
            resend: sweep
                .resend
                .iter()
                .filter_map(|m| match active.send_frame(&m.message_id, &m.ciphertext) {
                    Ok(bytes) => Some(Outbound {
                        message_id: m.message_id.clone(),
                        bytes,
                    }),
                    Err(e) => {
                        warn!(message_id = %m.message_id, error = %e, "Failed to re-encode resend");
                        None
                    }
                })
                .collect(),
            abandoned: sweep.abandoned.into_iter().map(|m| m.message_id).collect(),
        }
    }

    /// [`retry_pending`](Self::retry_pending) at the controller's clock.
    pub fn retry_due(&mut self) -> RetrySweep {
        let now = self.clock.now_unix();
        self.retry_pending(now)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::AlreadyInChat);
        }
        Ok(())
    }

    fn record_chat_type(&mut self, room_id: &str, chat_type: ChatType) {
        if let Some(active) = self.active.as_mut() {
            if active.is_room(room_id) {
                active.chat_type = Some(chat_type);
            }
        }
    }

    fn decrypt_received(
        &mut self,
        room_id: &str,
        ciphertext: &[u8],
        server_timestamp: i64,
        message_id: String,
    ) -> Option<DecryptedMessage> {
        let Some(active) = self.active.as_mut() else {
            debug!(message_id = %message_id, "Message received while not in a chat");
            return None;
        };
        if !active.is_room(room_id) {
            debug!(message_id = %message_id, "Message for another room");
            return None;
        }

        let Some(hit) = find_message(&active.ratchet_base, &active.ratchet, self.window, ciphertext)
        else {
            debug!(
                message_id = %message_id,
                chain_index = active.ratchet.index(),
                "No ratchet key in window decrypts message"
            );
            return None;
        };
        let payload = hit.payload;

        let verified = verify_signature(
            &payload.sender_public_key,
            &signing_message(&payload.content, payload.sequence_number, hit.index),
            &payload.signature,
        );
        if !verified {
            warn!(message_id = %message_id, chain_index = hit.index, "Message signature invalid");
        }

        if hit.index >= active.ratchet.index() {
            active.ratchet.advance_to(hit.index + 1);
        } else {
            debug!(
                chain_index = hit.index,
                canonical = active.ratchet.index(),
                "Older message, ratchet not advanced"
            );
        }

        let sender_fingerprint = <[u8; 32]>::try_from(payload.sender_public_key.as_slice())
            .ok()
            .map(|pk| fingerprint_of(&pk));
        let is_own = payload.username == self.username;

        debug!(
            message_id = %message_id,
            chain_index = hit.index,
            verified,
            is_own,
            "Message decrypted"
        );
        Some(DecryptedMessage {
            username: payload.username,
            content: payload.content,
            timestamp: payload.timestamp,
            server_timestamp,
            message_id,
            sequence_number: payload.sequence_number,
            chain_index: hit.index,
            verified,
            is_own,
            sender_fingerprint,
        })
    }
}
