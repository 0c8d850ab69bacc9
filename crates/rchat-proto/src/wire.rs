//! Client/server control and data messages.
//!
//! Every message is a `u32` little-endian variant number followed by the
//! variant's fields, laid out the same way as
//! [`MessagePayload`](crate::MessagePayload). Declaration order below fixes
//! the variant numbers.
//!
//! | # | client → server | server → client |
//! |---|---|---|
//! | 0 | `CreateChat(room_id, chat_type, username)` | `ChatCreated(room_id, chat_type)` |
//! | 1 | `JoinChat(room_id, username)` | `JoinedChat(room_id, chat_type, participant_count)` |
//! | 2 | `SendMessage(room_id, encrypted_payload, message_id)` | `Error(message)` |
//! | 3 | `LeaveChat(room_id)` | `MessageReceived(room_id, encrypted_payload, timestamp, message_id)` |
//! | 4 | | `MessageAck(message_id)` |
//! | 5 | | `UserJoined(room_id, username)` |
//! | 6 | | `UserLeft(room_id, username)` |

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Kind of chat room. `Group` carries an optional participant cap
/// (one-byte presence flag, then `u64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatType {
    OneToOne,
    Group { max_participants: Option<u64> },
}

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    CreateChat {
        room_id: String,
        chat_type: ChatType,
        username: String,
    },
    JoinChat {
        room_id: String,
        username: String,
    },
    SendMessage {
        room_id: String,
        encrypted_payload: Vec<u8>,
        message_id: String,
    },
    LeaveChat {
        room_id: String,
    },
}

impl ClientMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        bincode::serialize(self).map_err(|e| ProtoError::encode(&e))
    }

    /// Decode a client message. Unknown variants are malformed: a client
    /// message has no error variant to fall back on.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        bincode::deserialize(data).map_err(|e| ProtoError::wire(&e))
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    ChatCreated {
        room_id: String,
        chat_type: ChatType,
    },
    JoinedChat {
        room_id: String,
        chat_type: ChatType,
        participant_count: u64,
    },
    Error {
        message: String,
    },
    MessageReceived {
        room_id: String,
        encrypted_payload: Vec<u8>,
        timestamp: i64,
        message_id: String,
    },
    MessageAck {
        message_id: String,
    },
    UserJoined {
        room_id: String,
        username: String,
    },
    UserLeft {
        room_id: String,
        username: String,
    },
}

impl ServerMessage {
    /// Number of server variants this build understands.
    pub const VARIANT_COUNT: u32 = 7;

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        bincode::serialize(self).map_err(|e| ProtoError::encode(&e))
    }

    /// Decode a server message.
    ///
    /// An unknown variant number is not an error: it decodes to
    /// [`ServerMessage::Error`] describing the variant, so a newer server
    /// cannot wedge an older client. Truncated or invalid fields fail with
    /// [`ProtoError::MalformedWireMessage`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        if let Some(variant) = leading_variant(data).filter(|v| *v >= Self::VARIANT_COUNT) {
            return Ok(Self::Error {
                message: format!("Unknown server message variant: {variant}"),
            });
        }
        bincode::deserialize(data).map_err(|e| ProtoError::wire(&e))
    }
}

fn leading_variant(data: &[u8]) -> Option<u32> {
    let tag: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(tag))
}
