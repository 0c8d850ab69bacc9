//! Events surfaced to the UI layer.

use rchat_proto::ChatType;

/// Something the UI should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ChatCreated {
        room_id: String,
        chat_type: ChatType,
    },
    JoinedChat {
        room_id: String,
        chat_type: ChatType,
        participant_count: u64,
    },
    MessageDecrypted(DecryptedMessage),
    UserJoined {
        room_id: String,
        username: String,
    },
    UserLeft {
        room_id: String,
        username: String,
    },
    /// Server error or an undecodable frame.
    Error {
        message: String,
    },
    /// A pending send was acknowledged by the server.
    MessageAck {
        message_id: String,
    },
}

/// A message that decrypted and parsed inside the search window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub username: String,
    pub content: String,
    /// Sender's timestamp from the payload.
    pub timestamp: i64,
    /// Server receive timestamp from the frame.
    pub server_timestamp: i64,
    pub message_id: String,
    pub sequence_number: u64,
    pub chain_index: u64,
    /// Signature over content, sequence and chain index checked out.
    pub verified: bool,
    /// Embedded username equals ours. An echo check, not authentication.
    pub is_own: bool,
    /// Fingerprint of the embedded public key, when it is a valid key size.
    pub sender_fingerprint: Option<String>,
}
