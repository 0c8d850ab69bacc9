//! Codec error types.

/// Errors from encoding and decoding payloads and wire messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Malformed wire message: {0}")]
    MalformedWireMessage(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

impl ProtoError {
    pub(crate) fn payload(e: &bincode::Error) -> Self {
        Self::MalformedPayload(e.to_string())
    }

    pub(crate) fn wire(e: &bincode::Error) -> Self {
        Self::MalformedWireMessage(e.to_string())
    }

    pub(crate) fn encode(e: &bincode::Error) -> Self {
        Self::Encode(e.to_string())
    }
}
