//! Response assembler
//!
//! A successful notification is never answered. Errors are always answered,
//! notification or not, so a caller cannot silently lose a failure.

use serde::Serialize;

use crate::error::JsonRpcError;
use crate::normalize::Envelope;
use crate::response::JsonRpcMessage;

/// What goes back on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Single(JsonRpcMessage),
    Batch(Vec<JsonRpcMessage>),
}

/// Assembled outcome of one envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// `None` when there is nothing to send
    pub payload: Option<Payload>,
    /// At least one emitted response is an error
    pub is_error: bool,
}

impl Outbound {
    /// Nothing to send, nothing failed
    pub fn empty() -> Self {
        Self {
            payload: None,
            is_error: false,
        }
    }

    /// An envelope-level failure (parse error, empty batch, ...)
    pub fn from_error(error: JsonRpcError) -> Self {
        Self {
            payload: Some(Payload::Single(JsonRpcMessage::Error(error))),
            is_error: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    /// Serialized payload, `None` when empty
    pub fn to_bytes(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        self.payload.as_ref().map(serde_json::to_vec).transpose()
    }
}

fn should_emit(message: &JsonRpcMessage) -> bool {
    message.is_error() || message.id().is_some()
}

/// Apply notification suppression and single/batch reassembly.
///
/// A batch in which every element is suppressed yields no payload at all
/// rather than an empty array.
pub fn assemble(results: Envelope<JsonRpcMessage>) -> Outbound {
    match results {
        Envelope::Single(message) => {
            if should_emit(&message) {
                Outbound {
                    is_error: message.is_error(),
                    payload: Some(Payload::Single(message)),
                }
            } else {
                Outbound::empty()
            }
        }
        Envelope::Batch(messages) => {
            let emitted: Vec<JsonRpcMessage> = messages.into_iter().filter(should_emit).collect();
            if emitted.is_empty() {
                return Outbound::empty();
            }
            Outbound {
                is_error: emitted.iter().any(JsonRpcMessage::is_error),
                payload: Some(Payload::Batch(emitted)),
            }
        }
    }
}
