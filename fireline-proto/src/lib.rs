//! Wire protocol for the Fireline edge coordinator.
//!
//! Every frame is a single-line JSON object with a mandatory `type` field.
//! This crate owns the envelope codec ([`envelope`]), the shared data model
//! ([`Location`], [`SosState`]), and the catalog of message kinds
//! ([`ServerMessage`]) that both the server and the client speak.

pub mod envelope;
pub mod message;

pub use envelope::{Envelope, EnvelopeError};
pub use message::ServerMessage;

use serde::{Deserialize, Serialize};

/// A responder's last-known position, keyed by `responderId` independent of
/// connection liveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub at: u64,
}

/// Active SOS marker for a responder in an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: u64,
}

/// Server wall clock, epoch milliseconds. Clients treat this as an opaque
/// ordering hint, never authoritative time.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Known client→server message type tags, used by the dispatcher to match
/// on [`Envelope::msg_type`].
pub mod kind {
    pub const CLIENT_HELLO: &str = "CLIENT_HELLO";
    pub const LOCATION_UPDATE: &str = "LOCATION_UPDATE";
    pub const SOS_RAISE: &str = "SOS_RAISE";
    pub const SOS_CLEAR: &str = "SOS_CLEAR";
    pub const CHAT_SEND: &str = "CHAT_SEND";
    pub const ACK_MSG: &str = "ACK_MSG";
}
