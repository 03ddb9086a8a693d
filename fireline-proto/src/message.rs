//! Server→client message catalog (§6 of the spec).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Envelope, Location, SosState};

/// The fixed set of server-authored frames. Each variant's `#[serde(rename)]`
/// is the wire `type` tag. Server code only ever constructs these; client
/// code only ever decodes them, via [`ServerMessage::decode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ACK")]
    Ack {
        message: String,
        #[serde(rename = "incidentId")]
        incident_id: String,
        at: u64,
    },
    #[serde(rename = "ACK_MSG")]
    AckMsg {
        #[serde(rename = "msgId")]
        msg_id: String,
        at: u64,
    },
    #[serde(rename = "ERROR")]
    Error {
        error: String,
        at: u64,
    },
    #[serde(rename = "INCIDENT_SNAPSHOT")]
    IncidentSnapshot {
        #[serde(rename = "incidentId")]
        incident_id: String,
        responders: Vec<String>,
        locations: HashMap<String, Location>,
        sos: HashMap<String, SosState>,
        at: u64,
    },
    #[serde(rename = "LOCATION_UPDATE")]
    LocationUpdate {
        #[serde(rename = "msgId")]
        msg_id: String,
        #[serde(rename = "incidentId")]
        incident_id: String,
        #[serde(rename = "responderId")]
        responder_id: String,
        lat: f64,
        lng: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
        at: u64,
    },
    #[serde(rename = "SOS_RAISE")]
    SosRaise {
        #[serde(rename = "msgId")]
        msg_id: String,
        #[serde(rename = "incidentId")]
        incident_id: String,
        #[serde(rename = "responderId")]
        responder_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        at: u64,
    },
    #[serde(rename = "SOS_CLEAR")]
    SosClear {
        #[serde(rename = "msgId")]
        msg_id: String,
        #[serde(rename = "incidentId")]
        incident_id: String,
        #[serde(rename = "responderId")]
        responder_id: String,
        at: u64,
    },
    #[serde(rename = "CHAT_SEND")]
    ChatSend {
        #[serde(rename = "msgId")]
        msg_id: String,
        #[serde(rename = "incidentId")]
        incident_id: String,
        from: String,
        text: String,
        at: u64,
    },
    #[serde(rename = "PRESENCE_LEAVE")]
    PresenceLeave {
        #[serde(rename = "incidentId")]
        incident_id: String,
        #[serde(rename = "responderId")]
        responder_id: String,
        at: u64,
    },
}

impl ServerMessage {
    /// Encode as a single-line JSON frame.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }

    /// Decode a frame the server sent us. Frames of a type this enum
    /// doesn't know about (passthrough broadcasts of custom message types)
    /// fail here; callers that care about those should fall back to
    /// [`Envelope::decode`].
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Build the passthrough broadcast for a message type the dispatcher does
/// not otherwise recognize: the original fields, with `type`, `msgId`,
/// `incidentId`, and `from` set authoritatively by the server.
///
/// See §4.4.1's "other" row: `{...msg, msgId, incidentId, from:responderId, at}`.
pub fn passthrough_broadcast(
    original: &Envelope,
    incident_id: &str,
    responder_id: &str,
    at: u64,
) -> String {
    let mut fields: Map<String, Value> = original.fields.clone();
    fields.insert("type".into(), Value::String(original.msg_type.clone()));
    fields.insert(
        "msgId".into(),
        Value::String(original.msg_id().unwrap_or_default().to_string()),
    );
    fields.insert("incidentId".into(), Value::String(incident_id.to_string()));
    fields.insert("from".into(), Value::String(responder_id.to_string()));
    fields.insert("at".into(), Value::from(at));
    Value::Object(fields).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_msg_encodes_expected_shape() {
        let line = ServerMessage::AckMsg { msg_id: "m1".into(), at: 42 }.encode();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], "ACK_MSG");
        assert_eq!(v["msgId"], "m1");
        assert_eq!(v["at"], 42);
    }

    #[test]
    fn passthrough_overwrites_authority_fields() {
        let original =
            Envelope::decode(r#"{"type":"CUSTOM","msgId":"m1","incidentId":"evil","foo":1}"#)
                .unwrap();
        let line = passthrough_broadcast(&original, "I1", "A", 7);
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["type"], "CUSTOM");
        assert_eq!(v["incidentId"], "I1");
        assert_eq!(v["from"], "A");
        assert_eq!(v["foo"], 1);
        assert_eq!(v["at"], 7);
    }
}
