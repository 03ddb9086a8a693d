//! Client snapshot applier (C6): merges server snapshots and incremental
//! broadcasts into local observable state.

use std::collections::HashMap;

use fireline_proto::{Location, ServerMessage, SosState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// The UI-facing view of one incident. Identity and last-known collections
/// are preserved across disconnects so a dropped client keeps showing
/// stale-but-useful data instead of blanking out.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub status: Status,
    pub incident_id: Option<String>,
    pub responder_id: Option<String>,
    pub responders: Vec<String>,
    pub locations: HashMap<String, Location>,
    pub sos: HashMap<String, SosState>,
}

impl ObservedState {
    pub fn on_connect_begin(&mut self, incident_id: &str, responder_id: &str) {
        self.status = Status::Connecting;
        self.incident_id = Some(incident_id.to_string());
        self.responder_id = Some(responder_id.to_string());
    }

    pub fn on_open(&mut self) {
        self.status = Status::Connected;
    }

    pub fn on_close(&mut self) {
        self.status = Status::Disconnected;
    }

    /// Apply one server frame. Unrecognized/uninteresting types (ACK,
    /// ACK_MSG, ERROR, CHAT_SEND) are not part of the observable state and
    /// are ignored here — the reliable sender and the UI handle those.
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::IncidentSnapshot { responders, locations, sos, .. } => {
                self.responders = responders.clone();
                self.locations = locations.clone();
                self.sos = sos.clone();
            }
            ServerMessage::LocationUpdate { responder_id, lat, lng, accuracy, at, .. } => {
                self.locations.insert(
                    responder_id.clone(),
                    Location { lat: *lat, lng: *lng, accuracy: *accuracy, at: *at },
                );
            }
            ServerMessage::SosRaise { responder_id, note, at, .. } => {
                self.sos.insert(responder_id.clone(), SosState { note: note.clone(), at: *at });
            }
            ServerMessage::SosClear { responder_id, .. } => {
                self.sos.remove(responder_id);
            }
            ServerMessage::PresenceLeave { responder_id, .. } => {
                self.responders.retain(|r| r != responder_id);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn snapshot_replaces_wholesale() {
        let mut s = ObservedState { responders: vec!["stale".into()], ..Default::default() };
        s.apply(&ServerMessage::IncidentSnapshot {
            incident_id: "I1".into(),
            responders: vec!["A".into(), "B".into()],
            locations: HashMap::new(),
            sos: HashMap::new(),
            at: 1,
        });
        assert_eq!(s.responders, vec!["A", "B"]);
    }

    #[test]
    fn location_update_applies_incrementally() {
        let mut s = ObservedState::default();
        s.apply(&ServerMessage::LocationUpdate {
            msg_id: "m1".into(),
            incident_id: "I1".into(),
            responder_id: "A".into(),
            lat: 1.0,
            lng: 2.0,
            accuracy: None,
            at: 5,
        });
        assert_eq!(s.locations["A"].lat, 1.0);
    }

    #[test]
    fn disconnect_preserves_last_known_state() {
        let mut s = ObservedState::default();
        s.on_connect_begin("I1", "A");
        s.on_open();
        s.responders = vec!["A".into()];
        s.on_close();
        assert_eq!(s.status, Status::Disconnected);
        assert_eq!(s.responders, vec!["A".to_string()]);
    }

    #[test]
    fn sos_raise_then_clear_round_trips() {
        let mut s = ObservedState::default();
        s.apply(&ServerMessage::SosRaise {
            msg_id: "s1".into(),
            incident_id: "I1".into(),
            responder_id: "A".into(),
            note: Some("trapped".into()),
            at: 1,
        });
        assert!(s.sos.contains_key("A"));
        s.apply(&ServerMessage::SosClear {
            msg_id: "s2".into(),
            incident_id: "I1".into(),
            responder_id: "A".into(),
            at: 2,
        });
        assert!(!s.sos.contains_key("A"));
    }
}
