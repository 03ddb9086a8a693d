//! Protocol dispatcher (C4): handshake, snapshot synthesis, per-type
//! handlers, broadcast fan-out, disconnect cleanup.

use std::sync::Arc;

use fireline_proto::{envelope::Envelope, kind, now_ms, Location, ServerMessage, SosState};

use crate::store::ConnId;
use crate::State;

/// A connection's place in the handshake state machine. `CLOSED` is not
/// represented here — it is simply the point at which `handle_frame` stops
/// being called and `on_disconnect` runs.
enum ConnState {
    AwaitingHello,
    Joined { incident_id: String, responder_id: String },
}

/// Owns one connection's protocol state across its lifetime. The transport
/// layer feeds it decoded text frames and, on close, asks it to clean up.
pub struct Connection {
    pub id: ConnId,
    state: ConnState,
}

impl Connection {
    pub fn new() -> Self {
        Self { id: ConnId::next(), state: ConnState::AwaitingHello }
    }

    /// Process one decoded-or-not frame. Malformed JSON and missing
    /// envelope fields are reported to this connection only; the connection
    /// is never torn down because of a message-level error.
    pub async fn handle_line(&mut self, state: &Arc<State>, line: &str) {
        let envelope = match Envelope::decode(line) {
            Ok(e) => e,
            Err(e) => {
                self.send_error(state, &e.to_string());
                return;
            }
        };

        let joined = matches!(self.state, ConnState::Joined { .. });
        if !joined {
            self.handle_hello(state, envelope).await;
        } else if envelope.msg_type == kind::CLIENT_HELLO {
            self.send_error(state, "Already joined; re-binding a connection is not supported");
        } else {
            self.handle_data_message(state, envelope).await;
        }
    }

    async fn handle_hello(&mut self, state: &Arc<State>, envelope: Envelope) {
        let Some(incident_id) = envelope.non_empty_str("incidentId").map(str::to_string) else {
            self.send_error(state, "incidentId must be a non-empty string");
            return;
        };
        let Some(responder_id) = envelope.non_empty_str("responderId").map(str::to_string) else {
            self.send_error(state, "responderId must be a non-empty string");
            return;
        };

        state.store.add_connection(self.id, &incident_id, &responder_id);
        tracing::info!(conn = %self.id, %incident_id, %responder_id, "joined incident");

        let at = now_ms();
        self.send(
            state,
            ServerMessage::Ack {
                message: "Joined incident".to_string(),
                incident_id: incident_id.clone(),
                at,
            },
        );
        self.send(
            state,
            ServerMessage::IncidentSnapshot {
                responders: state.store.responder_ids_in(&incident_id),
                locations: state.store.locations_for(&incident_id),
                sos: state.store.sos_for(&incident_id),
                incident_id: incident_id.clone(),
                at: now_ms(),
            },
        );

        self.state = ConnState::Joined { incident_id, responder_id };
    }

    async fn handle_data_message(&mut self, state: &Arc<State>, envelope: Envelope) {
        let ConnState::Joined { incident_id, responder_id } = &self.state else {
            unreachable!("handle_data_message only called while joined")
        };

        let Some(msg_id) = envelope.msg_id().map(str::to_string) else {
            self.send_error(state, "Missing msgId");
            return;
        };

        // Mark-then-ACK: the ACK means "stop retrying", independent of
        // whether the effect below actually occurs. A validation failure on
        // an already-marked msgId does not re-execute on retry.
        let is_new = state.dedup.mark_if_new(incident_id, &msg_id);
        self.send(state, ServerMessage::AckMsg { msg_id: msg_id.clone(), at: now_ms() });
        if !is_new {
            return;
        }

        let incident_id = incident_id.clone();
        let responder_id = responder_id.clone();
        match envelope.msg_type.as_str() {
            kind::LOCATION_UPDATE => {
                self.handle_location_update(state, &incident_id, &responder_id, &msg_id, &envelope)
            }
            kind::SOS_RAISE => {
                self.handle_sos_raise(state, &incident_id, &responder_id, &msg_id, &envelope)
            }
            kind::SOS_CLEAR => self.handle_sos_clear(state, &incident_id, &responder_id, &msg_id),
            kind::CHAT_SEND => {
                self.handle_chat_send(state, &incident_id, &responder_id, &msg_id, &envelope)
            }
            _ => self.handle_passthrough(state, &incident_id, &responder_id, &envelope),
        }
    }

    fn handle_location_update(
        &mut self,
        state: &Arc<State>,
        incident_id: &str,
        responder_id: &str,
        msg_id: &str,
        envelope: &Envelope,
    ) {
        let lat = envelope.f64_field("lat");
        let lng = envelope.f64_field("lng");
        let valid = matches!(
            (lat, lng),
            (Some(lat), Some(lng))
                if lat.is_finite() && (-90.0..=90.0).contains(&lat)
                    && lng.is_finite() && (-180.0..=180.0).contains(&lng)
        );
        if !valid {
            self.send_error(state, "Invalid coordinates");
            return;
        }
        let (lat, lng) = (lat.unwrap(), lng.unwrap());
        let accuracy = envelope.f64_field("accuracy").filter(|a| a.is_finite());
        let at = now_ms();

        state.store.set_location(responder_id, Location { lat, lng, accuracy, at });

        let line = ServerMessage::LocationUpdate {
            msg_id: msg_id.to_string(),
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            lat,
            lng,
            accuracy,
            at,
        }
        .encode();
        state.broadcast(incident_id, &line);
    }

    fn handle_sos_raise(
        &mut self,
        state: &Arc<State>,
        incident_id: &str,
        responder_id: &str,
        msg_id: &str,
        envelope: &Envelope,
    ) {
        let note = envelope.str_field("note").map(str::to_string);
        let at = now_ms();
        state.store.raise_sos(incident_id, responder_id, SosState { note: note.clone(), at });

        let line = ServerMessage::SosRaise {
            msg_id: msg_id.to_string(),
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            note,
            at,
        }
        .encode();
        state.broadcast(incident_id, &line);
    }

    fn handle_sos_clear(
        &mut self,
        state: &Arc<State>,
        incident_id: &str,
        responder_id: &str,
        msg_id: &str,
    ) {
        state.store.clear_sos(incident_id, responder_id);
        let at = now_ms();
        let line = ServerMessage::SosClear {
            msg_id: msg_id.to_string(),
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            at,
        }
        .encode();
        state.broadcast(incident_id, &line);
    }

    fn handle_chat_send(
        &mut self,
        state: &Arc<State>,
        incident_id: &str,
        responder_id: &str,
        msg_id: &str,
        envelope: &Envelope,
    ) {
        let Some(text) = envelope.non_empty_str("text").map(str::to_string) else {
            self.send_error(state, "text must be a non-empty string");
            return;
        };
        let at = now_ms();
        let line = ServerMessage::ChatSend {
            msg_id: msg_id.to_string(),
            incident_id: incident_id.to_string(),
            from: responder_id.to_string(),
            text,
            at,
        }
        .encode();
        state.broadcast(incident_id, &line);
    }

    fn handle_passthrough(
        &mut self,
        state: &Arc<State>,
        incident_id: &str,
        responder_id: &str,
        envelope: &Envelope,
    ) {
        let line =
            fireline_proto::message::passthrough_broadcast(envelope, incident_id, responder_id, now_ms());
        state.broadcast(incident_id, &line);
    }

    fn send(&self, state: &Arc<State>, msg: ServerMessage) {
        state.send_to(self.id, msg.encode());
    }

    fn send_error(&self, state: &Arc<State>, error: &str) {
        self.send(state, ServerMessage::Error { error: error.to_string(), at: now_ms() });
    }

    /// Called once the transport has closed. Removes the connection from
    /// its room (if any) and broadcasts a presence-leave to the rest.
    pub fn on_disconnect(&self, state: &Arc<State>) {
        let Some(meta) = state.store.remove_connection(self.id) else {
            return;
        };
        tracing::info!(
            conn = %self.id,
            incident_id = %meta.incident_id,
            responder_id = %meta.responder_id,
            "left incident"
        );
        let line = ServerMessage::PresenceLeave {
            incident_id: meta.incident_id.clone(),
            responder_id: meta.responder_id,
            at: now_ms(),
        }
        .encode();
        state.broadcast(&meta.incident_id, &line);
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
