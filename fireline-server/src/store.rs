//! Incident state store (C2): rooms, connection metadata, last-known
//! location per responder, active SOS per incident.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use fireline_proto::{Location, SosState};

/// Opaque per-socket identifier, minted once per accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

impl ConnId {
    pub fn next() -> Self {
        ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A connection's binding, set once on successful handshake.
#[derive(Debug, Clone)]
pub struct ConnMeta {
    pub incident_id: String,
    pub responder_id: String,
}

/// Rooms, presence, and responder-keyed state. Each concern gets its own
/// lock rather than one shared mutex, so a slow lookup against one map
/// never blocks another.
#[derive(Default)]
pub struct Store {
    /// incidentId -> open connections currently bound to it. A room with
    /// zero connections is removed, never left as an empty entry.
    rooms: Mutex<HashMap<String, HashSet<ConnId>>>,
    /// connId -> its binding, for connections past the handshake.
    conn_meta: Mutex<HashMap<ConnId, ConnMeta>>,
    /// responderId -> last-known location. Survives disconnects.
    locations: Mutex<HashMap<String, Location>>,
    /// incidentId -> responderId -> active SOS.
    sos: Mutex<HashMap<String, HashMap<String, SosState>>>,
}

impl Store {
    /// Bind a connection to `(incidentId, responderId)`, creating the room
    /// lazily. A reconnecting responder's new binding simply joins the
    /// member set alongside any still-open prior connection.
    pub fn add_connection(&self, conn_id: ConnId, incident_id: &str, responder_id: &str) {
        self.rooms
            .lock()
            .entry(incident_id.to_string())
            .or_default()
            .insert(conn_id);
        self.conn_meta.lock().insert(
            conn_id,
            ConnMeta {
                incident_id: incident_id.to_string(),
                responder_id: responder_id.to_string(),
            },
        );
    }

    /// Remove a connection from its room (if bound), deleting the room when
    /// it becomes empty. Returns the prior binding, if any.
    pub fn remove_connection(&self, conn_id: ConnId) -> Option<ConnMeta> {
        let meta = self.conn_meta.lock().remove(&conn_id)?;
        let mut rooms = self.rooms.lock();
        if let Some(members) = rooms.get_mut(&meta.incident_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&meta.incident_id);
            }
        }
        Some(meta)
    }

    /// Responder IDs with at least one live connection in the room. Derived
    /// from the connection set, so it always reflects live presence.
    pub fn responder_ids_in(&self, incident_id: &str) -> Vec<String> {
        let rooms = self.rooms.lock();
        let Some(members) = rooms.get(incident_id) else {
            return Vec::new();
        };
        let conn_meta = self.conn_meta.lock();
        members
            .iter()
            .filter_map(|c| conn_meta.get(c).map(|m| m.responder_id.clone()))
            .collect()
    }

    pub fn connections_in(&self, incident_id: &str) -> Vec<ConnId> {
        self.rooms
            .lock()
            .get(incident_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_location(&self, responder_id: &str, loc: Location) {
        self.locations.lock().insert(responder_id.to_string(), loc);
    }

    /// Locations for responders currently in the room, restricted to those
    /// with a stored location. Late joiners inherit whatever an earlier
    /// session of the same responder established.
    pub fn locations_for(&self, incident_id: &str) -> HashMap<String, Location> {
        let responders = self.responder_ids_in(incident_id);
        let locations = self.locations.lock();
        responders
            .into_iter()
            .filter_map(|r| locations.get(&r).cloned().map(|loc| (r, loc)))
            .collect()
    }

    pub fn raise_sos(&self, incident_id: &str, responder_id: &str, sos: SosState) {
        self.sos
            .lock()
            .entry(incident_id.to_string())
            .or_default()
            .insert(responder_id.to_string(), sos);
    }

    pub fn clear_sos(&self, incident_id: &str, responder_id: &str) {
        let mut sos = self.sos.lock();
        if let Some(by_responder) = sos.get_mut(incident_id) {
            by_responder.remove(responder_id);
            if by_responder.is_empty() {
                sos.remove(incident_id);
            }
        }
    }

    pub fn sos_for(&self, incident_id: &str) -> HashMap<String, SosState> {
        self.sos.lock().get(incident_id).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_disappears_when_last_connection_leaves() {
        let store = Store::default();
        let a = ConnId::next();
        store.add_connection(a, "I1", "A");
        assert_eq!(store.room_count(), 1);
        store.remove_connection(a);
        assert_eq!(store.room_count(), 0);
    }

    #[test]
    fn location_survives_disconnect_and_is_filtered_by_membership() {
        let store = Store::default();
        let a = ConnId::next();
        store.add_connection(a, "I1", "A");
        store.set_location("A", Location { lat: 1.0, lng: 2.0, accuracy: None, at: 1 });
        store.remove_connection(a);
        // Not in the room anymore, so not in the snapshot.
        assert!(store.locations_for("I1").is_empty());

        let b = ConnId::next();
        store.add_connection(b, "I1", "A");
        assert_eq!(store.locations_for("I1").len(), 1);
    }

    #[test]
    fn sos_raise_then_clear_drops_empty_incident_map() {
        let store = Store::default();
        store.raise_sos("I1", "A", SosState { note: None, at: 1 });
        assert_eq!(store.sos_for("I1").len(), 1);
        store.clear_sos("I1", "A");
        assert!(store.sos_for("I1").is_empty());
    }

    #[test]
    fn cross_incident_isolation() {
        let store = Store::default();
        let a = ConnId::next();
        let b = ConnId::next();
        store.add_connection(a, "I1", "A");
        store.add_connection(b, "I2", "B");
        assert_eq!(store.connections_in("I1"), vec![a]);
        assert_eq!(store.connections_in("I2"), vec![b]);
    }
}
