//! Edge coordinator library: incident rooms, dedup/ACK, and the protocol
//! dispatcher (C2–C4 and the server half of C7).

pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod store;
pub mod web;

pub use config::ServerConfig;
pub use store::{ConnId, Store};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use dedup::Dedup;

/// Everything shared across connection handlers.
pub struct State {
    pub store: Store,
    pub dedup: Arc<Dedup>,
    /// Per-connection outgoing channel; the writer half of each socket reads
    /// from this so a slow peer's send buffer can't stall the dispatcher.
    senders: Mutex<std::collections::HashMap<ConnId, mpsc::Sender<String>>>,
    pub server_name: String,
}

impl State {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            store: Store::default(),
            dedup: Arc::new(Dedup::new(config.dedup_ttl_ms)),
            senders: Mutex::new(std::collections::HashMap::new()),
            server_name: "fireline".to_string(),
        }
    }

    pub fn register_sender(&self, conn_id: ConnId, tx: mpsc::Sender<String>) {
        self.senders.lock().insert(conn_id, tx);
    }

    pub fn unregister_sender(&self, conn_id: ConnId) {
        self.senders.lock().remove(&conn_id);
    }

    /// Send a line to a single connection. A full or closed buffer is a
    /// documented, silent loss: the peer recovers via snapshot-on-reconnect.
    pub fn send_to(&self, conn_id: ConnId, line: String) {
        if let Some(tx) = self.senders.lock().get(&conn_id)
            && tx.try_send(line).is_err() {
                tracing::debug!(?conn_id, "send buffer full or closed, dropping");
            }
    }

    /// Broadcast to every open connection currently in the room, including
    /// the sender (the sender relies on its own ACK, not the echo).
    pub fn broadcast(&self, incident_id: &str, line: &str) {
        for conn_id in self.store.connections_in(incident_id) {
            self.send_to(conn_id, line.to_string());
        }
    }
}
