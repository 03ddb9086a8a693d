//! Dedup/ACK layer (C3): mark-if-new by message identifier inside an
//! incident, with a time-bounded effect window.

use std::collections::HashMap;

use parking_lot::Mutex;

use fireline_proto::now_ms;

/// Per-incident `msgId -> firstSeenAtMs`, so identifiers cannot collide
/// across rooms.
pub struct Dedup {
    entries: Mutex<HashMap<String, HashMap<String, u64>>>,
    ttl_ms: u64,
}

impl Dedup {
    pub fn new(ttl_ms: u64) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl_ms }
    }

    /// Atomically insert `(msgId, now)` into the incident's dedup map if
    /// absent. Returns true iff this is the first sighting within the TTL.
    pub fn mark_if_new(&self, incident_id: &str, msg_id: &str) -> bool {
        self.mark_if_new_at(incident_id, msg_id, now_ms())
    }

    /// Same as [`Self::mark_if_new`] with an explicit timestamp, so sweep
    /// behavior can be tested without depending on wall-clock time.
    pub fn mark_if_new_at(&self, incident_id: &str, msg_id: &str, now: u64) -> bool {
        let mut entries = self.entries.lock();
        let by_incident = entries.entry(incident_id.to_string()).or_default();
        if by_incident.contains_key(msg_id) {
            return false;
        }
        by_incident.insert(msg_id.to_string(), now);
        true
    }

    /// Remove entries older than the TTL; drop an incident's map once it's
    /// empty. Intended to run once per minute from a background task.
    pub fn sweep(&self, now: u64) {
        let mut entries = self.entries.lock();
        entries.retain(|_incident, by_msg| {
            by_msg.retain(|_msg_id, first_seen| now.saturating_sub(*first_seen) < self.ttl_ms);
            !by_msg.is_empty()
        });
    }

    #[cfg(test)]
    pub fn incident_count(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Spawn the minute-cadence sweeper. Returns the task handle so callers can
/// abort it (e.g. in tests).
pub fn spawn_sweeper(dedup: std::sync::Arc<Dedup>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
        loop {
            ticker.tick().await;
            dedup.sweep(now_ms());
        }
    })
}
