//! Client reliable sender (C5): priority outbox, in-flight pending set,
//! retry on timeout, ACK-driven removal.
//!
//! This is pure state — no I/O. The transport driver (`transport.rs`) calls
//! [`Sender::tick`] on a 300ms cadence and writes whatever line it returns;
//! that split is what makes the priority/retry logic unit-testable without
//! a real socket.

use std::collections::HashSet;

use serde_json::{Map, Value};

use fireline_proto::kind;

use crate::msgid;

fn priority_for(msg_type: &str) -> i32 {
    match msg_type {
        kind::SOS_RAISE | kind::SOS_CLEAR => 0,
        kind::LOCATION_UPDATE => 2,
        kind::CHAT_SEND => 3,
        _ => 5,
    }
}

#[derive(Debug, Clone)]
struct OutboxItem {
    msg_id: String,
    msg_type: String,
    payload: Map<String, Value>,
    priority: i32,
    attempts: u32,
    last_sent_at_ms: Option<u64>,
}

impl OutboxItem {
    fn encode(&self) -> String {
        let mut fields = self.payload.clone();
        fields.insert("type".into(), Value::String(self.msg_type.clone()));
        fields.insert("msgId".into(), Value::String(self.msg_id.clone()));
        Value::Object(fields).to_string()
    }
}

/// Default resend timeout, per §6 reference configuration.
pub const DEFAULT_RESEND_AFTER_MS: u64 = 1_500;

#[derive(Default)]
pub struct Sender {
    outbox: Vec<OutboxItem>,
    /// msgIds currently in flight (sent, awaiting ACK). Membership only —
    /// the item itself, including its `last_sent_at_ms`, lives in `outbox`.
    pending: HashSet<String>,
    resend_after_ms: u64,
}

impl Sender {
    pub fn new(resend_after_ms: u64) -> Self {
        Self { outbox: Vec::new(), pending: HashSet::new(), resend_after_ms }
    }

    /// Enqueue a user action. Each call mints a fresh `msgId` — the server's
    /// dedup protects against network-level resends of the same id, not
    /// against user-level double-taps producing two distinct ids.
    pub fn enqueue(&mut self, msg_type: &str, payload: Map<String, Value>) -> String {
        let msg_id = msgid::generate();
        let priority = priority_for(msg_type);
        self.outbox.push(OutboxItem {
            msg_id: msg_id.clone(),
            msg_type: msg_type.to_string(),
            payload,
            priority,
            attempts: 0,
            last_sent_at_ms: None,
        });
        // Stable sort: equal-priority items keep insertion order.
        self.outbox.sort_by_key(|i| i.priority);
        msg_id
    }

    /// Retire an item on the server's per-message ACK.
    pub fn ack(&mut self, msg_id: &str) {
        self.pending.remove(msg_id);
        self.outbox.retain(|i| i.msg_id != msg_id);
    }

    /// One flush-tick iteration (§4.5): send the first never-sent item, or
    /// resend the first timed-out in-flight item, at most one per call.
    pub fn tick(&mut self, now_ms: u64) -> Option<String> {
        if let Some(idx) = self.outbox.iter().position(|i| !self.pending.contains(&i.msg_id)) {
            return Some(self.dispatch(idx, now_ms));
        }
        if let Some(idx) = self.outbox.iter().position(|i| {
            i.last_sent_at_ms
                .map(|last| now_ms.saturating_sub(last) > self.resend_after_ms)
                .unwrap_or(false)
        }) {
            return Some(self.dispatch(idx, now_ms));
        }
        None
    }

    fn dispatch(&mut self, idx: usize, now_ms: u64) -> String {
        let item = &mut self.outbox[idx];
        item.attempts += 1;
        item.last_sent_at_ms = Some(now_ms);
        let line = item.encode();
        self.pending.insert(item.msg_id.clone());
        line
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    #[cfg(test)]
    fn order(&self) -> Vec<String> {
        self.outbox.iter().map(|i| i.msg_type.clone()).collect()
    }
}
