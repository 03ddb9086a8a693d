//! Responder client configuration (§4.10), mirroring the server's
//! env-backed `clap` setup.

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(name = "fireline-client", about = "Responder client simulator for the Fireline edge coordinator")]
pub struct ClientConfig {
    /// WebSocket URL of the edge node (e.g. ws://127.0.0.1:3000/).
    #[arg(long, env = "EDGE_URL", default_value = "ws://127.0.0.1:3000/")]
    pub edge_url: String,

    #[arg(long, env = "INCIDENT_ID", default_value = "I1")]
    pub incident_id: String,

    #[arg(long, env = "RESPONDER_ID", default_value = "responder-1")]
    pub responder_id: String,

    /// How long an unacknowledged outbox item waits before being resent.
    #[arg(long, env = "RESEND_AFTER_MS", default_value_t = crate::sender::DEFAULT_RESEND_AFTER_MS)]
    pub resend_after_ms: u64,

    /// Flush-tick cadence for the reliable sender.
    #[arg(long, env = "FLUSH_TICK_MS", default_value_t = 300)]
    pub flush_tick_ms: u64,
}

impl From<ClientConfig> for crate::transport::ConnectConfig {
    fn from(c: ClientConfig) -> Self {
        Self {
            edge_url: c.edge_url,
            incident_id: c.incident_id,
            responder_id: c.responder_id,
            resend_after_ms: c.resend_after_ms,
            flush_tick_ms: c.flush_tick_ms,
        }
    }
}
