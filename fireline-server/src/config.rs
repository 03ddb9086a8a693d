//! Server configuration (§4.10): everything is a flag with an environment
//! fallback, matching how the rest of the ecosystem wires up `clap`.

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(name = "fireline-server", about = "Edge coordinator for first-responder incidents")]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "FIRELINE_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// How long a message identifier suppresses re-execution within an
    /// incident, in milliseconds.
    #[arg(long, env = "DEDUP_TTL_MS", default_value_t = 900_000)]
    pub dedup_ttl_ms: u64,

    /// Dedup sweeper cadence, in milliseconds.
    #[arg(long, env = "SWEEP_INTERVAL_MS", default_value_t = 60_000)]
    pub sweep_interval_ms: u64,
}
