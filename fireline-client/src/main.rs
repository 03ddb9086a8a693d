//! Responder client simulator: connects to an edge node, applies snapshots
//! and incremental updates into observable state, and periodically sends a
//! simulated location update so the reliable sender has something to drain.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fireline_client::applier::ObservedState;
use fireline_client::{connect, ClientConfig, ConnectConfig, Event};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fireline_client=info".parse()?))
        .init();

    let config = ClientConfig::parse();
    tracing::info!(edge_url = %config.edge_url, incident_id = %config.incident_id, responder_id = %config.responder_id, "starting responder client");

    let incident_id = config.incident_id.clone();
    let responder_id = config.responder_id.clone();
    let (handle, mut events) = connect(ConnectConfig::from(config));

    let mut state = ObservedState::default();
    state.on_connect_begin(&incident_id, &responder_id);

    let mut location_ticker = tokio::time::interval(std::time::Duration::from_secs(10));
    // Placeholder coordinates: real geolocation sourcing is an external
    // collaborator (§1), out of scope here.
    let (mut lat, mut lng) = (37.7749, -122.4194);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Connecting => { tracing::info!("connecting"); }
                    Event::Open => { state.on_open(); tracing::info!("connected"); }
                    Event::Closed { reason } => { state.on_close(); tracing::warn!(%reason, "disconnected"); }
                    Event::Message(msg) => {
                        tracing::debug!(?msg, "server message");
                        state.apply(&msg);
                    }
                }
            }
            _ = location_ticker.tick() => {
                lat += 0.0001;
                lng += 0.0001;
                handle.location_update(lat, lng, Some(5.0)).await;
            }
        }
    }

    Ok(())
}
