//! Transport adapter, client half (C7): a reconnecting WebSocket duplex
//! that drives the reliable sender's flush tick and feeds decoded server
//! frames back to the caller as [`Event`]s.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use fireline_proto::{kind, now_ms, ServerMessage};

use crate::sender::Sender;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Events surfaced to the consumer (UI, simulator bot, snapshot applier).
#[derive(Debug, Clone)]
pub enum Event {
    Connecting,
    Open,
    Message(ServerMessage),
    Closed { reason: String },
}

enum Command {
    Enqueue { msg_type: String, payload: Map<String, Value> },
}

#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn location_update(&self, lat: f64, lng: f64, accuracy: Option<f64>) {
        let mut payload = Map::new();
        payload.insert("lat".into(), Value::from(lat));
        payload.insert("lng".into(), Value::from(lng));
        if let Some(a) = accuracy {
            payload.insert("accuracy".into(), Value::from(a));
        }
        self.enqueue(kind::LOCATION_UPDATE, payload).await;
    }

    pub async fn sos_raise(&self, note: Option<&str>) {
        let mut payload = Map::new();
        if let Some(n) = note {
            payload.insert("note".into(), Value::String(n.to_string()));
        }
        self.enqueue(kind::SOS_RAISE, payload).await;
    }

    pub async fn sos_clear(&self) {
        self.enqueue(kind::SOS_CLEAR, Map::new()).await;
    }

    pub async fn chat_send(&self, text: &str) {
        let mut payload = Map::new();
        payload.insert("text".into(), Value::String(text.to_string()));
        self.enqueue(kind::CHAT_SEND, payload).await;
    }

    async fn enqueue(&self, msg_type: &str, payload: Map<String, Value>) {
        let _ = self.cmd_tx.send(Command::Enqueue { msg_type: msg_type.to_string(), payload }).await;
    }
}

#[derive(Clone)]
pub struct ConnectConfig {
    pub edge_url: String,
    pub incident_id: String,
    pub responder_id: String,
    pub resend_after_ms: u64,
    pub flush_tick_ms: u64,
}

/// Connect (with automatic reconnect) and return a handle plus an event
/// stream. The outbox lives for the lifetime of the connection task, so it
/// survives every reconnect — the offline-first guarantee from §4.5.
pub fn connect(config: ConnectConfig) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    tokio::spawn(run(config, event_tx, cmd_rx));
    (ClientHandle { cmd_tx }, event_rx)
}

enum SessionEnd {
    CommandChannelClosed,
    Disconnected(String),
}

async fn run(config: ConnectConfig, event_tx: mpsc::Sender<Event>, mut cmd_rx: mpsc::Receiver<Command>) {
    let mut sender = Sender::new(config.resend_after_ms);
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        let _ = event_tx.send(Event::Connecting).await;
        let ws_stream = match tokio_tungstenite::connect_async(&config.edge_url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let _ = event_tx.send(Event::Closed { reason: e.to_string() }).await;
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };
        delay = INITIAL_RECONNECT_DELAY;
        let _ = event_tx.send(Event::Open).await;

        match session(ws_stream, &config, &mut sender, &event_tx, &mut cmd_rx).await {
            SessionEnd::CommandChannelClosed => return,
            SessionEnd::Disconnected(reason) => {
                let _ = event_tx.send(Event::Closed { reason }).await;
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
            }
        }
    }
}

async fn session<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    config: &ConnectConfig,
    sender: &mut Sender,
    event_tx: &mpsc::Sender<Event>,
    cmd_rx: &mut mpsc::Receiver<Command>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Handshake goes out-of-band, ahead of the outbox: the reference
    // behavior gates flushing on the socket being open, not on the
    // handshake's own ACK (a pre-handshake data message just gets a benign
    // "must send CLIENT_HELLO" error the client would retry after reconnect
    // anyway).
    let hello = serde_json::json!({
        "type": kind::CLIENT_HELLO,
        "incidentId": config.incident_id,
        "responderId": config.responder_id,
    })
    .to_string();
    if ws_tx.send(WsMessage::Text(hello)).await.is_err() {
        return SessionEnd::Disconnected("failed to send handshake".to_string());
    }

    let mut flush = tokio::time::interval(Duration::from_millis(config.flush_tick_ms));
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = flush.tick() => {
                if let Some(line) = sender.tick(now_ms())
                    && ws_tx.send(WsMessage::Text(line)).await.is_err() {
                        return SessionEnd::Disconnected("write failed".to_string());
                    }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Enqueue { msg_type, payload }) => {
                        sender.enqueue(&msg_type, payload);
                    }
                    None => return SessionEnd::CommandChannelClosed,
                }
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(msg) = ServerMessage::decode(&text) {
                            if let ServerMessage::AckMsg { msg_id, .. } = &msg {
                                sender.ack(msg_id);
                            }
                            let _ = event_tx.send(Event::Message(msg)).await;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                    None => return SessionEnd::Disconnected("connection closed".to_string()),
                }
            }
        }
    }
}
