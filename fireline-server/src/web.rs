//! Transport adapter, server half (C7): an axum WebSocket upgrade plus the
//! `/health` liveness probe (§4.8).

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State as AxumState, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::dispatcher::Connection;
use crate::State;

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, AxumState(state): AxumState<Arc<State>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<State>) {
    let mut conn = Connection::new();
    let conn_id = conn.id;
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Outgoing messages flow through this channel so a slow peer's write
    // can never block the dispatcher processing other connections.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    state.register_sender(conn_id, tx);

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(line.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => conn.handle_line(&state, &text).await,
            Ok(_) => continue, // Binary/Ping/Pong/Close: not protocol data
            Err(e) => {
                tracing::warn!(conn = %conn_id, "transport error: {e}");
                break;
            }
        }
    }

    conn.on_disconnect(&state);
    state.unregister_sender(conn_id);
    writer.abort();
}
