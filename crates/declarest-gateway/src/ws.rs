// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket subscription hub.
//!
//! Client -> Server (JSON):
//! ```json
//! {"action": "opendoc", "resource": "todos"}
//! {"action": "closedoc", "resource": "todos"}
//! ```
//!
//! Server -> Client (JSON): the notify wire shapes, e.g.
//! ```json
//! {"resource": "todos", "action": "create", "item": {"id": "..."}}
//! {"resource": "todos", "action": "update", "id": "...", "fields": {"title": "..."}}
//! {"resource": "todos", "action": "delete", "id": "..."}
//! ```
//!
//! Subscription requests for topics outside the synthesis-time whitelist are
//! ignored. Delivery is best-effort: a slow consumer's full buffer drops
//! events rather than blocking the publisher.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use declarest_core::{NotifyEvent, NotifySink};

/// Registry of live subscriber connections, keyed by a per-connection id.
pub struct WsHub {
    topics: Arc<HashSet<String>>,
    clients: DashMap<String, WsClient>,
}

struct WsClient {
    tx: mpsc::Sender<String>,
    topics: HashSet<String>,
}

/// Subscription frame from a client.
#[derive(Debug, Deserialize)]
struct SubscribeFrame {
    action: String,
    resource: String,
}

impl WsHub {
    /// A hub accepting subscriptions only to the given topics.
    pub fn new(topics: impl IntoIterator<Item = String>) -> Self {
        WsHub {
            topics: Arc::new(topics.into_iter().collect()),
            clients: DashMap::new(),
        }
    }

    /// The `/ws` route serving this hub.
    pub fn router(hub: Arc<WsHub>) -> Router {
        Router::new().route("/ws", get(ws_handler)).with_state(hub)
    }

    /// Register a connection and hand back its outbound channel.
    pub(crate) fn attach(&self, conn_id: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(64);
        self.clients.insert(
            conn_id.to_string(),
            WsClient {
                tx,
                topics: HashSet::new(),
            },
        );
        rx
    }

    pub(crate) fn detach(&self, conn_id: &str) {
        self.clients.remove(conn_id);
    }

    fn handle_frame(&self, conn_id: &str, frame: SubscribeFrame) {
        if !self.topics.contains(&frame.resource) {
            debug!(resource = %frame.resource, "subscription to unknown topic ignored");
            return;
        }
        let Some(mut client) = self.clients.get_mut(conn_id) else {
            return;
        };
        match frame.action.as_str() {
            "opendoc" => {
                client.topics.insert(frame.resource);
            }
            "closedoc" => {
                client.topics.remove(&frame.resource);
            }
            other => warn!(action = other, "unknown subscription action"),
        }
    }
}

#[async_trait]
impl NotifySink for WsHub {
    async fn publish(&self, event: &NotifyEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!("unserializable notify event: {e}");
                return;
            }
        };
        for client in self.clients.iter() {
            if client.topics.contains(&event.resource) {
                // Fire and forget; a full buffer just misses this event.
                let _ = client.tx.try_send(payload.clone());
            }
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<WsHub>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, hub))
}

/// Handle one subscriber connection: a sender task forwards published
/// events out, the receive loop applies subscription frames.
async fn handle_socket(socket: WebSocket, hub: Arc<WsHub>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut rx = hub.attach(&conn_id);

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                match serde_json::from_str::<SubscribeFrame>(text_str) {
                    Ok(frame) => hub.handle_frame(&conn_id, frame),
                    Err(e) => {
                        warn!("invalid subscription frame: {e}");
                        continue;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Binary and ping frames are not part of the protocol.
        }
    }

    hub.detach(&conn_id);
    sender_task.abort();
}
