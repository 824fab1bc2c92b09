//! `/api/ws`: live event channel. `LiveSubscriber` (defined in
//! `quarryscout_core::subscribers`) removes a subscriber the moment a
//! send to it fails rather than silently dropping messages for a lagging
//! one. This module supplies the axum-specific half: a `LiveSubscriber`
//! impl that forwards through an unbounded channel to a task owning the
//! actual `WebSocket` sink, plus the upgrade handler that
//! registers/unregisters it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use quarryscout_core::{LiveSubscriber, SubscriberId, WsEnvelope};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_EVENTS_SENT};
use crate::state::AppState;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

struct WsSubscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl LiveSubscriber for WsSubscriber {
    async fn send(&self, envelope: &WsEnvelope) -> Result<(), ()> {
        let json = serde_json::to_string(envelope).map_err(|_| ())?;
        WS_EVENTS_SENT
            .with_label_values(&[envelope_type(envelope)])
            .inc();
        self.tx.send(Message::Text(json.into())).map_err(|_| ())
    }

    fn id(&self) -> SubscriberId {
        self.id
    }
}

fn envelope_type(envelope: &WsEnvelope) -> &'static str {
    match envelope {
        WsEnvelope::WorkerStatus { .. } => "worker_status",
        WsEnvelope::NewMatch { .. } => "new_match",
        WsEnvelope::NewLog { .. } => "new_log",
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Registers a subscriber for the life of the connection, forwards every
/// broadcast to it through an unbounded channel, and unregisters it on
/// disconnect or first write failure. Client-sent frames are read only to
/// detect liveness/close; their content is otherwise ignored.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
    let registry = state.engine.registry();
    registry.register(Arc::new(WsSubscriber { id, tx }));

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(subscriber_id = id, "websocket client connected");

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                debug!("websocket send failed, client likely disconnected");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Client frames carry no meaning beyond liveness.
            }
            Err(e) => {
                warn!(subscriber_id = id, error = %e, "websocket receive error");
                break;
            }
        }
    }

    registry.unregister(id);
    write_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!(subscriber_id = id, "websocket client disconnected");
}
