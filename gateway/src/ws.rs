//! WebSocket /ws handler (§4.8): a per-connection bounded outbound queue
//! decoupled from the socket write path, so a slow client drops its own
//! oldest backlog instead of stalling event delivery for everyone else.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use operator_core::events::{AuroraEvent, BusEvent, ExecutionEvent};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping {
        id: Option<String>,
    },
    Subscribe {
        id: Option<String>,
        #[serde(default)]
        channels: Vec<String>,
    },
    Intent {
        id: Option<String>,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Connected {
        dropped_events: u64,
    },
    Pong {
        id: Option<String>,
        dropped_events: u64,
    },
    Subscribed {
        id: Option<String>,
        channels: Vec<String>,
    },
    Notification {
        seq: u64,
        metadata: serde_json::Value,
    },
    SkillExecution {
        seq: u64,
        metadata: serde_json::Value,
    },
    Error {
        id: Option<String>,
        message: String,
    },
}

/// Bounded, drop-oldest mailbox of pending outbound frames (§4.8). The
/// dropped-event count survives eviction and is reported back to the
/// client on the next `connected`/`pong` frame.
struct OutboundQueue {
    messages: VecDeque<ServerMessage>,
    dropped: AtomicU64,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::with_capacity(OUTBOUND_QUEUE_CAPACITY),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&mut self, message: ServerMessage) {
        if self.messages.len() >= OUTBOUND_QUEUE_CAPACITY {
            self.messages.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.messages.push_back(message);
    }

    fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let queue = Arc::new(Mutex::new(OutboundQueue::new()));
    let notify = Arc::new(Notify::new());

    {
        let mut q = queue.lock().await;
        q.push(ServerMessage::Connected { dropped_events: 0 });
    }
    notify.notify_one();

    let writer = {
        let queue = queue.clone();
        let notify = notify.clone();
        tokio::spawn(async move {
            loop {
                notify.notified().await;
                loop {
                    let next = queue.lock().await.messages.pop_front();
                    let Some(message) = next else { break };
                    let Ok(text) = serde_json::to_string(&message) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
            }
        })
    };

    let mut bus_rx = state.bus.subscribe();
    let forwarder = {
        let queue = queue.clone();
        let notify = notify.clone();
        tokio::spawn(async move {
            loop {
                match bus_rx.recv().await {
                    Ok(event) => {
                        let mut q = queue.lock().await;
                        q.push(to_server_message(event));
                        drop(q);
                        notify.notify_one();
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };
        let received_at = chrono::Utc::now().timestamp_millis();
        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping { id }) => {
                let dropped = queue.lock().await.dropped_count();
                Some(ServerMessage::Pong { id, dropped_events: dropped })
            }
            Ok(ClientMessage::Subscribe { id, channels }) => Some(ServerMessage::Subscribed { id, channels }),
            Ok(ClientMessage::Intent { id, message }) => {
                let routed = state.router.route(&message);
                Some(ServerMessage::SkillExecution {
                    seq: 0,
                    metadata: serde_json::json!({"id": id, "routed_intent": routed.intent, "confidence": routed.confidence}),
                })
            }
            Err(err) => Some(ServerMessage::Error {
                id: None,
                message: format!("could not parse client message: {err}"),
            }),
        };
        if let Some(reply) = reply {
            let now = chrono::Utc::now().timestamp_millis();
            state.aurora.record_channel_latency("ws", (now - received_at) as f64, now);
            let mut q = queue.lock().await;
            q.push(reply);
            drop(q);
            notify.notify_one();
        }
    }

    state.aurora.record_channel_disconnect("ws");
    writer.abort();
    forwarder.abort();
}

fn to_server_message(event: BusEvent) -> ServerMessage {
    match event {
        BusEvent::Execution { seq, event } => ServerMessage::SkillExecution {
            seq,
            metadata: execution_event_metadata(event),
        },
        BusEvent::Aurora { seq, event } => ServerMessage::Notification {
            seq,
            metadata: aurora_event_metadata(event),
        },
    }
}

fn execution_event_metadata(event: ExecutionEvent) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}

fn aurora_event_metadata(event: AuroraEvent) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}
