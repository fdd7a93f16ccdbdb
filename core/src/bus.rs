//! In-process event bus.
//!
//! A thin wrapper over `tokio::sync::broadcast`. Aurora's collectors, the
//! session log, and the gateway's WebSocket fan-out all subscribe; the
//! executor and Aurora publish. Neither side holds a reference to the
//! other, which is what breaks the cyclic dependency the design calls out.

use crate::events::{AuroraEvent, BusEvent, ExecutionEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Arc::new(Self {
            sender,
            seq: AtomicU64::new(0),
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish_execution(&self, event: ExecutionEvent) -> u64 {
        let seq = self.next_seq();
        // Subscribers are optional; nobody listening is not an error.
        let _ = self.sender.send(BusEvent::Execution { seq, event });
        seq
    }

    pub fn publish_aurora(&self, event: AuroraEvent) -> u64 {
        let seq = self.next_seq();
        let _ = self.sender.send(BusEvent::Aurora { seq, event });
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            sender,
            seq: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_monotonic_seq() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish_execution(ExecutionEvent::Completed {
            execution_id: "e1".into(),
        });
        bus.publish_aurora(AuroraEvent::Resume {
            execution_id: "e1".into(),
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let seq_of = |e: &BusEvent| match e {
            BusEvent::Execution { seq, .. } => *seq,
            BusEvent::Aurora { seq, .. } => *seq,
        };
        assert!(seq_of(&first) < seq_of(&second));
    }
}
