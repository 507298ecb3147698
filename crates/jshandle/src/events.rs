//! Context Events - lifecycle notifications for execution contexts
//!
//! Design: one broadcast channel per context. Destruction is pushed to
//! handles through the context's registry; the bus only lets outside
//! observers see it happen.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::context::ExecutionContextId;

/// Events an execution context can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContextEvent {
    /// A handle was explicitly disposed; `object_id` is set when a release was sent
    HandleDisposed {
        context_id: ExecutionContextId,
        object_id: Option<String>,
    },
    /// The context was torn down and `handles` live handles were invalidated
    Destroyed {
        context_id: ExecutionContextId,
        handles: usize,
    },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<ContextEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: ContextEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
