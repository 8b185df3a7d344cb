//! Broadcast router
//!
//! A single dispatch task drains a FIFO queue of call messages and fans each
//! one out over the [`ConnectionRegistry`]. Producers never wait: the queue
//! is unbounded, call volume being human-paced.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::{BroadcastFrame, CallMessage, ConnectionRegistry, DeliveryMode};

/// The dispatch task has stopped; the message was not queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterClosed(pub CallMessage);

impl std::fmt::Display for RouterClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Broadcast router closed")
    }
}

impl std::error::Error for RouterClosed {}

/// Producer side of the router queue
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<CallMessage>,
}

impl RouterHandle {
    /// Queue a message for fan-out
    pub fn publish(&self, message: CallMessage) -> Result<(), RouterClosed> {
        self.tx.send(message).map_err(|e| RouterClosed(e.0))
    }

    /// Whether the dispatch task is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-consumer dispatch loop
pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
    rx: mpsc::UnboundedReceiver<CallMessage>,
    mode: DeliveryMode,
}

impl BroadcastRouter {
    /// Create a router and its producer handle
    ///
    /// The delivery mode is taken from the registry configuration.
    pub fn new(registry: Arc<ConnectionRegistry>) -> (Self, RouterHandle) {
        let mode = registry.config().delivery_mode;
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { registry, rx, mode }, RouterHandle { tx })
    }

    /// Spawn the dispatch loop on the runtime
    ///
    /// The task ends once every [`RouterHandle`] is dropped.
    pub fn spawn(registry: Arc<ConnectionRegistry>) -> (RouterHandle, JoinHandle<()>) {
        let (router, handle) = Self::new(registry);
        let task = tokio::spawn(router.run());
        (handle, task)
    }

    /// Run the dispatch loop until the queue closes
    pub async fn run(mut self) {
        tracing::info!(mode = ?self.mode, "Broadcast router started");

        while let Some(message) = self.rx.recv().await {
            self.dispatch(&message).await;
        }

        tracing::info!("Broadcast router stopped");
    }

    async fn dispatch(&self, message: &CallMessage) {
        let frame = match BroadcastFrame::from_message(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    room = %message.room_code,
                    "Failed to encode call message"
                );
                return;
            }
        };

        let report = self.registry.broadcast(&frame, self.mode).await;

        tracing::info!(
            display = %message.display_code,
            room = %message.room_code,
            queue_number = %message.queue_number,
            delivered = report.delivered,
            dropped = report.dropped,
            "Call broadcast"
        );
    }
}
