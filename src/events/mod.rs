use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted after a lifecycle operation commits.
///
/// Consumers are in-process only; event delivery failure never fails the
/// operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_no: String,
        store_name: String,
    },
    OrderApproved {
        order_no: String,
        approved_by: String,
    },
    OrderPacked {
        order_no: String,
        packed_by: String,
    },
    OrderDispatched {
        order_no: String,
        dispatched_by: String,
    },
    OrderReceived {
        order_no: String,
    },
    OrderStatusUpdated {
        order_no: String,
        status: String,
    },
    GoodsReceiptPosted {
        grv_no: String,
        order_no: String,
    },
    StoreMirrorSyncFailed {
        order_no: String,
        store_name: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Spawned once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StoreMirrorSyncFailed {
                order_no,
                store_name,
                reason,
            } => {
                warn!(%order_no, %store_name, %reason, "store mirror sync failed");
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
    info!("event channel closed, processor exiting");
}
