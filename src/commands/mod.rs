use crate::{db::PoolRegistry, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for implementing the Command Pattern
///
/// Each lifecycle operation is encapsulated in one command object that can be
/// validated, executed against the pool registry, and produce events. There
/// is exactly one implementation per transition.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `registry` - Pool registry resolving logical database targets
    /// * `event_sender` - Channel to publish domain events
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Publishes a domain event, degrading a send failure to a warning. Events
/// are observability, not state; the operation that produced them has already
/// committed.
pub(crate) async fn publish(sender: &EventSender, event: crate::events::Event) {
    if let Err(e) = sender.send(event).await {
        tracing::warn!("failed to publish domain event: {e}");
    }
}

pub mod orders;
pub mod receiving;
