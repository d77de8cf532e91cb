// # Event Source Trait
//
// Defines the interface for consuming orchestration lifecycle events.
//
// ## Implementations
//
// - Docker Engine API (swarm services): `swarmbind-source-docker` crate
//
// ## Usage
//
// ```rust,ignore
// use swarmbind_core::EventSource;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* EventSource implementation */;
//
//     let mut events = source.subscribe().await?;
//     while let Some(event) = events.next().await {
//         let event = event?;
//         let service = source.inspect_service(&event.actor_id).await?;
//         println!("{:?}: {:?}", event.action, service.labels);
//     }
//
//     source.close().await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lifecycle action carried by a service event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    /// A service was created
    Create,
    /// A service was removed
    Remove,
    /// Any other action (update, ...), ignored by the engine
    Other(String),
}

impl ServiceAction {
    /// Classify a raw action name
    pub fn from_action(action: &str) -> Self {
        match action {
            "create" => ServiceAction::Create,
            "remove" => ServiceAction::Remove,
            other => ServiceAction::Other(other.to_string()),
        }
    }
}

/// A lifecycle event for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    /// What happened
    pub action: ServiceAction,
    /// Identifier of the service the event is about
    pub actor_id: String,
}

impl ServiceEvent {
    /// Create a new service event
    pub fn new(action: ServiceAction, actor_id: impl Into<String>) -> Self {
        Self {
            action,
            actor_id: actor_id.into(),
        }
    }

    /// Convenience constructor for a creation event
    pub fn created(actor_id: impl Into<String>) -> Self {
        Self::new(ServiceAction::Create, actor_id)
    }

    /// Convenience constructor for a removal event
    pub fn removed(actor_id: impl Into<String>) -> Self {
        Self::new(ServiceAction::Remove, actor_id)
    }
}

/// Metadata of a service, as returned by inspection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetadata {
    /// Service identifier
    pub id: String,
    /// Service labels
    pub labels: HashMap<String, String>,
}

/// Stream of service events
///
/// An `Err` item means the stream itself could not be read; the stream
/// yields nothing after it.
pub type ServiceEventStream =
    Pin<Box<dyn Stream<Item = Result<ServiceEvent, crate::Error>> + Send + 'static>>;

/// Trait for orchestration event source implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Stream Semantics
///
/// The stream returned by [`EventSource::subscribe`] is lazy, unbounded and
/// non-restartable: it delivers events in the order the orchestrator emits
/// them and ends only when the connection is lost. Dropping it must release
/// the underlying connection.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the event stream
    async fn subscribe(&self) -> Result<ServiceEventStream, crate::Error>;

    /// Fetch the metadata of a service
    async fn inspect_service(&self, actor_id: &str) -> Result<ServiceMetadata, crate::Error>;

    /// Release any resources still held by the source
    ///
    /// Called once by the engine after the event loop ended.
    async fn close(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_are_classified() {
        assert_eq!(ServiceAction::from_action("create"), ServiceAction::Create);
        assert_eq!(ServiceAction::from_action("remove"), ServiceAction::Remove);
        assert_eq!(
            ServiceAction::from_action("update"),
            ServiceAction::Other("update".to_string())
        );
    }
}
