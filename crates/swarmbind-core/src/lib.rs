// # swarmbind-core
//
// Core library keeping firewall-hosted DNS records in sync with the
// lifecycle of orchestrated services.
//
// ## Architecture Overview
//
// - **LabelSchema**: Parses service labels into mapping declarations
// - **DnsGateway**: Trait for managing records via the DNS management API
// - **EventSource**: Trait for consuming service lifecycle events
// - **ServiceRegistry**: In-memory map of services to the records they own
// - **Reconciler**: Idempotent creation and deletion of owned records
// - **SyncEngine**: Event loop driving the reconciler
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from API clients
// 2. **Event-Driven**: Services are reconciled as their events arrive
// 3. **Failure Isolation**: One failing mapping never stops the others
// 4. **Library-First**: The daemon and the one-shot commands share this crate
// 5. **Idempotency**: Existing records are adopted, never duplicated

pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod ops;
pub mod reconciler;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, GatewayConfig, LabelConfig, SyncConfig};
pub use engine::{EngineEvent, SyncEngine};
pub use error::{Error, GatewayError, Result};
pub use labels::{LabelSchema, MappingDeclaration};
pub use reconciler::{Reconciler, RetryPolicy};
pub use registry::{OwnedRecord, ServiceRegistry};
pub use traits::{DnsGateway, EventSource, ServiceAction, ServiceEvent, ServiceMetadata};
