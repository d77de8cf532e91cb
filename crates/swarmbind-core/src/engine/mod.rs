//! Event loop driver
//!
//! The SyncEngine is responsible for:
//! - Consuming service lifecycle events from an EventSource
//! - Extracting mapping declarations from created services
//! - Handing creations and removals to the Reconciler
//! - Reloading the DNS service after every handled event
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ EventSource │─── ServiceEvent ───┐
//! └─────────────┘                    │
//!                                    ▼
//!                           ┌──────────────┐
//!                           │  SyncEngine  │
//!                           └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ LabelSchema │           │  Reconciler  │           │   Events    │
//! │ (extract)   │           │ (gateway +   │           │  (notify)   │
//! └─────────────┘           │  registry)   │           └─────────────┘
//!                           └──────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. `create`: inspect service → extract labels → reconcile_create → reconfigure
//! 2. `remove`: reconcile_remove → reconfigure
//! 3. anything else: ignored
//!
//! Events are handled one at a time, in delivery order. Reconfigure runs even
//! when reconciliation partially failed.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::labels::LabelSchema;
use crate::reconciler::{Reconciler, RetryPolicy};
use crate::registry::ServiceRegistry;
use crate::traits::{DnsGateway, EventSource, ServiceAction, ServiceEvent};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started,

    /// A created service was reconciled
    ServiceReconciled {
        service_id: String,
        records: usize,
        failures: usize,
    },

    /// Metadata of a created service could not be fetched
    InspectionFailed { service_id: String, error: String },

    /// The records of a removed service were deleted and the entry evicted
    ServiceRemoved {
        service_id: String,
        deleted: usize,
        failures: usize,
    },

    /// Removal of a service the registry does not know
    UnknownServiceRemoved { service_id: String },

    /// An event with an action other than create/remove was skipped
    EventIgnored { service_id: String, action: String },

    /// DNS service reloaded
    Reconfigured,

    /// DNS service reload failed
    ReconfigureFailed { error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core event-driven engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine runs until shutdown signal received or the event stream fails
/// 4. The event stream is dropped and the source closed before returning
///
/// ## Cancellation
///
/// The shutdown signal is only observed between events: an event being
/// handled when the signal arrives is completed first.
pub struct SyncEngine {
    /// Source of service lifecycle events
    source: Box<dyn EventSource>,

    /// Drives gateway calls and owns the registry
    reconciler: Reconciler,

    /// Label convention
    schema: LabelSchema,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `source`: event source implementation
    /// - `gateway`: DNS gateway implementation
    /// - `registry`: registry the engine maintains (clone it to observe it)
    /// - `config`: swarmbind configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn EventSource>,
        gateway: Arc<dyn DnsGateway>,
        registry: ServiceRegistry,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.labels.validate()?;
        config.engine.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            source,
            reconciler: Reconciler::new(
                gateway,
                registry,
                RetryPolicy::from_config(&config.engine),
            ),
            schema: LabelSchema::new(config.labels.prefix.clone()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Handle to the registry maintained by this engine
    pub fn registry(&self) -> &ServiceRegistry {
        self.reconciler.registry()
    }

    /// Run the engine until SIGINT/ctrl-c
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The event stream could not be opened or read
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// With `None`, the engine runs until the event stream fails.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_until(async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        })
        .await
    }

    /// Run the engine until `shutdown` completes
    pub async fn run_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        self.emit_event(EngineEvent::Started);

        let mut events = match self.source.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to subscribe to {}: {}", self.source.source_name(), e);
                let reason = e.to_string();
                self.close_source().await;
                self.emit_event(EngineEvent::Stopped { reason });
                return Err(e);
            }
        };
        info!("Listening for events from {}", self.source.source_name());

        tokio::pin!(shutdown);

        // Main event loop
        let (outcome, reason) = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break (Ok(()), "Shutdown signal".to_string());
                }

                next = events.next() => match next {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => {
                        error!("Failed to read event stream: {}", e);
                        let reason = e.to_string();
                        break (Err(e), reason);
                    }
                    None => {
                        warn!("Event stream closed by {}", self.source.source_name());
                        let e = Error::orchestration("event stream closed");
                        let reason = e.to_string();
                        break (Err(e), reason);
                    }
                },
            }
        };

        drop(events);
        info!("Closed event stream");

        self.close_source().await;
        self.emit_event(EngineEvent::Stopped { reason });
        outcome
    }

    async fn close_source(&self) {
        if let Err(e) = self.source.close().await {
            warn!("Failed to close {}: {}", self.source.source_name(), e);
        } else {
            info!("Closed {}", self.source.source_name());
        }
    }

    /// Handle one service event
    ///
    /// Never fails: per-event errors are logged and reported as engine events.
    pub async fn handle_event(&self, event: ServiceEvent) {
        match event.action {
            ServiceAction::Create => {
                self.handle_created(&event.actor_id).await;
                self.reconfigure().await;
            }
            ServiceAction::Remove => {
                self.handle_removed(&event.actor_id).await;
                self.reconfigure().await;
            }
            ServiceAction::Other(action) => {
                debug!("Ignoring {} event for service {}", action, event.actor_id);
                self.emit_event(EngineEvent::EventIgnored {
                    service_id: event.actor_id,
                    action,
                });
            }
        }
    }

    async fn handle_created(&self, service_id: &str) {
        let service = match self.source.inspect_service(service_id).await {
            Ok(service) => service,
            Err(e) => {
                error!("Failed to inspect service {}: {}", service_id, e);
                self.emit_event(EngineEvent::InspectionFailed {
                    service_id: service_id.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let extraction = self.schema.extract(service_id, &service.labels);
        for diagnostic in &extraction.diagnostics {
            error!("{}", diagnostic);
        }

        if extraction.is_empty() {
            debug!("Service {} declares no complete mapping", service_id);
        }

        let report = self
            .reconciler
            .reconcile_create(service_id, &extraction.declarations)
            .await;

        self.emit_event(EngineEvent::ServiceReconciled {
            service_id: service_id.to_string(),
            records: report.records.len(),
            failures: report.failures.len(),
        });
    }

    async fn handle_removed(&self, service_id: &str) {
        match self.reconciler.reconcile_remove(service_id).await {
            Ok(report) => {
                self.emit_event(EngineEvent::ServiceRemoved {
                    service_id: service_id.to_string(),
                    deleted: report.deleted.len(),
                    failures: report.failures.len(),
                });
            }
            Err(e) => {
                error!("{}", e);
                self.emit_event(EngineEvent::UnknownServiceRemoved {
                    service_id: service_id.to_string(),
                });
            }
        }
    }

    async fn reconfigure(&self) {
        match self.reconciler.reconfigure().await {
            Ok(()) => {
                debug!("Reconfigured DNS service");
                self.emit_event(EngineEvent::Reconfigured);
            }
            Err(e) => {
                error!("Failed to reconfigure DNS service: {}", e);
                self.emit_event(EngineEvent::ReconfigureFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Full channel: the consumer is slower than the event stream
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
