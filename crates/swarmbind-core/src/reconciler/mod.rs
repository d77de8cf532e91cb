//! Reconciliation of declared mappings against the DNS zone
//!
//! The Reconciler is responsible for:
//! - Creating the records a service declares, unless they already exist
//! - Recording what each service owns in the [`ServiceRegistry`]
//! - Deleting owned records when the service goes away
//! - Retrying idempotent gateway calls on retryable failures
//!
//! ## Failure isolation
//!
//! Each declaration (selector) is processed on its own: a failing selector
//! is logged, recorded with a missing identifier, and the next selector is
//! processed. On removal, a failing delete does not prevent deleting the
//! remaining records, and the registry entry is evicted regardless.
//!
//! ## Idempotency
//!
//! Before creating a record the reconciler searches for one with the same
//! domain, type and name. A match is adopted instead of creating a
//! duplicate. This is a best-effort check: a concurrent external change
//! between search and create is not detected.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, GatewayError, Result};
use crate::labels::MappingDeclaration;
use crate::registry::{OwnedRecord, ServiceRegistry};
use crate::traits::DnsGateway;

/// Retry policy for idempotent gateway calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        delay: Duration::ZERO,
    };

    /// Build the policy from engine settings
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Outcome of [`Reconciler::reconcile_create`]
#[derive(Debug, Default)]
pub struct CreateReport {
    /// Owned records produced, one per declaration
    pub records: Vec<OwnedRecord>,
    /// Number of records newly created
    pub created: usize,
    /// Number of pre-existing records adopted
    pub adopted: usize,
    /// Non-fatal warnings (unresolved domains)
    pub warnings: Vec<Error>,
    /// Per-selector failures
    pub failures: Vec<Error>,
}

/// Outcome of [`Reconciler::reconcile_remove`]
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// Identifiers of the records deleted
    pub deleted: Vec<String>,
    /// Records that had no identifier and were skipped
    pub skipped: Vec<OwnedRecord>,
    /// Per-record delete failures
    pub failures: Vec<Error>,
}

enum Resolution {
    Created(Option<String>),
    Adopted(String),
}

/// Drives gateway calls for service lifecycle changes
///
/// The reconciler owns the handle to the [`ServiceRegistry`]; nothing else
/// mutates it.
pub struct Reconciler {
    gateway: Arc<dyn DnsGateway>,
    registry: ServiceRegistry,
    retry: RetryPolicy,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(gateway: Arc<dyn DnsGateway>, registry: ServiceRegistry, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            registry,
            retry,
        }
    }

    /// Handle to the registry this reconciler maintains
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The gateway this reconciler drives
    pub fn gateway(&self) -> &Arc<dyn DnsGateway> {
        &self.gateway
    }

    /// Create the records declared by a service
    ///
    /// Every declaration yields exactly one [`OwnedRecord`], with a missing
    /// identifier when the selector failed. The registry entry is replaced
    /// when at least one declaration was given.
    pub async fn reconcile_create(
        &self,
        service_id: &str,
        declarations: &[MappingDeclaration],
    ) -> CreateReport {
        let mut report = CreateReport::default();

        for declaration in declarations {
            let mut record = OwnedRecord {
                domain: declaration.domain.clone(),
                host: declaration.host.clone(),
                record_type: declaration.record_type.clone(),
                value: declaration.value.clone(),
                record_id: None,
            };

            match self.resolve_declaration(service_id, declaration, &mut report).await {
                Ok(Resolution::Created(record_id)) => {
                    if record_id.is_none() {
                        warn!(
                            "Service {}: record {}.{} saved without an identifier, it will not be removable",
                            service_id, declaration.host, declaration.domain
                        );
                    }
                    record.record_id = record_id;
                    report.created += 1;
                    info!("Added bind record {:?} for service {}", record, service_id);
                }
                Ok(Resolution::Adopted(record_id)) => {
                    warn!(
                        "For service {}, host record {} ({}) already exists on domain {}",
                        service_id, declaration.host, declaration.record_type, declaration.domain
                    );
                    record.record_id = Some(record_id);
                    report.adopted += 1;
                }
                Err(e) => {
                    error!(
                        "Service {}: failed to reconcile mapping '{}': {}",
                        service_id, declaration.selector, e
                    );
                    report.failures.push(e);
                }
            }

            report.records.push(record);
        }

        if report.records.is_empty() {
            debug!("Service {} declares no mappings", service_id);
            return report;
        }

        self.registry.put(service_id, report.records.clone()).await;
        info!(
            "Registered service {} with {} record(s)",
            service_id,
            report.records.len()
        );

        report
    }

    /// Delete the records owned by a service and forget it
    ///
    /// # Returns
    ///
    /// - `Ok(RemoveReport)`: the service was known; see the report for
    ///   per-record outcomes
    /// - `Err(Error::UnknownService)`: the service was not in the registry;
    ///   no gateway call was made
    pub async fn reconcile_remove(&self, service_id: &str) -> Result<RemoveReport> {
        let Some(records) = self.registry.get(service_id).await else {
            return Err(Error::UnknownService(service_id.to_string()));
        };

        let mut report = RemoveReport::default();

        for record in records {
            let Some(record_id) = record.record_id.clone() else {
                warn!(
                    "Service {}: record {}.{} has no identifier, cannot remove it",
                    service_id, record.host, record.domain
                );
                report.skipped.push(record);
                continue;
            };

            let gateway = &self.gateway;
            match self
                .with_retry("remove record", || gateway.remove_record(&record_id))
                .await
            {
                Ok(()) => {
                    info!("Removed bind record {:?}", record);
                    report.deleted.push(record_id);
                }
                Err(e) => {
                    warn!("Service {}: {}", service_id, e);
                    report.failures.push(e.into());
                }
            }
        }

        self.registry.remove(service_id).await;
        info!("Removed service {}", service_id);

        Ok(report)
    }

    /// Reload the DNS service
    pub async fn reconfigure(&self) -> std::result::Result<(), GatewayError> {
        let gateway = &self.gateway;
        self.with_retry("reconfigure", || gateway.reconfigure()).await
    }

    async fn resolve_declaration(
        &self,
        service_id: &str,
        declaration: &MappingDeclaration,
        report: &mut CreateReport,
    ) -> Result<Resolution> {
        let gateway = &self.gateway;

        let domain_id = self
            .with_retry("find domain", || gateway.find_domain(&declaration.domain))
            .await?;

        if domain_id.is_none() {
            warn!(
                "Could not find domain id for domain {} on service {}",
                declaration.domain, service_id
            );
            report
                .warnings
                .push(Error::DomainUnresolved(declaration.domain.clone()));
        }

        let existing = self
            .with_retry("search record", || {
                gateway.search_record(
                    &declaration.domain,
                    &declaration.record_type,
                    &declaration.host,
                )
            })
            .await?;

        if let Some(record_id) = existing {
            return Ok(Resolution::Adopted(record_id));
        }

        // Creation is not idempotent, a retried add could duplicate the record
        let record_id = self
            .gateway
            .add_record(
                domain_id.as_deref(),
                &declaration.host,
                &declaration.record_type,
                &declaration.value,
            )
            .await?;

        Ok(Resolution::Created(record_id))
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> std::result::Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} attempt {} failed on {}: {}",
                        operation,
                        attempt,
                        self.gateway.gateway_name(),
                        e
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
