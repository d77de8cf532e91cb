//! In-memory service registry
//!
//! The registry correlates services with the DNS records the engine created
//! or adopted on their behalf. It is the engine's single source of truth for
//! what it believes exists in the zone.
//!
//! ## Lifetime
//!
//! - Entries live for the lifetime of the process; nothing is persisted
//! - After a restart, removal events for services created earlier are
//!   reported as unknown and their records are left in place
//!
//! ## Invariant
//!
//! A service present in the registry has at least one attempted record,
//! possibly with a missing identifier when the attempt failed.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A DNS record owned by a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    /// Domain (zone) name
    pub domain: String,
    /// Record name inside the domain
    pub host: String,
    /// Record type
    pub record_type: String,
    /// Record value
    pub value: String,
    /// Identifier returned on creation or found by search
    ///
    /// `None` when creation or lookup failed. Such a record cannot be
    /// deleted and is reported as inconsistent on removal.
    pub record_id: Option<String>,
}

impl OwnedRecord {
    /// Whether the record can be deleted through the gateway
    pub fn is_deletable(&self) -> bool {
        self.record_id.is_some()
    }
}

/// The records owned by one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Service identifier
    pub service_id: String,
    /// Owned records, in declaration order
    pub records: Vec<OwnedRecord>,
}

/// Registry of services and their owned records
///
/// Cloning yields a handle to the same registry. All access goes through
/// the async methods, which take the internal lock for the duration of a
/// single operation only.
///
/// # Example
///
/// ```rust
/// use swarmbind_core::registry::{OwnedRecord, ServiceRegistry};
///
/// #[tokio::main]
/// async fn main() {
///     let registry = ServiceRegistry::new();
///
///     registry
///         .put(
///             "svc-1",
///             vec![OwnedRecord {
///                 domain: "example.org".to_string(),
///                 host: "api".to_string(),
///                 record_type: "CNAME".to_string(),
///                 value: "ingress".to_string(),
///                 record_id: Some("rec-1".to_string()),
///             }],
///         )
///         .await;
///
///     assert_eq!(registry.get("svc-1").await.map(|r| r.len()), Some(1));
///     assert!(registry.remove("svc-1").await.is_some());
///     assert!(registry.get("svc-1").await.is_none());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<RwLock<HashMap<String, ServiceEntry>>>,
}

impl ServiceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry of a service
    ///
    /// Returns the records previously owned by the service, if any.
    pub async fn put(
        &self,
        service_id: impl Into<String>,
        records: Vec<OwnedRecord>,
    ) -> Option<Vec<OwnedRecord>> {
        let service_id = service_id.into();
        let entry = ServiceEntry {
            service_id: service_id.clone(),
            records,
        };

        let mut guard = self.inner.write().await;
        guard.insert(service_id, entry).map(|prior| prior.records)
    }

    /// Get the records currently owned by a service
    pub async fn get(&self, service_id: &str) -> Option<Vec<OwnedRecord>> {
        let guard = self.inner.read().await;
        guard.get(service_id).map(|entry| entry.records.clone())
    }

    /// Evict the entry of a service
    pub async fn remove(&self, service_id: &str) -> Option<ServiceEntry> {
        let mut guard = self.inner.write().await;
        guard.remove(service_id)
    }

    /// Check whether a service is known
    pub async fn contains(&self, service_id: &str) -> bool {
        self.inner.read().await.contains_key(service_id)
    }

    /// Get the number of services in the registry
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// List all known service identifiers
    pub async fn service_ids(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }
}
