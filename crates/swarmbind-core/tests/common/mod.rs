//! Test doubles and common utilities for contract tests
//!
//! This module provides a recording gateway and a channel-driven event
//! source so that contract tests can drive the engine deterministically.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swarmbind_core::error::{Error, GatewayError, Result};
use swarmbind_core::traits::{
    DnsGateway, EventSource, ServiceEvent, ServiceEventStream, ServiceMetadata,
};
use swarmbind_core::{EngineEvent, GatewayConfig, LabelConfig, SyncConfig};
use tokio::sync::mpsc;

/// A call received by [`MockGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    FindDomain(String),
    SearchRecord {
        domain: String,
        record_type: String,
        name: String,
    },
    AddRecord {
        domain_id: Option<String>,
        name: String,
        record_type: String,
        value: String,
    },
    RemoveRecord(String),
    Reconfigure,
}

#[derive(Default)]
struct MockState {
    calls: Vec<GatewayCall>,
    /// domain name -> domain id
    domains: HashMap<String, String>,
    /// (domain, type, name) -> record id
    records: HashMap<(String, String, String), String>,
    next_id: usize,
    failing_adds: HashSet<String>,
    failing_removes: HashSet<String>,
    failing_reconfigures: usize,
    transient_search_failures: usize,
    add_delay: Option<Duration>,
}

/// An in-memory DnsGateway that records every call
///
/// Clones share state, so a test can keep one handle and give another to
/// the engine.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled domain
    pub fn with_domain(self, name: &str, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .domains
            .insert(name.to_string(), id.to_string());
        self
    }

    /// Register a record that already exists in the zone
    pub fn with_record(self, domain: &str, record_type: &str, name: &str, id: &str) -> Self {
        self.state.lock().unwrap().records.insert(
            (domain.to_string(), record_type.to_string(), name.to_string()),
            id.to_string(),
        );
        self
    }

    /// Make add_record fail with HTTP 400 for this record name
    pub fn failing_add(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_adds
            .insert(name.to_string());
        self
    }

    /// Make remove_record fail for this record id
    pub fn failing_remove(self, record_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_removes
            .insert(record_id.to_string());
        self
    }

    /// Make the next `count` reconfigure calls fail with HTTP 400
    pub fn failing_reconfigure(self, count: usize) -> Self {
        self.state.lock().unwrap().failing_reconfigures = count;
        self
    }

    /// Make the next `count` search calls fail with a timeout
    pub fn with_transient_search_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().transient_search_failures = count;
        self
    }

    /// Delay every add_record call
    pub fn with_add_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().add_delay = Some(delay);
        self
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn add_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::AddRecord { .. }))
            .collect()
    }

    pub fn remove_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::RemoveRecord(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn search_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::SearchRecord { .. }))
            .count()
    }

    pub fn reconfigure_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Reconfigure))
            .count()
    }

    /// Whether a record exists in the mocked zone
    pub fn has_record(&self, domain: &str, record_type: &str, name: &str) -> bool {
        self.state.lock().unwrap().records.contains_key(&(
            domain.to_string(),
            record_type.to_string(),
            name.to_string(),
        ))
    }

    fn record(&self, call: GatewayCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl DnsGateway for MockGateway {
    async fn find_domain(&self, name: &str) -> std::result::Result<Option<String>, GatewayError> {
        self.record(GatewayCall::FindDomain(name.to_string()));
        Ok(self.state.lock().unwrap().domains.get(name).cloned())
    }

    async fn search_record(
        &self,
        domain: &str,
        record_type: &str,
        name: &str,
    ) -> std::result::Result<Option<String>, GatewayError> {
        self.record(GatewayCall::SearchRecord {
            domain: domain.to_string(),
            record_type: record_type.to_string(),
            name: name.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if state.transient_search_failures > 0 {
            state.transient_search_failures -= 1;
            return Err(GatewayError::transport(
                "Failed to search record",
                "operation timed out",
                true,
            ));
        }

        Ok(state
            .records
            .get(&(domain.to_string(), record_type.to_string(), name.to_string()))
            .cloned())
    }

    async fn add_record(
        &self,
        domain_id: Option<&str>,
        name: &str,
        record_type: &str,
        value: &str,
    ) -> std::result::Result<Option<String>, GatewayError> {
        self.record(GatewayCall::AddRecord {
            domain_id: domain_id.map(str::to_string),
            name: name.to_string(),
            record_type: record_type.to_string(),
            value: value.to_string(),
        });

        let delay = self.state.lock().unwrap().add_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_adds.contains(name) {
            return Err(GatewayError::status(
                400,
                "Failed to add host",
                Some(r#"{"message":"Invalid JSON syntax","status":400}"#.to_string()),
            ));
        }

        let Some(domain_id) = domain_id else {
            return Err(GatewayError::unexpected(
                format!("Failed to add host \"{}\" to domain id \"None\"", name),
                r#"{"result":"failed","validations":{"record.domain":"Related item not found"}}"#,
            ));
        };

        let domain = state
            .domains
            .iter()
            .find(|(_, id)| id.as_str() == domain_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        state.next_id += 1;
        let record_id = format!("rec-{}", state.next_id);
        state.records.insert(
            (domain, record_type.to_string(), name.to_string()),
            record_id.clone(),
        );
        Ok(Some(record_id))
    }

    async fn remove_record(&self, record_id: &str) -> std::result::Result<(), GatewayError> {
        self.record(GatewayCall::RemoveRecord(record_id.to_string()));

        let mut state = self.state.lock().unwrap();
        if state.failing_removes.contains(record_id) {
            return Err(GatewayError::unexpected(
                "Failed to remove host",
                r#"{"result":"not found"}"#,
            ));
        }

        state.records.retain(|_, id| id != record_id);
        Ok(())
    }

    async fn reconfigure(&self) -> std::result::Result<(), GatewayError> {
        self.record(GatewayCall::Reconfigure);

        let mut state = self.state.lock().unwrap();
        if state.failing_reconfigures > 0 {
            state.failing_reconfigures -= 1;
            return Err(GatewayError::status(
                400,
                "Failed to reconfigure bind service",
                None,
            ));
        }
        Ok(())
    }

    fn gateway_name(&self) -> &'static str {
        "mock"
    }
}

/// An EventSource fed by the test through a channel
pub struct ControlledEventSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<ServiceEvent>>>>,
    services: HashMap<String, HashMap<String, String>>,
    inspect_count: Arc<AtomicUsize>,
    close_count: Arc<AtomicUsize>,
}

impl ControlledEventSource {
    /// Create a new controlled source and the sender feeding its stream
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<ServiceEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let source = Self {
            rx: Mutex::new(Some(rx)),
            services: HashMap::new(),
            inspect_count: Arc::new(AtomicUsize::new(0)),
            close_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, tx)
    }

    /// Make a service inspectable
    pub fn with_service(mut self, service_id: &str, labels: HashMap<String, String>) -> Self {
        self.services.insert(service_id.to_string(), labels);
        self
    }

    /// Counter of inspect_service() calls
    pub fn inspect_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.inspect_count)
    }

    /// Counter of close() calls
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }
}

#[async_trait::async_trait]
impl EventSource for ControlledEventSource {
    async fn subscribe(&self) -> Result<ServiceEventStream> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::orchestration("subscribe() can only be called once"))?;

        Ok(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }

    async fn inspect_service(&self, actor_id: &str) -> Result<ServiceMetadata> {
        self.inspect_count.fetch_add(1, Ordering::SeqCst);

        let labels = self
            .services
            .get(actor_id)
            .cloned()
            .ok_or_else(|| Error::orchestration(format!("404 - service {} not found", actor_id)))?;

        Ok(ServiceMetadata {
            id: actor_id.to_string(),
            labels,
        })
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "controlled"
    }
}

/// Build a label map
pub fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Labels declaring `api.example.org CNAME ingress` under selector "web"
pub fn web_labels() -> HashMap<String, String> {
    labels(&[
        ("ns.web.domain", "example.org"),
        ("ns.web.host", "api"),
        ("ns.web.type", "CNAME"),
        ("ns.web.value", "ingress"),
    ])
}

/// Configuration using the "ns" label prefix, no retry delay
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::new(GatewayConfig::new(
        "https://fw.example.org",
        "key",
        "secret",
    ));
    config.labels = LabelConfig {
        prefix: "ns".to_string(),
    };
    config.engine.retry_delay_millis = 0;
    config.engine.event_channel_capacity = 100;
    config
}

/// Wait until the engine emits an event matching `predicate`
pub async fn wait_for(
    rx: &mut mpsc::Receiver<EngineEvent>,
    predicate: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("engine event channel closed"),
            }
        }
    })
    .await
    .expect("engine event within 5 seconds")
}

/// Wait until the engine finished handling one create/remove event
pub async fn wait_for_reconfigure(rx: &mut mpsc::Receiver<EngineEvent>) -> EngineEvent {
    wait_for(rx, |e| {
        matches!(
            e,
            EngineEvent::Reconfigured | EngineEvent::ReconfigureFailed { .. }
        )
    })
    .await
}
