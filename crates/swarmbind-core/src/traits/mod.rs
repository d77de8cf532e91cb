//! Core traits for the swarmbind system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`EventSource`]: Consume orchestration lifecycle events
//! - [`DnsGateway`]: Manage records via the DNS management API

pub mod dns_gateway;
pub mod event_source;

pub use dns_gateway::DnsGateway;
pub use event_source::{
    EventSource, ServiceAction, ServiceEvent, ServiceEventStream, ServiceMetadata,
};
