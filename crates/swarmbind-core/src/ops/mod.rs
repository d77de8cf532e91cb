//! One-shot record operations
//!
//! Imperative operations used by the `add`, `remove` and `reconfigure`
//! commands. They talk to the same [`DnsGateway`] as the engine but never
//! touch the service registry.

use tracing::info;

use crate::error::{Error, Result};
use crate::traits::DnsGateway;

/// Add a record to a domain
///
/// An unresolved domain is passed through to the gateway, which then
/// rejects the creation.
///
/// # Returns
///
/// The identifier of the new record, when the gateway returned one.
pub async fn add_record(
    gateway: &dyn DnsGateway,
    domain: &str,
    name: &str,
    record_type: &str,
    value: &str,
) -> Result<Option<String>> {
    let domain_id = gateway.find_domain(domain).await?;
    if domain_id.is_none() {
        tracing::warn!("Could not find domain id for domain {}", domain);
    }

    let record_id = gateway
        .add_record(domain_id.as_deref(), name, record_type, value)
        .await?;

    info!(
        "Added record {} ({}) to domain {} -> {}",
        name, record_type, domain, value
    );
    Ok(record_id)
}

/// Remove a record identified by domain, name and type
///
/// # Returns
///
/// - `Ok(record_id)`: identifier of the deleted record
/// - `Err(Error::DomainUnresolved)`: no enabled domain with this name
/// - `Err(Error::RecordNotFound)`: no matching record
pub async fn remove_record(
    gateway: &dyn DnsGateway,
    domain: &str,
    name: &str,
    record_type: &str,
) -> Result<String> {
    if gateway.find_domain(domain).await?.is_none() {
        return Err(Error::DomainUnresolved(domain.to_string()));
    }

    let record_id = gateway
        .search_record(domain, record_type, name)
        .await?
        .ok_or_else(|| Error::RecordNotFound {
            domain: domain.to_string(),
            name: name.to_string(),
            record_type: record_type.to_string(),
        })?;

    gateway.remove_record(&record_id).await?;
    info!("Removed record {} ({}) from domain {}", name, record_type, domain);
    Ok(record_id)
}

/// Reload the DNS service
pub async fn reconfigure(gateway: &dyn DnsGateway) -> Result<()> {
    gateway.reconfigure().await?;
    info!("Reconfigured {} service", gateway.gateway_name());
    Ok(())
}
