// # DNS Gateway Trait
//
// Defines the interface to the DNS management API hosting the zone.
//
// ## Implementations
//
// - OPNsense BIND plugin: `swarmbind-gateway-opnsense` crate
//
// ## Usage
//
// ```rust,ignore
// use swarmbind_core::DnsGateway;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let gateway = /* DnsGateway implementation */;
//
//     let domain_id = gateway.find_domain("example.org").await?;
//     if gateway.search_record("example.org", "CNAME", "api").await?.is_none() {
//         gateway
//             .add_record(domain_id.as_deref(), "api", "CNAME", "ingress")
//             .await?;
//     }
//     gateway.reconfigure().await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::error::GatewayError;

/// Trait for DNS management API implementations
///
/// Every method performs the remote calls needed for a single logical
/// operation and reports the outcome. Implementations must be thread-safe
/// and usable across async tasks.
///
/// # Responsibilities
///
/// Gateways translate calls into requests against their API and map
/// responses to results. They do NOT:
/// - retry (owned by the `Reconciler`)
/// - remember which records belong to which service (owned by the
///   `ServiceRegistry`)
/// - decide whether a record should exist (owned by the `Reconciler`)
///
/// # Errors
///
/// Every method fails with a [`GatewayError`] when the remote responds with
/// a non-2xx status or an unexpected result field. The error must embed
/// the raw response body when one was sent.
#[async_trait]
pub trait DnsGateway: Send + Sync {
    /// Resolve a domain name to its identifier
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))`: an enabled domain with this name exists
    /// - `Ok(None)`: the domain is unknown or disabled
    async fn find_domain(&self, name: &str) -> Result<Option<String>, GatewayError>;

    /// Find an existing record by domain, type and name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record_id))`: a matching record exists
    /// - `Ok(None)`: nothing matches
    async fn search_record(
        &self,
        domain: &str,
        record_type: &str,
        name: &str,
    ) -> Result<Option<String>, GatewayError>;

    /// Create a record
    ///
    /// `domain_id` is passed through as-is; a `None` makes the remote reject
    /// the request instead of the call being skipped.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record_id))`: the record was saved
    /// - `Ok(None)`: the record was saved but the remote did not return
    ///   its identifier
    async fn add_record(
        &self,
        domain_id: Option<&str>,
        name: &str,
        record_type: &str,
        value: &str,
    ) -> Result<Option<String>, GatewayError>;

    /// Delete a record by identifier
    async fn remove_record(&self, record_id: &str) -> Result<(), GatewayError>;

    /// Reload the DNS service so that record changes take effect
    async fn reconfigure(&self) -> Result<(), GatewayError>;

    /// Get the gateway name (for logging/debugging)
    fn gateway_name(&self) -> &'static str;
}
