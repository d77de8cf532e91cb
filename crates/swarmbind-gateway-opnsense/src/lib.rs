// # OPNsense BIND Gateway
//
// This crate provides the DnsGateway implementation for the BIND plugin of
// an OPNsense firewall.
//
// ## Behavior
//
// - One HTTP request per gateway call (domain lookup is repeated for searches)
// - Errors carry the status code and the response body of the remote
// - HTTP timeout configured from the engine settings
// - NO retry logic (owned by the Reconciler, and only for idempotent calls)
// - NO caching of domain ids (domains may be toggled at any time)
//
// ## Security Requirements
//
// - API secret NEVER appears in logs or Debug output
// - Credentials are sent as HTTP basic auth on every request
//
// ## API Reference
//
// - List domains: GET `/api/bind/domain/get`
// - Search records: POST `/api/bind/record/searchRecord`
// - Add record: POST `/api/bind/record/addRecord`
// - Delete record: POST `/api/bind/record/delRecord/:uuid`
// - Reload BIND: POST `/api/bind/service/reconfigure`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use swarmbind_core::config::{GatewayConfig, SyncConfig};
use swarmbind_core::traits::DnsGateway;
use swarmbind_core::{Error, GatewayError, Result};

/// Rows requested per record search
const SEARCH_ROW_COUNT: u32 = 50;

/// Gateway for the OPNsense BIND plugin API
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API secret.
pub struct OpnsenseGateway {
    /// Base URL without trailing slash
    base_url: String,

    /// Basic-auth user
    api_key: String,

    /// Basic-auth password
    /// ⚠️ NEVER log this value
    api_secret: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API secret
impl std::fmt::Debug for OpnsenseGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpnsenseGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    rows: Vec<RecordRow>,
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    uuid: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
}

impl OpnsenseGateway {
    /// Create a new gateway
    ///
    /// # Parameters
    ///
    /// - `config`: firewall URL and credentials
    /// - `timeout`: timeout applied to every request
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &GatewayConfig, timeout: Duration) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.trimmed_base_url().to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            client,
        })
    }

    /// Create a gateway from the full configuration
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.gateway, config.engine.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, message: &str) -> std::result::Result<Value, GatewayError> {
        tracing::debug!("GET {}", path);
        let request = self
            .client
            .get(self.url(path))
            .basic_auth(&self.api_key, Some(&self.api_secret));
        send(request, message).await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        message: &str,
    ) -> std::result::Result<Value, GatewayError> {
        tracing::debug!("POST {}", path);
        let request = self
            .client
            .post(self.url(path))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(body);
        send(request, message).await
    }
}

/// Send a request and decode the JSON payload of a 2xx response
async fn send(
    request: reqwest::RequestBuilder,
    message: &str,
) -> std::result::Result<Value, GatewayError> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::transport(message, e.to_string(), e.is_timeout()))?;

    if !response.status().is_success() {
        return Err(error_from_response(response, message).await);
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| GatewayError::decode(message, e.to_string()))
}

/// Build the error for a non-2xx response
///
/// A JSON body is rendered compactly, any other body verbatim. An empty
/// body yields no body at all.
async fn error_from_response(response: reqwest::Response, message: &str) -> GatewayError {
    let status = response.status().as_u16();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Unable to read error response: {}", e);
            String::new()
        }
    };

    let body = if is_json {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => value.to_string(),
            Err(_) => text,
        }
    } else {
        text
    };

    GatewayError::status(status, message, Some(body))
}

fn result_field(payload: &Value, field: &str) -> Option<String> {
    payload.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Pick the record id matching `name` from search rows
///
/// A row with the same name and type wins. Otherwise the first row with the
/// same name is returned, whatever its type.
fn pick_record(rows: &[RecordRow], record_type: &str, name: &str) -> Option<String> {
    if let Some(row) = rows
        .iter()
        .find(|row| row.name == name && row.record_type == record_type)
    {
        tracing::info!("Record {} has uuid {}", name, row.uuid);
        return Some(row.uuid.clone());
    }

    let row = rows.iter().find(|row| row.name == name)?;
    tracing::warn!(
        "Record {} is already mapped to record type {}, expected {}",
        name,
        row.record_type,
        record_type
    );
    tracing::info!("Record {} has uuid {}", name, row.uuid);
    Some(row.uuid.clone())
}

#[async_trait]
impl DnsGateway for OpnsenseGateway {
    /// Resolve an enabled domain name to its id
    ///
    /// ```http
    /// GET /api/bind/domain/get
    /// ```
    async fn find_domain(&self, name: &str) -> std::result::Result<Option<String>, GatewayError> {
        let message = "Failed to read domains";
        let payload = self.get("/api/bind/domain/get", message).await?;

        let domains = payload
            .pointer("/domain/domains/domain")
            .ok_or_else(|| GatewayError::decode(message, "missing domain.domains.domain"))?;

        // An empty domain list is serialized as an array
        let Some(domains) = domains.as_object() else {
            return Ok(None);
        };

        for (domain_id, domain) in domains {
            if domain.get("domainname").and_then(Value::as_str) != Some(name) {
                continue;
            }

            if domain.get("enabled").and_then(Value::as_str) != Some("1") {
                tracing::warn!("Domain {} is not enabled", name);
                continue;
            }

            tracing::debug!("Domain {} has id {}", name, domain_id);
            return Ok(Some(domain_id.clone()));
        }

        Ok(None)
    }

    /// Search a record by domain, type and name
    ///
    /// ```http
    /// POST /api/bind/record/searchRecord
    /// {"current":1,"rowCount":50,"sort":{"type":"asc"},"searchPhrase":"api","domain":"<id>"}
    /// ```
    async fn search_record(
        &self,
        domain: &str,
        record_type: &str,
        name: &str,
    ) -> std::result::Result<Option<String>, GatewayError> {
        let domain_id = self.find_domain(domain).await?;

        let request = json!({
            "current": 1,
            "rowCount": SEARCH_ROW_COUNT,
            "sort": { "type": "asc" },
            "searchPhrase": name,
            "domain": domain_id,
        });

        let message = format!(
            "Failed to search record {} with type {} in domain {}",
            name, record_type, domain
        );
        let payload = self
            .post("/api/bind/record/searchRecord", &request, &message)
            .await?;

        let response: SearchResponse = serde_json::from_value(payload)
            .map_err(|e| GatewayError::decode(message.as_str(), e.to_string()))?;

        Ok(pick_record(&response.rows, record_type, name))
    }

    /// Create a record
    ///
    /// ```http
    /// POST /api/bind/record/addRecord
    /// {"record":{"enabled":"1","domain":"<id>","name":"api","type":"CNAME","value":"ingress"}}
    /// ```
    async fn add_record(
        &self,
        domain_id: Option<&str>,
        name: &str,
        record_type: &str,
        value: &str,
    ) -> std::result::Result<Option<String>, GatewayError> {
        let request = json!({
            "record": {
                "enabled": "1",
                "domain": domain_id,
                "name": name,
                "type": record_type,
                "value": value,
            }
        });

        let payload = self
            .post("/api/bind/record/addRecord", &request, "Failed to add host")
            .await?;

        if result_field(&payload, "result").as_deref() != Some("saved") {
            return Err(GatewayError::unexpected(
                format!(
                    "Failed to add host \"{}\" to domain id \"{}\"",
                    name,
                    domain_id.unwrap_or("None")
                ),
                payload.to_string(),
            ));
        }

        Ok(result_field(&payload, "uuid"))
    }

    /// Delete a record
    ///
    /// ```http
    /// POST /api/bind/record/delRecord/:uuid
    /// {}
    /// ```
    async fn remove_record(&self, record_id: &str) -> std::result::Result<(), GatewayError> {
        let path = format!("/api/bind/record/delRecord/{}", record_id);
        let payload = self.post(&path, &json!({}), "Failed to remove host").await?;

        if result_field(&payload, "result").as_deref() != Some("deleted") {
            return Err(GatewayError::unexpected(
                "Failed to remove host",
                payload.to_string(),
            ));
        }

        Ok(())
    }

    /// Reload the BIND service
    ///
    /// ```http
    /// POST /api/bind/service/reconfigure
    /// {}
    /// ```
    async fn reconfigure(&self) -> std::result::Result<(), GatewayError> {
        let payload = self
            .post(
                "/api/bind/service/reconfigure",
                &json!({}),
                "Failed to reconfigure bind service",
            )
            .await?;

        if result_field(&payload, "status").as_deref() != Some("ok") {
            return Err(GatewayError::unexpected(
                "Bind service responded with unexpected result",
                payload.to_string(),
            ));
        }

        Ok(())
    }

    fn gateway_name(&self) -> &'static str {
        "opnsense"
    }
}
