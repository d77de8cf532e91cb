//! Error types for the swarmbind system
//!
//! [`GatewayError`] describes a failed call against the DNS management API.
//! [`Error`] is the crate-wide error and also carries the non-fatal
//! diagnostics produced while extracting and reconciling declarations.

use thiserror::Error;

/// Result type alias for swarmbind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`DnsGateway`](crate::traits::DnsGateway) call
///
/// The rendered message always embeds the response body when the remote
/// sent one, so a log line is enough to diagnose a rejected request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The remote answered with a non-2xx status
    #[error("{} - {}{}", .status, .message, body_suffix(.body))]
    Status {
        /// HTTP status code
        status: u16,
        /// What the client was trying to do
        message: String,
        /// Decoded JSON (compact) or raw text of the response body
        body: Option<String>,
    },

    /// The remote answered 2xx but the result field was not the expected one
    #[error("{message}: {body}")]
    UnexpectedResult {
        /// What the client was trying to do
        message: String,
        /// The full response payload
        body: String,
    },

    /// The request never produced a response (connect error, timeout, ...)
    #[error("{message}: {detail}")]
    Transport {
        /// What the client was trying to do
        message: String,
        /// Underlying transport error
        detail: String,
        /// Whether the request ran into the configured timeout
        timed_out: bool,
    },

    /// A 2xx response whose body could not be decoded
    #[error("{message}: {detail}")]
    Decode {
        /// What the client was trying to do
        message: String,
        /// Decoder error
        detail: String,
    },
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(body) if !body.is_empty() => format!(": {}", body),
        _ => String::new(),
    }
}

impl GatewayError {
    /// Create a status error
    pub fn status(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            body: body.filter(|b| !b.is_empty()),
        }
    }

    /// Create an unexpected-result error
    pub fn unexpected(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::UnexpectedResult {
            message: message.into(),
            body: body.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, detail: impl Into<String>, timed_out: bool) -> Self {
        Self::Transport {
            message: message.into(),
            detail: detail.into(),
            timed_out,
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// HTTP status code, if the remote answered with an error status
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body attached to the error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body.as_deref(),
            Self::UnexpectedResult { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    ///
    /// Transport failures (including timeouts), rate limiting and server
    /// errors are retryable. Everything else is a definitive answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Core error type for the swarmbind system
#[derive(Error, Debug)]
pub enum Error {
    /// DNS management API failure
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A mapping declaration lacks one of its required attributes
    #[error("Service {service_id}: mapping '{selector}' is missing the '{attribute}' label")]
    IncompleteDeclaration {
        /// Service carrying the labels
        service_id: String,
        /// Selector of the incomplete declaration
        selector: String,
        /// Missing attribute name
        attribute: String,
    },

    /// A mapping label is present but has no value
    #[error("Service {service_id}: label {label} does not have a value")]
    EmptyLabelValue {
        /// Service carrying the label
        service_id: String,
        /// Full label key
        label: String,
    },

    /// Removal requested for a service the registry does not know
    #[error("No active service found for service id {0}")]
    UnknownService(String),

    /// Domain lookup found no enabled domain with this name
    #[error("Domain \"{0}\" unknown or not enabled")]
    DomainUnresolved(String),

    /// Record lookup found nothing to act on
    #[error("Record \"{name}\" with type \"{record_type}\" not found under domain \"{domain}\"")]
    RecordNotFound {
        /// Domain name searched
        domain: String,
        /// Record name searched
        name: String,
        /// Record type searched
        record_type: String,
    },

    /// Orchestration event source or service inspection failure
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an orchestration error
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an incomplete declaration diagnostic
    pub fn incomplete(
        service_id: impl Into<String>,
        selector: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::IncompleteDeclaration {
            service_id: service_id.into(),
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }
}
