// # Docker Event Source
//
// This crate provides the EventSource implementation backed by the Docker
// Engine API of a swarm manager.
//
// ## Architecture
//
// `subscribe()` checks the daemon answers, then hands the service event
// stream to a reader task that forwards events through a channel, so the
// stream returned to the engine owns no connection state. `close()` aborts
// the reader.
//
// ## Transport
//
// `DOCKER_HOST` may point at a unix socket (`unix:///var/run/docker.sock`)
// or a plain TCP endpoint (`tcp://`, `http://`). TLS endpoints are rejected
// when the source is created.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bollard::Docker;
use bollard::system::EventsOptions;
use swarmbind_core::traits::{
    EventSource, ServiceAction, ServiceEvent, ServiceEventStream, ServiceMetadata,
};
use swarmbind_core::{Error, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Default Engine API socket
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Where the Docker Engine API listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Unix socket path
    Unix(String),
    /// `http://host:port` address
    Http(String),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST` value
    ///
    /// # Examples
    ///
    /// ```
    /// use swarmbind_source_docker::DockerEndpoint;
    ///
    /// assert_eq!(
    ///     DockerEndpoint::parse("tcp://manager:2375").unwrap(),
    ///     DockerEndpoint::Http("http://manager:2375".to_string())
    /// );
    /// assert_eq!(
    ///     DockerEndpoint::parse("unix:///var/run/docker.sock").unwrap(),
    ///     DockerEndpoint::Unix("/var/run/docker.sock".to_string())
    /// );
    /// ```
    pub fn parse(docker_host: &str) -> Result<Self> {
        let docker_host = docker_host.trim();

        if let Some(path) = docker_host.strip_prefix("unix://") {
            let path = if path.is_empty() { DEFAULT_DOCKER_SOCKET } else { path };
            return Ok(Self::Unix(path.to_string()));
        }

        let docker_host = docker_host.trim_end_matches('/');
        let address = docker_host
            .strip_prefix("tcp://")
            .or_else(|| docker_host.strip_prefix("http://"));

        match address {
            Some("") => Err(Error::config("DOCKER_HOST is missing a host")),
            Some(address) => Ok(Self::Http(format!("http://{}", address))),
            None if docker_host.starts_with("https://") => Err(Error::config(format!(
                "TLS DOCKER_HOST is not supported, use a unix socket or a plain TCP endpoint. Got: {}",
                docker_host
            ))),
            None => Err(Error::config(format!(
                "DOCKER_HOST must use the unix, tcp or http scheme. Got: {}",
                docker_host
            ))),
        }
    }

    fn connect(&self, timeout: Duration) -> Result<Docker> {
        let timeout = timeout.as_secs().max(1);
        let client = match self {
            #[cfg(unix)]
            Self::Unix(path) => Docker::connect_with_unix(path, timeout, bollard::API_DEFAULT_VERSION),
            #[cfg(not(unix))]
            Self::Unix(_) => {
                return Err(Error::config(format!("{} requires a unix platform", self)));
            }
            Self::Http(address) => {
                Docker::connect_with_http(address, timeout, bollard::API_DEFAULT_VERSION)
            }
        };

        client.map_err(|e| Error::config(format!("Failed to create docker client for {}: {}", self, e)))
    }
}

impl fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path),
            Self::Http(address) => f.write_str(address),
        }
    }
}

/// Render a client error, keeping the status code the daemon answered with
fn describe(err: &bollard::errors::Error) -> String {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if message.is_empty() => status_code.to_string(),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => format!("{}: {}", status_code, message),
        other => other.to_string(),
    }
}

/// Event source reading service events from the Docker Engine API
pub struct DockerEventSource {
    endpoint: DockerEndpoint,

    /// Engine API client
    docker: Docker,

    /// Reader task of the open event stream
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for DockerEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerEventSource")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DockerEventSource {
    /// Create a new Docker event source
    ///
    /// # Parameters
    ///
    /// - `docker_host`: `DOCKER_HOST` value (e.g. "unix:///var/run/docker.sock")
    /// - `request_timeout`: timeout of every API request, in whole seconds
    ///
    /// No connection is made until the first call.
    pub fn new(docker_host: &str, request_timeout: Duration) -> Result<Self> {
        let endpoint = DockerEndpoint::parse(docker_host)?;
        let docker = endpoint.connect(request_timeout)?;

        Ok(Self {
            endpoint,
            docker,
            reader: Mutex::new(None),
        })
    }

    /// Endpoint this source talks to
    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }
}

fn service_event(message: bollard::models::EventMessage) -> Option<ServiceEvent> {
    let action = message.action?;
    let actor_id = message.actor.and_then(|actor| actor.id)?;
    Some(ServiceEvent::new(ServiceAction::from_action(&action), actor_id))
}

#[async_trait::async_trait]
impl EventSource for DockerEventSource {
    async fn subscribe(&self) -> Result<ServiceEventStream> {
        self.docker.ping().await.map_err(|e| {
            Error::orchestration(format!("Failed to subscribe to docker events: {}", describe(&e)))
        })?;

        let options = EventsOptions::<String> {
            filters: HashMap::from([("type".to_string(), vec!["service".to_string()])]),
            ..Default::default()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let docker = self.docker.clone();

        let handle = tokio::spawn(async move {
            let mut events = Box::pin(docker.events(Some(options)));

            while let Some(message) = events.next().await {
                match message {
                    Ok(message) => {
                        let Some(event) = service_event(message) else {
                            tracing::warn!("Skipping docker event without action or actor");
                            continue;
                        };

                        tracing::debug!("Docker event {:?}", event);
                        if tx.send(Ok(event)).is_err() {
                            tracing::debug!("Receiver dropped, stopping event reader");
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Error::orchestration(format!(
                            "Failed to read docker events: {}",
                            describe(&e)
                        ))));
                        return;
                    }
                }
            }

            tracing::info!("Docker event stream ended");
        });

        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }

        tracing::info!("Subscribed to service events on {}", self.endpoint);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn inspect_service(&self, actor_id: &str) -> Result<ServiceMetadata> {
        let service = self
            .docker
            .inspect_service(actor_id, None)
            .await
            .map_err(|e| {
                Error::orchestration(format!(
                    "Failed to inspect service {}: {}",
                    actor_id,
                    describe(&e)
                ))
            })?;

        Ok(ServiceMetadata {
            id: service.id.unwrap_or_else(|| actor_id.to_string()),
            labels: service.spec.and_then(|s| s.labels).unwrap_or_default(),
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
            tracing::info!("Closed docker client");
        }
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "docker"
    }
}
