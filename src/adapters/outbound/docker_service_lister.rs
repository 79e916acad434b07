//! Docker Swarm Service Lister
//!
//! Implements ServiceLister against the Docker Engine HTTP API
//! (`GET /services`), which only answers on swarm manager nodes. The daemon
//! is reached over its local unix socket by default, or over TCP when
//! `DOCKER_HOST` points at one.

use crate::domain::entities::ServiceEntry;
use crate::domain::ports::{DiscoveryError, ServiceLister};
use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Daemon endpoint used when `DOCKER_HOST` is not set.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Highest Engine API version requested when negotiating with the daemon.
pub const MAX_API_VERSION: &str = "1.44";

/// Where the Docker daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Base URL of a TCP endpoint, without trailing slash
    Http(String),
    /// Path of the daemon's unix socket
    #[cfg(unix)]
    Unix(PathBuf),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST` value. Blank means the local socket.
    pub fn parse(docker_host: &str) -> Result<Self> {
        let host = docker_host.trim().trim_end_matches('/');
        let host = if host.is_empty() { DEFAULT_DOCKER_HOST } else { host };

        if let Some(path) = host.strip_prefix("unix://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    bail!("docker host {} has no socket path", host);
                }
                return Ok(DockerEndpoint::Unix(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            bail!("unix sockets are not available on this platform: {} ({})", host, path);
        }
        if host.starts_with("npipe://") {
            bail!("docker host {} is a named pipe; expose the daemon over TCP instead", host);
        }
        if let Some(rest) = host.strip_prefix("tcp://") {
            return Ok(DockerEndpoint::Http(format!("http://{}", rest)));
        }
        if host.starts_with("http://") || host.starts_with("https://") {
            return Ok(DockerEndpoint::Http(host.to_string()));
        }
        Ok(DockerEndpoint::Http(format!("http://{}", host)))
    }
}

impl std::fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerEndpoint::Http(base) => write!(f, "{}", base),
            #[cfg(unix)]
            DockerEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Status, headers and buffered body of one daemon response.
struct DaemonResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Service listing backed by the Docker Engine API.
pub struct DockerServiceLister {
    endpoint: DockerEndpoint,
    client: reqwest::Client,
    /// Pinned or negotiated API version; `None` means unversioned paths.
    api_version: OnceCell<Option<String>>,
    label_filter: Option<String>,
}

impl DockerServiceLister {
    /// Create a lister for `docker_host` (`unix://`, `tcp://`, `http://` or `https://`).
    ///
    /// When `api_version` is set, requests are pinned to `/v{api_version}`.
    /// Otherwise the version is negotiated with the daemon on first use.
    pub fn new(docker_host: &str, api_version: Option<&str>) -> Result<Self> {
        let endpoint = DockerEndpoint::parse(docker_host)?;
        let client = reqwest::Client::builder().no_proxy().build()?;

        let api_version = match api_version.map(str::trim).filter(|v| !v.is_empty()) {
            Some(version) => OnceCell::from(Some(version.trim_start_matches('v').to_string())),
            None => OnceCell::new(),
        };

        Ok(Self {
            endpoint,
            client,
            api_version,
            label_filter: None,
        })
    }

    /// Only list services carrying `label` (filtered by the daemon).
    pub fn with_label_filter(mut self, label: impl Into<String>) -> Self {
        self.label_filter = Some(label.into());
        self
    }

    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }

    /// The API version in use, once pinned or negotiated.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.get().and_then(|v| v.as_deref())
    }

    async fn get(&self, path_and_query: &str) -> Result<DaemonResponse, DiscoveryError> {
        match &self.endpoint {
            DockerEndpoint::Http(base) => {
                let response = self
                    .client
                    .get(format!("{}{}", base, path_and_query))
                    .send()
                    .await
                    .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
                let status = response.status();
                let headers = response.headers().clone();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
                Ok(DaemonResponse {
                    status,
                    headers,
                    body,
                })
            }
            #[cfg(unix)]
            DockerEndpoint::Unix(socket) => unix_get(socket, path_and_query).await,
        }
    }

    /// Resolve the API version once: pinned, else asked of `/_ping`.
    ///
    /// A daemon that does not advertise a version is addressed with
    /// unversioned paths. Transport errors are not cached.
    async fn version(&self) -> Result<Option<&str>, DiscoveryError> {
        let version = self
            .api_version
            .get_or_try_init(|| async {
                let response = self.get("/_ping").await?;
                let advertised = response
                    .headers
                    .get("api-version")
                    .and_then(|v| v.to_str().ok())
                    .filter(|_| response.status.is_success())
                    .map(negotiate_version);
                match &advertised {
                    Some(version) => {
                        tracing::info!("docker API version {} via {}", version, self.endpoint);
                    }
                    None => {
                        tracing::debug!(
                            "docker daemon at {} did not advertise an API version",
                            self.endpoint
                        );
                    }
                }
                Ok::<_, DiscoveryError>(advertised)
            })
            .await?;
        Ok(version.as_deref())
    }
}

/// One request over a fresh connection to the daemon socket.
#[cfg(unix)]
async fn unix_get(socket: &Path, path_and_query: &str) -> Result<DaemonResponse, DiscoveryError> {
    use http_body_util::{BodyExt, Empty};
    use hyper_util::rt::TokioIo;

    let stream = tokio::net::UnixStream::connect(socket)
        .await
        .map_err(|e| socket_error(socket, e))?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| socket_error(socket, e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("docker socket connection closed: {}", e);
        }
    });

    let request = hyper::Request::get(path_and_query)
        .header(hyper::header::HOST, "docker")
        .body(Empty::<Bytes>::new())
        .map_err(|e| socket_error(socket, e))?;
    let response = sender.send_request(request).await.map_err(|e| socket_error(socket, e))?;

    let (parts, body) = response.into_parts();
    let body = body.collect().await.map_err(|e| socket_error(socket, e))?.to_bytes();
    Ok(DaemonResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

#[cfg(unix)]
fn socket_error(socket: &Path, error: impl std::fmt::Display) -> DiscoveryError {
    DiscoveryError::Transport(format!("{}: {}", socket.display(), error))
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// The daemon's version, capped at the highest version this client speaks.
fn negotiate_version(advertised: &str) -> String {
    match (parse_version(advertised), parse_version(MAX_API_VERSION)) {
        (Some(daemon), Some(max)) if daemon <= max => advertised.trim().to_string(),
        _ => MAX_API_VERSION.to_string(),
    }
}

/// `/services` path with optional version prefix and label filter.
fn services_path(version: Option<&str>, label: Option<&str>) -> Result<String, DiscoveryError> {
    let path = match version {
        Some(version) => format!("/v{}/services", version),
        None => "/services".to_string(),
    };
    let Some(label) = label else {
        return Ok(path);
    };

    let filters = serde_json::json!({ "label": [label] }).to_string();
    let url = reqwest::Url::parse_with_params(&format!("http://docker{}", path), &[("filters", filters)])
        .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

#[async_trait]
impl ServiceLister for DockerServiceLister {
    async fn list_services(&self) -> Result<Vec<ServiceEntry>, DiscoveryError> {
        let version = self.version().await?;
        let path = services_path(version, self.label_filter.as_deref())?;
        let response = self.get(&path).await?;

        if !response.status.is_success() {
            let message = match serde_json::from_slice::<DaemonError>(&response.body) {
                Ok(body) => body.message,
                Err(_) => response
                    .status
                    .canonical_reason()
                    .unwrap_or("unknown")
                    .to_string(),
            };
            return Err(DiscoveryError::Platform {
                status: response.status.as_u16(),
                message,
            });
        }

        let services: Vec<SwarmService> = serde_json::from_slice(&response.body)
            .map_err(|e| DiscoveryError::Decode(e.to_string()))?;

        Ok(services.into_iter().map(ServiceEntry::from).collect())
    }
}

// ===== Docker API wire types =====

#[derive(Debug, Deserialize)]
struct DaemonError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SwarmService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    spec: ServiceSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceSpec {
    #[serde(default)]
    name: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    endpoint_spec: Option<EndpointSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointSpec {
    #[serde(default)]
    ports: Option<Vec<PortConfig>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PortConfig {
    #[serde(default)]
    target_port: Option<u32>,
}

impl From<SwarmService> for ServiceEntry {
    fn from(service: SwarmService) -> Self {
        let ports = service
            .spec
            .endpoint_spec
            .and_then(|e| e.ports)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.target_port)
            .filter_map(|p| u16::try_from(p).ok())
            .collect();

        ServiceEntry {
            id: service.id,
            name: service.spec.name,
            labels: service.spec.labels.unwrap_or_default(),
            ports,
        }
    }
}
