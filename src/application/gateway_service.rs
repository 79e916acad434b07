//! Gateway Service - Host-based dispatch
//!
//! Resolves the backend for an inbound request from its `Host` header,
//! forwards the request, and translates the upstream outcome into a
//! gateway response. This is the primary interface for the inbound adapter.

use crate::application::ServiceRegistry;
use crate::domain::entities::Backend;
use crate::domain::ports::{ForwardError, Forwarder, UpstreamRequest, UpstreamResponse};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for one proxied request.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Headers that describe a single connection and are never relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors surfaced to the gateway's HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("request has no Host header")]
    MissingHost,
    #[error("unreadable request body: {0}")]
    InvalidBody(String),
    #[error("no backend for host {0:?}")]
    NoRoute(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("forwarding failed: {0}")]
    Forwarding(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingHost | GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoRoute(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Forwarding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// An inbound request, already buffered by the HTTP adapter.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw `Host` header value, if present and valid text
    pub host: Option<String>,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Host-based reverse proxy use case.
///
/// Stateless per request; the registry is the only shared state.
pub struct GatewayService {
    registry: Arc<ServiceRegistry>,
    forwarder: Arc<dyn Forwarder>,
    upstream_timeout: Duration,
}

impl GatewayService {
    pub fn new(registry: Arc<ServiceRegistry>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            registry,
            forwarder,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Resolve the backend for a raw `Host` value.
    ///
    /// Matching is exact and case-sensitive; a port suffix is part of the key.
    pub fn resolve(&self, host: Option<&str>) -> Result<Arc<Backend>, GatewayError> {
        let host = host
            .filter(|h| !h.is_empty())
            .ok_or(GatewayError::MissingHost)?;
        self.registry
            .lookup(host)
            .map_err(|_| GatewayError::NoRoute(host.to_string()))
    }

    /// Forward one request to the backend selected by its `Host` header.
    pub async fn dispatch(
        &self,
        request: InboundRequest,
    ) -> Result<UpstreamResponse, GatewayError> {
        let backend = self.resolve(request.host.as_deref())?;
        self.forward_to(&backend, request).await
    }

    /// Forward one request to an already resolved backend.
    pub async fn forward_to(
        &self,
        backend: &Backend,
        request: InboundRequest,
    ) -> Result<UpstreamResponse, GatewayError> {
        let url = backend.upstream_url(&request.path_and_query);
        let bodiless_request = request.method == Method::HEAD;

        let upstream = UpstreamRequest {
            method: request.method,
            url,
            headers: forwarded_headers(&request.headers),
            body: request.body,
        };

        match self.forwarder.forward(upstream, self.upstream_timeout).await {
            Ok(mut response) => {
                let keep_length = bodiless_request
                    || response.status == StatusCode::NO_CONTENT
                    || response.status == StatusCode::NOT_MODIFIED;
                strip_response_headers(&mut response.headers, keep_length);
                Ok(response)
            }
            Err(ForwardError::Timeout) => {
                tracing::warn!(
                    "upstream {}:{} timed out after {:?}",
                    backend.name,
                    backend.port,
                    self.upstream_timeout
                );
                Err(GatewayError::UpstreamTimeout)
            }
            Err(ForwardError::Failed(e)) => {
                tracing::error!("proxy error for {}: {}", backend.routing_key, e);
                Err(GatewayError::Forwarding(e))
            }
        }
    }
}

/// Headers named in a `Connection` header are hop-by-hop as well.
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in connection_listed(headers) {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Request headers to send upstream. The forwarder sets `Host` and length itself.
fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    strip_hop_by_hop(&mut out);
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}

/// Keep backend implementation details out of the relayed response.
///
/// `Content-Length` is recomputed from the relayed body, except for responses
/// that carry no body, where it describes the representation instead.
fn strip_response_headers(headers: &mut HeaderMap, keep_length: bool) {
    strip_hop_by_hop(headers);
    headers.remove(header::SERVER);
    if !keep_length {
        headers.remove(header::CONTENT_LENGTH);
    }
}
