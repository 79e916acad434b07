//! Forwarder Port
//!
//! Defines the "forward this request to this address" primitive used by the
//! gateway. The inbound adapter never talks to backends directly.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use std::time::Duration;

/// A fully buffered request addressed to an upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream timed out")]
    Timeout,
    #[error("forwarding failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Send `request` and wait at most `timeout` for the complete response.
    async fn forward(
        &self,
        request: UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, ForwardError>;
}
