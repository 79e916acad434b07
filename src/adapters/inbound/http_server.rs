//! HTTP Gateway Server
//!
//! Catch-all axum listener that hands every request to the GatewayService
//! and shuts down gracefully when the shared ShutdownController fires.

use crate::application::{GatewayError, GatewayService, InboundRequest};
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Largest request body buffered for forwarding.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<GatewayService>,
    pub shutdown: ShutdownController,
    pub max_body_bytes: usize,
}

/// Inbound HTTP adapter for the gateway.
pub struct HttpServer {
    listen_addr: String,
    state: HttpState,
}

impl HttpServer {
    pub fn new(
        listen_addr: String,
        service: Arc<GatewayService>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            state: HttpState {
                service,
                shutdown,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.state.max_body_bytes = max_body_bytes;
        self
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Build the catch-all router.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// On shutdown the listener stops accepting and in-flight requests
    /// are allowed to complete before this returns.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("gateway listening on {}", listener.local_addr()?);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("gateway listener stopped");
        Ok(())
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn proxy_handler(State(state): State<HttpState>, request: Request) -> Response {
    let _guard = state.shutdown.request_guard();
    let (parts, body) = request.into_parts();

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    // Resolve before the body is read.
    let backend = match state.service.resolve(host.as_deref()) {
        Ok(backend) => backend,
        Err(e) => return e.into_response(),
    };

    let body = match body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return GatewayError::InvalidBody(e.to_string()).into_response(),
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let inbound = InboundRequest {
        method: parts.method,
        host,
        path_and_query,
        headers: parts.headers,
        body,
    };

    match state.service.forward_to(&backend, inbound).await {
        Ok(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            response
        }
        Err(e) => e.into_response(),
    }
}
