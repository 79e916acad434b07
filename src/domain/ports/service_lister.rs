//! Service Lister Port
//!
//! Defines the interface to the orchestration platform's service listing.
//! Implementations may talk to Docker Swarm, Kubernetes, or a static list.

use crate::domain::entities::ServiceEntry;
use async_trait::async_trait;
use std::time::Duration;

/// Errors raised while listing services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("service listing timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("platform error (status {status}): {message}")]
    Platform { status: u16, message: String },
    #[error("malformed service listing: {0}")]
    Decode(String),
}

/// Outbound port for the "list current services" call.
///
/// The caller bounds each call with its own timeout by dropping the
/// future, so implementations must be cancel-safe.
#[async_trait]
pub trait ServiceLister: Send + Sync {
    /// List every service currently known to the platform.
    async fn list_services(&self) -> Result<Vec<ServiceEntry>, DiscoveryError>;
}
