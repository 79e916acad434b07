//! Application Layer
//!
//! Routing table, discovery loop and per-request dispatch.

pub mod discovery_poller;
pub mod gateway_service;
pub mod service_registry;

pub use discovery_poller::DiscoveryPoller;
pub use gateway_service::{GatewayError, GatewayService, InboundRequest};
pub use service_registry::{LookupError, ServiceRegistry};
