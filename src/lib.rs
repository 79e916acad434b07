//! swarm-gateway Library
//!
//! Host-based HTTP gateway for services discovered from Docker Swarm.
//! This module exposes the components for use in integration tests and
//! as a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::HttpServer;
pub use adapters::outbound::{DockerEndpoint, DockerServiceLister, LabelRoutingKey, ReqwestForwarder};
pub use application::{DiscoveryPoller, GatewayError, GatewayService, LookupError, ServiceRegistry};
pub use config::{load_config, Config};
pub use domain::entities::{Backend, RoutingSnapshot, ServiceEntry};
pub use domain::ports::{DiscoveryError, ForwardError, Forwarder, RoutingKeyExtractor, ServiceLister};
pub use infrastructure::ShutdownController;
