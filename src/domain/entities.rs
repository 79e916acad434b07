//! Domain Entities - Core routing objects
//!
//! These entities represent what the gateway knows about discovered services.
//! They have no external dependencies.

use std::collections::HashMap;
use std::sync::Arc;

/// A discovered backend service eligible for routing.
///
/// Descriptors are shared as `Arc<Backend>` and never mutated after
/// construction; a discovery cycle replaces them whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Hostname matched against the inbound `Host` header
    pub routing_key: String,
    /// Resolvable network name of the service
    pub name: String,
    /// Port the service listens on
    pub port: u16,
}

impl Backend {
    pub fn new(routing_key: impl Into<String>, name: impl Into<String>, port: u16) -> Self {
        Self {
            routing_key: routing_key.into(),
            name: name.into(),
            port,
        }
    }

    /// Build the upstream URL for a request path (query string included).
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("http://{}:{}{}", self.name, self.port, path_and_query)
        } else {
            format!("http://{}:{}/{}", self.name, self.port, path_and_query)
        }
    }
}

/// A raw service record as reported by the orchestration platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Platform-assigned identifier
    pub id: String,
    /// Logical service name (resolvable inside the overlay network)
    pub name: String,
    /// Service labels
    pub labels: HashMap<String, String>,
    /// Target ports in declaration order
    pub ports: Vec<u16>,
}

impl ServiceEntry {
    /// Non-blank label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// The complete routing table active at one point in time.
///
/// Snapshots are immutable; the registry swaps them whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingSnapshot {
    routes: HashMap<String, Arc<Backend>>,
}

impl RoutingSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot; a later descriptor replaces an earlier one with the same key.
    pub fn from_backends<I>(backends: I) -> Self
    where
        I: IntoIterator<Item = Backend>,
    {
        let routes = backends
            .into_iter()
            .map(|b| (b.routing_key.clone(), Arc::new(b)))
            .collect();
        Self { routes }
    }

    pub fn get(&self, routing_key: &str) -> Option<&Arc<Backend>> {
        self.routes.get(routing_key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routing keys in unspecified order.
    pub fn routing_keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
