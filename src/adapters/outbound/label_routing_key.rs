//! Label-based routing key extraction
//!
//! A service is routable when it carries the host label; the port comes
//! from the port label or, failing that, the first target port.

use crate::domain::entities::ServiceEntry;
use crate::domain::ports::RoutingKeyExtractor;

pub const DEFAULT_HOST_LABEL: &str = "gateway.host";
pub const DEFAULT_PORT_LABEL: &str = "gateway.port";

#[derive(Debug, Clone)]
pub struct LabelRoutingKey {
    host_label: String,
    port_label: String,
}

impl LabelRoutingKey {
    pub fn new(host_label: impl Into<String>, port_label: impl Into<String>) -> Self {
        Self {
            host_label: host_label.into(),
            port_label: port_label.into(),
        }
    }

    pub fn host_label(&self) -> &str {
        &self.host_label
    }
}

impl Default for LabelRoutingKey {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_LABEL, DEFAULT_PORT_LABEL)
    }
}

impl RoutingKeyExtractor for LabelRoutingKey {
    fn routing_key(&self, entry: &ServiceEntry) -> Option<String> {
        entry.label(&self.host_label).map(str::to_string)
    }

    /// An unparsable port label makes the service unroutable.
    fn port(&self, entry: &ServiceEntry) -> Option<u16> {
        match entry.label(&self.port_label) {
            Some(value) => value.parse::<u16>().ok().filter(|p| *p != 0),
            None => entry.ports.first().copied(),
        }
    }
}
