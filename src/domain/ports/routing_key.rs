//! Routing Key Extraction Port
//!
//! Decides which discovered services are routable and under which hostname.

use crate::domain::entities::ServiceEntry;

/// Maps a raw platform service entry to its routing identity.
///
/// Contract: given one entry, return zero or one routing key and zero or
/// one port. An entry without both is not routable and is skipped.
pub trait RoutingKeyExtractor: Send + Sync {
    /// Public hostname for the service, if it has one.
    fn routing_key(&self, entry: &ServiceEntry) -> Option<String>;

    /// Port to reach the service on. Defaults to the first target port.
    fn port(&self, entry: &ServiceEntry) -> Option<u16> {
        entry.ports.first().copied()
    }
}
