mod forwarder;
mod routing_key;
mod service_lister;

pub use forwarder::{ForwardError, Forwarder, UpstreamRequest, UpstreamResponse};
pub use routing_key::RoutingKeyExtractor;
pub use service_lister::{DiscoveryError, ServiceLister};
