mod docker_service_lister;
mod label_routing_key;
mod reqwest_forwarder;

pub use docker_service_lister::{
    DockerEndpoint, DockerServiceLister, DEFAULT_DOCKER_HOST, MAX_API_VERSION,
};
pub use label_routing_key::{LabelRoutingKey, DEFAULT_HOST_LABEL, DEFAULT_PORT_LABEL};
pub use reqwest_forwarder::ReqwestForwarder;
