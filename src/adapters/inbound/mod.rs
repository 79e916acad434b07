mod http_server;

pub use http_server::{router, HttpServer, HttpState, DEFAULT_MAX_BODY_BYTES};
