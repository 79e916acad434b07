//! Adapters Layer
//!
//! Inbound: the HTTP listener. Outbound: Docker discovery and upstream forwarding.

pub mod inbound;
pub mod outbound;
