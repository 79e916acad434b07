//! Domain Layer
//!
//! Routing entities and the ports the gateway talks to the outside world through.

pub mod entities;
pub mod ports;
