//! Infrastructure Layer
//!
//! Cross-cutting concerns: process lifecycle and shutdown coordination.

pub mod shutdown;

pub use shutdown::{shutdown_signal, RequestGuard, ShutdownController};
