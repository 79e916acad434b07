//! Service Registry
//!
//! Holds the current routing snapshot. Discovery swaps in whole snapshots
//! while request handlers read concurrently without locking.

use crate::domain::entities::{Backend, RoutingSnapshot};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no backend registered for host {0:?}")]
    NotFound(String),
}

/// Concurrency-safe store of the active routing snapshot.
///
/// Readers load the current `Arc<RoutingSnapshot>` and keep using it even if
/// a replace happens mid-request, so a lookup never observes a torn table.
#[derive(Debug)]
pub struct ServiceRegistry {
    snapshot: ArcSwap<RoutingSnapshot>,
    version: AtomicU64,
}

impl ServiceRegistry {
    /// Create an empty registry (version 0).
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RoutingSnapshot::empty()),
            version: AtomicU64::new(0),
        }
    }

    /// Install `snapshot` as current, discarding the previous one.
    ///
    /// Returns nothing and cannot fail. An empty snapshot is valid.
    pub fn replace_snapshot(&self, snapshot: RoutingSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Resolve a routing key against the current snapshot.
    pub fn lookup(&self, routing_key: &str) -> Result<Arc<Backend>, LookupError> {
        self.snapshot
            .load()
            .get(routing_key)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(routing_key.to_string()))
    }

    /// The current snapshot, for consistent multi-key reads.
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        self.snapshot.load_full()
    }

    /// Number of snapshots installed since creation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
