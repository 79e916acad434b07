//! Discovery Poller
//!
//! Periodically lists services from the orchestration platform and swaps the
//! resulting routing snapshot into the registry. A failed cycle leaves the
//! registry untouched; the next tick retries.

use crate::application::ServiceRegistry;
use crate::domain::entities::{Backend, RoutingSnapshot, ServiceEntry};
use crate::domain::ports::{DiscoveryError, RoutingKeyExtractor, ServiceLister};
use crate::infrastructure::shutdown::ShutdownController;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Time between two discovery cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound for a single service listing call.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Background task keeping the registry in sync with the platform.
pub struct DiscoveryPoller {
    lister: Arc<dyn ServiceLister>,
    extractor: Arc<dyn RoutingKeyExtractor>,
    registry: Arc<ServiceRegistry>,
    interval: Duration,
    timeout: Duration,
}

impl DiscoveryPoller {
    pub fn new(
        lister: Arc<dyn ServiceLister>,
        extractor: Arc<dyn RoutingKeyExtractor>,
        registry: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            lister,
            extractor,
            registry,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the polling loop until `shutdown` fires.
    ///
    /// The first cycle starts one interval after the call. A cycle already in
    /// progress when shutdown is requested runs to completion.
    pub async fn run(self, shutdown: ShutdownController) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "discovery started, interval={:?} timeout={:?}",
            self.interval,
            self.timeout
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!("discovery failed, keeping current routes: {}", e);
                    }
                }
            }
        }

        // The ticker and the platform client are released on return.
        tracing::info!("discovery stopped");
    }

    /// Execute one discovery cycle.
    ///
    /// On success the registry holds the new snapshot (possibly empty) and
    /// the number of installed routes is returned. On failure the registry
    /// is not touched.
    pub async fn poll_once(&self) -> Result<usize, DiscoveryError> {
        let entries = tokio::time::timeout(self.timeout, self.lister.list_services())
            .await
            .map_err(|_| DiscoveryError::Timeout(self.timeout))??;

        let snapshot = self.build_snapshot(entries);
        let count = snapshot.len();
        self.registry.replace_snapshot(snapshot);

        tracing::info!(
            "routing reload ok, version={} routes={}",
            self.registry.version(),
            count
        );
        Ok(count)
    }

    /// Convert raw service entries into a routing snapshot.
    ///
    /// Entries without a routing key or port are skipped.
    pub fn build_snapshot(&self, entries: Vec<ServiceEntry>) -> RoutingSnapshot {
        let mut seen = HashSet::new();
        let mut backends = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(routing_key) = self.extractor.routing_key(&entry) else {
                tracing::debug!("skipping service {} ({}): no routing key", entry.name, entry.id);
                continue;
            };
            let Some(port) = self.extractor.port(&entry) else {
                tracing::debug!("skipping service {} ({}): no port", entry.name, entry.id);
                continue;
            };
            if !seen.insert(routing_key.clone()) {
                tracing::warn!(
                    "duplicate routing key {}, service {} replaces earlier entry",
                    routing_key,
                    entry.name
                );
            }
            backends.push(Backend::new(routing_key, entry.name, port));
        }

        RoutingSnapshot::from_backends(backends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing::Instrument;
    use tracing_test::traced_test;

    // ===== Mock Implementations =====

    /// Replays scripted results, then keeps returning an empty listing.
    struct ScriptedLister {
        responses: Mutex<VecDeque<Result<Vec<ServiceEntry>, DiscoveryError>>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedLister {
        fn new(responses: Vec<Result<Vec<ServiceEntry>, DiscoveryError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ServiceLister for ScriptedLister {
        async fn list_services(&self) -> Result<Vec<ServiceEntry>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Uses the `host` label as routing key.
    struct HostLabel;

    impl RoutingKeyExtractor for HostLabel {
        fn routing_key(&self, entry: &ServiceEntry) -> Option<String> {
            entry.label("host").map(str::to_string)
        }
    }

    fn entry(name: &str, host: Option<&str>, ports: &[u16]) -> ServiceEntry {
        let mut labels = HashMap::new();
        if let Some(host) = host {
            labels.insert("host".to_string(), host.to_string());
        }
        ServiceEntry {
            id: format!("id-{}", name),
            name: name.to_string(),
            labels,
            ports: ports.to_vec(),
        }
    }

    fn poller(lister: Arc<ScriptedLister>, registry: Arc<ServiceRegistry>) -> DiscoveryPoller {
        DiscoveryPoller::new(lister, Arc::new(HostLabel), registry)
    }

    // ===== poll_once =====

    #[tokio::test]
    async fn test_poll_once_installs_discovered_routes() {
        let registry = Arc::new(ServiceRegistry::new());
        let lister = Arc::new(ScriptedLister::new(vec![Ok(vec![entry(
            "svc-a",
            Some("a.example.com"),
            &[8080],
        )])]));

        let count = poller(lister, registry.clone()).poll_once().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            *registry.lookup("a.example.com").unwrap(),
            Backend::new("a.example.com", "svc-a", 8080)
        );
    }

    #[tokio::test]
    async fn test_poll_once_empty_listing_is_a_valid_snapshot() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.replace_snapshot(RoutingSnapshot::from_backends(vec![Backend::new(
            "a.example.com",
            "svc-a",
            8080,
        )]));
        let lister = Arc::new(ScriptedLister::new(vec![Ok(Vec::new())]));

        let count = poller(lister, registry.clone()).poll_once().await.unwrap();

        assert_eq!(count, 0);
        assert!(registry.is_empty());
        assert_eq!(registry.version(), 2);
    }

    #[tokio::test]
    async fn test_poll_once_failure_keeps_previous_snapshot() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.replace_snapshot(RoutingSnapshot::from_backends(vec![Backend::new(
            "a.example.com",
            "svc-a",
            8080,
        )]));
        let lister = Arc::new(ScriptedLister::new(vec![Err(DiscoveryError::Transport(
            "connection refused".to_string(),
        ))]));

        let result = poller(lister, registry.clone()).poll_once().await;

        assert_eq!(
            result,
            Err(DiscoveryError::Transport("connection refused".to_string()))
        );
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.lookup("a.example.com").unwrap().name, "svc-a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_once_times_out() {
        let registry = Arc::new(ServiceRegistry::new());
        let lister = Arc::new(
            ScriptedLister::new(vec![Ok(vec![entry("svc-a", Some("a.example.com"), &[80])])])
                .with_delay(Duration::from_secs(10)),
        );

        let result = poller(lister, registry.clone())
            .with_timeout(Duration::from_secs(1))
            .poll_once()
            .await;

        assert_eq!(result, Err(DiscoveryError::Timeout(Duration::from_secs(1))));
        assert_eq!(registry.version(), 0);
    }

    // ===== build_snapshot =====

    #[test]
    fn test_build_snapshot_skips_unroutable_entries() {
        let registry = Arc::new(ServiceRegistry::new());
        let p = poller(Arc::new(ScriptedLister::new(Vec::new())), registry);

        let snapshot = p.build_snapshot(vec![
            entry("svc-a", Some("a.example.com"), &[8080, 9090]),
            entry("no-host", None, &[8080]),
            entry("no-port", Some("c.example.com"), &[]),
        ]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a.example.com").unwrap().port, 8080);
        assert!(snapshot.get("c.example.com").is_none());
    }

    #[test]
    #[traced_test]
    fn test_build_snapshot_warns_on_duplicate_key() {
        let registry = Arc::new(ServiceRegistry::new());
        let p = poller(Arc::new(ScriptedLister::new(Vec::new())), registry);

        let snapshot = p.build_snapshot(vec![
            entry("svc-old", Some("a.example.com"), &[80]),
            entry("svc-new", Some("a.example.com"), &[81]),
        ]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a.example.com").unwrap().name, "svc-new");
        assert!(logs_contain("duplicate routing key a.example.com"));
    }

    // ===== run loop =====

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_run_retries_after_failed_cycle() {
        let registry = Arc::new(ServiceRegistry::new());
        let lister = Arc::new(ScriptedLister::new(vec![
            Err(DiscoveryError::Platform {
                status: 503,
                message: "node is not a swarm manager".to_string(),
            }),
            Ok(vec![entry("svc-a", Some("a.example.com"), &[8080])]),
        ]));
        let shutdown = ShutdownController::new();

        let task = tokio::spawn(
            poller(lister.clone(), registry.clone())
                .with_interval(Duration::from_secs(5))
                .run(shutdown.clone())
                .in_current_span(),
        );

        // Nothing happens before the first tick.
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(lister.calls(), 0);

        // First cycle fails: registry stays at its initial (empty) snapshot.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(lister.calls(), 1);
        assert_eq!(registry.version(), 0);
        assert!(registry.lookup("a.example.com").is_err());
        assert!(logs_contain("discovery failed"));

        // Second cycle succeeds.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(lister.calls(), 2);
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.lookup("a.example.com").unwrap().name, "svc-a");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let registry = Arc::new(ServiceRegistry::new());
        let lister = Arc::new(ScriptedLister::new(Vec::new()));
        let shutdown = ShutdownController::new();

        let task = tokio::spawn(poller(lister.clone(), registry).run(shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.shutdown();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("poller did not stop")
            .unwrap();
        assert_eq!(lister.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_lets_in_flight_cycle_finish() {
        let registry = Arc::new(ServiceRegistry::new());
        let lister = Arc::new(
            ScriptedLister::new(vec![Ok(vec![entry("svc-a", Some("a.example.com"), &[80])])])
                .with_delay(Duration::from_millis(500)),
        );
        let shutdown = ShutdownController::new();

        let task = tokio::spawn(
            poller(lister.clone(), registry.clone())
                .with_interval(Duration::from_secs(5))
                .run(shutdown.clone()),
        );

        // Cancel while the first listing call is still running.
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(lister.calls(), 1);
        shutdown.shutdown();

        task.await.unwrap();
        assert_eq!(registry.lookup("a.example.com").unwrap().port, 80);
    }
}
