//! swarm-gateway - Host-based HTTP gateway for Docker Swarm services
//!
//! This is the composition root that wires together all the components.

use std::sync::Arc;
use swarm_gateway::adapters::outbound::{DockerServiceLister, LabelRoutingKey, ReqwestForwarder};
use swarm_gateway::application::{DiscoveryPoller, GatewayService, ServiceRegistry};
use swarm_gateway::infrastructure::{shutdown_signal, ShutdownController};
use swarm_gateway::{load_config, HttpServer};
use tokio::net::TcpListener;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting swarm-gateway listen={} docker={} host_label={}",
        cfg.listen_addr,
        cfg.docker_host,
        cfg.host_label
    );

    // ===== COMPOSITION ROOT =====

    let registry = Arc::new(ServiceRegistry::new());
    let shutdown = ShutdownController::new();

    // 1. Discovery: Docker Swarm -> registry
    let lister = DockerServiceLister::new(&cfg.docker_host, cfg.docker_api_version.as_deref())?
        .with_label_filter(cfg.host_label.clone());
    let extractor = LabelRoutingKey::new(cfg.host_label.clone(), cfg.port_label.clone());
    let poller = DiscoveryPoller::new(Arc::new(lister), Arc::new(extractor), registry.clone())
        .with_interval(cfg.discovery_interval())
        .with_timeout(cfg.discovery_timeout());

    // 2. Dispatch: registry -> upstream
    let forwarder = ReqwestForwarder::new()?;
    let service = Arc::new(
        GatewayService::new(registry, Arc::new(forwarder))
            .with_upstream_timeout(cfg.upstream_timeout()),
    );
    let server = HttpServer::new(cfg.listen_addr.clone(), service, shutdown.clone())
        .with_max_body_bytes(cfg.max_body_bytes);

    // Bind up front so an unusable address is fatal before anything starts.
    let listener = TcpListener::bind(server.listen_addr()).await?;

    // 3. Run both long-lived tasks until the shutdown signal
    let discovery_task = tokio::spawn(poller.run(shutdown.clone()));
    let mut server_task = tokio::spawn(async move { server.serve(listener).await });

    tokio::select! {
        _ = shutdown_signal(shutdown.clone()) => {}
        result = &mut server_task => {
            tracing::error!("gateway listener exited unexpectedly");
            shutdown.shutdown();
            discovery_task.await?;
            return result?;
        }
    }

    let drain = async { tokio::join!(discovery_task, server_task) };
    match tokio::time::timeout(cfg.shutdown_grace(), drain).await {
        Ok((discovery, server)) => {
            discovery?;
            server??;
        }
        Err(_) => {
            tracing::warn!(
                "shutdown grace period elapsed, {} requests still in flight",
                shutdown.in_flight_requests()
            );
        }
    }

    tracing::info!("done");
    Ok(())
}
