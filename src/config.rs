use crate::adapters::outbound::DEFAULT_DOCKER_HOST;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Listener settings
    pub listen_addr: String,
    pub max_body_bytes: usize,
    pub upstream_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub debug: bool,

    // Discovery settings
    pub docker_host: String,
    pub docker_api_version: Option<String>,
    pub discovery_interval_secs: u64,
    pub discovery_timeout_secs: u64,
    pub host_label: String,
    pub port_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            upstream_timeout_secs: 5,
            shutdown_grace_secs: 30,
            debug: false,
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            docker_api_version: None,
            discovery_interval_secs: 5,
            discovery_timeout_secs: 1,
            host_label: "gateway.host".to_string(),
            port_label: "gateway.port".to_string(),
        }
    }
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.discovery_interval_secs == 0 {
            anyhow::bail!("discovery interval must be greater than zero");
        }
        if self.discovery_timeout_secs == 0 {
            anyhow::bail!("discovery timeout must be greater than zero");
        }
        if self.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream timeout must be greater than zero");
        }
        if self.host_label.trim().is_empty() {
            anyhow::bail!("host label must not be empty");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();

    let listen_addr = env_or("GATEWAY_LISTEN_ADDR", &defaults.listen_addr);
    let max_body_bytes = env_parse("GATEWAY_MAX_BODY_BYTES", defaults.max_body_bytes);
    let upstream_timeout_secs =
        env_parse("GATEWAY_UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout_secs);
    let shutdown_grace_secs = env_parse("GATEWAY_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace_secs);

    let debug = std::env::var("DEBUG").is_ok();

    // Discovery settings, DOCKER_* follow the docker CLI conventions
    let docker_host = std::env::var("DOCKER_HOST")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.docker_host);
    let docker_api_version = std::env::var("DOCKER_API_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let discovery_interval_secs = env_parse(
        "GATEWAY_DISCOVERY_INTERVAL_SECS",
        defaults.discovery_interval_secs,
    );
    let discovery_timeout_secs = env_parse(
        "GATEWAY_DISCOVERY_TIMEOUT_SECS",
        defaults.discovery_timeout_secs,
    );

    let host_label = env_or("GATEWAY_HOST_LABEL", &defaults.host_label);
    let port_label = env_or("GATEWAY_PORT_LABEL", &defaults.port_label);

    let cfg = Config {
        listen_addr,
        max_body_bytes,
        upstream_timeout_secs,
        shutdown_grace_secs,
        debug,
        docker_host,
        docker_api_version,
        discovery_interval_secs,
        discovery_timeout_secs,
        host_label,
        port_label,
    };
    cfg.validate()?;
    Ok(cfg)
}
