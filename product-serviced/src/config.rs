use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::DEFAULT_REGISTRY_URL;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub application: ApplicationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Remote configuration source, fetched once at boot when present
    #[serde(default)]
    pub config_server: Option<ConfigServerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port 0 asks the OS for an ephemeral port
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Published `ipAddr`; the hostname is used when unset
    #[serde(default)]
    pub ip_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Pause between marking DOWN and deregistering. Not derived from the
    /// registry's lease or poll interval.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigServerConfig {
    pub url: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            hostname: default_hostname(),
            ip_addr: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RegistryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ServerConfig {
    /// Replace the port part of `listen`, keeping the host part
    pub fn set_port(&mut self, port: u16) {
        let host = match self.listen.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.listen.clone(),
        };
        self.listen = format!("{}:{}", host, port);
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.application.name.is_empty(),
            "application.name must not be empty"
        );
        anyhow::ensure!(
            self.registry.heartbeat_interval_secs > 0,
            "registry.heartbeat_interval_secs must be greater than zero"
        );
        anyhow::ensure!(
            self.registry.request_timeout_secs > 0,
            "registry.request_timeout_secs must be greater than zero"
        );
        Ok(())
    }
}
