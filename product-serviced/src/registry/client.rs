//! HTTP client for the registry server
//!
//! Translates lifecycle operations into the registry's REST protocol:
//!
//! - `POST   {base}/apps/{app}` register or update status (full payload)
//! - `PUT    {base}/apps/{app}/{id}` heartbeat renewal, no body
//! - `DELETE {base}/apps/{app}/{id}` deregistration
//!
//! The client holds no mutable state and never terminates the process.
//! Whether a failure is fatal is decided by the caller.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use shared::protocol::{app_url, instance_url};
use shared::types::InstanceStatus;
use tracing::{debug, info};
use crate::config::RegistryConfig;
use crate::registry::error::{RegistryError, Result};
use crate::registry::instance::InstanceRecord;

/// Operations the lifecycle coordinator needs from a registry server
#[async_trait]
pub trait RegistryApi: Send + Sync + 'static {
    /// Create the instance entry with status STARTING
    async fn register(&self, record: &InstanceRecord) -> Result<()>;

    /// Re-send the full payload with `status`
    async fn update_status(&self, record: &InstanceRecord, status: InstanceStatus) -> Result<()>;

    /// Renew the instance lease
    async fn heartbeat(&self, app: &str, instance_id: &str) -> Result<()>;

    /// Remove the instance entry
    async fn deregister(&self, app: &str, instance_id: &str) -> Result<()>;
}

/// Eureka-compatible registry client
#[derive(Debug, Clone)]
pub struct EurekaClient {
    http: Client,
    base_url: String,
}

impl EurekaClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Self::with_timeout(&config.url, config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RegistryError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and read the whole body so the connection can be reused
    async fn send(&self, request: RequestBuilder, url: String) -> Result<()> {
        let response = request
            .send()
            .await
            .map_err(|source| RegistryError::Transport { url: url.clone(), source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RegistryError::Body { url: url.clone(), source })?;

        if !status.is_success() {
            return Err(RegistryError::Status { url, status, body });
        }

        if !body.is_empty() {
            debug!("Registry response from {}: {}", url, body);
        }

        Ok(())
    }

    async fn post_status(&self, record: &InstanceRecord, status: InstanceStatus) -> Result<()> {
        let url = app_url(&self.base_url, record.app_name());
        let body = record.payload(status);
        self.send(self.http.post(&url).json(&body), url).await
    }
}

#[async_trait]
impl RegistryApi for EurekaClient {
    async fn register(&self, record: &InstanceRecord) -> Result<()> {
        info!(
            "Registering {}/{} with registry at {}",
            record.app_name(),
            record.instance_id(),
            self.base_url
        );
        self.post_status(record, InstanceStatus::Starting).await
    }

    async fn update_status(&self, record: &InstanceRecord, status: InstanceStatus) -> Result<()> {
        info!("Updating {}/{} status to {}", record.app_name(), record.instance_id(), status);
        self.post_status(record, status).await
    }

    async fn heartbeat(&self, app: &str, instance_id: &str) -> Result<()> {
        let url = instance_url(&self.base_url, app, instance_id);
        debug!("Sending heartbeat to {}", url);
        self.send(self.http.put(&url), url).await
    }

    async fn deregister(&self, app: &str, instance_id: &str) -> Result<()> {
        info!("Deregistering {}/{} from registry", app, instance_id);
        let url = instance_url(&self.base_url, app, instance_id);
        self.send(self.http.delete(&url), url).await
    }
}
