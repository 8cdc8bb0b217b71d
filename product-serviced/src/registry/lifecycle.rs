//! Registration lifecycle
//!
//! Sequences one instance through the registry:
//!
//! ```text
//! Unregistered -> Starting -> Up -> Down -> Deregistered
//! ```
//!
//! Boot registers (STARTING), marks UP and starts heartbeats. Shutdown
//! cancels heartbeats, marks DOWN, waits out the grace period so registry
//! consumers see DOWN, then deregisters. Failures to register, mark UP or
//! deregister are returned to the caller as fatal. A failed DOWN update is
//! logged and shutdown carries on.

use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use shared::types::InstanceStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::config::RegistryConfig;
use crate::registry::client::RegistryApi;
use crate::registry::error::{RegistryError, Result};
use crate::registry::heartbeat::{self, HeartbeatHandle};
use crate::registry::instance::InstanceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unregistered,
    Starting,
    Up,
    Down,
    Deregistered,
}

impl LifecycleState {
    fn successor(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Unregistered => Some(LifecycleState::Starting),
            LifecycleState::Starting => Some(LifecycleState::Up),
            LifecycleState::Up => Some(LifecycleState::Down),
            LifecycleState::Down => Some(LifecycleState::Deregistered),
            LifecycleState::Deregistered => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub heartbeat_interval: Duration,
    pub shutdown_grace: Duration,
}

impl From<&RegistryConfig> for Timings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

pub struct LifecycleCoordinator {
    api: Arc<dyn RegistryApi>,
    record: InstanceRecord,
    timings: Timings,
    state_tx: watch::Sender<LifecycleState>,
    heartbeat: Option<HeartbeatHandle>,
}

impl LifecycleCoordinator {
    pub fn new(api: Arc<dyn RegistryApi>, record: InstanceRecord, timings: Timings) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Unregistered);
        Self {
            api,
            record,
            timings,
            state_tx,
            heartbeat: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Move exactly one step forward
    fn transition(&mut self, to: LifecycleState) -> Result<()> {
        let from = self.state();
        if from.successor() != Some(to) {
            return Err(RegistryError::InvalidTransition { from, to });
        }

        let status = match to {
            LifecycleState::Starting => Some(InstanceStatus::Starting),
            LifecycleState::Up => Some(InstanceStatus::Up),
            LifecycleState::Down => Some(InstanceStatus::Down),
            LifecycleState::Unregistered | LifecycleState::Deregistered => None,
        };
        if let Some(status) = status {
            if !self.record.advance_status(status) {
                return Err(RegistryError::InvalidTransition { from, to });
            }
        }

        self.state_tx.send_replace(to);
        tracing::debug!(
            "Registry lifecycle {:?} -> {:?} (instance status {})",
            from,
            to,
            self.record.status()
        );
        Ok(())
    }

    /// Register, mark UP and start heartbeats. Heartbeats also stop when
    /// `shutdown` is cancelled.
    pub async fn start(&mut self, shutdown: &CancellationToken) -> Result<()> {
        self.transition(LifecycleState::Starting)?;
        self.api.register(&self.record).await?;

        self.api.update_status(&self.record, InstanceStatus::Up).await?;
        self.transition(LifecycleState::Up)?;

        self.heartbeat = Some(heartbeat::start(
            self.api.clone(),
            self.record.app_name().to_string(),
            self.record.instance_id().to_string(),
            self.timings.heartbeat_interval,
            shutdown,
        ));

        tracing::info!(
            "Instance {}/{} is UP on port {}",
            self.record.app_name(),
            self.record.instance_id(),
            self.record.port()
        );
        Ok(())
    }

    /// Cancel heartbeats, mark DOWN, wait the grace period, deregister.
    pub async fn shutdown(&mut self) -> Result<()> {
        let current = self.state();
        if current != LifecycleState::Up {
            return Err(RegistryError::InvalidTransition {
                from: current,
                to: LifecycleState::Down,
            });
        }

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.cancel();
            tracing::debug!("Heartbeat cancelled, last outcome {:?}", heartbeat.last_outcome());
        }

        self.transition(LifecycleState::Down)?;
        if let Err(e) = self.api.update_status(&self.record, InstanceStatus::Down).await {
            tracing::warn!("Failed to mark instance DOWN, deregistering anyway: {}", e);
        }

        if !self.timings.shutdown_grace.is_zero() {
            tracing::info!("Waiting {:?} for DOWN to propagate", self.timings.shutdown_grace);
            tokio::time::sleep(self.timings.shutdown_grace).await;
        }

        let deregistered = self
            .api
            .deregister(self.record.app_name(), self.record.instance_id())
            .await;

        // Joined on both paths so an in-flight renewal finishes before exit
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stopped().await;
        }

        deregistered?;
        self.transition(LifecycleState::Deregistered)?;

        tracing::info!(
            "Instance {}/{} deregistered",
            self.record.app_name(),
            self.record.instance_id()
        );
        Ok(())
    }
}

/// Running registry client: the instance is UP and a watcher waits for
/// shutdown.
pub struct RegistryClientHandle {
    state_rx: watch::Receiver<LifecycleState>,
    task: JoinHandle<Result<()>>,
}

impl RegistryClientHandle {
    pub fn state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_rx.clone()
    }

    /// Resolves once the shutdown sequence has run
    pub async fn finished(self) -> Result<()> {
        self.task.await?
    }
}

/// Register synchronously, then hand the coordinator to a background task
/// that runs the shutdown sequence once `shutdown` is cancelled.
pub async fn start_client(
    api: Arc<dyn RegistryApi>,
    record: InstanceRecord,
    timings: Timings,
    shutdown: CancellationToken,
) -> Result<RegistryClientHandle> {
    let mut coordinator = LifecycleCoordinator::new(api, record, timings);
    coordinator.start(&shutdown).await?;

    let state_rx = coordinator.subscribe();
    let task = tokio::spawn(async move {
        shutdown.cancelled().await;
        tracing::info!("Shutdown requested, leaving registry");
        coordinator.shutdown().await
    });

    Ok(RegistryClientHandle { state_rx, task })
}
