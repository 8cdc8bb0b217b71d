//! In-memory registry that records every call, for ordering assertions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::StatusCode;
use shared::types::InstanceStatus;
use tokio::time::Instant;
use crate::registry::client::RegistryApi;
use crate::registry::error::{RegistryError, Result};
use crate::registry::instance::InstanceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Register,
    UpdateStatus(InstanceStatus),
    Heartbeat,
    Deregister,
}

#[derive(Default)]
pub struct RecordingRegistry {
    pub(crate) calls: Mutex<Vec<(Instant, Call)>>,
    pub heartbeat_delay: Duration,
    /// Number of upcoming heartbeats that fail
    pub failing_heartbeats: AtomicUsize,
    pub completed_heartbeats: AtomicUsize,
    pub fail_register: bool,
    pub fail_up: bool,
    pub fail_down: bool,
    pub fail_deregister: bool,
}

fn unavailable(url: &str) -> RegistryError {
    RegistryError::Status {
        url: url.to_string(),
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: String::new(),
    }
}

impl RecordingRegistry {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, call)| *call).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn heartbeat_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, call)| *call == Call::Heartbeat)
            .map(|(at, _)| *at)
            .collect()
    }
}

#[async_trait]
impl RegistryApi for RecordingRegistry {
    async fn register(&self, _record: &InstanceRecord) -> Result<()> {
        self.push(Call::Register);
        if self.fail_register {
            return Err(unavailable("register"));
        }
        Ok(())
    }

    async fn update_status(&self, _record: &InstanceRecord, status: InstanceStatus) -> Result<()> {
        self.push(Call::UpdateStatus(status));
        let fail = match status {
            InstanceStatus::Up => self.fail_up,
            InstanceStatus::Down => self.fail_down,
            InstanceStatus::Starting => false,
        };
        if fail {
            return Err(unavailable("status"));
        }
        Ok(())
    }

    async fn heartbeat(&self, _app: &str, _instance_id: &str) -> Result<()> {
        self.push(Call::Heartbeat);
        if !self.heartbeat_delay.is_zero() {
            tokio::time::sleep(self.heartbeat_delay).await;
        }
        self.completed_heartbeats.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_heartbeats
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(unavailable("heartbeat"));
        }
        Ok(())
    }

    async fn deregister(&self, _app: &str, _instance_id: &str) -> Result<()> {
        self.push(Call::Deregister);
        if self.fail_deregister {
            return Err(unavailable("deregister"));
        }
        Ok(())
    }
}
