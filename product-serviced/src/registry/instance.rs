use shared::protocol::{HEALTH_CHECK_PATH, HOME_PAGE_PATH, STATUS_PAGE_PATH};
use shared::types::{DataCenterInfo, InstanceInfo, InstanceStatus, PortInfo, RegistrationBody};
use uuid::Uuid;
use crate::config::Config;

/// The registry-visible identity of this process.
///
/// Everything except `status` is fixed at construction. `status` only moves
/// forward and is changed by the lifecycle coordinator alone.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    instance_id: String,
    app_name: String,
    host_name: String,
    ip_addr: String,
    port: u16,
    status: InstanceStatus,
}

/// Fresh identifier for one process run
pub fn generate_instance_id() -> String {
    Uuid::new_v4().to_string()
}

impl InstanceRecord {
    pub fn new(
        app_name: impl Into<String>,
        instance_id: impl Into<String>,
        host_name: impl Into<String>,
        ip_addr: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            app_name: app_name.into(),
            host_name: host_name.into(),
            ip_addr: ip_addr.into(),
            port,
            status: InstanceStatus::Starting,
        }
    }

    /// Build the record from config. `bound_port` must be the port the
    /// listener actually got, not the configured one.
    pub fn from_config(config: &Config, instance_id: impl Into<String>, bound_port: u16) -> Self {
        let ip_addr = config
            .server
            .ip_addr
            .clone()
            .unwrap_or_else(|| config.server.hostname.clone());

        Self::new(
            config.application.name.clone(),
            instance_id,
            config.server.hostname.clone(),
            ip_addr,
            bound_port,
        )
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    /// Move to `next`; returns false and leaves the record untouched when
    /// that would go backwards.
    pub(crate) fn advance_status(&mut self, next: InstanceStatus) -> bool {
        if next < self.status {
            return false;
        }
        self.status = next;
        true
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host_name, self.port, path)
    }

    /// Wire payload carrying `status`
    pub fn payload(&self, status: InstanceStatus) -> RegistrationBody {
        RegistrationBody {
            instance: InstanceInfo {
                instance_id: self.instance_id.clone(),
                host_name: self.host_name.clone(),
                app: self.app_name.clone(),
                vip_address: self.app_name.clone(),
                secure_vip_address: self.app_name.clone(),
                ip_addr: self.ip_addr.clone(),
                status,
                port: PortInfo::enabled(self.port),
                secure_port: PortInfo::disabled(self.port),
                health_check_url: self.url(HEALTH_CHECK_PATH),
                status_page_url: self.url(STATUS_PAGE_PATH),
                home_page_url: self.url(HOME_PAGE_PATH),
                data_center_info: DataCenterInfo::default(),
            },
        }
    }
}
