use std::fmt;
use serde::{Serialize, Deserialize};
use crate::protocol::{DATA_CENTER_CLASS, DATA_CENTER_NAME};

/// Registry-visible status of an instance.
/// Declaration order is the only allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    Starting,
    Up,
    Down,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port descriptor, serialized as `{"$": 8080, "@enabled": "true"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    #[serde(rename = "$")]
    pub port: u16,

    /// The registry expects the flag as a string, not a JSON boolean
    #[serde(rename = "@enabled", with = "bool_string")]
    pub enabled: bool,
}

impl PortInfo {
    pub fn enabled(port: u16) -> Self {
        Self { port, enabled: true }
    }

    pub fn disabled(port: u16) -> Self {
        Self { port, enabled: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenterInfo {
    #[serde(rename = "@class")]
    pub class: String,
    pub name: String,
}

impl Default for DataCenterInfo {
    fn default() -> Self {
        Self {
            class: DATA_CENTER_CLASS.to_string(),
            name: DATA_CENTER_NAME.to_string(),
        }
    }
}

/// Instance payload as the registry server understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub instance_id: String,
    pub host_name: String,
    pub app: String,
    pub vip_address: String,
    pub secure_vip_address: String,
    pub ip_addr: String,
    pub status: InstanceStatus,
    pub port: PortInfo,
    pub secure_port: PortInfo,
    pub health_check_url: String,
    pub status_page_url: String,
    pub home_page_url: String,
    pub data_center_info: DataCenterInfo,
}

/// Envelope for register and status-update requests: `{"instance": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationBody {
    pub instance: InstanceInfo,
}

mod bool_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Str(other),
                &"\"true\" or \"false\"",
            )),
        }
    }
}
