//! Premise configuration.
//!
//! A configuration file is TOML with one `[[premises]]` table per simulated
//! installation:
//!
//! ```toml
//! [[premises]]
//! id = "home"
//! name = "Demo house"
//! port = 3671
//!
//! [[premises.devices]]
//! id = "light-1"
//! type = "light_switch"
//! individual_address = "1.1.1"
//! group_addresses = { switch_cmd = "1/0/1", switch_status = "1/0/2" }
//!
//! [[premises.scenarios]]
//! device = "light-1"
//! field = "on"
//! interval_secs = 30
//! values = [true, false]
//! ```
//!
//! Group objects keep the order they are written in; several device types
//! pick their status object by position.

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::device::{self, DeviceSpec, DeviceState, GroupObjects, TemplateTable};
use crate::dpt::DptValue;
use crate::error::{KnxError, Result};
use crate::knx_server::ServerSettings;
use crate::protocol::KNXNETIP_DEFAULT_PORT;
use core::fmt;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// File read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "knx-sim.toml";

/// Standard KNXnet/IP port
pub const DEFAULT_PORT: u16 = KNXNETIP_DEFAULT_PORT;

/// Whole simulator configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Simulated installations
    #[serde(default)]
    pub premises: Vec<PremiseConfig>,
}

impl SimConfig {
    /// Read and validate the file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KnxError::config_io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| KnxError::config_parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Move the only premise to `port`
    pub fn override_port(&mut self, port: u16) -> Result<()> {
        let [premise] = self.premises.as_mut_slice() else {
            return Err(KnxError::config_invalid(
                "a port override needs a configuration with exactly one premise",
            ));
        };
        premise.port = port;
        Ok(())
    }

    /// Check cross-references the file format cannot express
    pub fn validate(&self) -> Result<()> {
        if self.premises.is_empty() {
            return Err(KnxError::config_invalid("no premises configured"));
        }

        let mut ids = BTreeSet::new();
        let mut endpoints = BTreeSet::new();
        for premise in &self.premises {
            if !ids.insert(premise.id.as_str()) {
                return Err(KnxError::config_invalid(format!(
                    "duplicate premise id '{}'",
                    premise.id
                )));
            }
            if premise.port != 0 && !endpoints.insert((premise.bind.as_str(), premise.port)) {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': {}:{} is already used by another premise",
                    premise.id, premise.bind, premise.port
                )));
            }
            premise.validate()?;
        }
        Ok(())
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_gateway_address() -> IndividualAddress {
    IndividualAddress::from_parts(1, 0, 0)
}

const fn default_client_address() -> IndividualAddress {
    IndividualAddress::from_parts(1, 0, 255)
}

/// One simulated installation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PremiseConfig {
    /// Unique id, used in logs and the inspector
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// UDP port, 0 picks a free one
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address of the gateway itself
    #[serde(default = "default_gateway_address")]
    pub gateway_address: IndividualAddress,
    /// Address assigned to tunnelling clients
    #[serde(default = "default_client_address")]
    pub client_address: IndividualAddress,
    /// Close idle tunnelling channels after this many seconds
    #[serde(default)]
    pub channel_idle_timeout_secs: Option<u64>,
    /// Devices on the bus
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Periodic value drivers
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

impl PremiseConfig {
    /// Premise with default network settings and nothing on the bus
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            bind: default_bind(),
            port: default_port(),
            gateway_address: default_gateway_address(),
            client_address: default_client_address(),
            channel_idle_timeout_secs: None,
            devices: Vec::new(),
            scenarios: Vec::new(),
        }
    }

    /// Name for logs, the id when unnamed
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Settings for this premise's tunnelling server
    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            gateway_address: self.gateway_address,
            client_address: self.client_address,
            idle_timeout: self.channel_idle_timeout_secs.map(Duration::from_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for device in &self.devices {
            if !ids.insert(device.id.as_str()) {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': duplicate device id '{}'",
                    self.id, device.id
                )));
            }
            if !device::is_known_type(&device.kind) {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': device '{}' has unknown type '{}'",
                    self.id, device.id, device.kind
                )));
            }
        }

        for scenario in &self.scenarios {
            if !ids.contains(scenario.device.as_str()) {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': scenario for unknown device '{}'",
                    self.id, scenario.device
                )));
            }
            if !(scenario.interval_secs.is_finite() && scenario.interval_secs > 0.0) {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': scenario on '{}' needs a positive interval",
                    self.id, scenario.device
                )));
            }
            if scenario.values.is_empty() {
                return Err(KnxError::config_invalid(format!(
                    "premise '{}': scenario on '{}' has no values",
                    self.id, scenario.device
                )));
            }
        }
        Ok(())
    }
}

/// One device on the bus
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Unique id within the premise
    pub id: String,
    /// Registered device type, see [`device::device_types`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Source address
    pub individual_address: IndividualAddress,
    /// Group object name to group address, in file order
    #[serde(default, deserialize_with = "ordered_objects")]
    pub group_addresses: GroupObjects,
    /// Initial state overriding the device defaults
    #[serde(default)]
    pub initial_state: DeviceState,
    /// Slot table for template devices
    #[serde(default)]
    pub template: TemplateTable,
}

impl DeviceConfig {
    /// Construction parameters for the device registry
    pub fn spec(&self) -> DeviceSpec {
        DeviceSpec {
            id: self.id.clone(),
            individual_address: self.individual_address,
            group_objects: self.group_addresses.clone(),
            initial_state: self.initial_state.clone(),
            template: self.template.clone(),
        }
    }
}

struct OrderedObjects;

impl<'de> Visitor<'de> for OrderedObjects {
    type Value = GroupObjects;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a table of group object names to group addresses")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut objects = GroupObjects::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, ga)) = map.next_entry::<String, GroupAddress>()? {
            objects.push((name, ga));
        }
        Ok(objects)
    }
}

fn ordered_objects<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<GroupObjects, D::Error> {
    deserializer.deserialize_map(OrderedObjects)
}

const fn default_interval() -> f64 {
    10.0
}

/// Periodic driver of one device field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Target device id
    pub device: String,
    /// State field to set
    pub field: String,
    /// Seconds between values
    #[serde(default = "default_interval")]
    pub interval_secs: f64,
    /// Values applied in turn, wrapping around
    pub values: Vec<DptValue>,
}
