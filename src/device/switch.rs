//! On/off light switch.

use crate::addressing::GroupAddress;
use crate::device::{is_switch_status_name, Device, DeviceCore, DeviceSpec, DPT_SWITCH};
use crate::dpt::{Boolean, DptDecode, DptValue};
use crate::error::Result;
use crate::protocol::CemiFrame;

/// Switching actuator with a single `on` field.
///
/// Writes to a command object set `on` and answer on the first status
/// object. Writes to a status object are absorbed. Reads on any object
/// return `on`.
#[derive(Debug)]
pub struct Switch {
    core: DeviceCore,
}

impl Switch {
    /// Build from `spec`, `on` defaults to false
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            core: DeviceCore::new("light_switch", spec, &[("on", DptValue::Bool(false))]),
        }
    }

    fn status_ga(&self) -> Option<GroupAddress> {
        self.core.find(is_switch_status_name)
    }
}

impl Device for Switch {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some(is_status) = self.core.name_of(ga).map(is_switch_status_name) else {
            return Ok(Vec::new());
        };
        let on = DptValue::Bool(Boolean.decode(payload)?);
        self.core.set("on", on.clone());
        if is_status {
            return Ok(Vec::new());
        }

        match self.status_ga() {
            Some(status) => Ok(vec![self.core.response(status, DPT_SWITCH, &on)?]),
            None => Ok(Vec::new()),
        }
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        if !self.core.listens_to(ga) {
            return Ok(None);
        }
        let on = DptValue::Bool(self.core.flag("on"));
        self.core.response(ga, DPT_SWITCH, &on).map(Some)
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core.listens_to(ga).then_some(DPT_SWITCH)
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        match field {
            "on" => self.status_ga(),
            _ => None,
        }
    }
}
