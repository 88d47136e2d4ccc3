//! Presence detector with illuminance output.

use crate::addressing::GroupAddress;
use crate::device::{contains_any, Device, DeviceCore, DeviceSpec};
use crate::dpt::{self, DptValue};
use crate::error::Result;
use crate::protocol::CemiFrame;

const DPT_OCCUPANCY: &str = "1.018";
const DPT_LUX: &str = "9.004";

/// State field and DPT for a presence detector object
fn channel(name: &str) -> (&'static str, &'static str) {
    if contains_any(name, &["lux", "light_level", "illuminance"]) {
        ("lux", DPT_LUX)
    } else {
        ("presence", DPT_OCCUPANCY)
    }
}

/// Presence detector reporting `presence` (1.018) and `lux` (9.004).
#[derive(Debug)]
pub struct Presence {
    core: DeviceCore,
}

impl Presence {
    /// Build from `spec`, unoccupied and dark by default
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            core: DeviceCore::new(
                "presence",
                spec,
                &[
                    ("presence", DptValue::Bool(false)),
                    ("lux", DptValue::Float(0.0)),
                ],
            ),
        }
    }
}

impl Device for Presence {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some((field, dpt)) = self.core.name_of(ga).map(channel) else {
            return Ok(Vec::new());
        };
        let value = dpt::decode(dpt, payload)?;
        self.core.set(field, value.clone());
        Ok(vec![self.core.response(ga, dpt, &value)?])
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some((field, dpt)) = self.core.name_of(ga).map(channel) else {
            return Ok(None);
        };
        match self.core.state.get(field) {
            Some(value) => self.core.response(ga, dpt, value).map(Some),
            None => Ok(None),
        }
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core.name_of(ga).map(|n| channel(n).1)
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        self.core.find(|n| channel(n).0 == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;

    fn detector() -> Presence {
        Presence::new(DeviceSpec::new(
            "pd-1",
            ia!(1, 1, 50),
            group_objects! {
                "presence" => 4/0/1,
                "lux" => 4/0/2,
            },
        ))
    }

    #[test]
    fn test_presence_write_echoes() {
        let mut pd = detector();
        let frames = pd.on_group_write(ga!(4 / 0 / 1), &[0x01]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(4 / 0 / 1)));
        assert!(pd.core().flag("presence"));
    }

    #[test]
    fn test_lux_is_dpt9() {
        let mut pd = detector();
        pd.on_group_write(ga!(4 / 0 / 2), &[0x0C, 0x33]).unwrap();
        assert_eq!(pd.state().get("lux"), Some(&DptValue::Float(21.5)));
        assert_eq!(pd.dpt_for(ga!(4 / 0 / 2)), Some("9.004"));
        assert_eq!(pd.dpt_for(ga!(4 / 0 / 1)), Some("1.018"));
    }

    #[test]
    fn test_read_defaults() {
        let mut pd = detector();
        let frame = pd.on_group_read(ga!(4 / 0 / 1)).unwrap().unwrap();
        assert_eq!(frame.payload.as_slice(), &[0x00]);
    }

    #[test]
    fn test_update_presence() {
        let mut pd = detector();
        let frames = pd.update("presence", DptValue::Bool(true)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(4 / 0 / 1)));
        assert!(pd.update("co2", DptValue::Float(400.0)).is_err());
    }
}
