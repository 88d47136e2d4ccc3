//! Measuring sensor and binary input.

use crate::addressing::GroupAddress;
use crate::device::{infer_dpt, Device, DeviceCore, DeviceSpec};
use crate::dpt::{self, DptValue};
use crate::error::Result;
use crate::protocol::CemiFrame;

/// Sensor whose group object names are its fields.
///
/// The DPT of each object is inferred from its name: `temperature` is 9.001,
/// `humidity` 9.007, `lux` 9.004, anything unrecognised 1.001 (binary
/// inputs). A write stores the decoded value and echoes it on the same
/// object; a read returns the stored value, or nothing before the first
/// measurement.
#[derive(Debug)]
pub struct Sensor {
    core: DeviceCore,
}

impl Sensor {
    /// Build from `spec`
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            core: DeviceCore::new("sensor", spec, &[]),
        }
    }
}

impl Device for Sensor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some(field) = self.core.name_of(ga).map(str::to_string) else {
            return Ok(Vec::new());
        };
        let dpt = infer_dpt(&field);
        let value = dpt::decode(dpt, payload)?;
        self.core.set(&field, value.clone());
        Ok(vec![self.core.response(ga, dpt, &value)?])
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(field) = self.core.name_of(ga) else {
            return Ok(None);
        };
        match self.core.state.get(field) {
            Some(value) => self.core.response(ga, infer_dpt(field), value).map(Some),
            None => Ok(None),
        }
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core.name_of(ga).map(infer_dpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;

    fn sensor() -> Sensor {
        Sensor::new(
            DeviceSpec::new(
                "climate-1",
                ia!(1, 1, 40),
                group_objects! {
                    "temperature" => 3/0/1,
                    "humidity" => 3/0/2,
                    "lux" => 3/0/3,
                },
            )
            .with_state("temperature", 21.5),
        )
    }

    #[test]
    fn test_read_initial_value() {
        let mut sensor = sensor();
        let frame = sensor.on_group_read(ga!(3 / 0 / 1)).unwrap().unwrap();
        assert!(frame.is_group_response());
        assert_eq!(frame.payload.as_slice(), &[0x0C, 0x33]);
    }

    #[test]
    fn test_read_before_measurement_is_silent() {
        let mut sensor = sensor();
        assert!(sensor.on_group_read(ga!(3 / 0 / 2)).unwrap().is_none());
    }

    #[test]
    fn test_write_stores_and_echoes() {
        let mut sensor = sensor();
        let frames = sensor.on_group_write(ga!(3 / 0 / 3), &[0x0C, 0x38]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(3 / 0 / 3)));
        assert_eq!(sensor.state().get("lux"), Some(&DptValue::Float(21.6)));
        assert!(sensor.on_group_write(ga!(3 / 0 / 2), &[0x0C]).is_err());
    }

    #[test]
    fn test_update_sends_on_own_object() {
        let mut sensor = sensor();
        let frames = sensor.update("temperature", DptValue::Float(-5.0)).unwrap();
        assert!(frames[0].is_group_write());
        assert_eq!(frames[0].group_address(), Some(ga!(3 / 0 / 1)));
        assert_eq!(frames[0].payload.as_slice(), &[0x86, 0x0C]);
        assert_eq!(sensor.dpt_for(ga!(3 / 0 / 2)), Some("9.007"));
    }
}
