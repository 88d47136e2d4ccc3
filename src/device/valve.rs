//! Heating valve actuator.

use crate::addressing::GroupAddress;
use crate::device::{contains_any, is_status_name, Device, DeviceCore, DeviceSpec, DPT_PERCENT, DPT_SWITCH};
use crate::dpt::{Boolean, DptDecode, DptValue, Scaling};
use crate::error::Result;
use crate::protocol::CemiFrame;

fn is_position_name(name: &str) -> bool {
    contains_any(name, &["position"])
}

/// Valve command decoded from a payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ValveCommand {
    /// Opening in percent
    Percent(f64),
    /// Fully open or closed
    Binary(bool),
}

impl ValveCommand {
    /// Classify `payload`: a one-byte value above 1, or any write on a
    /// position object, is a percentage
    pub(crate) fn decode(payload: &[u8], position_object: bool) -> Result<Self> {
        let percent = position_object || matches!(payload, [b] if *b > 1);
        if percent {
            Ok(Self::Percent(Scaling.decode(payload)?))
        } else {
            Ok(Self::Binary(Boolean.decode(payload)?))
        }
    }

    /// Resulting `(on, position)`
    pub(crate) fn resolve(self) -> (bool, f64) {
        match self {
            Self::Percent(position) => (position > 0.0, position),
            Self::Binary(on) => (on, if on { 100.0 } else { 0.0 }),
        }
    }
}

/// Valve with `on` and `position` fields.
///
/// Percentage writes answer on the position status and, when it is a
/// different object, the valve status. Binary writes answer on the valve
/// status only.
#[derive(Debug)]
pub struct Valve {
    core: DeviceCore,
    position_status: Option<GroupAddress>,
    valve_status: Option<GroupAddress>,
}

impl Valve {
    /// Build from `spec`, closed by default
    pub fn new(spec: DeviceSpec) -> Self {
        let core = DeviceCore::new(
            "valve_actuator",
            spec,
            &[
                ("on", DptValue::Bool(false)),
                ("position", DptValue::Float(0.0)),
            ],
        );
        let position_status = core.find(|n| is_status_name(n) && is_position_name(n));
        let valve_status = core
            .find(|n| is_status_name(n) && contains_any(n, &["valve"]))
            .or_else(|| core.find(|n| is_status_name(n) && !is_position_name(n)));
        Self {
            core,
            position_status,
            valve_status,
        }
    }

    fn status_response(&self, ga: GroupAddress, position: bool) -> Result<CemiFrame> {
        if position {
            let value = DptValue::Float(self.core.number("position"));
            self.core.response(ga, DPT_PERCENT, &value)
        } else {
            let value = DptValue::Bool(self.core.flag("on"));
            self.core.response(ga, DPT_SWITCH, &value)
        }
    }
}

impl Device for Valve {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some((position_object, status)) = self
            .core
            .name_of(ga)
            .map(|n| (is_position_name(n), is_status_name(n)))
        else {
            return Ok(Vec::new());
        };

        let command = ValveCommand::decode(payload, position_object)?;
        let (on, position) = command.resolve();
        self.core.set("on", DptValue::Bool(on));
        self.core.set("position", DptValue::Float(position));
        if status {
            return Ok(Vec::new());
        }

        let mut frames = Vec::with_capacity(2);
        if let ValveCommand::Percent(_) = command {
            if let Some(target) = self.position_status {
                frames.push(self.status_response(target, true)?);
            }
        }
        if let Some(target) = self.valve_status {
            if frames.is_empty() || Some(target) != self.position_status {
                frames.push(self.status_response(target, false)?);
            }
        }
        Ok(frames)
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(position) = self.core.name_of(ga).map(is_position_name) else {
            return Ok(None);
        };
        self.status_response(ga, position).map(Some)
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core
            .name_of(ga)
            .map(|n| if is_position_name(n) { DPT_PERCENT } else { DPT_SWITCH })
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        match field {
            "on" => self.valve_status,
            "position" => self.position_status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;

    fn valve() -> Valve {
        Valve::new(DeviceSpec::new(
            "valve-1",
            ia!(1, 1, 70),
            group_objects! {
                "valve_cmd" => 6/0/1,
                "valve_status" => 6/0/2,
                "position_cmd" => 6/0/3,
                "position_status" => 6/0/4,
            },
        ))
    }

    #[test]
    fn test_command_classification() {
        assert_eq!(ValveCommand::decode(&[0x01], false).unwrap(), ValveCommand::Binary(true));
        assert_eq!(ValveCommand::decode(&[0x00], false).unwrap(), ValveCommand::Binary(false));
        assert_eq!(ValveCommand::decode(&[0xFF], false).unwrap(), ValveCommand::Percent(100.0));
        assert_eq!(ValveCommand::decode(&[0x01], true).unwrap(), ValveCommand::Percent(0.4));
        assert_eq!(ValveCommand::Percent(0.0).resolve(), (false, 0.0));
    }

    #[test]
    fn test_binary_write() {
        let mut valve = valve();
        let frames = valve.on_group_write(ga!(6 / 0 / 1), &[0x01]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(6 / 0 / 2)));
        assert_eq!(valve.core().number("position"), 100.0);
    }

    #[test]
    fn test_percent_write_answers_both() {
        let mut valve = valve();
        let frames = valve.on_group_write(ga!(6 / 0 / 3), &[0x80]).unwrap();
        let targets: Vec<_> = frames.iter().filter_map(CemiFrame::group_address).collect();
        assert_eq!(targets, vec![ga!(6 / 0 / 4), ga!(6 / 0 / 2)]);
        assert_eq!(frames[0].payload.as_slice(), &[0x80]);
        assert_eq!(frames[1].payload.as_slice(), &[0x01]);
    }

    #[test]
    fn test_percent_on_valve_object() {
        let mut valve = valve();
        let frames = valve.on_group_write(ga!(6 / 0 / 1), &[0x40]).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(valve.core().flag("on"));
    }

    #[test]
    fn test_status_write_absorbed() {
        let mut valve = valve();
        assert!(valve.on_group_write(ga!(6 / 0 / 4), &[0x80]).unwrap().is_empty());
        assert_eq!(valve.core().number("position"), 50.2);
    }

    #[test]
    fn test_reads() {
        let mut valve = valve();
        valve.on_group_write(ga!(6 / 0 / 3), &[0xFF]).unwrap();
        let position = valve.on_group_read(ga!(6 / 0 / 4)).unwrap().unwrap();
        assert_eq!(position.payload.as_slice(), &[0xFF]);
        let on = valve.on_group_read(ga!(6 / 0 / 2)).unwrap().unwrap();
        assert_eq!(on.payload.as_slice(), &[0x01]);
    }
}
