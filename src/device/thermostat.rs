//! Room thermostat with a proportional heating loop.
//!
//! ```text
//! target = setpoint + mode offset
//! output = clamp(KP * (target - current), 0, 100)     (0 when target <= current)
//! ```
//!
//! | Mode | Offset (K) |
//! |------|------------|
//! | comfort, auto | 0 |
//! | standby | -2 |
//! | economy | -4 |
//! | protection | -10 |
//!
//! The output is only announced (as a `heating_output` indication) when the
//! integer percentage actually changes.

use crate::addressing::GroupAddress;
use crate::device::{contains_any, is_status_name, Device, DeviceCore, DeviceSpec, DPT_PERCENT};
use crate::dpt::{DptDecode, DptValue, Float16, HvacMode, Unsigned8};
use crate::error::{KnxError, Result};
use crate::protocol::CemiFrame;

/// Proportional gain, percent per kelvin
pub const KP: f64 = 10.0;

const DPT_TEMPERATURE: &str = "9.001";
const DPT_HVAC_MODE: &str = "20.102";

const DEFAULT_TEMPERATURE: f64 = 20.0;
const DEFAULT_SETPOINT: f64 = 21.0;

/// Setpoint shift for `mode` in kelvin
pub const fn mode_offset(mode: HvacMode) -> f64 {
    match mode {
        HvacMode::Comfort | HvacMode::Auto => 0.0,
        HvacMode::Standby => -2.0,
        HvacMode::Economy => -4.0,
        HvacMode::BuildingProtection => -10.0,
    }
}

/// Heating demand in percent
pub fn heating_output(setpoint: f64, current: f64, mode: HvacMode) -> u8 {
    let error = setpoint + mode_offset(mode) - current;
    if error <= 0.0 {
        return 0;
    }
    (KP * error).trunc().clamp(0.0, 100.0) as u8
}

/// Mode from a state value: a name or the DPT 20.102 number
fn mode_of(value: &DptValue) -> Result<HvacMode> {
    if let Some(name) = value.as_str() {
        return HvacMode::from_name(name).ok_or_else(KnxError::dpt_value_out_of_range);
    }
    let raw = value.as_i64().ok_or_else(KnxError::dpt_type_mismatch)?;
    HvacMode::from_u8(u8::try_from(raw).map_err(|_| KnxError::dpt_value_out_of_range())?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Object {
    Temperature,
    Setpoint,
    SetpointStatus,
    Mode,
    ModeStatus,
    Output,
}

impl Object {
    fn of(name: &str) -> Option<Self> {
        let status = is_status_name(name);
        if contains_any(name, &["mode"]) {
            Some(if status { Self::ModeStatus } else { Self::Mode })
        } else if contains_any(name, &["setpoint"]) {
            Some(if status {
                Self::SetpointStatus
            } else {
                Self::Setpoint
            })
        } else if contains_any(name, &["output", "valve", "heating"]) {
            Some(Self::Output)
        } else if contains_any(name, &["temp"]) {
            Some(Self::Temperature)
        } else {
            None
        }
    }

    const fn dpt(self) -> &'static str {
        match self {
            Self::Temperature | Self::Setpoint | Self::SetpointStatus => DPT_TEMPERATURE,
            Self::Mode | Self::ModeStatus => DPT_HVAC_MODE,
            Self::Output => DPT_PERCENT,
        }
    }
}

/// Thermostat with `current_temperature`, `setpoint`, `mode` and
/// `heating_output` fields.
#[derive(Debug)]
pub struct Thermostat {
    core: DeviceCore,
}

impl Thermostat {
    /// Build from `spec`; defaults are 20 °C measured, 21 °C setpoint, comfort
    pub fn new(spec: DeviceSpec) -> Result<Self> {
        let mut core = DeviceCore::new(
            "thermostat",
            spec,
            &[
                ("current_temperature", DptValue::Float(DEFAULT_TEMPERATURE)),
                ("setpoint", DptValue::Float(DEFAULT_SETPOINT)),
                ("mode", DptValue::text(HvacMode::Comfort.name())),
            ],
        );
        let mode = core.state.get("mode").map_or(Ok(HvacMode::Comfort), mode_of)?;
        core.state
            .insert("mode".to_string(), DptValue::text(mode.name()));

        let mut thermostat = Self { core };
        let output = thermostat.output();
        thermostat
            .core
            .state
            .insert("heating_output".to_string(), DptValue::from(output));
        Ok(thermostat)
    }

    /// Current HVAC mode
    pub fn mode(&self) -> HvacMode {
        self.core
            .state
            .get("mode")
            .and_then(|v| mode_of(v).ok())
            .unwrap_or_default()
    }

    fn output(&self) -> u8 {
        heating_output(
            self.core.number("setpoint"),
            self.core.number("current_temperature"),
            self.mode(),
        )
    }

    fn object_ga(&self, object: Object) -> Option<GroupAddress> {
        self.core.find(|n| Object::of(n) == Some(object))
    }

    fn value_of(&self, object: Object) -> DptValue {
        match object {
            Object::Temperature => DptValue::Float(self.core.number("current_temperature")),
            Object::Setpoint | Object::SetpointStatus => {
                DptValue::Float(self.core.number("setpoint"))
            }
            Object::Mode | Object::ModeStatus => DptValue::from(self.mode().to_u8()),
            Object::Output => DptValue::Float(self.core.number("heating_output")),
        }
    }

    /// Recompute the output, returning its indication when it changed
    fn recompute(&mut self) -> Result<Option<CemiFrame>> {
        let output = self.output();
        if self.core.number("heating_output") == f64::from(output) {
            return Ok(None);
        }
        self.core.set("heating_output", DptValue::from(output));
        match self.object_ga(Object::Output) {
            Some(ga) => self
                .core
                .indication(ga, DPT_PERCENT, &DptValue::from(output))
                .map(Some),
            None => Ok(None),
        }
    }

    /// Frame announcing `object`, as a response or an indication
    fn announce(&self, object: Object, response: bool) -> Result<Option<CemiFrame>> {
        let Some(ga) = self.object_ga(object) else {
            return Ok(None);
        };
        let value = self.value_of(object);
        let frame = if response {
            self.core.response(ga, object.dpt(), &value)?
        } else {
            self.core.indication(ga, object.dpt(), &value)?
        };
        Ok(Some(frame))
    }

    /// Apply a new value for `object`, returning the frames it causes
    fn apply(&mut self, object: Object, value: &DptValue, response: bool) -> Result<Vec<CemiFrame>> {
        let status = match object {
            Object::Temperature => {
                let current = value.as_f64().ok_or_else(KnxError::dpt_type_mismatch)?;
                self.core.set("current_temperature", DptValue::Float(current));
                // Measurements are announced by the simulation only
                (!response).then_some(Object::Temperature)
            }
            Object::Setpoint => {
                let setpoint = value.as_f64().ok_or_else(KnxError::dpt_type_mismatch)?;
                self.core.set("setpoint", DptValue::Float(setpoint));
                Some(Object::SetpointStatus)
            }
            Object::Mode => {
                let mode = mode_of(value)?;
                self.core.set("mode", DptValue::text(mode.name()));
                Some(Object::ModeStatus)
            }
            Object::SetpointStatus | Object::ModeStatus | Object::Output => return Ok(Vec::new()),
        };

        let mut frames = Vec::new();
        if let Some(status) = status {
            frames.extend(self.announce(status, response)?);
        }
        frames.extend(self.recompute()?);
        Ok(frames)
    }
}

impl Device for Thermostat {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some(object) = self.core.name_of(ga).and_then(Object::of) else {
            return Ok(Vec::new());
        };
        let value = match object {
            Object::Temperature | Object::Setpoint => DptValue::Float(Float16.decode(payload)?),
            Object::Mode => {
                let mode: HvacMode = Unsigned8.decode(payload)?;
                DptValue::text(mode.name())
            }
            Object::SetpointStatus | Object::ModeStatus | Object::Output => return Ok(Vec::new()),
        };
        self.apply(object, &value, true)
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(object) = self.core.name_of(ga).and_then(Object::of) else {
            return Ok(None);
        };
        let value = self.value_of(object);
        self.core.response(ga, object.dpt(), &value).map(Some)
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core.name_of(ga).and_then(Object::of).map(Object::dpt)
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        match field {
            "current_temperature" | "temperature" | "actual_temperature" => {
                self.object_ga(Object::Temperature)
            }
            "setpoint" => self.object_ga(Object::SetpointStatus),
            "mode" => self.object_ga(Object::ModeStatus),
            "heating_output" => self.object_ga(Object::Output),
            _ => None,
        }
    }

    fn update(&mut self, field: &str, value: DptValue) -> Result<Vec<CemiFrame>> {
        let object = match field {
            "current_temperature" | "temperature" | "actual_temperature" => Object::Temperature,
            "setpoint" => Object::Setpoint,
            "mode" => Object::Mode,
            _ => return Err(KnxError::unknown_field(field)),
        };
        self.apply(object, &value, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn thermostat() -> Thermostat {
        Thermostat::new(DeviceSpec::new(
            "tstat-1",
            ia!(1, 1, 60),
            group_objects! {
                "current_temperature" => 5/0/1,
                "setpoint" => 5/0/2,
                "setpoint_status" => 5/0/3,
                "mode" => 5/0/4,
                "mode_status" => 5/0/5,
                "heating_output" => 5/0/6,
            },
        ))
        .unwrap()
    }

    #[rstest]
    #[case(21.0, 20.0, HvacMode::Comfort, 10)]
    #[case(21.0, 21.0, HvacMode::Comfort, 0)]
    #[case(21.0, 25.0, HvacMode::Comfort, 0)]
    #[case(30.0, 10.0, HvacMode::Comfort, 100)]
    #[case(21.0, 18.0, HvacMode::Standby, 10)]
    #[case(21.0, 16.5, HvacMode::Economy, 5)]
    #[case(21.0, 20.0, HvacMode::BuildingProtection, 0)]
    #[case(21.0, 20.0, HvacMode::Auto, 10)]
    fn test_heating_output(
        #[case] setpoint: f64,
        #[case] current: f64,
        #[case] mode: HvacMode,
        #[case] output: u8,
    ) {
        assert_eq!(heating_output(setpoint, current, mode), output);
    }

    #[test]
    fn test_defaults() {
        let t = thermostat();
        assert_eq!(t.mode(), HvacMode::Comfort);
        assert_eq!(t.state().get("heating_output"), Some(&DptValue::Unsigned(10)));
        assert_eq!(t.state().get("mode"), Some(&DptValue::text("comfort")));
    }

    #[test]
    fn test_numeric_initial_mode() {
        let spec = DeviceSpec::new("t", ia!(1, 1, 1), Vec::new()).with_state("mode", 3u8);
        let t = Thermostat::new(spec).unwrap();
        assert_eq!(t.mode(), HvacMode::Economy);
        assert_eq!(t.state().get("heating_output"), Some(&DptValue::Unsigned(0)));
    }

    #[test]
    fn test_setpoint_write() {
        let mut t = thermostat();
        // 23.0 °C = 0x0C7E (exponent 1, mantissa 1150)
        let frames = t.on_group_write(ga!(5 / 0 / 2), &[0x0C, 0x7E]).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_group_response());
        assert_eq!(frames[0].group_address(), Some(ga!(5 / 0 / 3)));
        assert_eq!(frames[0].payload.as_slice(), &[0x0C, 0x7E]);
        assert!(frames[1].is_group_write());
        assert_eq!(frames[1].group_address(), Some(ga!(5 / 0 / 6)));
        // 30 % = 0x4D
        assert_eq!(frames[1].payload.as_slice(), &[0x4D]);
    }

    #[test]
    fn test_temperature_write_only_announces_changes() {
        let mut t = thermostat();
        // 20.0 °C leaves the output at 10 %
        let frames = t.on_group_write(ga!(5 / 0 / 1), &[0x07, 0xD0]).unwrap();
        assert!(frames.is_empty());

        // 22.0 °C drives it to 0 %
        let frames = t.on_group_write(ga!(5 / 0 / 1), &[0x0C, 0x4C]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(5 / 0 / 6)));
        assert_eq!(frames[0].payload.as_slice(), &[0x00]);
    }

    #[test]
    fn test_mode_write() {
        let mut t = thermostat();
        let frames = t.on_group_write(ga!(5 / 0 / 4), &[0x03]).unwrap();
        assert_eq!(t.mode(), HvacMode::Economy);
        assert_eq!(frames[0].group_address(), Some(ga!(5 / 0 / 5)));
        assert_eq!(frames[0].payload.as_slice(), &[0x03]);
        assert_eq!(frames[1].payload.as_slice(), &[0x00]);
        assert!(t.on_group_write(ga!(5 / 0 / 4), &[0x09]).is_err());
    }

    #[test]
    fn test_reads() {
        let mut t = thermostat();
        let setpoint = t.on_group_read(ga!(5 / 0 / 3)).unwrap().unwrap();
        assert_eq!(setpoint.payload.as_slice(), &[0x0C, 0x1A]);
        let mode = t.on_group_read(ga!(5 / 0 / 5)).unwrap().unwrap();
        assert_eq!(mode.payload.as_slice(), &[0x01]);
        assert_eq!(t.dpt_for(ga!(5 / 0 / 6)), Some("5.001"));
    }

    #[test]
    fn test_update_temperature() {
        let mut t = thermostat();
        let frames = t
            .update("current_temperature", DptValue::Float(19.0))
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(CemiFrame::is_group_write));
        assert_eq!(frames[0].group_address(), Some(ga!(5 / 0 / 1)));
        assert_eq!(frames[1].group_address(), Some(ga!(5 / 0 / 6)));
        assert_eq!(t.state().get("heating_output"), Some(&DptValue::Unsigned(20)));
        assert!(t.update("humidity", DptValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_update_mode_by_name() {
        let mut t = thermostat();
        let frames = t.update("mode", DptValue::text("standby")).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(5 / 0 / 5)));
        assert_eq!(frames[0].payload.as_slice(), &[0x02]);
        assert!(t.update("mode", DptValue::text("party")).is_err());
    }
}
