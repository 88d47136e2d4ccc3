//! Dimmable light.

use crate::addressing::GroupAddress;
use crate::device::{contains_any, is_switch_status_name, Device, DeviceCore, DeviceSpec, DPT_PERCENT, DPT_SWITCH};
use crate::dpt::{Boolean, DptDecode, DptValue, Scaling};
use crate::error::Result;
use crate::protocol::CemiFrame;

const BRIGHTNESS_WORDS: &[&str] = &["brightness", "dim", "level", "value", "percent"];

fn is_brightness_name(name: &str) -> bool {
    contains_any(name, BRIGHTNESS_WORDS)
}

/// Dimmer with `on` and `brightness` (0-100 %) fields.
///
/// Both a brightness write and a switch write answer with the switch status
/// followed by the brightness status.
#[derive(Debug)]
pub struct Dimmer {
    core: DeviceCore,
    switch_status: Option<GroupAddress>,
    brightness_status: Option<GroupAddress>,
}

impl Dimmer {
    /// Build from `spec`, off at 0 % unless the initial state says otherwise
    pub fn new(spec: DeviceSpec) -> Self {
        let core = DeviceCore::new(
            "light_dimmer",
            spec,
            &[
                ("on", DptValue::Bool(false)),
                ("brightness", DptValue::Float(0.0)),
            ],
        );
        let switch_status = core
            .find(|n| is_switch_status_name(n) && contains_any(n, &["switch", "on"]))
            .or_else(|| core.find(|n| is_switch_status_name(n) && !is_brightness_name(n)));
        let brightness_status = core.find(|n| is_switch_status_name(n) && is_brightness_name(n));
        Self {
            core,
            switch_status,
            brightness_status,
        }
    }

    fn status_frames(&self) -> Result<Vec<CemiFrame>> {
        let mut frames = Vec::with_capacity(2);
        if let Some(ga) = self.switch_status {
            let on = DptValue::Bool(self.core.flag("on"));
            frames.push(self.core.response(ga, DPT_SWITCH, &on)?);
        }
        if let Some(ga) = self.brightness_status {
            let brightness = DptValue::Float(self.core.number("brightness"));
            frames.push(self.core.response(ga, DPT_PERCENT, &brightness)?);
        }
        Ok(frames)
    }

    fn set_brightness(&mut self, brightness: f64) {
        self.core.set("brightness", DptValue::Float(brightness));
        self.core.set("on", DptValue::Bool(brightness > 0.0));
    }

    fn set_on(&mut self, on: bool) {
        self.core.set("on", DptValue::Bool(on));
        if on && self.core.number("brightness") == 0.0 {
            self.core.set("brightness", DptValue::Float(100.0));
        }
    }
}

impl Device for Dimmer {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some((brightness, status)) = self
            .core
            .name_of(ga)
            .map(|n| (is_brightness_name(n), is_switch_status_name(n)))
        else {
            return Ok(Vec::new());
        };

        match (brightness, status) {
            (true, true) => {
                let value = Scaling.decode(payload)?;
                self.core.set("brightness", DptValue::Float(value));
                Ok(Vec::new())
            }
            (false, true) => {
                let on = Boolean.decode(payload)?;
                self.core.set("on", DptValue::Bool(on));
                Ok(Vec::new())
            }
            (true, false) => {
                self.set_brightness(Scaling.decode(payload)?);
                self.status_frames()
            }
            (false, false) => {
                self.set_on(Boolean.decode(payload)?);
                self.status_frames()
            }
        }
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(brightness) = self.core.name_of(ga).map(is_brightness_name) else {
            return Ok(None);
        };
        let frame = if brightness {
            let value = DptValue::Float(self.core.number("brightness"));
            self.core.response(ga, DPT_PERCENT, &value)?
        } else {
            let value = DptValue::Bool(self.core.flag("on"));
            self.core.response(ga, DPT_SWITCH, &value)?
        };
        Ok(Some(frame))
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core
            .name_of(ga)
            .map(|n| if is_brightness_name(n) { DPT_PERCENT } else { DPT_SWITCH })
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        match field {
            "on" => self.switch_status,
            "brightness" => self.brightness_status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;

    fn dimmer() -> Dimmer {
        Dimmer::new(DeviceSpec::new(
            "dimmer-1",
            ia!(1, 1, 20),
            group_objects! {
                "switch_cmd" => 1/1/1,
                "switch_status" => 1/1/2,
                "brightness_cmd" => 1/1/3,
                "brightness_status" => 1/1/4,
            },
        ))
    }

    fn targets(frames: &[CemiFrame]) -> Vec<GroupAddress> {
        frames.iter().filter_map(CemiFrame::group_address).collect()
    }

    #[test]
    fn test_brightness_write() {
        let mut dimmer = dimmer();
        let frames = dimmer.on_group_write(ga!(1 / 1 / 3), &[0x80]).unwrap();
        assert_eq!(targets(&frames), vec![ga!(1 / 1 / 2), ga!(1 / 1 / 4)]);
        assert_eq!(frames[0].payload.as_slice(), &[0x01]);
        assert_eq!(frames[1].payload.as_slice(), &[0x80]);
        assert!(dimmer.core().flag("on"));
        assert_eq!(dimmer.core().number("brightness"), 50.2);
    }

    #[test]
    fn test_brightness_zero_switches_off() {
        let mut dimmer = dimmer();
        dimmer.on_group_write(ga!(1 / 1 / 3), &[0xFF]).unwrap();
        let frames = dimmer.on_group_write(ga!(1 / 1 / 3), &[0x00]).unwrap();
        assert_eq!(frames[0].payload.as_slice(), &[0x00]);
        assert!(!dimmer.core().flag("on"));
    }

    #[test]
    fn test_switch_on_from_zero_goes_full() {
        let mut dimmer = dimmer();
        let frames = dimmer.on_group_write(ga!(1 / 1 / 1), &[0x01]).unwrap();
        assert_eq!(dimmer.core().number("brightness"), 100.0);
        assert_eq!(frames[1].payload.as_slice(), &[0xFF]);
    }

    #[test]
    fn test_switch_on_keeps_previous_brightness() {
        let mut dimmer = dimmer();
        dimmer.on_group_write(ga!(1 / 1 / 3), &[0x80]).unwrap();
        dimmer.on_group_write(ga!(1 / 1 / 1), &[0x00]).unwrap();
        dimmer.on_group_write(ga!(1 / 1 / 1), &[0x01]).unwrap();
        assert_eq!(dimmer.core().number("brightness"), 50.2);
    }

    #[test]
    fn test_status_write_absorbed() {
        let mut dimmer = dimmer();
        assert!(dimmer.on_group_write(ga!(1 / 1 / 4), &[0x40]).unwrap().is_empty());
        assert!(dimmer.on_group_write(ga!(1 / 1 / 2), &[0x01]).unwrap().is_empty());
    }

    #[test]
    fn test_reads() {
        let mut dimmer = dimmer();
        dimmer.on_group_write(ga!(1 / 1 / 3), &[0xFF]).unwrap();
        let brightness = dimmer.on_group_read(ga!(1 / 1 / 4)).unwrap().unwrap();
        assert_eq!(brightness.payload.as_slice(), &[0xFF]);
        let on = dimmer.on_group_read(ga!(1 / 1 / 1)).unwrap().unwrap();
        assert_eq!(on.payload.as_slice(), &[0x01]);
        assert_eq!(dimmer.dpt_for(ga!(1 / 1 / 3)), Some("5.001"));
        assert_eq!(dimmer.dpt_for(ga!(1 / 1 / 2)), Some("1.001"));
    }

    #[test]
    fn test_state_and_actual_objects_are_status() {
        let mut dimmer = Dimmer::new(DeviceSpec::new(
            "dimmer-2",
            ia!(1, 1, 21),
            group_objects! {
                "switch" => 1/2/1,
                "switch_state" => 1/2/2,
                "brightness" => 1/2/3,
                "brightness_actual" => 1/2/4,
            },
        ));
        assert!(dimmer.on_group_write(ga!(1 / 2 / 2), &[0x01]).unwrap().is_empty());
        assert!(dimmer.on_group_write(ga!(1 / 2 / 4), &[0x80]).unwrap().is_empty());

        let frames = dimmer.on_group_write(ga!(1 / 2 / 3), &[0xFF]).unwrap();
        assert_eq!(targets(&frames), vec![ga!(1 / 2 / 2), ga!(1 / 2 / 4)]);
    }
}
