//! Roller blind / venetian blind.

use crate::addressing::GroupAddress;
use crate::device::{contains_any, is_status_name, Device, DeviceCore, DeviceSpec, DPT_PERCENT};
use crate::dpt::{DptDecode, DptValue, Scaling};
use crate::error::Result;
use crate::protocol::CemiFrame;

/// Which axis a group object drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Position,
    Slat,
}

impl Axis {
    fn of(name: &str) -> Self {
        if contains_any(name, &["slat", "tilt"]) {
            Self::Slat
        } else {
            Self::Position
        }
    }

    const fn field(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Slat => "slat",
        }
    }
}

/// Blind with `position` and `slat` fields, both 0-100 %.
///
/// `position_cmd` answers on `position_status`, `slat_cmd` on
/// `slat_status`.
#[derive(Debug)]
pub struct Blind {
    core: DeviceCore,
}

impl Blind {
    /// Build from `spec`, fully open with flat slats by default
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            core: DeviceCore::new(
                "blind",
                spec,
                &[
                    ("position", DptValue::Float(0.0)),
                    ("slat", DptValue::Float(0.0)),
                ],
            ),
        }
    }

    fn status_ga(&self, axis: Axis) -> Option<GroupAddress> {
        self.core
            .find(|n| is_status_name(n) && Axis::of(n) == axis)
    }
}

impl Device for Blind {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let Some((axis, status)) = self
            .core
            .name_of(ga)
            .map(|n| (Axis::of(n), is_status_name(n)))
        else {
            return Ok(Vec::new());
        };
        let value = DptValue::Float(Scaling.decode(payload)?);
        self.core.set(axis.field(), value.clone());
        if status {
            return Ok(Vec::new());
        }
        match self.status_ga(axis) {
            Some(target) => Ok(vec![self.core.response(target, DPT_PERCENT, &value)?]),
            None => Ok(Vec::new()),
        }
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(axis) = self.core.name_of(ga).map(Axis::of) else {
            return Ok(None);
        };
        let value = DptValue::Float(self.core.number(axis.field()));
        self.core.response(ga, DPT_PERCENT, &value).map(Some)
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core.listens_to(ga).then_some(DPT_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;

    fn blind() -> Blind {
        Blind::new(DeviceSpec::new(
            "blind-1",
            ia!(1, 1, 30),
            group_objects! {
                "position_cmd" => 2/0/1,
                "position_status" => 2/0/2,
                "slat_cmd" => 2/0/3,
                "slat_status" => 2/0/4,
            },
        ))
    }

    #[test]
    fn test_position_and_slat_are_independent() {
        let mut blind = blind();
        let frames = blind.on_group_write(ga!(2 / 0 / 1), &[0xFF]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(2 / 0 / 2)));
        assert_eq!(frames[0].payload.as_slice(), &[0xFF]);

        let frames = blind.on_group_write(ga!(2 / 0 / 3), &[0x80]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(2 / 0 / 4)));
        assert_eq!(blind.core().number("position"), 100.0);
        assert_eq!(blind.core().number("slat"), 50.2);
    }

    #[test]
    fn test_reads_by_axis() {
        let mut blind = blind();
        blind.on_group_write(ga!(2 / 0 / 1), &[0xFF]).unwrap();
        let slat = blind.on_group_read(ga!(2 / 0 / 4)).unwrap().unwrap();
        assert_eq!(slat.payload.as_slice(), &[0x00]);
        let position = blind.on_group_read(ga!(2 / 0 / 2)).unwrap().unwrap();
        assert_eq!(position.payload.as_slice(), &[0xFF]);
    }

    #[test]
    fn test_update_position() {
        let mut blind = blind();
        let frames = blind.update("position", DptValue::Float(100.0)).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(2 / 0 / 2)));
        assert!(frames[0].is_group_write());
    }
}
