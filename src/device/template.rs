//! Data-driven device.
//!
//! A template device has no built-in behaviour. Each group object ("slot")
//! carries a DPT and a direction:
//!
//! - `write` slots are commands: the payload is decoded into the slot's
//!   field and echoed on the `status` slot of the same field.
//! - `status` slots are terminal: a write is stored, nothing is echoed.
//!
//! The field of a slot is its name without `_cmd` / `_status`, with a few
//! aliases so that `switch_cmd` and `switch_status` both map to `on`.
//!
//! Slots missing from the table are derived from their names: the DPT is
//! inferred, and names containing `status` / `feedback` are status slots.

use crate::addressing::GroupAddress;
use crate::device::{infer_dpt, is_status_name, Device, DeviceCore, DeviceSpec, TemplateTable};
use crate::dpt::{self, DptValue};
use crate::error::{KnxError, Result};
use crate::protocol::CemiFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a template slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Command written by clients
    #[default]
    Write,
    /// Feedback written by the device
    Status,
}

/// Slot definition as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotDef {
    /// DPT id, inferred from the slot name when absent
    #[serde(default)]
    pub dpt: Option<String>,
    /// Slot direction
    #[serde(default)]
    pub direction: Direction,
}

impl SlotDef {
    /// Slot with an explicit DPT
    pub fn new(dpt: &str, direction: Direction) -> Self {
        Self {
            dpt: Some(dpt.to_string()),
            direction,
        }
    }
}

/// State field for a slot name
pub fn field_of(slot: &str) -> &str {
    let base = slot
        .strip_suffix("_cmd")
        .or_else(|| slot.strip_suffix("_status"))
        .unwrap_or(slot);
    match base {
        "switch" | "on_off" => "on",
        "move" => "moving",
        "stop" => "stopped",
        other => other,
    }
}

#[derive(Debug, Clone)]
struct Resolved {
    dpt: String,
    direction: Direction,
    field: String,
}

/// Device driven by a slot table
#[derive(Debug)]
pub struct Template {
    core: DeviceCore,
    slots: BTreeMap<String, Resolved>,
}

impl Template {
    /// Build from `spec`, using `spec.template` where it defines a slot.
    ///
    /// Every DPT in the table must be known.
    pub fn new(mut spec: DeviceSpec) -> Result<Self> {
        let table: TemplateTable = std::mem::take(&mut spec.template);
        let core = DeviceCore::new("template_device", spec, &[]);

        let mut slots = BTreeMap::new();
        for (name, _) in &core.group_objects {
            let def = table.get(name);
            let dpt = match def.and_then(|d| d.dpt.as_deref()) {
                Some(dpt) if dpt::is_supported(dpt) => dpt.to_string(),
                Some(_) => return Err(KnxError::unsupported_dpt()),
                None => infer_dpt(name).to_string(),
            };
            let direction = match def {
                Some(d) => d.direction,
                None if is_status_name(name) => Direction::Status,
                None => Direction::Write,
            };
            slots.insert(
                name.clone(),
                Resolved {
                    dpt,
                    direction,
                    field: field_of(name).to_string(),
                },
            );
        }
        Ok(Self { core, slots })
    }

    /// Status slot reporting `field`
    fn status_slot(&self, field: &str) -> Option<(GroupAddress, &Resolved)> {
        self.core.group_objects.iter().find_map(|(name, ga)| {
            let slot = self.slots.get(name)?;
            (slot.direction == Direction::Status && slot.field == field).then_some((*ga, slot))
        })
    }
}

impl Device for Template {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let bound: Vec<Resolved> = self
            .core
            .names_of(ga)
            .filter_map(|name| self.slots.get(name).cloned())
            .collect();

        let mut written = Vec::new();
        for slot in &bound {
            let value = dpt::decode(&slot.dpt, payload)?;
            self.core.set(&slot.field, value);
            if slot.direction == Direction::Write {
                written.push(slot.field.as_str());
            }
        }

        let mut frames: Vec<CemiFrame> = Vec::new();
        for field in written {
            let Some((target, status)) = self.status_slot(field) else {
                continue;
            };
            if frames.iter().any(|f| f.group_address() == Some(target)) {
                continue;
            }
            if let Some(value) = self.core.state.get(field) {
                frames.push(self.core.response(target, &status.dpt, value)?);
            }
        }
        Ok(frames)
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let found = self.core.names_of(ga).find_map(|name| {
            let slot = self.slots.get(name)?;
            let value = self.core.state.get(&slot.field)?;
            Some((slot, value))
        });
        match found {
            Some((slot, value)) => self.core.response(ga, &slot.dpt, value).map(Some),
            None => Ok(None),
        }
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.core
            .names_of(ga)
            .find_map(|name| self.slots.get(name))
            .map(|slot| slot.dpt.as_str())
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        self.status_slot(field).map(|(ga, _)| ga).or_else(|| {
            self.core.group_objects.iter().find_map(|(name, ga)| {
                let slot = self.slots.get(name)?;
                (slot.field == field).then_some(*ga)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("switch_cmd", "on")]
    #[case("switch_status", "on")]
    #[case("on_off", "on")]
    #[case("move", "moving")]
    #[case("stop_cmd", "stopped")]
    #[case("brightness_status", "brightness")]
    #[case("scene", "scene")]
    fn test_field_of(#[case] slot: &str, #[case] field: &str) {
        assert_eq!(field_of(slot), field);
    }

    fn blind_template() -> Template {
        let mut table = TemplateTable::new();
        table.insert("move".into(), SlotDef::new("1.008", Direction::Write));
        table.insert("stop".into(), SlotDef::new("1.017", Direction::Write));
        table.insert("position".into(), SlotDef::new("5.001", Direction::Write));
        table.insert("position_status".into(), SlotDef::new("5.001", Direction::Status));
        Template::new(
            DeviceSpec::new(
                "tpl-1",
                ia!(1, 1, 90),
                group_objects! {
                    "move" => 7/0/1,
                    "stop" => 7/0/2,
                    "position" => 7/0/3,
                    "position_status" => 7/0/4,
                },
            )
            .with_template(table),
        )
        .unwrap()
    }

    #[test]
    fn test_write_answers_on_status_slot() {
        let mut device = blind_template();
        let frames = device.on_group_write(ga!(7 / 0 / 3), &[0x80]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(7 / 0 / 4)));
        assert_eq!(frames[0].payload.as_slice(), &[0x80]);
        assert_eq!(device.state().get("position"), Some(&DptValue::Float(50.2)));
    }

    #[test]
    fn test_write_without_status_slot() {
        let mut device = blind_template();
        assert!(device.on_group_write(ga!(7 / 0 / 1), &[0x01]).unwrap().is_empty());
        assert_eq!(device.state().get("moving"), Some(&DptValue::Bool(true)));
    }

    #[test]
    fn test_status_slot_is_terminal() {
        let mut device = blind_template();
        assert!(device.on_group_write(ga!(7 / 0 / 4), &[0x40]).unwrap().is_empty());
    }

    #[test]
    fn test_aliased_slots_all_decode() {
        let spec = DeviceSpec::new(
            "tpl-2",
            ia!(1, 1, 91),
            group_objects! {
                "switch_cmd" => 7/1/1,
                "light_cmd" => 7/1/1,
                "switch_status" => 7/1/2,
            },
        );
        let mut device = Template::new(spec).unwrap();
        let frames = device.on_group_write(ga!(7 / 1 / 1), &[0x01]).unwrap();
        assert_eq!(device.state().get("on"), Some(&DptValue::Bool(true)));
        assert_eq!(device.state().get("light"), Some(&DptValue::Bool(true)));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(7 / 1 / 2)));
    }

    #[test]
    fn test_read() {
        let mut device = blind_template();
        assert!(device.on_group_read(ga!(7 / 0 / 4)).unwrap().is_none());
        device.on_group_write(ga!(7 / 0 / 3), &[0xFF]).unwrap();
        let frame = device.on_group_read(ga!(7 / 0 / 4)).unwrap().unwrap();
        assert_eq!(frame.payload.as_slice(), &[0xFF]);
    }

    #[test]
    fn test_unknown_dpt_rejected() {
        let mut table = TemplateTable::new();
        table.insert("x".into(), SlotDef::new("99.999", Direction::Write));
        let spec = DeviceSpec::new("tpl-3", ia!(1, 1, 92), group_objects! { "x" => 7/2/1 })
            .with_template(table);
        assert!(Template::new(spec).unwrap_err().is_dpt_error());
    }

    #[test]
    fn test_update_prefers_status_slot() {
        let mut device = blind_template();
        let frames = device.update("position", DptValue::Float(25.0)).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(7 / 0 / 4)));
        let frames = device.update("moving", DptValue::Bool(true)).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(7 / 0 / 1)));
    }
}
