//! Simulated KNX devices.
//!
//! Every device owns a [`DeviceCore`]: its id, individual address, an ordered
//! list of named group objects and a state map of [`DptValue`]s. The
//! behaviour lives behind the [`Device`] trait, which the premise dispatcher
//! drives with decoded group telegrams.
//!
//! Devices never talk to the network themselves. A write or read returns the
//! frames the device would put on the bus; the caller decides where they go.
//!
//! ## Group object naming
//!
//! Devices recognise the role of a group object from its name. Names are
//! matched case-insensitively by substring:
//!
//! | Pattern | Role |
//! |---------|------|
//! | `status`, `feedback` | status object, written by the device |
//! | `state`, `actual` | status object for switches |
//! | anything else | command object, written by clients |
//!
//! ```
//! use knx_sim::device::{self, DeviceSpec};
//! use knx_sim::{ga, ia, group_objects};
//!
//! let spec = DeviceSpec::new("light-1", ia!(1, 1, 10), group_objects! {
//!     "switch_cmd" => 1/0/1,
//!     "switch_status" => 1/0/2,
//! });
//! let mut light = device::create("light_switch", spec).unwrap();
//!
//! let responses = light.on_group_write(ga!(1/0/1), &[0x01]).unwrap();
//! assert_eq!(responses[0].group_address(), Some(ga!(1/0/2)));
//! ```

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::dpt::{self, DptValue};
use crate::error::{KnxError, Result};
use crate::protocol::CemiFrame;
use crate::sim_log;
use core::fmt;
use std::collections::BTreeMap;

pub mod blind;
pub mod dimmer;
pub mod multi_channel;
pub mod presence;
pub mod registry;
pub mod sensor;
pub mod switch;
pub mod template;
pub mod thermostat;
pub mod valve;

#[doc(inline)]
pub use blind::Blind;
#[doc(inline)]
pub use dimmer::Dimmer;
#[doc(inline)]
pub use multi_channel::{ChannelKind, MultiChannel};
#[doc(inline)]
pub use presence::Presence;
#[doc(inline)]
pub use registry::{create, device_types, is_known_type};
#[doc(inline)]
pub use sensor::Sensor;
#[doc(inline)]
pub use switch::Switch;
#[doc(inline)]
pub use template::{Direction, SlotDef, Template};
#[doc(inline)]
pub use thermostat::Thermostat;
#[doc(inline)]
pub use valve::Valve;

/// Device state, field name to value
pub type DeviceState = BTreeMap<String, DptValue>;

/// Named group objects in configuration order
pub type GroupObjects = Vec<(String, GroupAddress)>;

/// Slot table of a template device
pub type TemplateTable = BTreeMap<String, SlotDef>;

/// DPT for on/off objects
pub(crate) const DPT_SWITCH: &str = "1.001";
/// DPT for percentage objects
pub(crate) const DPT_PERCENT: &str = "5.001";

/// Everything needed to construct a device
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    /// Unique id within the premise
    pub id: String,
    /// Source address of the device's telegrams
    pub individual_address: IndividualAddress,
    /// Named group objects, order significant
    pub group_objects: GroupObjects,
    /// Initial state values, overriding the device defaults
    pub initial_state: DeviceState,
    /// Slot table, only used by template devices
    pub template: TemplateTable,
}

impl DeviceSpec {
    /// Spec with empty initial state and no template
    pub fn new(
        id: impl Into<String>,
        individual_address: IndividualAddress,
        group_objects: GroupObjects,
    ) -> Self {
        Self {
            id: id.into(),
            individual_address,
            group_objects,
            initial_state: DeviceState::new(),
            template: TemplateTable::new(),
        }
    }

    /// Add an initial state value
    #[must_use]
    pub fn with_state(mut self, field: impl Into<String>, value: impl Into<DptValue>) -> Self {
        self.initial_state.insert(field.into(), value.into());
        self
    }

    /// Set the template slot table
    #[must_use]
    pub fn with_template(mut self, template: TemplateTable) -> Self {
        self.template = template;
        self
    }
}

/// Identity, wiring and state shared by all device kinds
#[derive(Debug, Clone)]
pub struct DeviceCore {
    /// Unique id within the premise
    pub id: String,
    /// Registered type name
    pub kind: String,
    /// Source address of the device's telegrams
    pub individual_address: IndividualAddress,
    /// Named group objects in configuration order
    pub group_objects: GroupObjects,
    /// Current state
    pub state: DeviceState,
}

impl DeviceCore {
    /// Core for `spec`; `defaults` fill fields the initial state leaves out
    pub fn new(kind: &str, spec: DeviceSpec, defaults: &[(&str, DptValue)]) -> Self {
        let mut state = spec.initial_state;
        for (field, value) in defaults {
            state
                .entry((*field).to_string())
                .or_insert_with(|| value.clone());
        }
        Self {
            id: spec.id,
            kind: kind.to_string(),
            individual_address: spec.individual_address,
            group_objects: spec.group_objects,
            state,
        }
    }

    /// Address of the group object called `name`
    pub fn ga(&self, name: &str) -> Option<GroupAddress> {
        self.group_objects
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ga)| *ga)
    }

    /// Name of the first group object bound to `ga`
    pub fn name_of(&self, ga: GroupAddress) -> Option<&str> {
        self.names_of(ga).next()
    }

    /// Names of all group objects bound to `ga`
    pub fn names_of(&self, ga: GroupAddress) -> impl Iterator<Item = &str> {
        self.group_objects
            .iter()
            .filter(move |(_, g)| *g == ga)
            .map(|(n, _)| n.as_str())
    }

    /// First group object whose name satisfies `pred`
    pub fn find(&self, pred: impl Fn(&str) -> bool) -> Option<GroupAddress> {
        self.group_objects
            .iter()
            .find(|(n, _)| pred(n))
            .map(|(_, ga)| *ga)
    }

    /// True when any group object is bound to `ga`
    pub fn listens_to(&self, ga: GroupAddress) -> bool {
        self.group_objects.iter().any(|(_, g)| *g == ga)
    }

    /// Boolean view of a state field, false when absent
    pub fn flag(&self, field: &str) -> bool {
        self.state
            .get(field)
            .and_then(DptValue::as_bool)
            .unwrap_or(false)
    }

    /// Numeric view of a state field, 0 when absent
    pub fn number(&self, field: &str) -> f64 {
        self.state
            .get(field)
            .and_then(DptValue::as_f64)
            .unwrap_or(0.0)
    }

    /// Store a state value
    pub fn set(&mut self, field: &str, value: DptValue) {
        if self.state.get(field) != Some(&value) {
            sim_log!(info, "{}: {} = {}", self.id, field, value);
        }
        self.state.insert(field.to_string(), value);
    }

    /// `GroupValue_Response` carrying `value` encoded as `dpt`
    pub fn response(&self, ga: GroupAddress, dpt: &str, value: &DptValue) -> Result<CemiFrame> {
        let raw = dpt::encode(dpt, value)?;
        CemiFrame::group_response(self.individual_address, ga, &raw)
    }

    /// `GroupValue_Write` indication carrying `value` encoded as `dpt`
    pub fn indication(&self, ga: GroupAddress, dpt: &str, value: &DptValue) -> Result<CemiFrame> {
        let raw = dpt::encode(dpt, value)?;
        CemiFrame::group_write(self.individual_address, ga, &raw)
    }
}

/// A simulated device on the bus.
///
/// `on_group_write` and `on_group_read` are driven by telegrams from
/// clients; `update` is driven by the simulation itself (scenarios, the
/// management side) and produces unsolicited indications.
pub trait Device: Send + fmt::Debug {
    /// Shared identity and state
    fn core(&self) -> &DeviceCore;

    /// Mutable shared identity and state
    fn core_mut(&mut self) -> &mut DeviceCore;

    /// Handle a `GroupValue_Write` on `ga`, returning response frames
    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>>;

    /// Handle a `GroupValue_Read` on `ga`
    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>>;

    /// DPT of the group object bound to `ga`
    fn dpt_for(&self, ga: GroupAddress) -> Option<&str>;

    /// Group object that carries indications for `field`
    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        let core = self.core();
        core.ga(&format!("{field}_status")).or_else(|| core.ga(field))
    }

    /// Set `field` from inside the simulation and announce the new value
    fn update(&mut self, field: &str, value: DptValue) -> Result<Vec<CemiFrame>> {
        let target = self.indication_ga(field);
        if target.is_none() && !self.core().state.contains_key(field) {
            return Err(KnxError::unknown_field(field));
        }
        self.core_mut().set(field, value.clone());

        let Some(ga) = target else {
            return Ok(Vec::new());
        };
        let dpt = self.dpt_for(ga).ok_or_else(KnxError::unsupported_dpt)?;
        Ok(vec![self.core().indication(ga, dpt, &value)?])
    }

    /// Device id
    fn id(&self) -> &str {
        &self.core().id
    }

    /// Registered type name
    fn kind(&self) -> &str {
        &self.core().kind
    }

    /// Source address
    fn individual_address(&self) -> IndividualAddress {
        self.core().individual_address
    }

    /// Named group objects
    fn group_objects(&self) -> &[(String, GroupAddress)] {
        &self.core().group_objects
    }

    /// Current state
    fn state(&self) -> &DeviceState {
        &self.core().state
    }
}

fn contains_any(name: &str, needles: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Status object name (`status`, `feedback`)
pub fn is_status_name(name: &str) -> bool {
    contains_any(name, &["status", "feedback"])
}

/// Status object name for switching devices, which also report on
/// `state` and `actual` objects
pub fn is_switch_status_name(name: &str) -> bool {
    contains_any(name, &["status", "feedback", "state", "actual"])
}

/// Best-guess DPT for a group object from its name, 1.001 when nothing matches
pub fn infer_dpt(name: &str) -> &'static str {
    const RULES: &[(&[&str], &str)] = &[
        (&["switch", "on_off"], "1.001"),
        (&["move"], "1.008"),
        (&["stop"], "1.017"),
        (&["presence", "occupancy"], "1.018"),
        (&["brightness", "position", "slat", "valve", "output"], "5.001"),
        (&["dim"], "3.007"),
        (&["temp", "setpoint"], "9.001"),
        (&["humidity"], "9.007"),
        (&["lux", "light_level"], "9.004"),
    ];
    RULES
        .iter()
        .find(|(needles, _)| contains_any(name, needles))
        .map_or(DPT_SWITCH, |(_, dpt)| dpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use rstest::rstest;

    fn core() -> DeviceCore {
        let spec = DeviceSpec::new(
            "dev",
            ia!(1, 1, 1),
            group_objects! {
                "switch_cmd" => 1/0/1,
                "switch_status" => 1/0/2,
                "alias" => 1/0/1,
            },
        )
        .with_state("on", true);
        DeviceCore::new("test", spec, &[("on", DptValue::Bool(false)), ("level", DptValue::Float(3.0))])
    }

    #[test]
    fn test_initial_state_wins_over_defaults() {
        let core = core();
        assert!(core.flag("on"));
        assert_eq!(core.number("level"), 3.0);
        assert_eq!(core.number("missing"), 0.0);
    }

    #[test]
    fn test_lookup_helpers() {
        let core = core();
        assert_eq!(core.ga("switch_status"), Some(ga!(1 / 0 / 2)));
        assert_eq!(core.name_of(ga!(1 / 0 / 1)), Some("switch_cmd"));
        assert_eq!(core.names_of(ga!(1 / 0 / 1)).count(), 2);
        assert_eq!(core.find(is_status_name), Some(ga!(1 / 0 / 2)));
        assert!(!core.listens_to(ga!(2 / 0 / 0)));
    }

    #[test]
    fn test_response_and_indication_frames() {
        let core = core();
        let response = core
            .response(ga!(1 / 0 / 2), "1.001", &DptValue::Bool(true))
            .unwrap();
        assert!(response.is_group_response());
        assert_eq!(response.source, ia!(1, 1, 1));
        assert_eq!(response.payload.as_slice(), &[0x01]);

        let indication = core
            .indication(ga!(1 / 0 / 2), "9.001", &DptValue::Float(21.5))
            .unwrap();
        assert!(indication.is_group_write());
        assert_eq!(indication.payload.as_slice(), &[0x0C, 0x33]);
    }

    #[rstest]
    #[case("switch_status", true)]
    #[case("Position_Feedback", true)]
    #[case("switch_cmd", false)]
    #[case("state", false)]
    fn test_status_names(#[case] name: &str, #[case] status: bool) {
        assert_eq!(is_status_name(name), status);
    }

    #[test]
    fn test_switch_status_names() {
        assert!(is_switch_status_name("state"));
        assert!(is_switch_status_name("actual_value"));
        assert!(!is_switch_status_name("switch"));
    }

    #[rstest]
    #[case("switch_cmd", "1.001")]
    #[case("blind_move", "1.008")]
    #[case("presence", "1.018")]
    #[case("brightness_status", "5.001")]
    #[case("dim_relative", "3.007")]
    #[case("room_temperature", "9.001")]
    #[case("humidity", "9.007")]
    #[case("lux", "9.004")]
    #[case("input_1", "1.001")]
    fn test_infer_dpt(#[case] name: &str, #[case] dpt: &str) {
        assert_eq!(infer_dpt(name), dpt);
    }
}
