//! Multi-channel actuators.
//!
//! One physical device with N independent channels (`a`, `b`, ...). Every
//! group object name is resolved once, at construction, into a [`Slot`]:
//! the channel it belongs to, the function it drives and whether it is a
//! command or a status object. Telegrams are then routed through that table
//! only, so a command on channel `b` can never answer on channel `a`.
//!
//! ## Channel naming
//!
//! Tried in order, first match wins:
//!
//! | Pattern | Example | Channel |
//! |---------|---------|---------|
//! | `channel_<letter>_...` | `channel_b_switch` | b |
//! | `ch<N>_...` | `ch3_valve` | c |
//! | `<letter>_<function>...` | `d_switch_status` | d |
//! | `..._<letter>` | `switch_status_e` | e |
//! | `..._<N>` | `position_6` | f |
//! | anything else | `switch` | a |
//!
//! ## State
//!
//! Channel values live in the device state as `ch_<channel>_<field>`, e.g.
//! `ch_b_on`, `ch_a_brightness`, `ch_c_position`, `ch_d_valve`.

use crate::addressing::GroupAddress;
use crate::device::valve::ValveCommand;
use crate::device::{
    contains_any, is_status_name, is_switch_status_name, Device, DeviceCore, DeviceSpec,
    DPT_PERCENT, DPT_SWITCH,
};
use crate::dpt::{Boolean, DptDecode, DptValue, Scaling};
use crate::error::{KnxError, Result};
use crate::protocol::CemiFrame;
use std::collections::{BTreeMap, BTreeSet};

/// Words that may follow a single-letter channel prefix.
///
/// Covers every word the actuator families and status checks recognise, so
/// `b_level` or `b_tilt` land on channel b rather than the default.
const FUNCTION_WORDS: &[&str] = &[
    "switch",
    "on_off",
    "status",
    "feedback",
    "cmd",
    "state",
    "actual",
    "valve",
    "heating",
    "position",
    "brightness",
    "dim",
    "level",
    "value",
    "percent",
    "slat",
    "tilt",
    "move",
    "up_down",
    "stop",
];

const BRIGHTNESS_WORDS: &[&str] = &["brightness", "dim", "level", "value", "percent"];

/// Actuator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// On/off channels
    Switch,
    /// Dimmer channels with switch and brightness objects
    Dimmer,
    /// Blind channels with position, slat, move and stop objects
    Blind,
    /// Heating valve channels
    Heating,
}

impl ChannelKind {
    /// Function of the object called `name`
    pub fn function(self, name: &str) -> Function {
        match self {
            Self::Switch => Function::Switch,
            Self::Dimmer if contains_any(name, BRIGHTNESS_WORDS) => Function::Brightness,
            Self::Dimmer => Function::Switch,
            Self::Blind if contains_any(name, &["slat", "tilt"]) => Function::Slat,
            Self::Blind if contains_any(name, &["move", "up_down"]) => Function::Move,
            Self::Blind if contains_any(name, &["stop"]) => Function::Stop,
            Self::Blind => Function::Position,
            Self::Heating => Function::Valve,
        }
    }

    /// True when `name` is a status object for this family
    pub fn is_status(self, name: &str) -> bool {
        match self {
            Self::Switch => is_switch_status_name(name),
            _ => is_status_name(name),
        }
    }

    /// State defaults for one channel
    fn defaults(self) -> &'static [(&'static str, DptValue)] {
        const SWITCH: &[(&str, DptValue)] = &[("on", DptValue::Bool(false))];
        const DIMMER: &[(&str, DptValue)] = &[
            ("on", DptValue::Bool(false)),
            ("brightness", DptValue::Float(0.0)),
        ];
        const BLIND: &[(&str, DptValue)] = &[
            ("position", DptValue::Float(0.0)),
            ("slat", DptValue::Float(0.0)),
            ("moving", DptValue::Bool(false)),
        ];
        const HEATING: &[(&str, DptValue)] = &[("valve", DptValue::Float(0.0))];
        match self {
            Self::Switch => SWITCH,
            Self::Dimmer => DIMMER,
            Self::Blind => BLIND,
            Self::Heating => HEATING,
        }
    }
}

/// What a group object drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    /// On/off
    Switch,
    /// Dimming level
    Brightness,
    /// Blind height
    Position,
    /// Slat angle
    Slat,
    /// Up/down travel
    Move,
    /// Stop travel
    Stop,
    /// Valve opening
    Valve,
}

impl Function {
    /// State field suffix
    pub const fn field(self) -> &'static str {
        match self {
            Self::Switch => "on",
            Self::Brightness => "brightness",
            Self::Position => "position",
            Self::Slat => "slat",
            Self::Move | Self::Stop => "moving",
            Self::Valve => "valve",
        }
    }

    /// DPT of objects with this function
    pub const fn dpt(self) -> &'static str {
        match self {
            Self::Switch => DPT_SWITCH,
            Self::Move => "1.008",
            Self::Stop => "1.017",
            Self::Brightness | Self::Position | Self::Slat | Self::Valve => DPT_PERCENT,
        }
    }

    fn from_field(field: &str) -> Option<Self> {
        match field {
            "on" => Some(Self::Switch),
            "brightness" => Some(Self::Brightness),
            "position" => Some(Self::Position),
            "slat" => Some(Self::Slat),
            "moving" => Some(Self::Move),
            "valve" => Some(Self::Valve),
            _ => None,
        }
    }
}

/// Command or status object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Written by clients
    Command,
    /// Written by the device
    Status,
}

/// Resolved meaning of one group object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    /// Channel letter
    pub channel: char,
    /// Driven function
    pub function: Function,
    /// Command or status
    pub role: Role,
}

impl Slot {
    /// Resolve `name` for an actuator of `kind`
    pub fn resolve(kind: ChannelKind, name: &str) -> Self {
        Self {
            channel: channel_of(name),
            function: kind.function(name),
            role: if kind.is_status(name) {
                Role::Status
            } else {
                Role::Command
            },
        }
    }
}

/// Channel letter for a 1-based channel number
fn channel_letter(number: &str) -> Option<char> {
    let n: u8 = number.parse().ok()?;
    (1..=26).contains(&n).then(|| char::from(b'a' + n - 1))
}

/// Single lowercase letter
fn single_letter(part: &str) -> Option<char> {
    let mut chars = part.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_lowercase() => Some(c),
        _ => None,
    }
}

/// Channel a group object name belongs to
pub fn channel_of(name: &str) -> char {
    let name = name.to_ascii_lowercase();

    if let Some(rest) = name.strip_prefix("channel_") {
        if let Some((head, _)) = rest.split_once('_') {
            if let Some(c) = single_letter(head) {
                return c;
            }
        }
    }

    if let Some(rest) = name.strip_prefix("ch") {
        if let Some((digits, _)) = rest.split_once('_') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return channel_letter(digits).unwrap_or('a');
            }
        }
    }

    if let Some((head, rest)) = name.split_once('_') {
        if let Some(c) = single_letter(head) {
            if FUNCTION_WORDS.iter().any(|w| rest.starts_with(w)) {
                return c;
            }
        }
    }

    if let Some((_, tail)) = name.rsplit_once('_') {
        if let Some(c) = single_letter(tail) {
            return c;
        }
        if let Some(c) = channel_letter(tail) {
            return c;
        }
    }

    'a'
}

fn state_key(channel: char, field: &str) -> String {
    format!("ch_{channel}_{field}")
}

/// Multi-channel switch, dimmer, blind or heating actuator.
#[derive(Debug)]
pub struct MultiChannel {
    core: DeviceCore,
    kind: ChannelKind,
    slots: BTreeMap<GroupAddress, Vec<Slot>>,
    status: BTreeMap<(char, Function), GroupAddress>,
}

impl MultiChannel {
    /// Build an `folds`-channel actuator registered as `type_name`.
    ///
    /// Fails when two objects resolve to the same slot, or when an object
    /// names a channel beyond `folds`.
    pub fn new(type_name: &str, kind: ChannelKind, folds: u8, spec: DeviceSpec) -> Result<Self> {
        let mut core = DeviceCore::new(type_name, spec, &[]);
        let mut slots: BTreeMap<GroupAddress, Vec<Slot>> = BTreeMap::new();
        let mut status = BTreeMap::new();
        let mut seen = BTreeSet::new();

        for (name, ga) in &core.group_objects {
            let slot = Slot::resolve(kind, name);
            let index = u32::from(slot.channel) - u32::from('a') + 1;
            if index > u32::from(folds) {
                return Err(KnxError::config_invalid(format!(
                    "{}: '{}' addresses channel {} of a {}-fold actuator",
                    core.id, name, slot.channel, folds
                )));
            }
            if !seen.insert(slot) {
                return Err(KnxError::channel_conflict(name));
            }
            if slot.role == Role::Status {
                status.insert((slot.channel, slot.function), *ga);
            }
            slots.entry(*ga).or_default().push(slot);
        }

        let channels: BTreeSet<char> = seen.iter().map(|s| s.channel).collect();
        for channel in channels {
            for (field, value) in kind.defaults() {
                core.state
                    .entry(state_key(channel, field))
                    .or_insert_with(|| value.clone());
            }
        }

        Ok(Self {
            core,
            kind,
            slots,
            status,
        })
    }

    /// Actuator family
    pub fn channel_kind(&self) -> ChannelKind {
        self.kind
    }

    /// Resolved slots of `ga`
    pub fn slots(&self, ga: GroupAddress) -> &[Slot] {
        self.slots.get(&ga).map_or(&[], Vec::as_slice)
    }

    fn value(&self, channel: char, function: Function) -> DptValue {
        let key = state_key(channel, function.field());
        match function {
            Function::Switch | Function::Move | Function::Stop => {
                DptValue::Bool(self.core.flag(&key))
            }
            _ => DptValue::Float(self.core.number(&key)),
        }
    }

    fn set(&mut self, channel: char, function: Function, value: DptValue) {
        self.core.set(&state_key(channel, function.field()), value);
    }

    /// Response on the status object of `(channel, function)`, if wired
    fn answer(&self, channel: char, function: Function) -> Result<Option<CemiFrame>> {
        let Some(ga) = self.status.get(&(channel, function)) else {
            return Ok(None);
        };
        let value = self.value(channel, function);
        self.core.response(*ga, function.dpt(), &value).map(Some)
    }

    /// Store a status write without echo
    fn absorb(&mut self, slot: Slot, payload: &[u8]) -> Result<()> {
        let value = match slot.function {
            Function::Switch | Function::Move | Function::Stop => {
                DptValue::Bool(Boolean.decode(payload)?)
            }
            Function::Valve => {
                DptValue::Float(ValveCommand::decode(payload, false)?.resolve().1)
            }
            _ => DptValue::Float(Scaling.decode(payload)?),
        };
        self.set(slot.channel, slot.function, value);
        Ok(())
    }

    fn command(&mut self, slot: Slot, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let c = slot.channel;
        let answers: &[Function] = match (self.kind, slot.function) {
            (ChannelKind::Dimmer, Function::Brightness) => {
                let brightness = Scaling.decode(payload)?;
                self.set(c, Function::Brightness, DptValue::Float(brightness));
                self.set(c, Function::Switch, DptValue::Bool(brightness > 0.0));
                &[Function::Switch, Function::Brightness]
            }
            (ChannelKind::Dimmer, _) => {
                let on = Boolean.decode(payload)?;
                self.set(c, Function::Switch, DptValue::Bool(on));
                if on && self.core.number(&state_key(c, "brightness")) == 0.0 {
                    self.set(c, Function::Brightness, DptValue::Float(100.0));
                }
                &[Function::Switch, Function::Brightness]
            }
            (_, Function::Switch) => {
                let on = Boolean.decode(payload)?;
                self.set(c, Function::Switch, DptValue::Bool(on));
                &[Function::Switch]
            }
            (_, Function::Move) => {
                // Travel is instantaneous: down closes, up opens
                let down = Boolean.decode(payload)?;
                let position = if down { 100.0 } else { 0.0 };
                self.set(c, Function::Position, DptValue::Float(position));
                self.set(c, Function::Move, DptValue::Bool(false));
                &[Function::Position]
            }
            (_, Function::Stop) => {
                Boolean.decode(payload)?;
                self.set(c, Function::Stop, DptValue::Bool(false));
                &[]
            }
            (_, Function::Valve) => {
                let (_, opening) = ValveCommand::decode(payload, false)?.resolve();
                self.set(c, Function::Valve, DptValue::Float(opening));
                &[Function::Valve]
            }
            (_, function) => {
                let value = Scaling.decode(payload)?;
                self.set(c, function, DptValue::Float(value));
                match function {
                    Function::Slat => &[Function::Slat],
                    _ => &[Function::Position],
                }
            }
        };

        let mut frames = Vec::with_capacity(answers.len());
        for function in answers {
            frames.extend(self.answer(c, *function)?);
        }
        Ok(frames)
    }
}

impl Device for MultiChannel {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn on_group_write(&mut self, ga: GroupAddress, payload: &[u8]) -> Result<Vec<CemiFrame>> {
        let slots = self.slots(ga).to_vec();
        let mut frames = Vec::new();
        for slot in slots {
            match slot.role {
                Role::Status => self.absorb(slot, payload)?,
                Role::Command => frames.extend(self.command(slot, payload)?),
            }
        }
        Ok(frames)
    }

    fn on_group_read(&mut self, ga: GroupAddress) -> Result<Option<CemiFrame>> {
        let Some(slot) = self.slots(ga).first().copied() else {
            return Ok(None);
        };
        let value = self.value(slot.channel, slot.function);
        self.core
            .response(ga, slot.function.dpt(), &value)
            .map(Some)
    }

    fn dpt_for(&self, ga: GroupAddress) -> Option<&str> {
        self.slots(ga).first().map(|s| s.function.dpt())
    }

    fn indication_ga(&self, field: &str) -> Option<GroupAddress> {
        let (channel, function) = parse_field(field)?;
        self.status.get(&(channel, function)).copied()
    }

    fn update(&mut self, field: &str, value: DptValue) -> Result<Vec<CemiFrame>> {
        let Some((channel, function)) = parse_field(field) else {
            return Err(KnxError::unknown_field(field));
        };
        if !self.core.state.contains_key(field) {
            return Err(KnxError::unknown_field(field));
        }
        self.core.set(field, value.clone());
        match self.status.get(&(channel, function)) {
            Some(ga) => Ok(vec![self.core.indication(*ga, function.dpt(), &value)?]),
            None => Ok(Vec::new()),
        }
    }
}

/// Split `ch_<channel>_<field>`
fn parse_field(field: &str) -> Option<(char, Function)> {
    let rest = field.strip_prefix("ch_")?;
    let (channel, name) = rest.split_once('_')?;
    Some((single_letter(channel)?, Function::from_field(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("channel_b_switch", 'b')]
    #[case("ch3_valve", 'c')]
    #[case("ch12_switch_status", 'l')]
    #[case("d_switch_status", 'd')]
    #[case("b_level", 'b')]
    #[case("b_feedback", 'b')]
    #[case("b_tilt", 'b')]
    #[case("c_up_down", 'c')]
    #[case("switch_status_e", 'e')]
    #[case("position_6", 'f')]
    #[case("switch", 'a')]
    #[case("Channel_C_Switch", 'c')]
    #[case("x_unrelated", 'a')]
    fn test_channel_of(#[case] name: &str, #[case] channel: char) {
        assert_eq!(channel_of(name), channel);
    }

    fn switch_actuator() -> MultiChannel {
        MultiChannel::new(
            "switch_actuator_4fold",
            ChannelKind::Switch,
            4,
            DeviceSpec::new(
                "sa-1",
                ia!(1, 1, 80),
                group_objects! {
                    "channel_a_switch" => 1/2/1,
                    "channel_a_status" => 1/2/2,
                    "channel_b_switch" => 1/2/3,
                    "channel_b_status" => 1/2/4,
                },
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_channels_do_not_cross_talk() {
        let mut actuator = switch_actuator();
        let frames = actuator.on_group_write(ga!(1 / 2 / 3), &[0x01]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_address(), Some(ga!(1 / 2 / 4)));
        assert!(actuator.core().flag("ch_b_on"));
        assert!(!actuator.core().flag("ch_a_on"));

        let frames = actuator.on_group_write(ga!(1 / 2 / 1), &[0x01]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(1 / 2 / 2)));
    }

    #[test]
    fn test_status_write_absorbed() {
        let mut actuator = switch_actuator();
        assert!(actuator.on_group_write(ga!(1 / 2 / 2), &[0x01]).unwrap().is_empty());
        assert!(actuator.core().flag("ch_a_on"));
    }

    #[test]
    fn test_read_channel_value() {
        let mut actuator = switch_actuator();
        actuator.on_group_write(ga!(1 / 2 / 3), &[0x01]).unwrap();
        let b = actuator.on_group_read(ga!(1 / 2 / 4)).unwrap().unwrap();
        assert_eq!(b.payload.as_slice(), &[0x01]);
        let a = actuator.on_group_read(ga!(1 / 2 / 2)).unwrap().unwrap();
        assert_eq!(a.payload.as_slice(), &[0x00]);
    }

    #[test]
    fn test_conflicting_slots_rejected() {
        let err = MultiChannel::new(
            "switch_actuator_2fold",
            ChannelKind::Switch,
            2,
            DeviceSpec::new(
                "sa-2",
                ia!(1, 1, 81),
                group_objects! {
                    "channel_a_switch" => 1/2/1,
                    "ch1_switch" => 1/2/5,
                },
            ),
        )
        .unwrap_err();
        assert!(err.as_device().is_some_and(|e| e.is_channel_conflict()));
    }

    #[test]
    fn test_channel_beyond_folds_rejected() {
        let err = MultiChannel::new(
            "switch_actuator_2fold",
            ChannelKind::Switch,
            2,
            DeviceSpec::new("sa-3", ia!(1, 1, 82), group_objects! { "channel_c_switch" => 1/2/1 }),
        )
        .unwrap_err();
        assert!(err.as_config().is_some());
    }

    #[test]
    fn test_dimmer_channel() {
        let mut actuator = MultiChannel::new(
            "dimmer_actuator_2fold",
            ChannelKind::Dimmer,
            2,
            DeviceSpec::new(
                "da-1",
                ia!(1, 1, 83),
                group_objects! {
                    "ch1_switch" => 1/3/1,
                    "ch1_switch_status" => 1/3/2,
                    "ch1_brightness" => 1/3/3,
                    "ch1_brightness_status" => 1/3/4,
                    "ch2_switch" => 1/3/5,
                    "ch2_switch_status" => 1/3/6,
                },
            ),
        )
        .unwrap();

        let frames = actuator.on_group_write(ga!(1 / 3 / 1), &[0x01]).unwrap();
        let targets: Vec<_> = frames.iter().filter_map(CemiFrame::group_address).collect();
        assert_eq!(targets, vec![ga!(1 / 3 / 2), ga!(1 / 3 / 4)]);
        assert_eq!(frames[1].payload.as_slice(), &[0xFF]);
        assert_eq!(actuator.core().number("ch_b_brightness"), 0.0);
        assert_eq!(actuator.dpt_for(ga!(1 / 3 / 3)), Some("5.001"));
    }

    #[test]
    fn test_blind_channel() {
        let mut actuator = MultiChannel::new(
            "blind_actuator_2fold",
            ChannelKind::Blind,
            2,
            DeviceSpec::new(
                "ba-1",
                ia!(1, 1, 84),
                group_objects! {
                    "b_move" => 2/1/1,
                    "b_stop" => 2/1/2,
                    "b_position" => 2/1/3,
                    "b_position_status" => 2/1/4,
                    "b_slat" => 2/1/5,
                    "b_slat_status" => 2/1/6,
                },
            ),
        )
        .unwrap();

        let frames = actuator.on_group_write(ga!(2 / 1 / 1), &[0x01]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(2 / 1 / 4)));
        assert_eq!(frames[0].payload.as_slice(), &[0xFF]);

        let frames = actuator.on_group_write(ga!(2 / 1 / 5), &[0x80]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(2 / 1 / 6)));
        assert!(actuator.on_group_write(ga!(2 / 1 / 2), &[0x01]).unwrap().is_empty());
    }

    #[test]
    fn test_heating_channel() {
        let mut actuator = MultiChannel::new(
            "heating_actuator_2fold",
            ChannelKind::Heating,
            2,
            DeviceSpec::new(
                "ha-1",
                ia!(1, 1, 85),
                group_objects! {
                    "valve_a" => 6/1/1,
                    "valve_status_a" => 6/1/2,
                    "valve_b" => 6/1/3,
                    "valve_status_b" => 6/1/4,
                },
            ),
        )
        .unwrap();

        let frames = actuator.on_group_write(ga!(6 / 1 / 3), &[0x01]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(6 / 1 / 4)));
        assert_eq!(frames[0].payload.as_slice(), &[0xFF]);

        let frames = actuator.on_group_write(ga!(6 / 1 / 1), &[0x80]).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(6 / 1 / 2)));
        assert_eq!(frames[0].payload.as_slice(), &[0x80]);
        assert_eq!(actuator.core().number("ch_b_valve"), 100.0);
    }

    #[test]
    fn test_update_channel_field() {
        let mut actuator = switch_actuator();
        let frames = actuator.update("ch_b_on", DptValue::Bool(true)).unwrap();
        assert!(frames[0].is_group_write());
        assert_eq!(frames[0].group_address(), Some(ga!(1 / 2 / 4)));
        assert!(actuator.update("ch_d_on", DptValue::Bool(true)).is_err());
        assert!(actuator.update("on", DptValue::Bool(true)).is_err());
    }
}
