//! Device type registry.
//!
//! Maps configuration type names to constructors. Single-function devices
//! are listed one by one; multi-channel devices are `<family>_<N>fold`
//! with a fixed set of channel counts per family.

use crate::device::{
    Blind, ChannelKind, Device, DeviceSpec, Dimmer, MultiChannel, Presence, Sensor, Switch,
    Template, Thermostat, Valve,
};
use crate::error::{KnxError, Result};

type Constructor = fn(DeviceSpec) -> Result<Box<dyn Device>>;

fn light_switch(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Switch::new(spec)))
}

fn light_dimmer(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Dimmer::new(spec)))
}

fn blind(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Blind::new(spec)))
}

fn sensor(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Sensor::new(spec)))
}

fn presence(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Presence::new(spec)))
}

fn thermostat(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Thermostat::new(spec)?))
}

fn valve_actuator(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    Ok(Box::new(Valve::new(spec)))
}

fn template_device(spec: DeviceSpec) -> Result<Box<dyn Device>> {
    if spec.template.is_empty() {
        return Err(KnxError::missing_template(&spec.id));
    }
    Ok(Box::new(Template::new(spec)?))
}

static BASE_TYPES: &[(&str, Constructor)] = &[
    ("light_switch", light_switch),
    ("light_dimmer", light_dimmer),
    ("blind", blind),
    ("sensor", sensor),
    ("presence", presence),
    ("thermostat", thermostat),
    ("valve_actuator", valve_actuator),
    ("template_device", template_device),
];

#[derive(Debug, Clone, Copy)]
enum Family {
    Actuator(ChannelKind),
    PushButton,
    BinaryInput,
}

static FAMILIES: &[(&str, Family, &[u8])] = &[
    ("switch_actuator", Family::Actuator(ChannelKind::Switch), &[2, 4, 8, 12, 16, 24]),
    ("dimmer_actuator", Family::Actuator(ChannelKind::Dimmer), &[1, 2, 4]),
    ("blind_actuator", Family::Actuator(ChannelKind::Blind), &[2, 4, 8]),
    ("heating_actuator", Family::Actuator(ChannelKind::Heating), &[2, 4, 6, 8]),
    ("push_button", Family::PushButton, &[2, 4, 6, 8]),
    ("binary_input", Family::BinaryInput, &[4, 8, 16]),
];

fn family_of(kind: &str) -> Option<(Family, u8)> {
    let (name, count) = kind.rsplit_once('_')?;
    let folds: u8 = count.strip_suffix("fold")?.parse().ok()?;
    FAMILIES
        .iter()
        .find(|(family, _, counts)| *family == name && counts.contains(&folds))
        .map(|(_, family, _)| (*family, folds))
}

/// True when `kind` names a registered device type
pub fn is_known_type(kind: &str) -> bool {
    BASE_TYPES.iter().any(|(name, _)| *name == kind) || family_of(kind).is_some()
}

/// All registered type names
pub fn device_types() -> Vec<String> {
    let base = BASE_TYPES.iter().map(|(name, _)| (*name).to_string());
    let multi = FAMILIES.iter().flat_map(|(family, _, counts)| {
        counts.iter().map(move |n| format!("{family}_{n}fold"))
    });
    base.chain(multi).collect()
}

/// Construct a device of type `kind`
pub fn create(kind: &str, spec: DeviceSpec) -> Result<Box<dyn Device>> {
    if let Some((_, constructor)) = BASE_TYPES.iter().find(|(name, _)| *name == kind) {
        return constructor(spec);
    }

    let (family, folds) = family_of(kind).ok_or_else(|| KnxError::unknown_device_type(kind))?;
    let mut device: Box<dyn Device> = match family {
        Family::Actuator(channels) => Box::new(MultiChannel::new(kind, channels, folds, spec)?),
        Family::PushButton => Box::new(Template::new(spec)?),
        Family::BinaryInput => Box::new(Sensor::new(spec)),
    };
    device.core_mut().kind = kind.to_string();
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ga, group_objects, ia};
    use rstest::rstest;

    fn spec() -> DeviceSpec {
        DeviceSpec::new("dev", ia!(1, 1, 1), group_objects! { "switch" => 1/0/1 })
    }

    #[rstest]
    #[case("light_switch")]
    #[case("thermostat")]
    #[case("switch_actuator_24fold")]
    #[case("dimmer_actuator_1fold")]
    #[case("heating_actuator_6fold")]
    #[case("push_button_4fold")]
    #[case("binary_input_16fold")]
    fn test_known_types(#[case] kind: &str) {
        assert!(is_known_type(kind));
        let device = create(kind, spec()).unwrap();
        assert_eq!(device.kind(), kind);
        assert!(device.core().listens_to(ga!(1 / 0 / 1)));
    }

    #[rstest]
    #[case("lava_lamp")]
    #[case("switch_actuator_3fold")]
    #[case("switch_actuator")]
    #[case("push_button_xfold")]
    fn test_unknown_types(#[case] kind: &str) {
        assert!(!is_known_type(kind));
        let err = create(kind, spec()).unwrap_err();
        assert!(err.as_device().is_some_and(|e| e.is_unknown_device_type()));
    }

    #[test]
    fn test_template_device_needs_table() {
        let err = create("template_device", spec()).unwrap_err();
        assert!(err.as_device().is_some());
    }

    #[test]
    fn test_device_types_listing() {
        let types = device_types();
        assert_eq!(types.len(), 8 + 6 + 3 + 3 + 4 + 4 + 3);
        assert!(types.iter().any(|t| t == "blind_actuator_8fold"));
        assert!(types.iter().any(|t| t == "valve_actuator"));
    }

    #[test]
    fn test_push_button_behaves_as_template() {
        let mut button = create("push_button_2fold", spec()).unwrap();
        let frames = button.update("on", true.into()).unwrap();
        assert_eq!(frames[0].group_address(), Some(ga!(1 / 0 / 1)));
    }
}
