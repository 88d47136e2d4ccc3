//! DPT registry
//!
//! Maps datapoint ids such as `"9.001"` onto a wire [`Codec`] and the
//! metadata shown to users (name, unit, range, width). Lookups try the exact
//! id first and fall back to the main type, so `"9.030"` resolves through
//! `"9"` even though it has no entry of its own.
//!
//! The table is static and read-only; every device and the configuration
//! layer go through [`encode`] / [`decode`] with [`DptValue`]s.

use crate::dpt::dpt10::{KnxDate, KnxTime};
use crate::dpt::dpt3::StepCode;
use crate::dpt::{
    Angle, Boolean, Character, ControlBoolean, Date, DptDecode, DptEncode, DptValue, Float16,
    Float32, SceneControl, SceneNumber, Scaling, Signed16, Signed32, Signed8, StepControl, Text,
    TimeOfDay, Unsigned16, Unsigned32, Unsigned8, MAX_DPT_SIZE,
};
use crate::error::{KnxError, Result};
use serde::Serialize;

/// Encoded datapoint bytes
pub type DptBytes = heapless::Vec<u8, MAX_DPT_SIZE>;

/// Wire format of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// DPT 1
    Boolean,
    /// DPT 2
    ControlBoolean,
    /// DPT 3
    Step,
    /// DPT 4
    Character,
    /// DPT 5.001
    Scaling,
    /// DPT 5.003
    Angle,
    /// DPT 5, 20
    Unsigned8,
    /// DPT 6
    Signed8,
    /// DPT 7
    Unsigned16,
    /// DPT 8
    Signed16,
    /// DPT 9
    Float16,
    /// DPT 10
    TimeOfDay,
    /// DPT 11
    Date,
    /// DPT 12
    Unsigned32,
    /// DPT 13
    Signed32,
    /// DPT 14
    Float32,
    /// DPT 16
    Text,
    /// DPT 17
    SceneNumber,
    /// DPT 18
    SceneControl,
}

impl Codec {
    /// Encoded width in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Boolean
            | Self::ControlBoolean
            | Self::Step
            | Self::Character
            | Self::Scaling
            | Self::Angle
            | Self::Unsigned8
            | Self::Signed8
            | Self::SceneNumber
            | Self::SceneControl => 1,
            Self::Unsigned16 | Self::Signed16 | Self::Float16 => 2,
            Self::TimeOfDay | Self::Date => 3,
            Self::Unsigned32 | Self::Signed32 | Self::Float32 => 4,
            Self::Text => MAX_DPT_SIZE,
        }
    }
}

/// One registered datapoint type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DptInfo {
    /// Id, either `"main"` or `"main.sub"`
    pub id: &'static str,
    /// Human readable name
    pub name: &'static str,
    /// Unit symbol, empty when dimensionless
    pub unit: &'static str,
    /// Lower bound of the value range, if any
    pub min: Option<f64>,
    /// Upper bound of the value range, if any
    pub max: Option<f64>,
    /// Encoded width in bytes
    pub size: usize,
    /// Wire format
    pub codec: Codec,
}

const fn entry(
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    range: Option<(f64, f64)>,
    codec: Codec,
) -> DptInfo {
    let (min, max) = match range {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };
    DptInfo {
        id,
        name,
        unit,
        min,
        max,
        size: codec.size(),
        codec,
    }
}

const BOOL: Option<(f64, f64)> = Some((0.0, 1.0));
const U8: Option<(f64, f64)> = Some((0.0, 255.0));
const I8: Option<(f64, f64)> = Some((-128.0, 127.0));
const U16: Option<(f64, f64)> = Some((0.0, 65_535.0));
const I16: Option<(f64, f64)> = Some((-32_768.0, 32_767.0));
const F16: Option<(f64, f64)> = Some((-670_760.0, 670_760.0));
const F16_POS: Option<(f64, f64)> = Some((0.0, 670_760.0));
const U32: Option<(f64, f64)> = Some((0.0, 4_294_967_295.0));
const I32: Option<(f64, f64)> = Some((-2_147_483_648.0, 2_147_483_647.0));
const SCENE: Option<(f64, f64)> = Some((0.0, 63.0));

static REGISTRY: &[DptInfo] = &[
    entry("1", "Boolean", "", BOOL, Codec::Boolean),
    entry("1.001", "Switch", "", BOOL, Codec::Boolean),
    entry("1.002", "Boolean", "", BOOL, Codec::Boolean),
    entry("1.003", "Enable", "", BOOL, Codec::Boolean),
    entry("1.005", "Alarm", "", BOOL, Codec::Boolean),
    entry("1.008", "Up/Down", "", BOOL, Codec::Boolean),
    entry("1.009", "Open/Close", "", BOOL, Codec::Boolean),
    entry("1.010", "Start/Stop", "", BOOL, Codec::Boolean),
    entry("1.018", "Occupancy", "", BOOL, Codec::Boolean),
    entry("2", "Control Boolean", "", None, Codec::ControlBoolean),
    entry("2.001", "Switch Control", "", None, Codec::ControlBoolean),
    entry("3", "Control Dimming", "", None, Codec::Step),
    entry("3.007", "Dimming Control", "", None, Codec::Step),
    entry("3.008", "Blinds Control", "", None, Codec::Step),
    entry("4", "Character", "", None, Codec::Character),
    entry("4.001", "ASCII Character", "", None, Codec::Character),
    entry("5", "Unsigned 8-bit", "", U8, Codec::Unsigned8),
    entry("5.001", "Scaling", "%", Some((0.0, 100.0)), Codec::Scaling),
    entry("5.003", "Angle", "°", Some((0.0, 360.0)), Codec::Angle),
    entry("5.004", "Percent (0-255)", "%", U8, Codec::Unsigned8),
    entry("5.010", "Counter Pulses", "pulses", U8, Codec::Unsigned8),
    entry("6", "Signed 8-bit", "", I8, Codec::Signed8),
    entry("6.001", "Percent (-128..127)", "%", I8, Codec::Signed8),
    entry("7", "Unsigned 16-bit", "", U16, Codec::Unsigned16),
    entry("7.001", "Pulses", "pulses", U16, Codec::Unsigned16),
    entry("7.005", "Time (seconds)", "s", U16, Codec::Unsigned16),
    entry("7.012", "Current (mA)", "mA", U16, Codec::Unsigned16),
    entry("8", "Signed 16-bit", "", I16, Codec::Signed16),
    entry("8.001", "Pulses Difference", "pulses", I16, Codec::Signed16),
    entry(
        "9",
        "2-byte Float",
        "",
        Some((-671_088.64, 670_760.96)),
        Codec::Float16,
    ),
    entry(
        "9.001",
        "Temperature",
        "°C",
        Some((-273.0, 670_760.0)),
        Codec::Float16,
    ),
    entry("9.002", "Temperature Diff", "K", F16, Codec::Float16),
    entry("9.003", "Kelvin/Hour", "K/h", F16, Codec::Float16),
    entry("9.004", "Lux", "lux", F16_POS, Codec::Float16),
    entry("9.005", "Speed (m/s)", "m/s", F16_POS, Codec::Float16),
    entry("9.006", "Pressure (Pa)", "Pa", F16_POS, Codec::Float16),
    entry("9.007", "Humidity", "%", F16_POS, Codec::Float16),
    entry("9.008", "Air Quality (ppm)", "ppm", F16_POS, Codec::Float16),
    entry("9.010", "Time (s)", "s", F16, Codec::Float16),
    entry("9.011", "Time (ms)", "ms", F16, Codec::Float16),
    entry("9.020", "Voltage (mV)", "mV", F16, Codec::Float16),
    entry("9.021", "Current (mA)", "mA", F16, Codec::Float16),
    entry("9.022", "Power Density", "W/m²", F16, Codec::Float16),
    entry("9.024", "Power (kW)", "kW", F16, Codec::Float16),
    entry("9.028", "Wind Speed (km/h)", "km/h", F16_POS, Codec::Float16),
    entry("10", "Time of Day", "", None, Codec::TimeOfDay),
    entry("10.001", "Time of Day", "", None, Codec::TimeOfDay),
    entry("11", "Date", "", None, Codec::Date),
    entry("11.001", "Date", "", None, Codec::Date),
    entry("12", "Unsigned 32-bit", "", U32, Codec::Unsigned32),
    entry("12.001", "Counter Pulses", "pulses", U32, Codec::Unsigned32),
    entry("13", "Signed 32-bit", "", I32, Codec::Signed32),
    entry("13.001", "Counter Pulses", "pulses", I32, Codec::Signed32),
    entry("13.010", "Active Energy (Wh)", "Wh", I32, Codec::Signed32),
    entry("13.011", "Reactive Energy (VARh)", "VARh", I32, Codec::Signed32),
    entry("13.013", "Active Energy (kWh)", "kWh", I32, Codec::Signed32),
    entry("14", "4-byte Float", "", None, Codec::Float32),
    entry("14.019", "Current (A)", "A", None, Codec::Float32),
    entry("14.027", "Electric Potential (V)", "V", None, Codec::Float32),
    entry("14.033", "Frequency (Hz)", "Hz", None, Codec::Float32),
    entry("14.056", "Power (W)", "W", None, Codec::Float32),
    entry("14.068", "Temperature (°C)", "°C", None, Codec::Float32),
    entry("14.076", "Volume Flow (m³/h)", "m³/h", None, Codec::Float32),
    entry("16", "String", "", None, Codec::Text),
    entry("16.000", "ASCII String", "", None, Codec::Text),
    entry("16.001", "ISO 8859-1 String", "", None, Codec::Text),
    entry("17", "Scene Number", "", SCENE, Codec::SceneNumber),
    entry("17.001", "Scene Number", "", SCENE, Codec::SceneNumber),
    entry("18", "Scene Control", "", None, Codec::SceneControl),
    entry("18.001", "Scene Control", "", None, Codec::SceneControl),
    entry("20", "HVAC Mode", "", U8, Codec::Unsigned8),
    entry("20.102", "HVAC Mode", "", Some((0.0, 4.0)), Codec::Unsigned8),
];

/// Every registered datapoint type, in id order
pub fn all() -> &'static [DptInfo] {
    REGISTRY
}

/// Find a datapoint type by id, falling back to its main type
pub fn lookup(id: &str) -> Option<&'static DptInfo> {
    let id = id.trim();
    REGISTRY.iter().find(|info| info.id == id).or_else(|| {
        let main = id.split('.').next()?;
        REGISTRY.iter().find(|info| info.id == main)
    })
}

/// Whether `id` resolves to a registered type
pub fn is_supported(id: &str) -> bool {
    lookup(id).is_some()
}

/// Encode `value` as datapoint `id`
///
/// # Errors
///
/// - unsupported DPT when `id` does not resolve
/// - type mismatch when `value` has the wrong shape for the codec
/// - out of range when an integer does not fit the type's range
pub fn encode(id: &str, value: &DptValue) -> Result<DptBytes> {
    lookup(id).ok_or_else(KnxError::unsupported_dpt)?.encode(value)
}

/// Decode `data` as datapoint `id`
///
/// # Errors
///
/// - unsupported DPT when `id` does not resolve
/// - invalid data when `data` is shorter than the type needs
pub fn decode(id: &str, data: &[u8]) -> Result<DptValue> {
    lookup(id).ok_or_else(KnxError::unsupported_dpt)?.decode(data)
}

fn mismatch<T>() -> Result<T> {
    Err(KnxError::dpt_type_mismatch())
}

fn bool_of(value: &DptValue) -> Result<bool> {
    value.as_bool().ok_or_else(KnxError::dpt_type_mismatch)
}

fn float_of(value: &DptValue) -> Result<f64> {
    value.as_f64().ok_or_else(KnxError::dpt_type_mismatch)
}

impl DptInfo {
    /// Integer view of `value`, checked against this type's range
    fn integer<T: TryFrom<i64>>(&self, value: &DptValue) -> Result<T> {
        let raw = match value {
            DptValue::Float(v) if v.is_finite() => v.round() as i64,
            other => other.as_i64().ok_or_else(KnxError::dpt_type_mismatch)?,
        };
        let as_float = raw as f64;
        if self.min.is_some_and(|min| as_float < min) || self.max.is_some_and(|max| as_float > max)
        {
            return Err(KnxError::dpt_value_out_of_range());
        }
        T::try_from(raw).map_err(|_| KnxError::dpt_value_out_of_range())
    }

    /// Encode `value` with this type's codec
    pub fn encode(&self, value: &DptValue) -> Result<DptBytes> {
        let mut buf = [0u8; MAX_DPT_SIZE];
        let len = match self.codec {
            Codec::Boolean => Boolean.encode(bool_of(value)?, &mut buf)?,
            Codec::ControlBoolean => {
                let pair = match value {
                    DptValue::Control { control, value } => (*control, *value),
                    other => (false, bool_of(other)?),
                };
                ControlBoolean.encode(pair, &mut buf)?
            }
            Codec::Step => match value {
                DptValue::Step { control, step } => {
                    StepControl.encode((*control, StepCode::from_u8(*step)?), &mut buf)?
                }
                _ => return mismatch(),
            },
            Codec::Character => match value.as_str() {
                Some(s) => Character.encode(s.chars().next().unwrap_or('\0'), &mut buf)?,
                None => return mismatch(),
            },
            Codec::Scaling => Scaling.encode(float_of(value)?, &mut buf)?,
            Codec::Angle => Angle.encode(float_of(value)?, &mut buf)?,
            Codec::Unsigned8 => Unsigned8.encode(self.integer::<u8>(value)?, &mut buf)?,
            Codec::Signed8 => Signed8.encode(self.integer::<i8>(value)?, &mut buf)?,
            Codec::Unsigned16 => Unsigned16.encode(self.integer::<u16>(value)?, &mut buf)?,
            Codec::Signed16 => Signed16.encode(self.integer::<i16>(value)?, &mut buf)?,
            Codec::Float16 => Float16.encode(float_of(value)?, &mut buf)?,
            Codec::TimeOfDay => match value {
                DptValue::Time {
                    day,
                    hour,
                    minute,
                    second,
                } => TimeOfDay.encode(
                    KnxTime {
                        day: *day,
                        hour: *hour,
                        minute: *minute,
                        second: *second,
                    },
                    &mut buf,
                )?,
                _ => return mismatch(),
            },
            Codec::Date => match value {
                DptValue::Date { day, month, year } => Date.encode(
                    KnxDate {
                        day: *day,
                        month: *month,
                        year: *year,
                    },
                    &mut buf,
                )?,
                _ => return mismatch(),
            },
            Codec::Unsigned32 => Unsigned32.encode(self.integer::<u32>(value)?, &mut buf)?,
            Codec::Signed32 => Signed32.encode(self.integer::<i32>(value)?, &mut buf)?,
            Codec::Float32 => Float32.encode(float_of(value)?, &mut buf)?,
            Codec::Text => match value.as_str() {
                Some(s) => Text.encode(s, &mut buf)?,
                None => return mismatch(),
            },
            Codec::SceneNumber => SceneNumber.encode(self.integer::<u8>(value)?, &mut buf)?,
            Codec::SceneControl => {
                let pair = match value {
                    DptValue::Scene { learn, number } => (*learn, *number),
                    other => (false, self.integer::<u8>(other)?),
                };
                SceneControl.encode(pair, &mut buf)?
            }
        };
        DptBytes::from_slice(&buf[..len]).map_err(|_| KnxError::buffer_too_small())
    }

    /// Decode `data` with this type's codec
    pub fn decode(&self, data: &[u8]) -> Result<DptValue> {
        let value = match self.codec {
            Codec::Boolean => DptValue::Bool(Boolean.decode(data)?),
            Codec::ControlBoolean => {
                let (control, value) = ControlBoolean.decode(data)?;
                DptValue::Control { control, value }
            }
            Codec::Step => {
                let (control, step) = StepControl.decode(data)?;
                DptValue::Step {
                    control,
                    step: step as u8,
                }
            }
            Codec::Character => {
                let c: char = Character.decode(data)?;
                let mut text = heapless::String::new();
                text.push(c).map_err(|_| KnxError::invalid_dpt_data())?;
                DptValue::Text(text)
            }
            Codec::Scaling => DptValue::Float(Scaling.decode(data)?),
            Codec::Angle => DptValue::Float(Angle.decode(data)?),
            Codec::Unsigned8 => {
                let raw: u8 = Unsigned8.decode(data)?;
                DptValue::Unsigned(u32::from(raw))
            }
            Codec::Signed8 => DptValue::Signed(i32::from(Signed8.decode(data)?)),
            Codec::Unsigned16 => DptValue::Unsigned(u32::from(Unsigned16.decode(data)?)),
            Codec::Signed16 => DptValue::Signed(i32::from(Signed16.decode(data)?)),
            Codec::Float16 => DptValue::Float(Float16.decode(data)?),
            Codec::TimeOfDay => {
                let t = TimeOfDay.decode(data)?;
                DptValue::Time {
                    day: t.day,
                    hour: t.hour,
                    minute: t.minute,
                    second: t.second,
                }
            }
            Codec::Date => {
                let d = Date.decode(data)?;
                DptValue::Date {
                    day: d.day,
                    month: d.month,
                    year: d.year,
                }
            }
            Codec::Unsigned32 => DptValue::Unsigned(Unsigned32.decode(data)?),
            Codec::Signed32 => DptValue::Signed(Signed32.decode(data)?),
            Codec::Float32 => DptValue::Float(Float32.decode(data)?),
            Codec::Text => DptValue::Text(Text.decode(data)?),
            Codec::SceneNumber => DptValue::Unsigned(u32::from(SceneNumber.decode(data)?)),
            Codec::SceneControl => {
                let (learn, number) = SceneControl.decode(data)?;
                DptValue::Scene { learn, number }
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_registry_is_broad_and_unique() {
        assert!(all().len() >= 35);
        for (i, info) in all().iter().enumerate() {
            assert!(
                all()[i + 1..].iter().all(|other| other.id != info.id),
                "duplicate {}",
                info.id
            );
            assert_eq!(info.size, info.codec.size());
        }
    }

    #[test]
    fn test_lookup_falls_back_to_main_type() {
        assert_eq!(lookup("9.001").unwrap().unit, "°C");
        assert_eq!(lookup("9.030").unwrap().id, "9");
        assert_eq!(lookup(" 1.001 ").unwrap().name, "Switch");
        assert!(lookup("99.001").is_none());
        assert!(is_supported("14.056"));
        assert!(!is_supported("15.000"));
    }

    #[test]
    fn test_unknown_dpt_is_explicit_error() {
        let err = encode("99.001", &DptValue::Bool(true)).unwrap_err();
        assert!(err.as_dpt().unwrap().is_unsupported());
        assert!(decode("bogus", &[0x00]).is_err());
    }

    #[rstest]
    #[case("1.001", DptValue::Bool(true), &[0x01])]
    #[case("5.001", DptValue::Float(50.0), &[0x80])]
    #[case("5.001", DptValue::Unsigned(100), &[0xFF])]
    #[case("6.001", DptValue::Signed(-1), &[0xFF])]
    #[case("7.001", DptValue::Unsigned(1234), &[0x04, 0xD2])]
    #[case("9.001", DptValue::Float(21.5), &[0x0C, 0x33])]
    #[case("9.001", DptValue::Unsigned(0), &[0x00, 0x00])]
    #[case("13.010", DptValue::Signed(-1), &[0xFF, 0xFF, 0xFF, 0xFF])]
    #[case("17.001", DptValue::Unsigned(5), &[0x05])]
    #[case("20.102", DptValue::Unsigned(3), &[0x03])]
    fn test_encode(#[case] id: &str, #[case] value: DptValue, #[case] bytes: &[u8]) {
        assert_eq!(encode(id, &value).unwrap().as_slice(), bytes);
    }

    #[rstest]
    #[case("1.001", &[0x01], DptValue::Bool(true))]
    #[case("5.001", &[0xFF], DptValue::Float(100.0))]
    #[case("5", &[0x2A], DptValue::Unsigned(42))]
    #[case("8.001", &[0xFF, 0xFE], DptValue::Signed(-2))]
    #[case("9.001", &[0x7F, 0xFF], DptValue::Float(670_760.96))]
    #[case("12.001", &[0, 0, 1, 0], DptValue::Unsigned(256))]
    #[case("11.001", &[1, 7, 95], DptValue::Date { day: 1, month: 7, year: 1995 })]
    #[case("18.001", &[0x85], DptValue::Scene { learn: true, number: 5 })]
    fn test_decode(#[case] id: &str, #[case] bytes: &[u8], #[case] value: DptValue) {
        assert_eq!(decode(id, bytes).unwrap(), value);
    }

    #[test]
    fn test_round_trip_tolerances() {
        for percent in [0.0, 12.5, 33.3, 99.0] {
            let raw = encode("5.001", &DptValue::Float(percent)).unwrap();
            let back = decode("5.001", &raw).unwrap().as_f64().unwrap();
            assert!((back - percent).abs() <= 0.5);
        }
        for temp in [-20.0, 0.5, 19.87, 22.4, 80.0] {
            let raw = encode("9.001", &DptValue::Float(temp)).unwrap();
            let back = decode("9.001", &raw).unwrap().as_f64().unwrap();
            assert!((back - temp).abs() <= 0.05, "{temp} -> {back}");
        }
    }

    #[test]
    fn test_integer_range_checks() {
        let err = encode("20.102", &DptValue::Unsigned(5)).unwrap_err();
        assert!(err.as_dpt().unwrap().is_out_of_range());
        assert!(encode("5", &DptValue::Unsigned(256)).is_err());
        assert!(encode("7", &DptValue::Signed(-1)).is_err());
        assert!(encode("17", &DptValue::Unsigned(64)).is_err());
        assert_eq!(
            encode("7.001", &DptValue::Float(10.4)).unwrap().as_slice(),
            &[0x00, 0x0A]
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode("1.001", &DptValue::text("on")).unwrap_err();
        assert!(err.as_dpt().unwrap().is_type_mismatch());
        assert!(encode("10.001", &DptValue::Float(1.0)).is_err());
        assert!(encode("16.000", &DptValue::Unsigned(1)).is_err());
    }

    #[test]
    fn test_short_payload_is_invalid_data() {
        let err = decode("9.001", &[0x0C]).unwrap_err();
        assert!(err.as_dpt().unwrap().is_invalid_data());
        assert!(decode("1.001", &[]).is_err());
        assert!(decode("13.010", &[0, 0]).is_err());
    }

    #[test]
    fn test_composite_types() {
        let time = DptValue::Time {
            day: 1,
            hour: 7,
            minute: 30,
            second: 0,
        };
        let raw = encode("10.001", &time).unwrap();
        assert_eq!(raw.as_slice(), &[0x27, 0x1E, 0x00]);
        assert_eq!(decode("10.001", &raw).unwrap(), time);

        let step = DptValue::Step {
            control: true,
            step: 1,
        };
        assert_eq!(encode("3.007", &step).unwrap().as_slice(), &[0x09]);
        assert_eq!(decode("3.007", &[0x09]).unwrap(), step);

        let text = encode("16.001", &DptValue::text("Living room")).unwrap();
        assert_eq!(text.len(), 14);
        assert_eq!(decode("16.001", &text).unwrap(), DptValue::text("Living room"));

        assert_eq!(decode("4.001", &[0x41]).unwrap(), DptValue::text("A"));
    }
}
