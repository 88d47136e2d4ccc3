//! Single-byte datapoint types
//!
//! - **DPT 4.xxx** - Character (ASCII / ISO 8859-1)
//! - **DPT 5.xxx** - 8-bit unsigned, with the scaled subtypes
//!   - **5.001** - Percentage (0-100%) scaled onto 0-255
//!   - **5.003** - Angle (0-360°) scaled onto 0-255
//! - **DPT 6.xxx** - 8-bit signed (two's complement)
//! - **DPT 17.xxx** - Scene number (0-63)
//! - **DPT 18.xxx** - Scene control (learn bit + scene number)
//! - **DPT 20.xxx** - 8-bit enumerations, e.g. 20.102 HVAC mode
//!
//! ## Scaling
//!
//! ```text
//! 5.001 encode: raw = round(value * 255 / 100)     clamped to 0-100 first
//! 5.001 decode: value = round(raw * 100 / 255, 1 decimal)
//! ```
//!
//! The scaled subtypes clamp instead of rejecting, since they are fed from
//! computed simulation values; the raw integer subtypes reject out-of-range
//! input.

use crate::dpt::{round_to, DptDecode, DptEncode};
use crate::error::{KnxError, Result};
use core::fmt;

fn first(data: &[u8]) -> Result<u8> {
    data.first().copied().ok_or_else(KnxError::invalid_dpt_data)
}

fn put(buf: &mut [u8], byte: u8) -> Result<usize> {
    let slot = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
    *slot = byte;
    Ok(1)
}

/// Map `value` from `0..=full` onto `0..=255`, clamping first
fn scale_to_byte(value: f64, full: f64) -> Result<u8> {
    if value.is_nan() {
        return Err(KnxError::dpt_value_out_of_range());
    }
    Ok((value.clamp(0.0, full) * 255.0 / full).round() as u8)
}

/// DPT 4.xxx character codec (ISO 8859-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character;

impl DptEncode<char> for Character {
    fn encode(&self, value: char, buf: &mut [u8]) -> Result<usize> {
        let byte = u8::try_from(u32::from(value)).map_err(|_| KnxError::dpt_value_out_of_range())?;
        put(buf, byte)
    }
}

impl DptDecode<char> for Character {
    fn decode(&self, data: &[u8]) -> Result<char> {
        Ok(char::from(first(data)?))
    }
}

/// DPT 5.001 percentage codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaling;

impl DptEncode<f64> for Scaling {
    fn encode(&self, value: f64, buf: &mut [u8]) -> Result<usize> {
        put(buf, scale_to_byte(value, 100.0)?)
    }
}

impl DptDecode<f64> for Scaling {
    fn decode(&self, data: &[u8]) -> Result<f64> {
        Ok(round_to(f64::from(first(data)?) * 100.0 / 255.0, 1))
    }
}

/// DPT 5.003 angle codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle;

impl DptEncode<f64> for Angle {
    fn encode(&self, value: f64, buf: &mut [u8]) -> Result<usize> {
        put(buf, scale_to_byte(value, 360.0)?)
    }
}

impl DptDecode<f64> for Angle {
    fn decode(&self, data: &[u8]) -> Result<f64> {
        Ok(round_to(f64::from(first(data)?) * 360.0 / 255.0, 1))
    }
}

/// DPT 5.xxx / 17.xxx / 20.xxx raw unsigned byte codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsigned8;

impl DptEncode<u8> for Unsigned8 {
    fn encode(&self, value: u8, buf: &mut [u8]) -> Result<usize> {
        put(buf, value)
    }
}

impl DptDecode<u8> for Unsigned8 {
    fn decode(&self, data: &[u8]) -> Result<u8> {
        first(data)
    }
}

/// DPT 6.xxx signed byte codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signed8;

impl DptEncode<i8> for Signed8 {
    fn encode(&self, value: i8, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_be_bytes()[0])
    }
}

impl DptDecode<i8> for Signed8 {
    fn decode(&self, data: &[u8]) -> Result<i8> {
        Ok(i8::from_be_bytes([first(data)?]))
    }
}

/// DPT 17.xxx scene number codec (0-63)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneNumber;

impl DptEncode<u8> for SceneNumber {
    fn encode(&self, value: u8, buf: &mut [u8]) -> Result<usize> {
        if value > 63 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        put(buf, value)
    }
}

impl DptDecode<u8> for SceneNumber {
    fn decode(&self, data: &[u8]) -> Result<u8> {
        Ok(first(data)? & 0x3F)
    }
}

/// DPT 18.xxx scene control codec, values are `(learn, number)`
///
/// ```text
/// L0NN NNNN    L = learn, N = scene number
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneControl;

impl DptEncode<(bool, u8)> for SceneControl {
    fn encode(&self, (learn, number): (bool, u8), buf: &mut [u8]) -> Result<usize> {
        if number > 63 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        put(buf, (u8::from(learn) << 7) | number)
    }
}

impl DptDecode<(bool, u8)> for SceneControl {
    fn decode(&self, data: &[u8]) -> Result<(bool, u8)> {
        let byte = first(data)?;
        Ok((byte & 0x80 != 0, byte & 0x3F))
    }
}

/// DPT 20.102 HVAC operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HvacMode {
    /// Automatic
    Auto = 0,
    /// Comfort (occupied)
    #[default]
    Comfort = 1,
    /// Standby
    Standby = 2,
    /// Economy (night)
    Economy = 3,
    /// Building protection (frost / heat)
    BuildingProtection = 4,
}

impl HvacMode {
    /// Mode from its wire value
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Comfort),
            2 => Ok(Self::Standby),
            3 => Ok(Self::Economy),
            4 => Ok(Self::BuildingProtection),
            _ => Err(KnxError::dpt_value_out_of_range()),
        }
    }

    /// Mode from its lower-case name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(Self::Auto),
            "comfort" => Some(Self::Comfort),
            "standby" => Some(Self::Standby),
            "economy" => Some(Self::Economy),
            "protection" | "building_protection" => Some(Self::BuildingProtection),
            _ => None,
        }
    }

    /// Wire value
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Lower-case name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Comfort => "comfort",
            Self::Standby => "standby",
            Self::Economy => "economy",
            Self::BuildingProtection => "protection",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DptEncode<HvacMode> for Unsigned8 {
    fn encode(&self, value: HvacMode, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_u8())
    }
}

impl DptDecode<HvacMode> for Unsigned8 {
    fn decode(&self, data: &[u8]) -> Result<HvacMode> {
        HvacMode::from_u8(first(data)?)
    }
}
