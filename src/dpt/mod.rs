//! KNX Datapoint Types (DPT)
//!
//! This module provides encoding and decoding for KNX Datapoint Types.
//! DPTs define how to interpret the data payload in KNX telegrams.
//!
//! ## Supported DPT Families
//!
//! - **DPT 1.xxx / 2.xxx** - Boolean and controlled boolean
//! - **DPT 3.xxx** - 3-bit controlled: dimming, blind control
//! - **DPT 4, 5, 6, 17, 18, 20** - single byte: characters, percentages,
//!   angles, counters, scenes, HVAC modes
//! - **DPT 7.xxx / 8.xxx** - 16-bit unsigned / signed
//! - **DPT 9.xxx** - 2-byte float: temperature, illuminance, pressure
//! - **DPT 10.xxx / 11.xxx** - time of day and date
//! - **DPT 12, 13, 14** - 32-bit unsigned, signed and IEEE float
//! - **DPT 16.xxx** - 14-character string
//!
//! ## Usage
//!
//! Devices and configuration work with DPT ids and [`DptValue`]s through the
//! registry:
//!
//! ```
//! use knx_sim::dpt::{self, DptValue};
//!
//! let raw = dpt::encode("9.001", &DptValue::Float(21.5)).unwrap();
//! assert_eq!(raw.as_slice(), &[0x0C, 0x33]);
//! assert_eq!(dpt::decode("9.001", &raw).unwrap(), DptValue::Float(21.5));
//! ```
//!
//! The per-format codecs implement [`DptEncode`] / [`DptDecode`] on typed
//! values:
//!
//! ```
//! use knx_sim::dpt::{Float16, DptEncode, DptDecode};
//!
//! let mut buf = [0u8; 2];
//! Float16.encode(21.5, &mut buf).unwrap();
//! assert_eq!(Float16.decode(&buf).unwrap(), 21.5);
//! ```

use crate::error::Result;
use core::fmt;
use serde::{Deserialize, Serialize};

pub mod dpt1;
pub mod dpt10;
pub mod dpt13;
pub mod dpt16;
pub mod dpt3;
pub mod dpt5;
pub mod dpt7;
pub mod dpt9;
pub mod registry;

#[doc(inline)]
pub use dpt1::{Boolean, ControlBoolean};
#[doc(inline)]
pub use dpt10::{Date, KnxDate, KnxTime, TimeOfDay};
#[doc(inline)]
pub use dpt13::{Float32, Signed32, Unsigned32};
#[doc(inline)]
pub use dpt16::Text;
#[doc(inline)]
pub use dpt3::{StepCode, StepControl};
#[doc(inline)]
pub use dpt5::{Angle, Character, HvacMode, SceneControl, SceneNumber, Scaling, Signed8, Unsigned8};
#[doc(inline)]
pub use dpt7::{Signed16, Unsigned16};
#[doc(inline)]
pub use dpt9::Float16;
#[doc(inline)]
pub use registry::{all, decode, encode, is_supported, lookup, Codec, DptBytes, DptInfo};

/// Maximum encoded width of any DPT (DPT 16)
pub const MAX_DPT_SIZE: usize = 14;

/// Trait for encoding values to KNX data format
pub trait DptEncode<T> {
    /// Encode a value into `buf`, returning the number of bytes written
    fn encode(&self, value: T, buf: &mut [u8]) -> Result<usize>;
}

/// Trait for decoding KNX data to values
pub trait DptDecode<T> {
    /// Decode KNX byte representation to a value
    fn decode(&self, data: &[u8]) -> Result<T>;
}

/// A decoded datapoint value.
///
/// Device state, scenario steps and configuration values all use this type.
/// In TOML and JSON it is written in its natural form: `true`, `42`, `-3`,
/// `21.5`, `"text"`, or a table for the composite types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DptValue {
    /// DPT 1
    Bool(bool),
    /// DPT 5, 7, 12, 17, 20
    Unsigned(u32),
    /// DPT 6, 8, 13
    Signed(i32),
    /// DPT 5.001, 5.003, 9, 14
    Float(f64),
    /// DPT 4, 16
    Text(heapless::String<MAX_DPT_SIZE>),
    /// DPT 2
    Control {
        /// Control bit
        control: bool,
        /// Value bit
        value: bool,
    },
    /// DPT 3
    Step {
        /// Direction: increase / down when set
        control: bool,
        /// Step code 0-7, 0 = stop
        step: u8,
    },
    /// DPT 10
    Time {
        /// Day of week, 0 = no day, 1 = Monday
        day: u8,
        /// Hour 0-23
        hour: u8,
        /// Minute 0-59
        minute: u8,
        /// Second 0-59
        second: u8,
    },
    /// DPT 11
    Date {
        /// Day of month 1-31
        day: u8,
        /// Month 1-12
        month: u8,
        /// Full year 1990-2089
        year: u16,
    },
    /// DPT 18
    Scene {
        /// Learn bit
        learn: bool,
        /// Scene number 0-63
        number: u8,
    },
}

impl DptValue {
    /// Truthiness of the value: booleans as-is, numbers when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Unsigned(v) => Some(*v != 0),
            Self::Signed(v) => Some(*v != 0),
            Self::Float(v) => Some(*v != 0.0),
            Self::Control { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of scalar values; booleans count as 0 / 1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Unsigned(v) => Some(f64::from(*v)),
            Self::Signed(v) => Some(f64::from(*v)),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of scalar values; floats must be integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Unsigned(v) => Some(i64::from(*v)),
            Self::Signed(v) => Some(i64::from(*v)),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Text view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Build a text value, truncated to 14 bytes on a character boundary
    pub fn text(s: &str) -> Self {
        let mut out = heapless::String::new();
        for c in s.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        Self::Text(out)
    }
}

impl From<bool> for DptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u8> for DptValue {
    fn from(value: u8) -> Self {
        Self::Unsigned(u32::from(value))
    }
}

impl From<u32> for DptValue {
    fn from(value: u32) -> Self {
        Self::Unsigned(value)
    }
}

impl From<i32> for DptValue {
    fn from(value: i32) -> Self {
        Self::Signed(value)
    }
}

impl From<f64> for DptValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for DptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Control { control, value } => write!(f, "control={control} value={value}"),
            Self::Step { control, step } => write!(f, "control={control} step={step}"),
            Self::Time {
                day,
                hour,
                minute,
                second,
            } => write!(f, "day {day} {hour:02}:{minute:02}:{second:02}"),
            Self::Date { day, month, year } => write!(f, "{year:04}-{month:02}-{day:02}"),
            Self::Scene { learn, number } => write!(f, "scene {number} learn={learn}"),
        }
    }
}

/// Round to `decimals` places, used where decoded values are reported with
/// fixed precision
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
