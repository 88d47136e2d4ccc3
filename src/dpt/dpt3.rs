//! DPT 3.xxx - 3-bit controlled (dimming and blinds)
//!
//! ## Format
//!
//! ```text
//! ┌─────────┬─────────────┐
//! │ Control │  Stepcode   │
//! │  (1b)   │    (3b)     │
//! └─────────┴─────────────┘
//!    Bit 3     Bits 0-2
//! ```
//!
//! ## Stepcode Values
//!
//! - **0**: Break/Stop - halts current operation
//! - **1-7**: Intervals (1, 2, 4, 8, 16, 32, 64 intervals respectively)
//!
//! ## Common Subtypes
//!
//! - **3.007** - Dimming control (decrease/increase light intensity)
//! - **3.008** - Blind control (up/down blind positioning)

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 3.xxx codec, values are `(control, stepcode)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepControl;

/// Stepcode values for 3-bit controlled types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StepCode {
    /// Break/Stop - halts the current operation
    Break = 0,
    /// 1 interval
    Intervals1 = 1,
    /// 2 intervals
    Intervals2 = 2,
    /// 4 intervals
    Intervals4 = 3,
    /// 8 intervals
    Intervals8 = 4,
    /// 16 intervals
    Intervals16 = 5,
    /// 32 intervals
    Intervals32 = 6,
    /// 64 intervals (maximum)
    Intervals64 = 7,
}

impl StepCode {
    /// Stepcode from its low three bits
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            0 => Self::Break,
            1 => Self::Intervals1,
            2 => Self::Intervals2,
            3 => Self::Intervals4,
            4 => Self::Intervals8,
            5 => Self::Intervals16,
            6 => Self::Intervals32,
            _ => Self::Intervals64,
        }
    }

    /// Stepcode from a value that must be 0-7
    pub fn from_u8(value: u8) -> Result<Self> {
        if value > 7 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        Ok(Self::from_bits(value))
    }

    /// Number of intervals the range is divided into (0 for break)
    pub const fn intervals(self) -> u8 {
        match self {
            Self::Break => 0,
            _ => 1 << (self as u8 - 1),
        }
    }
}

impl DptEncode<(bool, StepCode)> for StepControl {
    fn encode(&self, (control, step): (bool, StepCode), buf: &mut [u8]) -> Result<usize> {
        let slot = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
        *slot = (u8::from(control) << 3) | step as u8;
        Ok(1)
    }
}

impl DptDecode<(bool, StepCode)> for StepControl {
    fn decode(&self, data: &[u8]) -> Result<(bool, StepCode)> {
        let byte = data.first().ok_or_else(KnxError::invalid_dpt_data)?;
        Ok((byte & 0x08 != 0, StepCode::from_bits(*byte)))
    }
}
