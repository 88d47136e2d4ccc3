//! DPT 9.xxx - 2-byte Float (16-bit floating point)
//!
//! 2-byte floating point datapoint types represent values using a custom
//! 16-bit floating point format with 1 sign bit, 4 exponent bits, and 11 mantissa bits.
//!
//! ## Format
//!
//! ```text
//! Byte 0: SEEE EMMM
//! Byte 1: MMMM MMMM
//!
//! S = Sign bit (bit 15: 0 = positive, 1 = negative)
//! E = Exponent (bits 14-11: 4 bits, unsigned, range 0-15)
//! M = Mantissa (bits 10-0, two's complement together with S)
//!
//! Value = (0.01 * M) * 2^E
//! ```
//!
//! ## Range
//!
//! - Min: -671088.64
//! - Max: +670760.96
//! - Resolution: 0.01 at exponent 0
//!
//! `0x7FFF` is reserved as "invalid" on the bus. It decodes to the maximum
//! magnitude rather than failing, so a device reporting it stays readable.
//!
//! ## Common Subtypes
//!
//! - **9.001** - Temperature (°C)
//! - **9.004** - Illuminance (lux)
//! - **9.005** - Wind speed (m/s)
//! - **9.006** - Pressure (Pa)
//! - **9.007** - Humidity (%)
//! - **9.008** - Air quality (ppm)

use crate::dpt::{round_to, DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// Largest encodable magnitude (mantissa 2047, exponent 15)
pub const MAX_VALUE: f64 = 670_760.96;

/// Reserved "invalid data" pattern
pub const INVALID: [u8; 2] = [0x7F, 0xFF];

/// DPT 9.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Float16;

impl Float16 {
    /// Encode into a fixed two-byte array
    pub fn to_bytes(value: f64) -> Result<[u8; 2]> {
        if value.is_nan() {
            return Err(KnxError::dpt_value_out_of_range());
        }
        if value == 0.0 {
            return Ok([0x00, 0x00]);
        }

        let negative = value < 0.0;
        let mut magnitude = value.abs() * 100.0;
        let mut exponent = 0u8;

        // Scale until the mantissa fits 11 bits, saturating at exponent 15
        while magnitude > 2047.0 && exponent < 15 {
            magnitude /= 2.0;
            exponent += 1;
        }

        let mantissa = (magnitude.round() as u16).min(2047);
        if mantissa == 0 {
            return Ok([0x00, 0x00]);
        }

        let (sign, bits) = if negative {
            (1u8, (2048 - mantissa) & 0x07FF)
        } else {
            (0u8, mantissa)
        };

        let high = (sign << 7) | (exponent << 3) | ((bits >> 8) as u8 & 0x07);
        Ok([high, (bits & 0xFF) as u8])
    }

    /// Decode from the first two bytes of `data`
    pub fn from_bytes(data: &[u8]) -> Result<f64> {
        let (high, low) = match data {
            [h, l, ..] => (*h, *l),
            _ => return Err(KnxError::invalid_dpt_data()),
        };

        let raw = u16::from_be_bytes([high, low]);
        let exponent = (raw >> 11) & 0x0F;
        let bits = i32::from(raw & 0x07FF);

        let mantissa = if raw & 0x8000 != 0 { bits - 2048 } else { bits };

        let value = 0.01 * f64::from(mantissa) * f64::from(1u32 << exponent);
        Ok(round_to(value, 2))
    }
}

impl DptEncode<f64> for Float16 {
    fn encode(&self, value: f64, buf: &mut [u8]) -> Result<usize> {
        let slot = buf.get_mut(..2).ok_or_else(KnxError::buffer_too_small)?;
        slot.copy_from_slice(&Self::to_bytes(value)?);
        Ok(2)
    }
}

impl DptDecode<f64> for Float16 {
    fn decode(&self, data: &[u8]) -> Result<f64> {
        Self::from_bytes(data)
    }
}
