//! 4-byte datapoint types
//!
//! - **DPT 12.xxx** - 32-bit unsigned counter
//! - **DPT 13.xxx** - 32-bit signed counter (two's complement)
//! - **DPT 14.xxx** - IEEE 754 single precision float
//!
//! All three are big-endian.
//!
//! ## Common Subtypes
//!
//! - **12.001** - Counter pulses
//! - **13.010** - Active energy (Wh)
//! - **13.013** - Active energy (kWh)
//! - **14.056** - Power (W)
//! - **14.068** - Temperature (°C)

use crate::dpt::{round_to, DptDecode, DptEncode};
use crate::error::{KnxError, Result};

fn four_bytes(data: &[u8]) -> Result<[u8; 4]> {
    match data {
        [a, b, c, d, ..] => Ok([*a, *b, *c, *d]),
        _ => Err(KnxError::invalid_dpt_data()),
    }
}

fn put(buf: &mut [u8], bytes: [u8; 4]) -> Result<usize> {
    let slot = buf.get_mut(..4).ok_or_else(KnxError::buffer_too_small)?;
    slot.copy_from_slice(&bytes);
    Ok(4)
}

/// DPT 12.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsigned32;

impl DptEncode<u32> for Unsigned32 {
    fn encode(&self, value: u32, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_be_bytes())
    }
}

impl DptDecode<u32> for Unsigned32 {
    #[inline]
    fn decode(&self, data: &[u8]) -> Result<u32> {
        Ok(u32::from_be_bytes(four_bytes(data)?))
    }
}

/// DPT 13.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signed32;

impl DptEncode<i32> for Signed32 {
    fn encode(&self, value: i32, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_be_bytes())
    }
}

impl DptDecode<i32> for Signed32 {
    #[inline]
    fn decode(&self, data: &[u8]) -> Result<i32> {
        Ok(i32::from_be_bytes(four_bytes(data)?))
    }
}

/// DPT 14.xxx codec
///
/// Decoded values are rounded to four decimals so that values written as
/// decimals read back as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Float32;

impl DptEncode<f64> for Float32 {
    fn encode(&self, value: f64, buf: &mut [u8]) -> Result<usize> {
        put(buf, (value as f32).to_be_bytes())
    }
}

impl DptDecode<f64> for Float32 {
    fn decode(&self, data: &[u8]) -> Result<f64> {
        let value = f32::from_be_bytes(four_bytes(data)?);
        if !value.is_finite() {
            return Ok(f64::from(value));
        }
        Ok(round_to(f64::from(value), 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed32() {
        let mut buf = [0u8; 4];
        Signed32.encode(-1, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
        Signed32.encode(500_000, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x07, 0xA1, 0x20]);
        assert_eq!(Signed32.decode(&buf).unwrap(), 500_000);
        assert_eq!(Signed32.decode(&[0x80, 0, 0, 0]).unwrap(), i32::MIN);
    }

    #[test]
    fn test_unsigned32() {
        let mut buf = [0u8; 4];
        Unsigned32.encode(u32::MAX, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
        assert_eq!(Unsigned32.decode(&[0, 0, 0x01, 0x00]).unwrap(), 256);
    }

    #[test]
    fn test_float32() {
        let mut buf = [0u8; 4];
        Float32.encode(230.0, &mut buf).unwrap();
        assert_eq!(buf, [0x43, 0x66, 0x00, 0x00]);
        Float32.encode(49.95, &mut buf).unwrap();
        assert_eq!(Float32.decode(&buf).unwrap(), 49.95);
    }

    #[test]
    fn test_short_data() {
        assert!(Signed32.decode(&[0, 0, 0]).is_err());
        assert!(Unsigned32.decode(&[]).is_err());
        assert!(Float32.decode(&[0x43, 0x66]).is_err());
        assert!(Signed32.encode(1, &mut [0u8; 3]).is_err());
    }
}
