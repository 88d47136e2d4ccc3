//! DPT 7.xxx / 8.xxx - 2-byte unsigned and signed values
//!
//! ## Format
//!
//! - 16 bits, big-endian
//! - DPT 7: unsigned (0-65535)
//! - DPT 8: two's complement (-32768..32767)
//!
//! ## Common Subtypes
//!
//! - **7.001** - Pulses
//! - **7.005** - Time period (s)
//! - **7.012** - Current (mA)
//! - **8.001** - Pulse difference

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

fn two_bytes(data: &[u8]) -> Result<[u8; 2]> {
    match data {
        [a, b, ..] => Ok([*a, *b]),
        _ => Err(KnxError::invalid_dpt_data()),
    }
}

fn put(buf: &mut [u8], bytes: [u8; 2]) -> Result<usize> {
    let slot = buf.get_mut(..2).ok_or_else(KnxError::buffer_too_small)?;
    slot.copy_from_slice(&bytes);
    Ok(2)
}

/// DPT 7.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsigned16;

impl DptEncode<u16> for Unsigned16 {
    fn encode(&self, value: u16, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_be_bytes())
    }
}

impl DptDecode<u16> for Unsigned16 {
    #[inline]
    fn decode(&self, data: &[u8]) -> Result<u16> {
        Ok(u16::from_be_bytes(two_bytes(data)?))
    }
}

/// DPT 8.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signed16;

impl DptEncode<i16> for Signed16 {
    fn encode(&self, value: i16, buf: &mut [u8]) -> Result<usize> {
        put(buf, value.to_be_bytes())
    }
}

impl DptDecode<i16> for Signed16 {
    #[inline]
    fn decode(&self, data: &[u8]) -> Result<i16> {
        Ok(i16::from_be_bytes(two_bytes(data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned16() {
        let mut buf = [0u8; 2];
        Unsigned16.encode(1234, &mut buf).unwrap();
        assert_eq!(buf, [0x04, 0xD2]);
        assert_eq!(Unsigned16.decode(&[0x13, 0x88]).unwrap(), 5000);
        assert_eq!(Unsigned16.decode(&[0xFF, 0xFF]).unwrap(), u16::MAX);
    }

    #[test]
    fn test_signed16() {
        let mut buf = [0u8; 2];
        Signed16.encode(-2, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFE]);
        assert_eq!(Signed16.decode(&[0x80, 0x00]).unwrap(), i16::MIN);
    }

    #[test]
    fn test_short_data() {
        assert!(Unsigned16.decode(&[0x01]).is_err());
        assert!(Signed16.decode(&[]).is_err());
        assert!(Unsigned16.encode(1, &mut [0u8; 1]).is_err());
    }

    #[test]
    fn test_extra_bytes_ignored() {
        assert_eq!(Unsigned16.decode(&[0x00, 0x2A, 0xFF]).unwrap(), 42);
    }
}
