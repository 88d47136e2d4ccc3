//! KNX Individual Address.
//!
//! Individual addresses identify physical devices on the bus.
//! Format: Area.Line.Device (e.g., 1.1.5)
//! - Area: 0-15 (4 bits)
//! - Line: 0-15 (4 bits)
//! - Device: 0-255 (8 bits)
//!
//! Uniqueness across a premise is not enforced: two simulated devices with
//! the same address is a configuration mistake, not a protocol error.

use crate::error::{KnxError, Result};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// KNX Individual Address (Area.Line.Device)
///
/// # Examples
///
/// ```
/// use knx_sim::IndividualAddress;
///
/// let addr = IndividualAddress::new(1, 0, 255).unwrap();
/// assert_eq!(addr.to_string(), "1.0.255");
/// assert_eq!(u16::from(addr), 0x10FF);
///
/// let addr: IndividualAddress = "1.1.5".parse().unwrap();
/// assert_eq!(addr.raw(), 0x1105);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IndividualAddress {
    raw: u16,
}

impl IndividualAddress {
    /// Maximum area value (4 bits)
    pub const MAX_AREA: u8 = 15;
    /// Maximum line value (4 bits)
    pub const MAX_LINE: u8 = 15;

    /// Default address of the simulated gateway (1.0.0)
    pub const DEFAULT_GATEWAY: Self = Self::from_parts(1, 0, 0);
    /// Default address handed to tunnelling clients (1.0.255)
    pub const DEFAULT_CLIENT: Self = Self::from_parts(1, 0, 255);

    /// Create an Individual Address from components.
    ///
    /// # Errors
    ///
    /// Returns an addressing error if `area` or `line` exceeds 15.
    pub fn new(area: u8, line: u8, device: u8) -> Result<Self> {
        if area > Self::MAX_AREA || line > Self::MAX_LINE {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self::from_parts(area, line, device))
    }

    /// Pack components without range checks. Used by the `ia!` macro after
    /// its compile-time validation.
    #[doc(hidden)]
    pub const fn from_parts(area: u8, line: u8, device: u8) -> Self {
        Self {
            raw: ((area as u16 & 0x0F) << 12) | ((line as u16 & 0x0F) << 8) | device as u16,
        }
    }

    /// Get the raw u16 representation of the address.
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Get the area component (0-15).
    #[inline(always)]
    pub const fn area(self) -> u8 {
        ((self.raw >> 12) & 0x0F) as u8
    }

    /// Get the line component (0-15).
    #[inline(always)]
    pub const fn line(self) -> u8 {
        ((self.raw >> 8) & 0x0F) as u8
    }

    /// Get the device component (0-255).
    #[inline(always)]
    pub const fn device(self) -> u8 {
        (self.raw & 0xFF) as u8
    }

    /// Encode the address into a byte buffer (big-endian).
    #[inline]
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 2 {
            return Err(KnxError::buffer_too_small());
        }
        buf[0..2].copy_from_slice(&self.raw.to_be_bytes());
        Ok(2)
    }

    /// Decode an address from a byte buffer (big-endian).
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(KnxError::buffer_too_small());
        }
        Ok(Self {
            raw: u16::from_be_bytes([buf[0], buf[1]]),
        })
    }
}

impl From<u16> for IndividualAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<IndividualAddress> for u16 {
    #[inline(always)]
    fn from(addr: IndividualAddress) -> u16 {
        addr.raw
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl core::str::FromStr for IndividualAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|part| part.parse::<u8>().ok())
                .ok_or_else(KnxError::invalid_individual_address)
        };

        let area = next()?;
        let line = next()?;
        let device = next()?;

        if parts.next().is_some() {
            return Err(KnxError::invalid_individual_address());
        }

        Self::new(area, line, device)
    }
}

impl Serialize for IndividualAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndividualAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid individual address '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let addr = IndividualAddress::new(1, 1, 5).unwrap();
        assert_eq!(addr.area(), 1);
        assert_eq!(addr.line(), 1);
        assert_eq!(addr.device(), 5);
        assert_eq!(addr.raw(), 0x1105);
    }

    #[test]
    fn test_new_out_of_range() {
        assert!(IndividualAddress::new(16, 0, 0).is_err());
        assert!(IndividualAddress::new(0, 16, 0).is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(IndividualAddress::DEFAULT_GATEWAY.raw(), 0x1000);
        assert_eq!(IndividualAddress::DEFAULT_CLIENT.raw(), 0x10FF);
        assert_eq!(IndividualAddress::DEFAULT_CLIENT.to_string(), "1.0.255");
    }

    #[test]
    fn test_text_round_trip_for_every_area_and_line() {
        for area in 0..=15u8 {
            for line in 0..=15u8 {
                let text = format!("{area}.{line}.200");
                let addr: IndividualAddress = text.parse().unwrap();
                assert_eq!(addr.to_string(), text);
                assert_eq!(addr.to_string().parse::<IndividualAddress>().unwrap(), addr);
            }
        }
    }

    #[test]
    fn test_from_str_invalid() {
        for text in ["1.1", "1.1.1.1", "16.0.0", "1.16.0", "1.1.256", "a.b.c", "", "1/1/1"] {
            assert!(text.parse::<IndividualAddress>().is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn test_encode_decode() {
        let addr = IndividualAddress::new(15, 15, 255).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(addr.encode(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0xFF, 0xFF]);
        assert_eq!(IndividualAddress::decode(&buf).unwrap(), addr);
    }
}
