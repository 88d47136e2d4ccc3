//! KNX Group Address.
//!
//! Group addresses are the broadcast channels of the bus: any number of
//! simulated devices may listen on one address. Two text forms exist:
//! - 2-level: Main/Sub (e.g., 1/234)
//! - 3-level: Main/Middle/Sub (e.g., 1/2/3), always used for output
//!
//! Internally stored as 16 bits:
//! - Main: 5 bits (0-31)
//! - Middle: 3 bits (0-7)
//! - Sub: 8 bits (0-255), or 11 bits (0-2047) in 2-level form

use crate::error::{KnxError, Result};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// KNX Group Address
///
/// # Examples
///
/// ```
/// use knx_sim::GroupAddress;
///
/// let addr = GroupAddress::new(1, 2, 3).unwrap();
/// assert_eq!(addr.to_string(), "1/2/3");
///
/// // 2-level input is accepted, output is always 3-level
/// let addr: GroupAddress = "1/234".parse().unwrap();
/// assert_eq!(addr.to_string(), "1/0/234");
///
/// let addr = GroupAddress::from(0x0A03u16);
/// assert_eq!((addr.main(), addr.middle(), addr.sub()), (1, 2, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupAddress {
    raw: u16,
}

impl GroupAddress {
    /// Maximum main group value (5 bits)
    pub const MAX_MAIN: u8 = 31;
    /// Maximum middle group value (3 bits)
    pub const MAX_MIDDLE: u8 = 7;
    /// Maximum sub value for 2-level format (11 bits)
    pub const MAX_SUB_2LEVEL: u16 = 2047;

    /// Create a 3-level Group Address (Main/Middle/Sub).
    ///
    /// # Errors
    ///
    /// Returns an addressing error if `main` > 31 or `middle` > 7.
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        if main > Self::MAX_MAIN || middle > Self::MAX_MIDDLE {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self::from_parts(main, middle, sub))
    }

    /// Create a 2-level Group Address (Main/Sub).
    ///
    /// # Errors
    ///
    /// Returns an addressing error if `main` > 31 or `sub` > 2047.
    pub fn new_2level(main: u8, sub: u16) -> Result<Self> {
        if main > Self::MAX_MAIN || sub > Self::MAX_SUB_2LEVEL {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self {
            raw: (u16::from(main) << 11) | sub,
        })
    }

    /// Pack components without range checks. Used by the `ga!` macro after
    /// its compile-time validation.
    #[doc(hidden)]
    pub const fn from_parts(main: u8, middle: u8, sub: u8) -> Self {
        Self {
            raw: ((main as u16 & 0x1F) << 11) | ((middle as u16 & 0x07) << 8) | sub as u16,
        }
    }

    /// Get the raw u16 representation of the address.
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Get the main group component (0-31).
    #[inline(always)]
    pub const fn main(self) -> u8 {
        ((self.raw >> 11) & 0x1F) as u8
    }

    /// Get the middle group component (0-7).
    #[inline(always)]
    pub const fn middle(self) -> u8 {
        ((self.raw >> 8) & 0x07) as u8
    }

    /// Get the sub group component for 3-level format (0-255).
    #[inline(always)]
    pub const fn sub(self) -> u8 {
        (self.raw & 0xFF) as u8
    }

    /// Get the sub group component for 2-level format (0-2047).
    #[inline(always)]
    pub const fn sub_2level(self) -> u16 {
        self.raw & 0x07FF
    }

    /// Format as 2-level string (Main/Sub).
    pub fn to_string_2level(&self) -> heapless::String<16> {
        use core::fmt::Write;
        let mut s = heapless::String::new();
        // 16 bytes always fit "31/2047"
        let _ = write!(s, "{}/{}", self.main(), self.sub_2level());
        s
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

impl From<u16> for GroupAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<GroupAddress> for u16 {
    #[inline(always)]
    fn from(addr: GroupAddress) -> u16 {
        addr.raw
    }
}

impl fmt::Display for GroupAddress {
    /// Always 3-level
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl core::str::FromStr for GroupAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('/');

        let main = parts
            .next()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(KnxError::invalid_group_address)?;

        let second = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(KnxError::invalid_group_address)?;

        match (parts.next(), parts.next()) {
            // Main/Sub
            (None, _) => Self::new_2level(main, second),
            // Main/Middle/Sub
            (Some(sub), None) => {
                let sub = sub
                    .parse::<u8>()
                    .map_err(|_| KnxError::invalid_group_address())?;
                let middle = u8::try_from(second).map_err(|_| KnxError::address_out_of_range())?;
                Self::new(main, middle, sub)
            }
            (Some(_), Some(_)) => Err(KnxError::invalid_group_address()),
        }
    }
}

impl Serialize for GroupAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid group address '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_3level_valid() {
        let addr = GroupAddress::new(1, 2, 3).unwrap();
        assert_eq!(addr.main(), 1);
        assert_eq!(addr.middle(), 2);
        assert_eq!(addr.sub(), 3);
        assert_eq!(addr.raw(), 0x0A03);
    }

    #[test]
    fn test_new_out_of_range() {
        assert!(GroupAddress::new(32, 0, 0).is_err());
        assert!(GroupAddress::new(0, 8, 0).is_err());
        assert!(GroupAddress::new_2level(0, 2048).is_err());
    }

    #[test]
    fn test_2level_packs_into_same_raw() {
        // 1/234 and 1/0/234 are the same 16-bit value
        let two: GroupAddress = "1/234".parse().unwrap();
        let three: GroupAddress = "1/0/234".parse().unwrap();
        assert_eq!(two, three);
        assert_eq!(two.to_string_2level(), "1/234");

        // 2-level sub above 255 spills into the middle bits
        let wide: GroupAddress = "1/1000".parse().unwrap();
        assert_eq!(wide.sub_2level(), 1000);
        assert_eq!(wide.to_string(), "1/3/232");
    }

    #[test]
    fn test_encode_decode() {
        let addr = GroupAddress::new(31, 7, 255).unwrap();
        let mut buf = [0u8; 2];
        addr.encode(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
        assert_eq!(GroupAddress::decode(&buf).unwrap(), addr);
        assert!(GroupAddress::decode(&buf[..1]).is_err());
    }

    #[test]
    fn test_from_str_invalid() {
        for text in ["1", "32/0/0", "1/8/0", "1/2/3/4", "a/b/c", "", "1/2048", "1/256/0"] {
            assert!(text.parse::<GroupAddress>().is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn test_serde_uses_text_form() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            ga: GroupAddress,
        }

        let parsed: Wrapper = toml::from_str("ga = \"1/0/1\"").unwrap();
        assert_eq!(parsed.ga, GroupAddress::new(1, 0, 1).unwrap());
        assert_eq!(toml::to_string(&parsed).unwrap().trim(), "ga = \"1/0/1\"");
        assert!(toml::from_str::<Wrapper>("ga = \"40/0/1\"").is_err());
    }
}
