//! KNX addressing.
//!
//! KNX uses two types of addresses:
//! - Individual addresses for physical devices (Area.Line.Device)
//! - Group addresses for logical functions (Main/Middle/Sub or Main/Sub)
//!
//! The free functions below work on packed `u16` values for callers that do
//! not carry the typed wrappers around.

pub mod group;
pub mod individual;

pub use group::GroupAddress;
pub use individual::IndividualAddress;

use crate::error::Result;

/// Parse "A.L.D" into its packed 16-bit form.
pub fn parse_individual(text: &str) -> Result<u16> {
    text.parse::<IndividualAddress>().map(IndividualAddress::raw)
}

/// Format a packed individual address as "A.L.D".
pub fn format_individual(raw: u16) -> String {
    IndividualAddress::from(raw).to_string()
}

/// Parse "M/Mid/Sub" or "M/Sub" into its packed 16-bit form.
pub fn parse_group(text: &str) -> Result<u16> {
    text.parse::<GroupAddress>().map(GroupAddress::raw)
}

/// Format a packed group address, always in 3-level form.
pub fn format_group(raw: u16) -> String {
    GroupAddress::from(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_round_trip() {
        let raw = parse_individual("1.0.255").unwrap();
        assert_eq!(raw, 0x10FF);
        assert_eq!(parse_individual(&format_individual(raw)).unwrap(), raw);
    }

    #[test]
    fn test_group_formats_3level() {
        assert_eq!(parse_group("1/2/3").unwrap(), 0x0A03);
        assert_eq!(format_group(parse_group("0/10").unwrap()), "0/0/10");
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        assert!(parse_individual("1.0").is_err());
        assert!(parse_group("1.2.3").is_err());
    }
}
