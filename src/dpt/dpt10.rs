//! DPT 10.xxx (time of day) and DPT 11.xxx (date)
//!
//! ## Format
//!
//! ```text
//! DPT 10:  DDDH HHHH   00MM MMMM   00SS SSSS
//!          D = weekday (0 = none, 1 = Monday .. 7 = Sunday)
//!
//! DPT 11:  000D DDDD   0000 MMMM   0YYY YYYY
//!          Y = 0-99, 90-99 => 1990-1999, 0-89 => 2000-2089
//! ```
//!
//! The century pivot is fixed by the KNX standard. Full years outside
//! 1990-2089 cannot be represented and are rejected on encode.

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

fn three_bytes(data: &[u8]) -> Result<[u8; 3]> {
    match data {
        [a, b, c, ..] => Ok([*a, *b, *c]),
        _ => Err(KnxError::invalid_dpt_data()),
    }
}

fn put(buf: &mut [u8], bytes: [u8; 3]) -> Result<usize> {
    let slot = buf.get_mut(..3).ok_or_else(KnxError::buffer_too_small)?;
    slot.copy_from_slice(&bytes);
    Ok(3)
}

/// Time of day with optional weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KnxTime {
    /// Weekday, 0 = no day, 1 = Monday .. 7 = Sunday
    pub day: u8,
    /// Hour 0-23
    pub hour: u8,
    /// Minute 0-59
    pub minute: u8,
    /// Second 0-59
    pub second: u8,
}

/// Calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnxDate {
    /// Day of month 1-31
    pub day: u8,
    /// Month 1-12
    pub month: u8,
    /// Full year 1990-2089
    pub year: u16,
}

/// DPT 10.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay;

impl DptEncode<KnxTime> for TimeOfDay {
    fn encode(&self, value: KnxTime, buf: &mut [u8]) -> Result<usize> {
        if value.day > 7 || value.hour > 23 || value.minute > 59 || value.second > 59 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        put(
            buf,
            [(value.day << 5) | value.hour, value.minute, value.second],
        )
    }
}

impl DptDecode<KnxTime> for TimeOfDay {
    fn decode(&self, data: &[u8]) -> Result<KnxTime> {
        let [b0, b1, b2] = three_bytes(data)?;
        Ok(KnxTime {
            day: (b0 >> 5) & 0x07,
            hour: b0 & 0x1F,
            minute: b1 & 0x3F,
            second: b2 & 0x3F,
        })
    }
}

/// DPT 11.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date;

impl Date {
    /// Two-digit wire year for a full year
    pub fn wire_year(year: u16) -> Result<u8> {
        match year {
            1990..=1999 => Ok((year - 1900) as u8),
            2000..=2089 => Ok((year - 2000) as u8),
            _ => Err(KnxError::dpt_value_out_of_range()),
        }
    }

    /// Full year for a two-digit wire year
    pub const fn full_year(wire: u8) -> u16 {
        let wire = (wire & 0x7F) as u16;
        if wire >= 90 {
            1900 + wire
        } else {
            2000 + wire
        }
    }
}

impl DptEncode<KnxDate> for Date {
    fn encode(&self, value: KnxDate, buf: &mut [u8]) -> Result<usize> {
        if !(1..=31).contains(&value.day) || !(1..=12).contains(&value.month) {
            return Err(KnxError::dpt_value_out_of_range());
        }
        put(buf, [value.day, value.month, Self::wire_year(value.year)?])
    }
}

impl DptDecode<KnxDate> for Date {
    fn decode(&self, data: &[u8]) -> Result<KnxDate> {
        let [b0, b1, b2] = three_bytes(data)?;
        Ok(KnxDate {
            day: b0 & 0x1F,
            month: b1 & 0x0F,
            year: Self::full_year(b2),
        })
    }
}
