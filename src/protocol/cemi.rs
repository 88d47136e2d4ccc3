//! Common External Message Interface (cEMI) frames.
//!
//! The simulator only speaks `L_Data` group telegrams, so [`CemiFrame`] is an
//! owned, fully decoded view of one: message code, addresses, APCI and a
//! payload of at most 14 bytes.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Message Code (1 byte)                    │
//! ├──────────────────────────────────────────┤
//! │ Additional Info Length (1 byte)          │
//! ├──────────────────────────────────────────┤
//! │ Additional Info (variable, skipped)      │
//! ├──────────────────────────────────────────┤
//! │ Control Field 1 (1 byte)                 │
//! │ Control Field 2 (1 byte)                 │
//! │ Source Address (2 bytes)                 │
//! │ Destination Address (2 bytes)            │
//! │ Data Length (1 byte)                     │
//! │ TPCI (1 byte)                            │
//! │ APCI | data (1 byte)                     │
//! │ Data (0-14 bytes)                        │
//! └──────────────────────────────────────────┘
//! ```
//!
//! `Data Length` counts the APDU bytes after the TPCI byte. Values up to
//! six bits ride in the low bits of the APCI byte (compact form); anything
//! wider follows it (extended form).

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::error::{KnxError, Result};
use crate::protocol::constants::{CEMIMessageCode, MAX_CEMI_SIZE, MAX_PAYLOAD_SIZE};
use core::fmt;

/// Application payload of one telegram
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_SIZE>;

/// Fixed part of an `L_Data` frame up to and including the data length byte
const LDATA_FIXED: usize = 7;

/// Control Field 1 of `L_Data` frame
///
/// ```text
/// Bit 7: Frame Type (0=extended, 1=standard)
/// Bit 5: Repeat (0=repeat, 1=do not repeat)
/// Bit 4: System Broadcast (0=system, 1=broadcast)
/// Bit 3-2: Priority (00=system, 01=normal, 10=urgent, 11=low)
/// Bit 1: Acknowledge Request
/// Bit 0: Confirm (0=no error, 1=error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField1 {
    raw: u8,
}

impl ControlField1 {
    /// Standard frame, do not repeat, broadcast, low priority (0xBC)
    pub const STANDARD: Self = Self { raw: 0xBC };

    /// Get raw byte value
    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Check if frame is standard (true) or extended (false)
    #[inline(always)]
    pub const fn is_standard_frame(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Check if confirm error flag is set
    #[inline(always)]
    pub const fn has_error(self) -> bool {
        (self.raw & 0x01) != 0
    }
}

impl Default for ControlField1 {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl From<u8> for ControlField1 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

/// Control Field 2 of `L_Data` frame
///
/// ```text
/// Bit 7: Destination Address Type (0=individual, 1=group)
/// Bit 6-4: Hop Count (0-7)
/// Bit 3-0: Extended Frame Format (0000=standard)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField2 {
    raw: u8,
}

impl ControlField2 {
    /// Create a Control Field 2 with hop count 6
    pub const fn new(is_group: bool) -> Self {
        // 0x60 = hop count 6, standard format
        Self {
            raw: if is_group { 0xE0 } else { 0x60 },
        }
    }

    /// Get raw byte value
    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Check if destination is group address (true) or individual (false)
    #[inline(always)]
    pub const fn is_group_address(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Get hop count (0-7)
    #[inline(always)]
    pub const fn hop_count(self) -> u8 {
        (self.raw >> 4) & 0x07
    }
}

impl From<u8> for ControlField2 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

/// APCI (Application Layer Protocol Control Information)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Apci {
    /// Group Value Read (`A_GroupValue_Read`)
    GroupValueRead,
    /// Group Value Response (`A_GroupValue_Response`)
    GroupValueResponse,
    /// Group Value Write (`A_GroupValue_Write`)
    GroupValueWrite,
    /// Any other service, kept as its 10-bit code
    Other(u16),
}

impl Apci {
    /// Parse APCI from the TPCI byte and the APCI byte
    ///
    /// The code lives in the low two bits of the TPCI byte and the top two
    /// bits of the APCI byte; the remaining six bits carry compact data.
    pub const fn from_bytes(tpci: u8, apci: u8) -> Self {
        let code = ((tpci as u16 & 0x03) << 8) | (apci as u16 & 0xC0);
        match code {
            0x000 => Self::GroupValueRead,
            0x040 => Self::GroupValueResponse,
            0x080 => Self::GroupValueWrite,
            _ => Self::Other(code),
        }
    }

    /// Convert APCI to its 10-bit code
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::GroupValueRead => 0x000,
            Self::GroupValueResponse => 0x040,
            Self::GroupValueWrite => 0x080,
            Self::Other(code) => code & 0x3C0,
        }
    }

    /// Short name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::GroupValueRead => "GroupRead",
            Self::GroupValueResponse => "GroupResponse",
            Self::GroupValueWrite => "GroupWrite",
            Self::Other(_) => "Other",
        }
    }
}

/// Destination of a telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Destination {
    /// Group address (multicast)
    Group(GroupAddress),
    /// Individual address (point-to-point)
    Individual(IndividualAddress),
}

impl Destination {
    fn raw(self) -> u16 {
        match self {
            Self::Group(ga) => ga.raw(),
            Self::Individual(ia) => ia.raw(),
        }
    }

    /// True for group destinations
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(ga) => write!(f, "{ga}"),
            Self::Individual(ia) => write!(f, "{ia}"),
        }
    }
}

/// Decoded cEMI `L_Data` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CemiFrame {
    /// Message code
    pub message_code: CEMIMessageCode,
    /// Control field 1
    pub ctrl1: ControlField1,
    /// Source address
    pub source: IndividualAddress,
    /// Destination address
    pub destination: Destination,
    /// Application service
    pub apci: Apci,
    /// Application data
    pub payload: Payload,
}

impl CemiFrame {
    /// Build an `L_Data.ind` group frame
    ///
    /// # Errors
    ///
    /// - write or response without payload
    /// - more than 14 payload bytes
    pub fn group(
        apci: Apci,
        source: IndividualAddress,
        destination: GroupAddress,
        payload: &[u8],
    ) -> Result<Self> {
        // An empty write would encode as compact 0 and decode as [0x00]
        if payload.is_empty() && matches!(apci, Apci::GroupValueWrite | Apci::GroupValueResponse) {
            return Err(KnxError::invalid_frame());
        }
        Ok(Self {
            message_code: CEMIMessageCode::LDataInd,
            ctrl1: ControlField1::STANDARD,
            source,
            destination: Destination::Group(destination),
            apci,
            payload: Payload::from_slice(payload).map_err(|_| KnxError::payload_too_large())?,
        })
    }

    /// `GroupValue_Write` indication from `source`
    pub fn group_write(source: IndividualAddress, ga: GroupAddress, payload: &[u8]) -> Result<Self> {
        Self::group(Apci::GroupValueWrite, source, ga, payload)
    }

    /// `GroupValue_Response` from `source`
    pub fn group_response(
        source: IndividualAddress,
        ga: GroupAddress,
        payload: &[u8],
    ) -> Result<Self> {
        Self::group(Apci::GroupValueResponse, source, ga, payload)
    }

    /// `GroupValue_Read` from `source`
    pub fn group_read(source: IndividualAddress, ga: GroupAddress) -> Self {
        Self {
            message_code: CEMIMessageCode::LDataInd,
            ctrl1: ControlField1::STANDARD,
            source,
            destination: Destination::Group(ga),
            apci: Apci::GroupValueRead,
            payload: Payload::new(),
        }
    }

    /// Same frame with a different message code
    #[must_use]
    pub fn with_message_code(mut self, message_code: CEMIMessageCode) -> Self {
        self.message_code = message_code;
        self
    }

    /// Group destination, if any
    pub fn group_address(&self) -> Option<GroupAddress> {
        match self.destination {
            Destination::Group(ga) => Some(ga),
            Destination::Individual(_) => None,
        }
    }

    /// Check if this is a group value write
    #[inline(always)]
    pub const fn is_group_write(&self) -> bool {
        matches!(self.apci, Apci::GroupValueWrite)
    }

    /// Check if this is a group value read
    #[inline(always)]
    pub const fn is_group_read(&self) -> bool {
        matches!(self.apci, Apci::GroupValueRead)
    }

    /// Check if this is a group value response
    #[inline(always)]
    pub const fn is_group_response(&self) -> bool {
        matches!(self.apci, Apci::GroupValueResponse)
    }

    /// True when the payload fits into the APCI byte
    fn is_compact(&self) -> bool {
        self.payload.len() <= 1 && self.payload.first().map_or(true, |&b| b <= 0x3F)
    }

    /// Size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        let data = if self.is_compact() { 0 } else { self.payload.len() };
        2 + LDATA_FIXED + 2 + data
    }

    /// Encode into a caller buffer, returning the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if buf.len() < len {
            return Err(KnxError::buffer_too_small());
        }

        let apci = self.apci.to_u16();
        let compact = self.is_compact();

        buf[0] = self.message_code.to_u8();
        buf[1] = 0x00; // no additional info
        buf[2] = self.ctrl1.raw();
        buf[3] = ControlField2::new(self.destination.is_group()).raw();
        buf[4..6].copy_from_slice(&self.source.raw().to_be_bytes());
        buf[6..8].copy_from_slice(&self.destination.raw().to_be_bytes());
        buf[8] = if compact { 1 } else { 1 + self.payload.len() as u8 };
        buf[9] = (apci >> 8) as u8 & 0x03;
        buf[10] = apci as u8 & 0xC0;

        if compact {
            if let Some(&value) = self.payload.first() {
                buf[10] |= value & 0x3F;
            }
        } else {
            buf[11..len].copy_from_slice(&self.payload);
        }

        Ok(len)
    }

    /// Encode into an owned buffer
    pub fn to_bytes(&self) -> Result<heapless::Vec<u8, MAX_CEMI_SIZE>> {
        let mut out = heapless::Vec::new();
        out.resize_default(self.encoded_len())
            .map_err(|_| KnxError::buffer_too_small())?;
        let len = self.encode(&mut out)?;
        out.truncate(len);
        Ok(out)
    }

    /// Decode a cEMI frame
    ///
    /// # Errors
    ///
    /// - unknown message code
    /// - additional info or APDU running past the end of `data`
    /// - more than 14 payload bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (&code, rest) = data.split_first().ok_or_else(KnxError::truncated_cemi)?;
        let message_code = CEMIMessageCode::from_u8(code).ok_or_else(KnxError::invalid_message_code)?;

        let add_info_len = usize::from(*rest.first().ok_or_else(KnxError::truncated_cemi)?);
        let ldata = data
            .get(2 + add_info_len..)
            .filter(|ldata| ldata.len() >= LDATA_FIXED)
            .ok_or_else(KnxError::truncated_cemi)?;

        let ctrl1 = ControlField1::from(ldata[0]);
        let ctrl2 = ControlField2::from(ldata[1]);
        let source = IndividualAddress::from(u16::from_be_bytes([ldata[2], ldata[3]]));
        let dest_raw = u16::from_be_bytes([ldata[4], ldata[5]]);
        let destination = if ctrl2.is_group_address() {
            Destination::Group(GroupAddress::from(dest_raw))
        } else {
            Destination::Individual(IndividualAddress::from(dest_raw))
        };

        // TPCI byte plus `data_len` more
        let apdu_len = 1 + usize::from(ldata[6]);
        let apdu = ldata
            .get(LDATA_FIXED..LDATA_FIXED + apdu_len)
            .ok_or_else(KnxError::truncated_cemi)?;

        let (apci, payload) = match apdu {
            [_tpci] => (Apci::GroupValueRead, Payload::new()),
            [tpci, apci_byte] => {
                let apci = Apci::from_bytes(*tpci, *apci_byte);
                let value = apci_byte & 0x3F;
                let mut payload = Payload::new();
                if !(apci == Apci::GroupValueRead && value == 0) {
                    // capacity is at least one
                    let _ = payload.push(value);
                }
                (apci, payload)
            }
            [tpci, apci_byte, data @ ..] => (
                Apci::from_bytes(*tpci, *apci_byte),
                Payload::from_slice(data).map_err(|_| KnxError::payload_too_large())?,
            ),
            [] => return Err(KnxError::truncated_cemi()),
        };

        Ok(Self {
            message_code,
            ctrl1,
            source,
            destination,
            apci,
            payload,
        })
    }
}

impl fmt::Display for CemiFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.apci.name(), self.source, self.destination)?;
        if !self.payload.is_empty() {
            f.write_str(" [")?;
            for (i, byte) in self.payload.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{byte:02X}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
