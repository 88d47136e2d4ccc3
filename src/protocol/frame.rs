//! KNXnet/IP frame parsing and encoding.
//!
//! Every datagram the server sees or sends starts with the same header:
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Header (6 bytes)           │
//! │  - Header Length: 0x06      │
//! │  - Protocol Version: 0x10   │
//! │  - Service Type: 2 bytes    │
//! │  - Total Length: 2 bytes    │
//! ├─────────────────────────────┤
//! │  Body (variable)            │
//! │  - Service-specific data    │
//! └─────────────────────────────┘
//! ```
//!
//! Parsing is zero-copy: [`KnxnetIpFrame`] borrows the receive buffer and
//! hands out the body slice bounded by the declared total length.

use crate::error::{KnxError, Result};
use crate::protocol::constants::{ServiceType, HEADER_SIZE_10, IPV4_UDP, KNXNETIP_VERSION_10};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Largest datagram [`FrameBuilder`] will produce
const MAX_BUILT_FRAME: usize = 256;

/// KNXnet/IP frame header (6 bytes)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Header Len   │ Protocol Ver │  Service Type ID    │
/// │   (1 byte)   │   (1 byte)   │     (2 bytes)       │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │           Total Length (2 bytes)                   │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnxnetIpHeader {
    /// Service type identifier
    pub service_type: ServiceType,
    /// Total length of frame (header + body)
    pub total_length: u16,
}

impl KnxnetIpHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 6;

    /// Create a header for a body of `body_length` bytes
    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Parse a header from a byte slice
    ///
    /// # Errors
    ///
    /// - buffer shorter than 6 bytes
    /// - header length byte other than 0x06
    /// - protocol version other than 0x10
    /// - unknown service type
    /// - total length smaller than the header itself
    #[inline]
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(raw) = data.get(..Self::SIZE) else {
            return Err(KnxError::invalid_frame());
        };

        if raw[0] != HEADER_SIZE_10 {
            return Err(KnxError::invalid_frame());
        }
        if raw[1] != KNXNETIP_VERSION_10 {
            return Err(KnxError::unsupported_version());
        }

        let service_type = ServiceType::from_u16(u16::from_be_bytes([raw[2], raw[3]]))
            .ok_or_else(KnxError::unsupported_service_type)?;
        let total_length = u16::from_be_bytes([raw[4], raw[5]]);

        if usize::from(total_length) < Self::SIZE {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            service_type,
            total_length,
        })
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = HEADER_SIZE_10;
        buf[1] = KNXNETIP_VERSION_10;
        buf[2..4].copy_from_slice(&self.service_type.to_u16().to_be_bytes());
        buf[4..6].copy_from_slice(&self.total_length.to_be_bytes());

        Ok(Self::SIZE)
    }

    /// Get the expected body length from the header
    pub const fn body_length(&self) -> u16 {
        self.total_length.saturating_sub(Self::SIZE as u16)
    }
}

/// Encode a complete 6-byte header for a body of `body_len` bytes.
pub fn encode_header(service_type: ServiceType, body_len: u16) -> [u8; KnxnetIpHeader::SIZE] {
    let mut out = [0u8; KnxnetIpHeader::SIZE];
    let header = KnxnetIpHeader::new(service_type, body_len);
    out[0] = HEADER_SIZE_10;
    out[1] = KNXNETIP_VERSION_10;
    out[2..4].copy_from_slice(&header.service_type.to_u16().to_be_bytes());
    out[4..6].copy_from_slice(&header.total_length.to_be_bytes());
    out
}

/// Zero-copy view of a KNXnet/IP frame
#[derive(Debug)]
pub struct KnxnetIpFrame<'a> {
    data: &'a [u8],
    header: KnxnetIpHeader,
}

impl<'a> KnxnetIpFrame<'a> {
    /// Parse a KNXnet/IP frame from a datagram.
    ///
    /// Trailing bytes beyond the declared total length are ignored; a
    /// datagram shorter than the declared length is a framing error.
    #[inline]
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = KnxnetIpHeader::parse(data)?;

        if data.len() < usize::from(header.total_length) {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self { data, header })
    }

    /// Get the frame header
    #[inline(always)]
    pub const fn header(&self) -> &KnxnetIpHeader {
        &self.header
    }

    /// Get the service type
    #[inline(always)]
    pub const fn service_type(&self) -> ServiceType {
        self.header.service_type
    }

    /// Get the frame body (payload after header)
    #[inline]
    pub fn body(&self) -> &'a [u8] {
        &self.data[KnxnetIpHeader::SIZE..usize::from(self.header.total_length)]
    }
}

/// Builder for complete KNXnet/IP frames
#[derive(Debug)]
pub struct FrameBuilder<'a> {
    service_type: ServiceType,
    body: &'a [u8],
}

impl<'a> FrameBuilder<'a> {
    /// Create a new frame builder
    pub const fn new(service_type: ServiceType, body: &'a [u8]) -> Self {
        Self { service_type, body }
    }

    /// Build the frame into a buffer, returning the number of bytes written
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let total_size = self.size();

        if total_size > MAX_BUILT_FRAME {
            return Err(KnxError::payload_too_large());
        }
        if buf.len() < total_size {
            return Err(KnxError::buffer_too_small());
        }

        let header = KnxnetIpHeader::new(self.service_type, self.body.len() as u16);
        header.encode(buf)?;
        buf[KnxnetIpHeader::SIZE..total_size].copy_from_slice(self.body);

        Ok(total_size)
    }

    /// Calculate the total frame size
    pub const fn size(&self) -> usize {
        KnxnetIpHeader::SIZE + self.body.len()
    }
}

/// Host Protocol Address Information (HPAI)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Structure Len│ Host Protocol│   IP Address        │
/// │   (1 byte)   │   (1 byte)   │   (4 bytes IPv4)    │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │                Port (2 bytes)                      │
/// └────────────────────────────────────────────────────┘
/// ```
///
/// An all-zero address and port ("route back") asks the server to reply to
/// whatever source address the datagram arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hpai {
    /// Host protocol code
    pub host_protocol: u8,
    /// IPv4 address (4 bytes)
    pub ip_address: [u8; 4],
    /// UDP port
    pub port: u16,
}

impl Hpai {
    /// Size of HPAI structure for IPv4
    pub const SIZE: usize = 8;

    /// The route-back endpoint 0.0.0.0:0
    pub const UNSPECIFIED: Self = Self::new([0, 0, 0, 0], 0);

    /// Create a new HPAI for IPv4 UDP
    pub const fn new(ip_address: [u8; 4], port: u16) -> Self {
        Self {
            host_protocol: IPV4_UDP,
            ip_address,
            port,
        }
    }

    /// Parse HPAI from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(raw) = data.get(..Self::SIZE) else {
            return Err(KnxError::invalid_frame());
        };

        if usize::from(raw[0]) != Self::SIZE {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            host_protocol: raw[1],
            ip_address: [raw[2], raw[3], raw[4], raw[5]],
            port: u16::from_be_bytes([raw[6], raw[7]]),
        })
    }

    /// Encode HPAI into bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = Self::SIZE as u8;
        buf[1] = self.host_protocol;
        buf[2..6].copy_from_slice(&self.ip_address);
        buf[6..8].copy_from_slice(&self.port.to_be_bytes());

        Ok(Self::SIZE)
    }

    /// True when the endpoint is 0.0.0.0:0
    pub fn is_route_back(&self) -> bool {
        self.ip_address == [0, 0, 0, 0] && self.port == 0
    }

    /// Stated endpoint, or `None` for route-back
    pub fn endpoint(&self) -> Option<SocketAddrV4> {
        (!self.is_route_back()).then(|| SocketAddrV4::new(Ipv4Addr::from(self.ip_address), self.port))
    }
}

impl From<SocketAddrV4> for Hpai {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(addr.ip().octets(), addr.port())
    }
}
