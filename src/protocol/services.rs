//! KNXnet/IP tunnelling service bodies.
//!
//! Each service has a `parse` for the body of a received frame and a `build`
//! that writes a complete frame (header included) into a caller buffer. The
//! server parses requests and builds responses; the request builders and
//! response parsers are what a tunnelling client uses, and the tests drive
//! the server through them.
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                          Server
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELING_REQUEST ------>|
//!   |<------ TUNNELING_ACK ----------|
//!   |<------ TUNNELING_REQUEST ------|  (device response, if any)
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::constants::{ServiceType, TUNNEL_CONNECTION, TUNNEL_LINKLAYER};
use crate::protocol::frame::{Hpai, KnxnetIpHeader};

/// Write the header and return the offset of the body.
fn begin_frame(buf: &mut [u8], service_type: ServiceType, body_len: usize) -> Result<usize> {
    if buf.len() < KnxnetIpHeader::SIZE + body_len {
        return Err(KnxError::buffer_too_small());
    }
    KnxnetIpHeader::new(service_type, body_len as u16).encode(buf)
}

/// Connection Request Information (CRI)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionRequestInfo {
    /// Connection type (`TUNNEL_CONNECTION` = 0x04)
    pub connection_type: u8,
    /// KNX layer (`TUNNEL_LINKLAYER` = 0x02), zero when absent
    pub knx_layer: u8,
}

impl ConnectionRequestInfo {
    /// Structure length of a tunnelling CRI
    pub const SIZE: usize = 4;

    /// CRI for a link-layer tunnel
    pub const fn tunnel_link_layer() -> Self {
        Self {
            connection_type: TUNNEL_CONNECTION,
            knx_layer: TUNNEL_LINKLAYER,
        }
    }

    /// True when the client asked for a tunnelling connection
    pub const fn is_tunnel(&self) -> bool {
        self.connection_type == TUNNEL_CONNECTION
    }

    /// Encode CRI to bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = Self::SIZE as u8;
        buf[1] = self.connection_type;
        buf[2] = self.knx_layer;
        buf[3] = 0x00;

        Ok(Self::SIZE)
    }

    /// Decode CRI from bytes.
    ///
    /// Management connections send a 2-byte CRI, so only the type byte is
    /// mandatory.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let length = usize::from(*data.first().ok_or_else(KnxError::invalid_frame)?);
        if length < 2 || data.len() < length {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            connection_type: data[1],
            knx_layer: if length > 2 { data[2] } else { 0 },
        })
    }
}

/// `CONNECT_REQUEST` service (0x0205)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Control endpoint (for connection management)
    pub control_endpoint: Hpai,
    /// Data endpoint (for tunnelling data)
    pub data_endpoint: Hpai,
    /// Connection request information
    pub cri: ConnectionRequestInfo,
}

impl ConnectRequest {
    /// Create a link-layer tunnel `CONNECT_REQUEST`
    pub const fn new(control_endpoint: Hpai, data_endpoint: Hpai) -> Self {
        Self {
            control_endpoint,
            data_endpoint,
            cri: ConnectionRequestInfo::tunnel_link_layer(),
        }
    }

    /// Parse from frame body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let control_endpoint = Hpai::parse(body)?;
        let data_endpoint = Hpai::parse(body.get(Hpai::SIZE..).unwrap_or_default())?;
        let cri = ConnectionRequestInfo::decode(body.get(2 * Hpai::SIZE..).unwrap_or_default())?;

        Ok(Self {
            control_endpoint,
            data_endpoint,
            cri,
        })
    }

    /// Build the complete frame
    ///
    /// Returns the number of bytes written to the buffer
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = begin_frame(
            buf,
            ServiceType::ConnectRequest,
            2 * Hpai::SIZE + ConnectionRequestInfo::SIZE,
        )?;
        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        offset += self.data_endpoint.encode(&mut buf[offset..])?;
        offset += self.cri.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

/// `CONNECT_RESPONSE` service (0x0206)
///
/// The body always carries the data endpoint and the CRD, also when the
/// status is an error; some clients read those fields unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    /// Communication channel ID (0 on error)
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
    /// Data endpoint of the server
    pub data_endpoint: Hpai,
    /// Individual address assigned to the tunnel
    pub individual_address: IndividualAddress,
}

impl ConnectResponse {
    /// Body length: channel, status, HPAI and a 4-byte CRD
    pub const BODY_SIZE: usize = 2 + Hpai::SIZE + 4;

    /// Successful response for `channel_id`
    pub const fn accepted(channel_id: u8, individual_address: IndividualAddress) -> Self {
        Self {
            channel_id,
            status: 0,
            data_endpoint: Hpai::UNSPECIFIED,
            individual_address,
        }
    }

    /// Error response with channel 0
    pub const fn rejected(status: u8) -> Self {
        Self {
            channel_id: 0,
            status,
            data_endpoint: Hpai::UNSPECIFIED,
            individual_address: IndividualAddress::from_parts(0, 0, 0),
        }
    }

    /// Build the complete frame
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = begin_frame(buf, ServiceType::ConnectResponse, Self::BODY_SIZE)?;

        buf[offset] = self.channel_id;
        buf[offset + 1] = self.status;
        offset += 2;
        offset += self.data_endpoint.encode(&mut buf[offset..])?;

        buf[offset] = 4; // CRD length
        buf[offset + 1] = TUNNEL_CONNECTION;
        offset += 2;
        offset += self.individual_address.encode(&mut buf[offset..])?;

        Ok(offset)
    }

    /// Parse from frame body
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < Self::BODY_SIZE {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            channel_id: body[0],
            status: body[1],
            data_endpoint: Hpai::parse(&body[2..10])?,
            individual_address: IndividualAddress::decode(&body[12..14])?,
        })
    }

    /// Check if connection was successful
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Shared shape of `CONNECTIONSTATE_REQUEST` and `DISCONNECT_REQUEST`:
/// channel id, a reserved byte and the control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Communication channel ID
    pub channel_id: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl ChannelRequest {
    /// Create a request for `channel_id`
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            control_endpoint,
        }
    }

    /// Parse from frame body
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < 2 {
            return Err(KnxError::invalid_frame());
        }
        // Only the channel id is acted upon; a missing endpoint means route-back.
        let control_endpoint = match body.get(2..) {
            Some(rest) if rest.len() >= Hpai::SIZE => Hpai::parse(rest)?,
            _ => Hpai::UNSPECIFIED,
        };

        Ok(Self {
            channel_id: body[0],
            control_endpoint,
        })
    }

    /// Build the complete frame for `service_type`
    pub fn build(&self, service_type: ServiceType, buf: &mut [u8]) -> Result<usize> {
        let mut offset = begin_frame(buf, service_type, 2 + Hpai::SIZE)?;
        buf[offset] = self.channel_id;
        buf[offset + 1] = 0x00;
        offset += 2;
        offset += self.control_endpoint.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

/// `CONNECTIONSTATE_REQUEST` service (0x0207)
pub type ConnectionStateRequest = ChannelRequest;

/// `DISCONNECT_REQUEST` service (0x0209)
pub type DisconnectRequest = ChannelRequest;

/// Shared shape of `CONNECTIONSTATE_RESPONSE` and `DISCONNECT_RESPONSE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl ChannelResponse {
    /// Create a response
    pub const fn new(channel_id: u8, status: u8) -> Self {
        Self { channel_id, status }
    }

    /// Parse from frame body
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < 2 {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            channel_id: body[0],
            status: body[1],
        })
    }

    /// Build the complete frame for `service_type`
    pub fn build(&self, service_type: ServiceType, buf: &mut [u8]) -> Result<usize> {
        let offset = begin_frame(buf, service_type, 2)?;
        buf[offset] = self.channel_id;
        buf[offset + 1] = self.status;
        Ok(offset + 2)
    }

    /// Check if the request was accepted
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// `CONNECTIONSTATE_RESPONSE` service (0x0208)
pub type ConnectionStateResponse = ChannelResponse;

/// `DISCONNECT_RESPONSE` service (0x020A)
pub type DisconnectResponse = ChannelResponse;

/// Connection header of tunnelling requests and acknowledgements
///
/// The fourth byte is reserved in requests and carries the status in acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHeader {
    /// Communication channel ID
    pub channel_id: u8,
    /// Sequence counter
    pub sequence_counter: u8,
    /// Status (acks) or reserved (requests)
    pub status: u8,
}

impl ConnectionHeader {
    /// Structure length
    pub const SIZE: usize = 4;

    /// Create a new connection header
    pub const fn new(channel_id: u8, sequence_counter: u8) -> Self {
        Self {
            channel_id,
            sequence_counter,
            status: 0,
        }
    }

    /// Encode to bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(KnxError::buffer_too_small());
        }

        buf[0] = Self::SIZE as u8;
        buf[1] = self.channel_id;
        buf[2] = self.sequence_counter;
        buf[3] = self.status;

        Ok(Self::SIZE)
    }

    /// Decode from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let Some(raw) = data.get(..Self::SIZE) else {
            return Err(KnxError::invalid_frame());
        };
        if usize::from(raw[0]) != Self::SIZE {
            return Err(KnxError::invalid_frame());
        }

        Ok(Self {
            channel_id: raw[1],
            sequence_counter: raw[2],
            status: raw[3],
        })
    }
}

/// `TUNNELING_REQUEST` service (0x0420)
#[derive(Debug)]
pub struct TunnelingRequest<'a> {
    /// Connection header
    pub connection_header: ConnectionHeader,
    /// cEMI frame data
    pub cemi_data: &'a [u8],
}

impl<'a> TunnelingRequest<'a> {
    /// Create a new `TUNNELING_REQUEST`
    pub const fn new(connection_header: ConnectionHeader, cemi_data: &'a [u8]) -> Self {
        Self {
            connection_header,
            cemi_data,
        }
    }

    /// Build the complete frame
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = begin_frame(
            buf,
            ServiceType::TunnellingRequest,
            ConnectionHeader::SIZE + self.cemi_data.len(),
        )?;
        offset += self.connection_header.encode(&mut buf[offset..])?;
        buf[offset..offset + self.cemi_data.len()].copy_from_slice(self.cemi_data);
        Ok(offset + self.cemi_data.len())
    }

    /// Parse from frame body
    pub fn parse(body: &'a [u8]) -> Result<Self> {
        let connection_header = ConnectionHeader::decode(body)?;

        Ok(Self {
            connection_header,
            cemi_data: &body[ConnectionHeader::SIZE..],
        })
    }
}

/// `TUNNELING_ACK` service (0x0421), 10 bytes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelingAck {
    /// Connection header with the status in its last byte
    pub connection_header: ConnectionHeader,
}

impl TunnelingAck {
    /// Acknowledge `sequence_counter` on `channel_id` with `status`
    pub const fn new(channel_id: u8, sequence_counter: u8, status: u8) -> Self {
        Self {
            connection_header: ConnectionHeader {
                channel_id,
                sequence_counter,
                status,
            },
        }
    }

    /// Build the complete frame
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        let offset = begin_frame(buf, ServiceType::TunnellingAck, ConnectionHeader::SIZE)?;
        Ok(offset + self.connection_header.encode(&mut buf[offset..])?)
    }

    /// Parse from frame body
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(Self {
            connection_header: ConnectionHeader::decode(body)?,
        })
    }

    /// Status carried by the ack
    pub const fn status(&self) -> u8 {
        self.connection_header.status
    }

    /// Check if request was acknowledged successfully
    pub const fn is_ok(&self) -> bool {
        self.connection_header.status == 0
    }
}
