//! KNXnet/IP protocol constants and service type identifiers.

/// KNXnet/IP protocol version 1.0
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// Receive buffer size used by the server loop
pub const MAX_FRAME_SIZE: usize = 1024;

/// Largest cEMI frame the simulator builds: 10 fixed bytes, two APCI bytes,
/// and a 14-byte payload
pub const MAX_CEMI_SIZE: usize = 26;

/// Largest application payload carried by one telegram (standard frame)
pub const MAX_PAYLOAD_SIZE: usize = 14;

// =============================================================================
// Service Type Identifiers
// =============================================================================

/// KNXnet/IP service type identifiers recognised by the simulator.
///
/// Discovery and routing services are recognised so they can be logged and
/// ignored; only the tunnelling profile is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServiceType {
    /// `SEARCH_REQUEST` - Device discovery request
    SearchRequest = 0x0201,
    /// `SEARCH_RESPONSE` - Device discovery response
    SearchResponse = 0x0202,
    /// `DESCRIPTION_REQUEST` - Device description request
    DescriptionRequest = 0x0203,
    /// `DESCRIPTION_RESPONSE` - Device description response
    DescriptionResponse = 0x0204,
    /// `CONNECT_REQUEST` - Connection request
    ConnectRequest = 0x0205,
    /// `CONNECT_RESPONSE` - Connection response
    ConnectResponse = 0x0206,
    /// `CONNECTIONSTATE_REQUEST` - Connection state request (heartbeat)
    ConnectionstateRequest = 0x0207,
    /// `CONNECTIONSTATE_RESPONSE` - Connection state response
    ConnectionstateResponse = 0x0208,
    /// `DISCONNECT_REQUEST` - Disconnect request
    DisconnectRequest = 0x0209,
    /// `DISCONNECT_RESPONSE` - Disconnect response
    DisconnectResponse = 0x020A,
    /// `TUNNELLING_REQUEST` - Tunnelling data request
    TunnellingRequest = 0x0420,
    /// `TUNNELLING_ACK` - Tunnelling acknowledgement
    TunnellingAck = 0x0421,
    /// `ROUTING_INDICATION` - Routing indication (multicast)
    RoutingIndication = 0x0530,
}

impl ServiceType {
    /// Convert a u16 to `ServiceType`
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0201 => Some(Self::SearchRequest),
            0x0202 => Some(Self::SearchResponse),
            0x0203 => Some(Self::DescriptionRequest),
            0x0204 => Some(Self::DescriptionResponse),
            0x0205 => Some(Self::ConnectRequest),
            0x0206 => Some(Self::ConnectResponse),
            0x0207 => Some(Self::ConnectionstateRequest),
            0x0208 => Some(Self::ConnectionstateResponse),
            0x0209 => Some(Self::DisconnectRequest),
            0x020A => Some(Self::DisconnectResponse),
            0x0420 => Some(Self::TunnellingRequest),
            0x0421 => Some(Self::TunnellingAck),
            0x0530 => Some(Self::RoutingIndication),
            _ => None,
        }
    }

    /// Convert `ServiceType` to u16
    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Connection Type Codes
// =============================================================================

/// Connection type for `DEVICE_MGMT_CONNECTION`
pub const DEVICE_MGMT_CONNECTION: u8 = 0x03;

/// Connection type for `TUNNEL_CONNECTION`
pub const TUNNEL_CONNECTION: u8 = 0x04;

/// KNX layer for link-layer tunnelling
pub const TUNNEL_LINKLAYER: u8 = 0x02;

// =============================================================================
// Host Protocol Codes
// =============================================================================

/// IPv4 UDP protocol
pub const IPV4_UDP: u8 = 0x01;

// =============================================================================
// Status Codes
// =============================================================================

/// Operation successful
pub const E_NO_ERROR: u8 = 0x00;

/// Channel id unknown to the server
pub const E_CONNECTION_ID: u8 = 0x21;

/// Connection type not supported
pub const E_CONNECTION_TYPE: u8 = 0x22;

/// Connection option not supported
pub const E_CONNECTION_OPTION: u8 = 0x23;

/// No free channel id
pub const E_NO_MORE_CONNECTIONS: u8 = 0x24;

/// Data connection error
pub const E_DATA_CONNECTION: u8 = 0x26;

/// KNX subnetwork connection error
pub const E_KNX_CONNECTION: u8 = 0x27;

// =============================================================================
// cEMI Message Codes
// =============================================================================

/// cEMI message codes for link-layer data frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CEMIMessageCode {
    /// `L_Data.req` - Data request (client to bus)
    LDataReq = 0x11,
    /// `L_Data.ind` - Data indication (bus to client)
    LDataInd = 0x29,
    /// `L_Data.con` - Data confirmation
    LDataCon = 0x2E,
}

impl CEMIMessageCode {
    /// Convert u8 to `CEMIMessageCode`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x11 => Some(Self::LDataReq),
            0x29 => Some(Self::LDataInd),
            0x2E => Some(Self::LDataCon),
            _ => None,
        }
    }

    /// Convert `CEMIMessageCode` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_round_trip() {
        for raw in [0x0205, 0x0206, 0x0207, 0x0208, 0x0209, 0x020A, 0x0420, 0x0421] {
            let service = ServiceType::from_u16(raw).unwrap();
            assert_eq!(service.to_u16(), raw);
        }
        assert_eq!(ServiceType::from_u16(0x0950), None);
    }

    #[test]
    fn test_message_codes() {
        assert_eq!(CEMIMessageCode::from_u8(0x29), Some(CEMIMessageCode::LDataInd));
        assert_eq!(CEMIMessageCode::LDataReq.to_u8(), 0x11);
        assert_eq!(CEMIMessageCode::from_u8(0x2B), None);
    }
}
