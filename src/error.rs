//! Error types for the simulator.
//!
//! Every fallible operation returns [`KnxError`]. The enum groups failures by
//! the layer that detected them, and each group carries a structured error
//! with a private kind and a captured backtrace:
//!
//! | Category     | Raised by                                   | Handling             |
//! |--------------|---------------------------------------------|----------------------|
//! | `Protocol`   | header / HPAI / cEMI framing                | logged, datagram dropped |
//! | `Connection` | channel table (unknown id, table full)      | answered with a KNX status |
//! | `Transport`  | UDP socket I/O                              | logged, loop keeps polling |
//! | `Addressing` | IA / GA text and range checks               | surfaced to caller   |
//! | `Dpt`        | datapoint encode / decode                   | surfaced to caller   |
//! | `Device`     | device construction and channel tables      | surfaced to configuration |
//! | `Config`     | configuration file loading                  | surfaced to the binary |

use core::fmt;
use std::backtrace::Backtrace;

/// Result type alias for simulator operations.
pub type Result<T> = core::result::Result<T, KnxError>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Framing error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    InvalidFrame,
    UnsupportedVersion,
    UnsupportedServiceType,
    PayloadTooLarge,
    InvalidMessageCode,
    TruncatedCemi,
}

/// Channel table error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConnectionErrorKind {
    ChannelNotFound,
    NoFreeChannels,
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    SendFailed,
    ReceiveFailed,
    BufferTooSmall,
    BindFailed,
    SpawnFailed,
}

/// Addressing error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AddressingErrorKind {
    InvalidIndividualAddress,
    InvalidGroupAddress,
    OutOfRange,
}

/// DPT error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DptErrorKind {
    InvalidData,
    ValueOutOfRange,
    UnsupportedType,
    TypeMismatch,
}

/// Device error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DeviceErrorKind {
    UnknownDeviceType,
    UnknownDevice,
    DuplicateDevice,
    ChannelConflict,
    UnknownField,
    MissingTemplate,
}

/// Configuration error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConfigErrorKind {
    Io,
    Parse,
    Invalid,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// Simulator error type.
///
/// This is the main error type returned by all operations. Each variant wraps
/// a structured error that captures a backtrace and exposes `is_*` helpers.
#[derive(Debug)]
pub enum KnxError {
    /// Framing errors (header, HPAI, cEMI)
    Protocol(ProtocolError),
    /// Channel lifecycle errors answered with a KNX status code
    Connection(ConnectionError),
    /// Socket errors
    Transport(TransportError),
    /// Address parsing and range errors
    Addressing(AddressingError),
    /// Datapoint Type errors (encoding, decoding, lookup)
    Dpt(DptError),
    /// Device construction and routing errors
    Device(DeviceError),
    /// Configuration loading errors
    Config(ConfigError),
    /// Operation not valid in the current state
    InvalidState,
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Framing error with backtrace
#[derive(Debug)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    backtrace: Backtrace,
}

impl ProtocolError {
    pub(crate) fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if this is an invalid frame error
    pub fn is_invalid_frame(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidFrame)
    }

    /// Check if this is an unsupported version error
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedVersion)
    }

    /// Check if the service type was not recognised
    pub fn is_unsupported_service_type(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedServiceType)
    }

    /// Check if a cEMI frame ended early
    pub fn is_truncated(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::TruncatedCemi)
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Channel table error with backtrace
#[derive(Debug)]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    backtrace: Backtrace,
}

impl ConnectionError {
    pub(crate) fn new(kind: ConnectionErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the channel id is not in the table
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::ChannelNotFound)
    }

    /// Check if every channel id is taken
    pub fn is_no_free_channels(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::NoFreeChannels)
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Transport error with the underlying I/O error
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    source: Option<std::io::Error>,
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn with_source(kind: TransportErrorKind, source: std::io::Error) -> Self {
        Self {
            kind,
            source: Some(source),
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if buffer is too small
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BufferTooSmall)
    }

    /// Check if the socket could not be bound
    pub fn is_bind_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BindFailed)
    }

    /// Check if a worker thread could not be started
    pub fn is_spawn_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::SpawnFailed)
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Addressing error with backtrace
#[derive(Debug)]
pub struct AddressingError {
    kind: AddressingErrorKind,
    backtrace: Backtrace,
}

impl AddressingError {
    pub(crate) fn new(kind: AddressingErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if address is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::OutOfRange)
    }

    /// Check if a group address failed to parse
    pub fn is_invalid_group_address(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::InvalidGroupAddress)
    }

    /// Check if an individual address failed to parse
    pub fn is_invalid_individual_address(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::InvalidIndividualAddress)
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// DPT error with backtrace
#[derive(Debug)]
pub struct DptError {
    kind: DptErrorKind,
    backtrace: Backtrace,
}

impl DptError {
    pub(crate) fn new(kind: DptErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if value is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, DptErrorKind::ValueOutOfRange)
    }

    /// Check if the DPT id is not registered
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, DptErrorKind::UnsupportedType)
    }

    /// Check if the payload was too short or malformed
    pub fn is_invalid_data(&self) -> bool {
        matches!(self.kind, DptErrorKind::InvalidData)
    }

    /// Check if the value variant does not fit the DPT
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, DptErrorKind::TypeMismatch)
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Device error with the offending name
#[derive(Debug)]
pub struct DeviceError {
    kind: DeviceErrorKind,
    detail: String,
    backtrace: Backtrace,
}

impl DeviceError {
    pub(crate) fn new(kind: DeviceErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the device type is not registered
    pub fn is_unknown_device_type(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::UnknownDeviceType)
    }

    /// Check if no device has the requested id
    pub fn is_unknown_device(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::UnknownDevice)
    }

    /// Check if a device id was registered twice
    pub fn is_duplicate_device(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::DuplicateDevice)
    }

    /// Check if two group addresses claim the same channel slot
    pub fn is_channel_conflict(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::ChannelConflict)
    }

    /// Check if a state field is unknown to the device
    pub fn is_unknown_field(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::UnknownField)
    }

    /// Name of the device, type, field or GA that caused the error
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Configuration error with a message
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    message: String,
    backtrace: Backtrace,
}

impl ConfigError {
    pub(crate) fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the file could not be read
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::Io)
    }

    /// Check if the file is not valid TOML for the schema
    pub fn is_parse(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::Parse)
    }

    /// Check if the parsed values are inconsistent
    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::Invalid)
    }

    /// Human readable description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Backtrace captured at construction
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

// =============================================================================
// Convenience Constructors for KnxError
// =============================================================================

impl KnxError {
    // Framing errors
    pub(crate) fn invalid_frame() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidFrame))
    }

    pub(crate) fn unsupported_version() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnsupportedVersion))
    }

    pub(crate) fn unsupported_service_type() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnsupportedServiceType))
    }

    pub(crate) fn payload_too_large() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::PayloadTooLarge))
    }

    pub(crate) fn invalid_message_code() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidMessageCode))
    }

    pub(crate) fn truncated_cemi() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::TruncatedCemi))
    }

    // Channel table errors
    pub(crate) fn channel_not_found() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::ChannelNotFound))
    }

    pub(crate) fn no_free_channels() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::NoFreeChannels))
    }

    // Transport errors
    pub(crate) fn buffer_too_small() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::BufferTooSmall))
    }

    pub(crate) fn send_failed(source: std::io::Error) -> Self {
        Self::Transport(TransportError::with_source(
            TransportErrorKind::SendFailed,
            source,
        ))
    }

    pub(crate) fn receive_failed(source: std::io::Error) -> Self {
        Self::Transport(TransportError::with_source(
            TransportErrorKind::ReceiveFailed,
            source,
        ))
    }

    pub(crate) fn bind_failed(source: std::io::Error) -> Self {
        Self::Transport(TransportError::with_source(
            TransportErrorKind::BindFailed,
            source,
        ))
    }

    pub(crate) fn spawn_failed(source: std::io::Error) -> Self {
        Self::Transport(TransportError::with_source(
            TransportErrorKind::SpawnFailed,
            source,
        ))
    }

    // Addressing errors
    pub(crate) fn invalid_group_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidGroupAddress))
    }

    pub(crate) fn invalid_individual_address() -> Self {
        Self::Addressing(AddressingError::new(
            AddressingErrorKind::InvalidIndividualAddress,
        ))
    }

    pub(crate) fn address_out_of_range() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::OutOfRange))
    }

    // DPT errors
    pub(crate) fn invalid_dpt_data() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::InvalidData))
    }

    pub(crate) fn dpt_value_out_of_range() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::ValueOutOfRange))
    }

    pub(crate) fn unsupported_dpt() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::UnsupportedType))
    }

    pub(crate) fn dpt_type_mismatch() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::TypeMismatch))
    }

    // Device errors
    pub(crate) fn unknown_device_type(name: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::UnknownDeviceType, name))
    }

    pub(crate) fn unknown_device(id: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::UnknownDevice, id))
    }

    pub(crate) fn duplicate_device(id: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::DuplicateDevice, id))
    }

    pub(crate) fn channel_conflict(ga_name: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::ChannelConflict, ga_name))
    }

    pub(crate) fn unknown_field(field: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::UnknownField, field))
    }

    pub(crate) fn missing_template(device_id: &str) -> Self {
        Self::Device(DeviceError::new(DeviceErrorKind::MissingTemplate, device_id))
    }

    // Configuration errors
    pub(crate) fn config_io(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::Io, message))
    }

    pub(crate) fn config_parse(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::Parse, message))
    }

    pub(crate) fn config_invalid(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::Invalid, message))
    }
}

// =============================================================================
// Category Accessors
// =============================================================================

impl KnxError {
    /// Framing error, if this is one
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }

    /// Channel table error, if this is one
    pub fn as_connection(&self) -> Option<&ConnectionError> {
        match self {
            Self::Connection(e) => Some(e),
            _ => None,
        }
    }

    /// Socket error, if this is one
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Datapoint error, if this is one
    pub fn as_dpt(&self) -> Option<&DptError> {
        match self {
            Self::Dpt(e) => Some(e),
            _ => None,
        }
    }

    /// Device error, if this is one
    pub fn as_device(&self) -> Option<&DeviceError> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }

    /// Configuration error, if this is one
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }

    /// True for any datapoint encode / decode / lookup failure
    pub fn is_dpt_error(&self) -> bool {
        matches!(self, Self::Dpt(_))
    }

    /// True for malformed input that should be dropped without a reply
    pub fn is_framing_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Addressing(_))
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            KnxError::Connection(e) => write!(f, "Connection error: {:?}", e.kind),
            KnxError::Transport(e) => match &e.source {
                Some(source) => write!(f, "Transport error: {:?} ({source})", e.kind),
                None => write!(f, "Transport error: {:?}", e.kind),
            },
            KnxError::Addressing(e) => write!(f, "Addressing error: {:?}", e.kind),
            KnxError::Dpt(e) => write!(f, "DPT error: {:?}", e.kind),
            KnxError::Device(e) => write!(f, "Device error: {:?} '{}'", e.kind, e.detail),
            KnxError::Config(e) => write!(f, "Configuration error: {:?}: {}", e.kind, e.message),
            KnxError::InvalidState => write!(f, "Invalid state"),
        }
    }
}

impl std::error::Error for KnxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KnxError::Transport(e) => e
                .source
                .as_ref()
                .map(|source| source as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}
