//! DoIP (Diagnostics over IP, ISO 13400) framing
//!
//! Every DoIP message, on UDP and TCP alike, is an 8-byte header followed
//! by `payload_length` payload bytes:
//!
//! ```text
//! ┌─────────┬─────────────┬──────────────┬────────────────┬─────────┐
//! │ version │ inv version │ payload type │ payload length │ payload │
//! │  0x02   │    0xFD     │     u16      │      u32       │  ...    │
//! └─────────┴─────────────┴──────────────┴────────────────┴─────────┘
//! ```

pub mod codec;
pub mod header;
pub mod payload;

use std::fmt;

/// Conventional DoIP port, shared by UDP discovery and TCP data
pub const DOIP_PORT: u16 = 13400;

/// Protocol version emitted and accepted by this implementation
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Bitwise inverse of [`PROTOCOL_VERSION`]
pub const INVERSE_PROTOCOL_VERSION: u8 = 0xFD;

/// Size of the fixed DoIP header
pub const HEADER_LEN: usize = 8;

/// DoIP payload types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    GenericNack,
    VehicleIdentificationRequest,
    VehicleIdentificationRequestByEid,
    VehicleIdentificationRequestByVin,
    /// Vehicle identification response / vehicle announcement
    VehicleIdentificationResponse,
    RoutingActivationRequest,
    RoutingActivationResponse,
    AliveCheckRequest,
    AliveCheckResponse,
    DiagnosticMessage,
    DiagnosticMessagePositiveAck,
    DiagnosticMessageNegativeAck,

    /// Unknown/reserved payload type
    Unknown(u16),
}

impl From<u16> for PayloadType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::GenericNack,
            0x0001 => Self::VehicleIdentificationRequest,
            0x0002 => Self::VehicleIdentificationRequestByEid,
            0x0003 => Self::VehicleIdentificationRequestByVin,
            0x0004 => Self::VehicleIdentificationResponse,
            0x0005 => Self::RoutingActivationRequest,
            0x0006 => Self::RoutingActivationResponse,
            0x0007 => Self::AliveCheckRequest,
            0x0008 => Self::AliveCheckResponse,
            0x8001 => Self::DiagnosticMessage,
            0x8002 => Self::DiagnosticMessagePositiveAck,
            0x8003 => Self::DiagnosticMessageNegativeAck,
            other => Self::Unknown(other),
        }
    }
}

impl From<PayloadType> for u16 {
    fn from(payload_type: PayloadType) -> Self {
        match payload_type {
            PayloadType::GenericNack => 0x0000,
            PayloadType::VehicleIdentificationRequest => 0x0001,
            PayloadType::VehicleIdentificationRequestByEid => 0x0002,
            PayloadType::VehicleIdentificationRequestByVin => 0x0003,
            PayloadType::VehicleIdentificationResponse => 0x0004,
            PayloadType::RoutingActivationRequest => 0x0005,
            PayloadType::RoutingActivationResponse => 0x0006,
            PayloadType::AliveCheckRequest => 0x0007,
            PayloadType::AliveCheckResponse => 0x0008,
            PayloadType::DiagnosticMessage => 0x8001,
            PayloadType::DiagnosticMessagePositiveAck => 0x8002,
            PayloadType::DiagnosticMessageNegativeAck => 0x8003,
            PayloadType::Unknown(v) => v,
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "Unknown(0x{:04X})", v),
            other => write!(f, "{:?}(0x{:04X})", other, u16::from(*other)),
        }
    }
}

/// Transport-level negative acknowledgement codes
///
/// Sent as the single payload byte of a `DiagnosticMessageNegativeAck`
/// (`0x8003`) frame when a frame cannot be turned into a UDS exchange.
/// Length failures share code `0x02` with source address failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackCode {
    /// Header version bytes did not match
    IncorrectPatternFormat,
    /// Source address reserved, not yet activated, or not the one registered
    /// on this socket
    InvalidSourceAddress,
    /// Payload too short for its payload type
    InvalidPayloadLength,
    /// Target address is not this entity
    UnknownTargetAddress,
    /// Declared payload length exceeds the configured maximum
    MessageTooLarge,
}

impl From<NackCode> for u8 {
    fn from(code: NackCode) -> Self {
        match code {
            NackCode::IncorrectPatternFormat => 0x00,
            NackCode::InvalidSourceAddress | NackCode::InvalidPayloadLength => 0x02,
            NackCode::UnknownTargetAddress => 0x03,
            NackCode::MessageTooLarge => 0x04,
        }
    }
}

/// Routing activation response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingActivationCode {
    /// Socket already activated with a different source address
    DifferentSourceAddress,
    SuccessfullyActivated,
}

impl From<RoutingActivationCode> for u8 {
    fn from(code: RoutingActivationCode) -> Self {
        match code {
            RoutingActivationCode::DifferentSourceAddress => 0x02,
            RoutingActivationCode::SuccessfullyActivated => 0x10,
        }
    }
}
