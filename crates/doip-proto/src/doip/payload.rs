//! Typed DoIP payloads
//!
//! Each payload knows its own byte layout; headers are added by
//! [`encode_frame`](super::codec::encode_frame).

use bytes::Bytes;

use super::RoutingActivationCode;
use crate::error::DoipError;

/// Length of the VIN field in identity payloads
pub const VIN_LEN: usize = 17;

/// Length of the entity ID (EID) field
pub const EID_LEN: usize = 6;

/// Length of the group ID (GID) field on the wire
pub const GID_LEN: usize = 6;

/// Fixed size of a vehicle identification response payload
pub const VEHICLE_IDENTIFICATION_LEN: usize = VIN_LEN + 2 + EID_LEN + GID_LEN + 1 + 1;

fn ensure_len(payload: &'static str, bytes: &[u8], expected: usize) -> Result<(), DoipError> {
    if bytes.len() < expected {
        return Err(DoipError::PayloadTooShort {
            payload,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Routing activation request (`0x0005`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingActivationRequest {
    pub source_address: u16,
    pub activation_type: u8,
}

impl RoutingActivationRequest {
    /// Source address, activation type and at least one reserved byte
    pub const MIN_LEN: usize = 4;

    pub fn parse(payload: &[u8]) -> Result<Self, DoipError> {
        ensure_len("RoutingActivationRequest", payload, Self::MIN_LEN)?;
        Ok(Self {
            source_address: u16::from_be_bytes([payload[0], payload[1]]),
            activation_type: payload[2],
        })
    }

    /// Encode with the four reserved bytes zeroed
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7);
        out.extend_from_slice(&self.source_address.to_be_bytes());
        out.push(self.activation_type);
        out.extend_from_slice(&[0x00; 4]);
        out
    }
}

/// Routing activation response (`0x0006`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingActivationResponse {
    pub tester_address: u16,
    pub entity_address: u16,
    pub code: u8,
}

impl RoutingActivationResponse {
    pub const LEN: usize = 6;

    pub fn new(tester_address: u16, entity_address: u16, code: RoutingActivationCode) -> Self {
        Self {
            tester_address,
            entity_address,
            code: code.into(),
        }
    }

    /// `[tester(2), entity(2), code(1), reserved(1)]`
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&self.tester_address.to_be_bytes());
        out.extend_from_slice(&self.entity_address.to_be_bytes());
        out.push(self.code);
        out.push(0x00);
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self, DoipError> {
        ensure_len("RoutingActivationResponse", payload, 5)?;
        Ok(Self {
            tester_address: u16::from_be_bytes([payload[0], payload[1]]),
            entity_address: u16::from_be_bytes([payload[2], payload[3]]),
            code: payload[4],
        })
    }
}

/// Diagnostic message (`0x8001`): addressing prefix plus UDS bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub source_address: u16,
    pub target_address: u16,
    pub user_data: Bytes,
}

impl DiagnosticMessage {
    /// Source and target addresses
    pub const ADDRESSING_LEN: usize = 4;

    pub fn new(source_address: u16, target_address: u16, user_data: impl Into<Bytes>) -> Self {
        Self {
            source_address,
            target_address,
            user_data: user_data.into(),
        }
    }

    /// Parse the addressing prefix; `user_data` may be empty
    pub fn parse(payload: &Bytes) -> Result<Self, DoipError> {
        ensure_len("DiagnosticMessage", payload, Self::ADDRESSING_LEN)?;
        Ok(Self {
            source_address: u16::from_be_bytes([payload[0], payload[1]]),
            target_address: u16::from_be_bytes([payload[2], payload[3]]),
            user_data: payload.slice(Self::ADDRESSING_LEN..),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ADDRESSING_LEN + self.user_data.len());
        out.extend_from_slice(&self.source_address.to_be_bytes());
        out.extend_from_slice(&self.target_address.to_be_bytes());
        out.extend_from_slice(&self.user_data);
        out
    }
}

/// Positive diagnostic message acknowledgement (`0x8002`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticMessageAck {
    pub source_address: u16,
    pub target_address: u16,
}

impl DiagnosticMessageAck {
    pub const ACK_CODE: u8 = 0x00;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5);
        out.extend_from_slice(&self.source_address.to_be_bytes());
        out.extend_from_slice(&self.target_address.to_be_bytes());
        out.push(Self::ACK_CODE);
        out
    }
}

/// Alive check response payload: the echoed source address
pub fn alive_check_response(source_address: u16) -> [u8; 2] {
    source_address.to_be_bytes()
}

/// Source address carried by an alive check request, if any
pub fn alive_check_source(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Vehicle identification response (`0x0004`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleIdentification {
    pub vin: [u8; VIN_LEN],
    pub logical_address: u16,
    pub eid: [u8; EID_LEN],
    pub gid: [u8; GID_LEN],
    pub further_action_required: u8,
    pub sync_status: u8,
}

impl VehicleIdentification {
    /// `VIN(17) + logical address(2) + EID(6) + GID(6) + further action(1) + sync status(1)`
    pub fn encode(&self) -> [u8; VEHICLE_IDENTIFICATION_LEN] {
        let mut out = [0u8; VEHICLE_IDENTIFICATION_LEN];
        out[..17].copy_from_slice(&self.vin);
        out[17..19].copy_from_slice(&self.logical_address.to_be_bytes());
        out[19..25].copy_from_slice(&self.eid);
        out[25..31].copy_from_slice(&self.gid);
        out[31] = self.further_action_required;
        out[32] = self.sync_status;
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self, DoipError> {
        ensure_len("VehicleIdentification", payload, VEHICLE_IDENTIFICATION_LEN)?;
        let mut vin = [0u8; VIN_LEN];
        vin.copy_from_slice(&payload[..17]);
        let mut eid = [0u8; EID_LEN];
        eid.copy_from_slice(&payload[19..25]);
        let mut gid = [0u8; GID_LEN];
        gid.copy_from_slice(&payload[25..31]);
        Ok(Self {
            vin,
            logical_address: u16::from_be_bytes([payload[17], payload[18]]),
            eid,
            gid,
            further_action_required: payload[31],
            sync_status: payload[32],
        })
    }

    pub fn vin_string(&self) -> String {
        String::from_utf8_lossy(&self.vin)
            .trim_matches(char::from(0))
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_routing_activation_request_min_len() {
        let request = RoutingActivationRequest::parse(&[0x0E, 0x80, 0x01, 0x00]).unwrap();
        assert_eq!(request.source_address, 0x0E80);
        assert_eq!(request.activation_type, 0x01);

        assert_eq!(
            RoutingActivationRequest::parse(&[0x0E, 0x80, 0x01]),
            Err(DoipError::PayloadTooShort {
                payload: "RoutingActivationRequest",
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_routing_activation_request_encode_iso_layout() {
        let request = RoutingActivationRequest {
            source_address: 0x0E80,
            activation_type: 0x00,
        };
        assert_eq!(request.encode(), vec![0x0E, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_routing_activation_response_layout() {
        let response = RoutingActivationResponse::new(
            0x0E80,
            0x0001,
            RoutingActivationCode::SuccessfullyActivated,
        );
        assert_eq!(response.encode(), vec![0x0E, 0x80, 0x00, 0x01, 0x10, 0x00]);
        assert_eq!(RoutingActivationResponse::parse(&response.encode()).unwrap(), response);
    }

    #[test]
    fn test_diagnostic_message_split() {
        let payload = Bytes::from_static(&[0x0E, 0x80, 0x00, 0x01, 0x22, 0xF1, 0x90]);
        let message = DiagnosticMessage::parse(&payload).unwrap();
        assert_eq!(message.source_address, 0x0E80);
        assert_eq!(message.target_address, 0x0001);
        assert_eq!(&message.user_data[..], &[0x22, 0xF1, 0x90]);
        assert_eq!(message.encode(), payload.to_vec());
    }

    #[test]
    fn test_diagnostic_message_without_user_data() {
        let payload = Bytes::from_static(&[0x0E, 0x80, 0x00, 0x01]);
        let message = DiagnosticMessage::parse(&payload).unwrap();
        assert!(message.user_data.is_empty());

        let short = Bytes::from_static(&[0x0E, 0x80, 0x00]);
        assert!(DiagnosticMessage::parse(&short).is_err());
    }

    #[test]
    fn test_alive_check_source() {
        assert_eq!(alive_check_source(&[0x0E, 0x80]), Some(0x0E80));
        assert_eq!(alive_check_source(&[0x0E]), None);
        assert_eq!(alive_check_source(&[]), None);
    }

    #[test]
    fn test_vehicle_identification_layout() {
        let identification = VehicleIdentification {
            vin: *b"WBAVN31010AE12345",
            logical_address: 0x0001,
            eid: [0x00, 0x01, 0x02, 0x03, 0x04, 0x05],
            gid: [0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            further_action_required: 0x00,
            sync_status: 0x00,
        };
        let encoded = identification.encode();
        assert_eq!(encoded.len(), 33);
        assert_eq!(&encoded[..17], b"WBAVN31010AE12345");
        assert_eq!(&encoded[17..19], &[0x00, 0x01]);
        assert_eq!(VehicleIdentification::parse(&encoded).unwrap(), identification);
        assert_eq!(identification.vin_string(), "WBAVN31010AE12345");
    }
}
