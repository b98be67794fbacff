//! Fixed 8-byte DoIP header

use super::{PayloadType, HEADER_LEN, INVERSE_PROTOCOL_VERSION, PROTOCOL_VERSION};
use crate::error::DoipError;

/// Decoded DoIP generic header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoipHeader {
    pub protocol_version: u8,
    pub inverse_protocol_version: u8,
    pub payload_type: u16,
    pub payload_length: u32,
}

impl DoipHeader {
    /// Header for an outgoing message
    pub fn new(payload_type: PayloadType, payload_length: u32) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            inverse_protocol_version: INVERSE_PROTOCOL_VERSION,
            payload_type: payload_type.into(),
            payload_length,
        }
    }

    /// Encode as big-endian `[version, inverse, type(u16), length(u32)]`
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.protocol_version;
        out[1] = self.inverse_protocol_version;
        out[2..4].copy_from_slice(&self.payload_type.to_be_bytes());
        out[4..8].copy_from_slice(&self.payload_length.to_be_bytes());
        out
    }

    /// Decode the first eight bytes of `bytes`
    ///
    /// Trailing bytes are ignored; the caller decides whether the declared
    /// payload is complete.
    pub fn decode(bytes: &[u8]) -> Result<Self, DoipError> {
        if bytes.len() < HEADER_LEN {
            return Err(DoipError::MalformedHeader(bytes.len()));
        }

        let version = bytes[0];
        let inverse = bytes[1];
        if version != PROTOCOL_VERSION || inverse != INVERSE_PROTOCOL_VERSION {
            return Err(DoipError::VersionMismatch { version, inverse });
        }

        Ok(Self {
            protocol_version: version,
            inverse_protocol_version: inverse,
            payload_type: u16::from_be_bytes([bytes[2], bytes[3]]),
            payload_length: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    pub fn payload_type(&self) -> PayloadType {
        PayloadType::from(self.payload_type)
    }

    /// Total frame size including the header
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn encode_header(payload_type: u16, payload_length: u32) -> [u8; HEADER_LEN] {
        DoipHeader::new(PayloadType::from(payload_type), payload_length).encode()
    }

    #[test]
    fn test_encode_layout() {
        let header = encode_header(0x8001, 0x0102_0304);
        assert_eq!(header, [0x02, 0xFD, 0x80, 0x01, 0x01, 0x02, 0x03, 0x04]);
    }

    #[rstest]
    #[case(0x0001, 0)]
    #[case(0x0005, 7)]
    #[case(0x8001, 4096)]
    #[case(0xABCD, u32::MAX)]
    fn test_decode_encoded(#[case] payload_type: u16, #[case] payload_length: u32) {
        let header = DoipHeader::decode(&encode_header(payload_type, payload_length)).unwrap();
        assert_eq!(header.payload_type, payload_type);
        assert_eq!(header.payload_length, payload_length);
    }

    #[test]
    fn test_decode_ignores_trailing_payload() {
        let mut frame = encode_header(0x0005, 4).to_vec();
        frame.extend_from_slice(&[0x0E, 0x80, 0x00, 0x00]);
        let header = DoipHeader::decode(&frame).unwrap();
        assert_eq!(header.payload_type(), PayloadType::RoutingActivationRequest);
        assert_eq!(header.frame_len(), 12);
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(
            DoipHeader::decode(&[0x02, 0xFD, 0x00]),
            Err(DoipError::MalformedHeader(3))
        );
        assert_eq!(DoipHeader::decode(&[]), Err(DoipError::MalformedHeader(0)));
    }

    #[rstest]
    #[case(0x01, 0xFE)]
    #[case(0x02, 0xFE)]
    #[case(0x03, 0xFD)]
    #[case(0xFF, 0x00)]
    fn test_decode_version_mismatch(#[case] version: u8, #[case] inverse: u8) {
        let mut frame = vec![version, inverse, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        frame.extend_from_slice(&[0xAA; 16]);
        assert_eq!(
            DoipHeader::decode(&frame),
            Err(DoipError::VersionMismatch { version, inverse })
        );
    }
}
