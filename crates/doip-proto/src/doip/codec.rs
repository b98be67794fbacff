//! Frame encoding and stream framing
//!
//! TCP delivers an unstructured byte stream, so a frame is only taken off
//! the receive buffer once the full `8 + payload_length` bytes are present.
//! UDP datagrams are self-delimiting and decoded in one go.

use bytes::{Buf, Bytes, BytesMut};

use super::header::DoipHeader;
use super::{PayloadType, HEADER_LEN};
use crate::error::DoipError;

/// A complete DoIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipFrame {
    pub header: DoipHeader,
    pub payload: Bytes,
}

impl DoipFrame {
    pub fn payload_type(&self) -> PayloadType {
        self.header.payload_type()
    }
}

/// Encode a complete frame: header followed by `payload`
pub fn encode_frame(payload_type: PayloadType, payload: &[u8]) -> Vec<u8> {
    let header = DoipHeader::new(payload_type, payload.len() as u32);
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(payload);
    frame
}

/// Take the next complete frame off a stream buffer
///
/// Returns `Ok(None)` while the header or the declared payload is still
/// incomplete; nothing is consumed in that case. Errors leave the buffer
/// untouched as well, since the stream cannot be resynchronised after a bad
/// header.
pub fn decode_frame(
    buf: &mut BytesMut,
    max_payload_len: u32,
) -> Result<Option<DoipFrame>, DoipError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let header = DoipHeader::decode(&buf[..HEADER_LEN])?;
    if header.payload_length > max_payload_len {
        return Err(DoipError::PayloadTooLarge {
            length: header.payload_length,
            limit: max_payload_len,
        });
    }

    if buf.len() < header.frame_len() {
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(header.payload_length as usize).freeze();
    Ok(Some(DoipFrame { header, payload }))
}

/// Decode a single datagram
///
/// The payload is whatever follows the header, clipped to the declared
/// length. A datagram shorter than its declared length is still returned so
/// that callers can answer requests whose payload carries no information.
pub fn decode_datagram(datagram: &[u8]) -> Result<DoipFrame, DoipError> {
    let header = DoipHeader::decode(datagram)?;
    let end = datagram.len().min(header.frame_len());
    Ok(DoipFrame {
        header,
        payload: Bytes::copy_from_slice(&datagram[HEADER_LEN..end]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAX: u32 = 4096;

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(PayloadType::AliveCheckResponse, &[0x0E, 0x80]);
        assert_eq!(
            frame,
            vec![0x02, 0xFD, 0x00, 0x08, 0x00, 0x00, 0x00, 0x02, 0x0E, 0x80]
        );
    }

    #[test]
    fn test_decode_waits_for_header() {
        let mut buf = BytesMut::from(&[0x02, 0xFD, 0x80][..]);
        assert_eq!(decode_frame(&mut buf, MAX), Ok(None));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_waits_for_payload() {
        let frame = encode_frame(
            PayloadType::DiagnosticMessage,
            &[0x0E, 0x80, 0x00, 0x01, 0x22],
        );
        let mut buf = BytesMut::from(&frame[..10]);
        assert_eq!(decode_frame(&mut buf, MAX), Ok(None));
        assert_eq!(buf.len(), 10);

        buf.extend_from_slice(&frame[10..]);
        let decoded = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(decoded.payload_type(), PayloadType::DiagnosticMessage);
        assert_eq!(&decoded.payload[..], &[0x0E, 0x80, 0x00, 0x01, 0x22]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(PayloadType::AliveCheckRequest, &[]));
        buf.extend_from_slice(&encode_frame(
            PayloadType::RoutingActivationRequest,
            &[0x0E, 0x80, 0x01, 0x00],
        ));
        buf.extend_from_slice(&[0x02, 0xFD]);

        let first = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(first.payload_type(), PayloadType::AliveCheckRequest);
        assert!(first.payload.is_empty());

        let second = decode_frame(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(second.payload_type(), PayloadType::RoutingActivationRequest);
        assert_eq!(second.payload.len(), 4);

        assert_eq!(decode_frame(&mut buf, MAX), Ok(None));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut buf = BytesMut::from(&[0x01, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00][..]);
        assert_eq!(
            decode_frame(&mut buf, MAX),
            Err(DoipError::VersionMismatch {
                version: 0x01,
                inverse: 0xFE
            })
        );
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let mut buf = BytesMut::from(&[0x02, 0xFD, 0x80, 0x01, 0x00, 0x01, 0x00, 0x00][..]);
        assert_eq!(
            decode_frame(&mut buf, MAX),
            Err(DoipError::PayloadTooLarge {
                length: 0x0001_0000,
                limit: MAX
            })
        );
    }

    #[test]
    fn test_decode_datagram_clips_to_declared_length() {
        let mut datagram = encode_frame(PayloadType::AliveCheckRequest, &[0x0E, 0x80]);
        datagram.extend_from_slice(&[0xFF, 0xFF]);
        let frame = decode_datagram(&datagram).unwrap();
        assert_eq!(&frame.payload[..], &[0x0E, 0x80]);
    }

    #[test]
    fn test_decode_datagram_truncated_payload() {
        let datagram = [0x02, 0xFD, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0xAA];
        let frame = decode_datagram(&datagram).unwrap();
        assert_eq!(frame.payload_type(), PayloadType::VehicleIdentificationRequest);
        assert_eq!(&frame.payload[..], &[0xAA]);
    }
}
