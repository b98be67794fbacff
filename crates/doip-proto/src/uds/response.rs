//! UDS response framing

use super::service_id;
use super::NegativeResponseCode;

/// Offset added to a service id in its positive response
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// Successful outcome of a UDS service handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositiveResponse {
    pub service_id: u8,
    /// Response bytes after the response service id
    pub data: Vec<u8>,
}

impl PositiveResponse {
    pub fn new(service_id: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            service_id,
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        positive_response(self.service_id, &self.data)
    }
}

/// Create a positive response for a service
pub fn positive_response(service_id: u8, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + data.len());
    response.push(service_id.wrapping_add(POSITIVE_RESPONSE_OFFSET));
    response.extend_from_slice(data);
    response
}

/// Create a negative response: `[0x7F, service id, nrc]`
pub fn negative_response(service_id: u8, nrc: NegativeResponseCode) -> Vec<u8> {
    vec![service_id::NEGATIVE_RESPONSE, service_id, nrc.into()]
}

/// NRC carried by a negative response, if `response` is one
pub fn parse_negative_response(response: &[u8]) -> Option<(u8, NegativeResponseCode)> {
    match response {
        [service_id::NEGATIVE_RESPONSE, sid, nrc, ..] => {
            Some((*sid, NegativeResponseCode::from(*nrc)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_positive_response() {
        let response = PositiveResponse::new(0x22, vec![0xF1, 0x90, b'W']);
        assert_eq!(response.encode(), vec![0x62, 0xF1, 0x90, b'W']);
        assert_eq!(positive_response(0x3E, &[0x00]), vec![0x7E, 0x00]);
    }

    #[test]
    fn test_negative_response() {
        let response = negative_response(0x28, NegativeResponseCode::SecurityAccessDenied);
        assert_eq!(response, vec![0x7F, 0x28, 0x33]);
        assert_eq!(
            parse_negative_response(&response),
            Some((0x28, NegativeResponseCode::SecurityAccessDenied))
        );
        assert_eq!(parse_negative_response(&[0x50, 0x01]), None);
    }
}
