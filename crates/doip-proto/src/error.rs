//! DoIP codec errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DoipError {
    /// Fewer than eight header bytes were available
    #[error("Malformed header: need 8 bytes, got {0}")]
    MalformedHeader(usize),

    #[error("Protocol version mismatch: version 0x{version:02X}, inverse 0x{inverse:02X}")]
    VersionMismatch { version: u8, inverse: u8 },

    #[error("Payload too short for {payload}: need {expected} bytes, got {actual}")]
    PayloadTooShort {
        payload: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Payload length {length} exceeds limit of {limit} bytes")]
    PayloadTooLarge { length: u32, limit: u32 },
}
