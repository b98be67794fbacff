//! doip-proto - DoIP framing and UDS message vocabulary
//!
//! Pure, I/O-free building blocks shared by the emulated DoIP entity and
//! its tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TCP / UDP bytes                      │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │
//!                 ┌───────────┴───────────┐
//!                 │ doip::header / codec  │  8-byte header, stream framing
//!                 └───────────┬───────────┘
//!                             │
//!                 ┌───────────┴───────────┐
//!                 │ doip::payload         │  routing activation, alive check,
//!                 │                       │  diagnostic message, identity
//!                 └───────────┬───────────┘
//!                             │
//!                 ┌───────────┴───────────┐
//!                 │ uds                   │  service ids, NRCs, response framing
//!                 └───────────────────────┘
//! ```

pub mod doip;
pub mod error;
pub mod uds;

pub use doip::codec::{decode_datagram, decode_frame, encode_frame, DoipFrame};
pub use doip::header::DoipHeader;
pub use doip::{NackCode, PayloadType, RoutingActivationCode};
pub use error::DoipError;
pub use uds::{NegativeResponseCode, PositiveResponse};
