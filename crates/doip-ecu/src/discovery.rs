//! UDP discovery responder
//!
//! Answers vehicle identification and alive check requests with a unicast
//! reply to the sender. Anything else, including datagrams with a bad header,
//! is logged and dropped.

use std::sync::Arc;

use doip_proto::doip::payload::{alive_check_response, alive_check_source, EID_LEN, VIN_LEN};
use doip_proto::{decode_datagram, encode_frame, PayloadType};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::identity::EntityIdentity;
use crate::server::wait_for_shutdown;

/// Largest datagram read in one receive
const MAX_DATAGRAM: usize = 1500;

/// Reply to one discovery datagram, or `None` when it is not answered
pub fn respond(datagram: &[u8], identity: &EntityIdentity) -> Option<Vec<u8>> {
    let frame = match decode_datagram(datagram) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed datagram");
            return None;
        }
    };

    let announce = || {
        encode_frame(
            PayloadType::VehicleIdentificationResponse,
            &identity.vehicle_identification().encode(),
        )
    };

    match frame.payload_type() {
        PayloadType::VehicleIdentificationRequest => Some(announce()),
        PayloadType::VehicleIdentificationRequestByEid => {
            if frame.payload.len() >= EID_LEN && frame.payload[..EID_LEN] == identity.eid {
                Some(announce())
            } else {
                debug!(eid = %hex::encode(&frame.payload), "EID does not match");
                None
            }
        }
        PayloadType::VehicleIdentificationRequestByVin => {
            if frame.payload.len() >= VIN_LEN && frame.payload[..VIN_LEN] == identity.vin_field() {
                Some(announce())
            } else {
                debug!(vin = %String::from_utf8_lossy(&frame.payload), "VIN does not match");
                None
            }
        }
        PayloadType::AliveCheckRequest => {
            let source =
                alive_check_source(&frame.payload).unwrap_or(identity.logical_address);
            Some(encode_frame(
                PayloadType::AliveCheckResponse,
                &alive_check_response(source),
            ))
        }
        other => {
            warn!(payload_type = %other, "Unsupported discovery request");
            None
        }
    }
}

/// Serve discovery requests on `socket` until shutdown
pub async fn run_discovery(
    socket: UdpSocket,
    identity: Arc<EntityIdentity>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port-unreachable from an earlier reply surfaces here on some
                        // platforms; the socket stays usable.
                        warn!(error = %e, "Discovery receive failed");
                        continue;
                    }
                };

                debug!(peer = %peer, len, "Discovery datagram");
                if let Some(reply) = respond(&buf[..len], &identity) {
                    if let Err(e) = socket.send_to(&reply, peer).await {
                        error!(peer = %peer, error = %e, "Discovery reply failed");
                    }
                }
            }
        }
    }

    debug!("Discovery responder stopped");
}
