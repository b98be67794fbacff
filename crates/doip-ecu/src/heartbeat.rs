//! Alive check supervisor
//!
//! Periodically probes every registered connection with an alive check
//! request. A connection whose socket write fails or stalls is removed from the
//! registry and told to close; silence alone never disconnects a tester.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use doip_proto::{encode_frame, PayloadType};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::server::wait_for_shutdown;

/// Probe every connection once; returns the ids that were pruned
///
/// Probes run concurrently. A write that has not completed within
/// `send_timeout` counts as a failure, so a peer that stopped reading cannot
/// hold up the others.
pub async fn run_cycle(
    registry: &ConnectionRegistry,
    logical_address: u16,
    send_timeout: Duration,
) -> Vec<ConnectionId> {
    let probe: Arc<[u8]> =
        encode_frame(PayloadType::AliveCheckRequest, &logical_address.to_be_bytes()).into();

    let mut probes = JoinSet::new();
    for handle in registry.snapshot() {
        let probe = Arc::clone(&probe);
        probes.spawn(async move {
            let result = match timeout(send_timeout, handle.writer.send(&probe)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "alive check write timed out",
                )),
            };
            (handle, result)
        });
    }

    let mut pruned = Vec::new();
    while let Some(joined) = probes.join_next().await {
        let (handle, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Alive check task failed");
                continue;
            }
        };
        if let Err(e) = result {
            warn!(id = %handle.id, peer = %handle.peer, error = %e, "Alive check failed, pruning");
            registry.remove(handle.id);
            handle.close();
            pruned.push(handle.id);
        }
    }

    pruned.sort();
    pruned
}

/// Run [`run_cycle`] every `interval` until shutdown
///
/// Each probe write is bounded by the interval itself.
pub async fn run_heartbeat(
    registry: ConnectionRegistry,
    logical_address: u16,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick completes immediately

    info!(interval_secs = interval.as_secs_f64(), "Heartbeat started");

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = ticker.tick() => {
                let pruned = run_cycle(&registry, logical_address, interval).await;
                debug!(
                    live = registry.len(),
                    pruned = pruned.len(),
                    "Heartbeat cycle"
                );
            }
        }
    }

    debug!("Heartbeat stopped");
}
