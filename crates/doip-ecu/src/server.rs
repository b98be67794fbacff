//! Server orchestration
//!
//! [`EcuServer::start`] binds the UDP discovery socket and the TCP data
//! socket, then spawns the discovery responder, the acceptor and (if enabled)
//! the heartbeat supervisor. All of them stop when the returned
//! [`ServerHandle`] is shut down or dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::EcuConfig;
use crate::connection::{run_acceptor, ConnectionContext};
use crate::discovery::run_discovery;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::heartbeat::run_heartbeat;
use crate::identity::EntityIdentity;
use crate::registry::ConnectionRegistry;
use crate::telemetry::{Clock, SystemClock};

/// How long [`ServerHandle::shutdown`] waits for tasks to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves once the shutdown flag is raised or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Emulated DoIP entity, ready to start
#[derive(Debug)]
pub struct EcuServer {
    config: EcuConfig,
    clock: Arc<dyn Clock>,
}

impl EcuServer {
    pub fn new(config: EcuConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replace the telemetry time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration, bind both sockets and spawn all tasks
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        self.config.validate()?;
        let identity = Arc::new(EntityIdentity::from_config(&self.config.identity)?);

        let network = &self.config.network;
        let udp_addr = SocketAddr::new(network.bind, network.udp_port);
        let tcp_addr = SocketAddr::new(network.bind, network.tcp_port);

        let udp = UdpSocket::bind(udp_addr)
            .await
            .map_err(|source| ServerError::Bind {
                protocol: "UDP",
                addr: udp_addr,
                source,
            })?;
        let tcp = TcpListener::bind(tcp_addr)
            .await
            .map_err(|source| ServerError::Bind {
                protocol: "TCP",
                addr: tcp_addr,
                source,
            })?;
        let udp_addr = udp.local_addr()?;
        let tcp_addr = tcp.local_addr()?;

        let registry = ConnectionRegistry::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&identity),
            self.config.security.clone(),
            self.config.timing.clone(),
            self.clock,
        );
        let ctx = Arc::new(ConnectionContext {
            dispatcher,
            registry: registry.clone(),
            max_payload_len: network.max_payload_len,
            send_diagnostic_ack: self.config.doip.send_diagnostic_ack,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = vec![
            tokio::spawn(run_discovery(
                udp,
                Arc::clone(&identity),
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_acceptor(tcp, ctx, shutdown_rx.clone())),
        ];
        if self.config.heartbeat.enabled {
            tasks.push(tokio::spawn(run_heartbeat(
                registry.clone(),
                identity.logical_address,
                self.config.heartbeat.interval(),
                shutdown_rx,
            )));
        }

        info!(
            vin = %identity.vin,
            logical_address = format!("0x{:04X}", identity.logical_address),
            udp = %udp_addr,
            tcp = %tcp_addr,
            "DoIP entity listening"
        );

        Ok(ServerHandle {
            udp_addr,
            tcp_addr,
            registry,
            identity,
            shutdown_tx,
            tasks,
        })
    }
}

/// Running server; dropping it stops every task
#[derive(Debug)]
pub struct ServerHandle {
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    registry: ConnectionRegistry,
    identity: Arc<EntityIdentity>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound discovery address (resolved if port 0 was requested)
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Bound diagnostic address (resolved if port 0 was requested)
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    /// Stop every task, close every connection and wait for them to finish
    pub async fn shutdown(mut self) {
        info!("Shutting down");
        let _ = self.shutdown_tx.send(true);

        for handle in self.registry.drain() {
            handle.close();
        }

        let tasks = std::mem::take(&mut self.tasks);
        let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("Tasks did not stop in time");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_config() -> EcuConfig {
        let mut config = EcuConfig::default();
        config.network.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.network.udp_port = 0;
        config.network.tcp_port = 0;
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = EcuServer::new(loopback_config()).start().await.unwrap();
        assert_ne!(server.tcp_addr().port(), 0);
        assert_ne!(server.udp_addr().port(), 0);
        assert!(server.registry().is_empty());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = loopback_config();
        config.identity.logical_address = 0x0000;
        let err = EcuServer::new(config).start().await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let first = EcuServer::new(loopback_config()).start().await.unwrap();

        let mut config = loopback_config();
        config.network.tcp_port = first.tcp_addr().port();
        let err = EcuServer::new(config).start().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { protocol: "TCP", .. }));

        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_for_shutdown(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
