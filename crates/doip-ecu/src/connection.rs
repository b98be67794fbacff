//! TCP acceptor and per-connection frame loop
//!
//! Every accepted socket gets its own task owning a fresh
//! [`DiagnosticSession`]. The task reads into a framing buffer, handles each
//! complete frame in order and removes itself from the registry when the peer
//! closes, a write fails, the heartbeat closes it or the server shuts down.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use doip_proto::doip::payload::{
    alive_check_response, alive_check_source, DiagnosticMessage, DiagnosticMessageAck,
    RoutingActivationRequest, RoutingActivationResponse,
};
use doip_proto::{
    decode_frame, encode_frame, DoipError, DoipFrame, NackCode, PayloadType,
    RoutingActivationCode,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::registry::{ConnectionHandle, ConnectionRegistry, FrameWriter};
use crate::server::wait_for_shutdown;
use crate::session::{DiagnosticSession, RoutingActivation};

/// Entity-wide state shared by every connection task
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub dispatcher: Dispatcher,
    pub registry: ConnectionRegistry,
    pub max_payload_len: u32,
    pub send_diagnostic_ack: bool,
}

impl ConnectionContext {
    fn logical_address(&self) -> u16 {
        self.dispatcher.identity().logical_address
    }
}

/// Accept connections until shutdown, then wait for every connection task
pub async fn run_acceptor(
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&ctx),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            },
        }
    }

    debug!(open = connections.len(), "Acceptor stopping");
    while connections.join_next().await.is_some() {}
}

/// Serve one accepted socket until it closes
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ConnectionContext>,
    shutdown: watch::Receiver<bool>,
) {
    let (reader, writer) = stream.into_split();
    let handle = ctx.registry.insert(peer, FrameWriter::new(writer));
    info!(peer = %peer, id = %handle.id, "Tester connected");

    let mut connection = Connection {
        handle: handle.clone(),
        session: DiagnosticSession::new(),
        ctx: Arc::clone(&ctx),
    };

    match connection.run(reader, shutdown).await {
        Ok(()) => info!(peer = %peer, id = %handle.id, "Tester disconnected"),
        Err(e) => warn!(peer = %peer, id = %handle.id, error = %e, "Connection closed on error"),
    }

    ctx.registry.remove(handle.id);
    let _ = handle.writer.shutdown().await;
}

/// Whether the frame loop keeps reading after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

struct Connection {
    handle: ConnectionHandle,
    session: DiagnosticSession,
    ctx: Arc<ConnectionContext>,
}

impl Connection {
    async fn run<R>(
        &mut self,
        mut reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::with_capacity(4096);
        let handle = self.handle.clone();

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
                _ = handle.closed() => {
                    debug!(id = %handle.id, "Closed by supervisor");
                    return Ok(());
                }
                read = reader.read_buf(&mut buf) => {
                    if read? == 0 {
                        return Ok(());
                    }
                    if self.drain_frames(&mut buf).await? == Flow::Close {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle every complete frame currently buffered
    async fn drain_frames(&mut self, buf: &mut BytesMut) -> std::io::Result<Flow> {
        loop {
            match decode_frame(buf, self.ctx.max_payload_len) {
                Ok(Some(frame)) => self.handle_frame(frame).await?,
                Ok(None) => return Ok(Flow::Continue),
                Err(e) => {
                    warn!(id = %self.handle.id, error = %e, "Unrecoverable framing error");
                    let code = match e {
                        DoipError::PayloadTooLarge { .. } => NackCode::MessageTooLarge,
                        _ => NackCode::IncorrectPatternFormat,
                    };
                    self.send_nack(code).await?;
                    return Ok(Flow::Close);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: DoipFrame) -> std::io::Result<()> {
        let payload_type = frame.payload_type();
        debug!(
            id = %self.handle.id,
            payload_type = %payload_type,
            len = frame.payload.len(),
            "Frame received"
        );

        match payload_type {
            PayloadType::RoutingActivationRequest => self.routing_activation(&frame).await?,
            PayloadType::AliveCheckRequest => {
                let source = alive_check_source(&frame.payload)
                    .unwrap_or_else(|| self.ctx.logical_address());
                self.send(PayloadType::AliveCheckResponse, &alive_check_response(source))
                    .await?;
            }
            PayloadType::AliveCheckResponse => {
                self.session.record_alive_response();
                debug!(
                    id = %self.handle.id,
                    source = ?alive_check_source(&frame.payload).map(|sa| format!("0x{:04X}", sa)),
                    "Alive check answered"
                );
            }
            PayloadType::DiagnosticMessage => self.diagnostic_message(&frame).await?,
            PayloadType::DiagnosticMessagePositiveAck
            | PayloadType::DiagnosticMessageNegativeAck => {
                debug!(
                    id = %self.handle.id,
                    payload_type = %payload_type,
                    payload = %hex::encode(&frame.payload),
                    "Acknowledgement from tester"
                );
            }
            other => {
                warn!(id = %self.handle.id, payload_type = %other, "Dropping unsupported frame");
            }
        }

        Ok(())
    }

    async fn routing_activation(&mut self, frame: &DoipFrame) -> std::io::Result<()> {
        let request = match RoutingActivationRequest::parse(&frame.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(id = %self.handle.id, error = %e, "Bad routing activation");
                return self.send_nack(NackCode::InvalidPayloadLength).await;
            }
        };

        let source = request.source_address;
        if matches!(source, 0x0000 | 0xFFFF) {
            warn!(
                id = %self.handle.id,
                tester = format!("0x{:04X}", source),
                "Reserved tester address"
            );
            return self.send_nack(NackCode::InvalidSourceAddress).await;
        }

        let code = match self.session.activate_routing(source) {
            RoutingActivation::Activated => {
                info!(
                    id = %self.handle.id,
                    tester = format!("0x{:04X}", source),
                    activation_type = format!("0x{:02X}", request.activation_type),
                    "Routing activated"
                );
                RoutingActivationCode::SuccessfullyActivated
            }
            RoutingActivation::Reactivated => RoutingActivationCode::SuccessfullyActivated,
            RoutingActivation::DifferentSource { registered } => {
                warn!(
                    id = %self.handle.id,
                    tester = format!("0x{:04X}", source),
                    registered = format!("0x{:04X}", registered),
                    "Routing already active for another tester"
                );
                RoutingActivationCode::DifferentSourceAddress
            }
        };

        let response = RoutingActivationResponse::new(source, self.ctx.logical_address(), code);
        self.send(PayloadType::RoutingActivationResponse, &response.encode())
            .await
    }

    async fn diagnostic_message(&mut self, frame: &DoipFrame) -> std::io::Result<()> {
        let Some(tester) = self.session.tester_address() else {
            warn!(id = %self.handle.id, "Diagnostic message before routing activation");
            return self.send_nack(NackCode::InvalidSourceAddress).await;
        };

        let message = match DiagnosticMessage::parse(&frame.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(id = %self.handle.id, error = %e, "Bad diagnostic message");
                return self.send_nack(NackCode::InvalidPayloadLength).await;
            }
        };

        let entity = self.ctx.logical_address();
        if message.source_address != tester {
            warn!(
                id = %self.handle.id,
                source = format!("0x{:04X}", message.source_address),
                tester = format!("0x{:04X}", tester),
                "Source address does not match activated tester"
            );
            return self.send_nack(NackCode::InvalidSourceAddress).await;
        }
        if message.target_address != entity {
            warn!(
                id = %self.handle.id,
                target = format!("0x{:04X}", message.target_address),
                "Unknown target address"
            );
            return self.send_nack(NackCode::UnknownTargetAddress).await;
        }
        if message.user_data.is_empty() {
            return self.send_nack(NackCode::InvalidPayloadLength).await;
        }

        if self.ctx.send_diagnostic_ack {
            let ack = DiagnosticMessageAck {
                source_address: entity,
                target_address: tester,
            };
            self.send(PayloadType::DiagnosticMessagePositiveAck, &ack.encode())
                .await?;
        }

        debug!(
            id = %self.handle.id,
            request = %hex::encode(&message.user_data),
            "UDS request"
        );
        let response = self
            .ctx
            .dispatcher
            .handle(&mut self.session, &message.user_data);
        debug!(id = %self.handle.id, response = %hex::encode(&response), "UDS response");

        let reply = DiagnosticMessage::new(entity, tester, response);
        self.send(PayloadType::DiagnosticMessage, &reply.encode())
            .await
    }

    async fn send_nack(&self, code: NackCode) -> std::io::Result<()> {
        debug!(id = %self.handle.id, code = ?code, "Sending negative ack");
        self.send(PayloadType::DiagnosticMessageNegativeAck, &[u8::from(code)])
            .await
    }

    async fn send(&self, payload_type: PayloadType, payload: &[u8]) -> std::io::Result<()> {
        self.handle
            .writer
            .send(&encode_frame(payload_type, payload))
            .await
    }
}
