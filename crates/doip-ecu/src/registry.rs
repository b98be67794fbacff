//! Live TCP connection registry
//!
//! The acceptor inserts a [`ConnectionHandle`] per accepted socket, the
//! heartbeat supervisor snapshots and prunes, and each connection task removes
//! itself on teardown. Every operation takes the registry lock for its whole
//! duration, so a snapshot never observes a half-applied insert or removal.
//!
//! Handles only carry what other tasks need: the write half of the socket and
//! a close signal. The [`DiagnosticSession`](crate::session::DiagnosticSession)
//! stays inside the connection task.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

/// Registry key of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared write half of a connection
///
/// Writes are serialised so a heartbeat probe never interleaves with a
/// response frame written by the connection task.
#[derive(Clone)]
pub struct FrameWriter {
    inner: Arc<tokio::sync::Mutex<BoxedWriter>>,
}

impl FrameWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(Box::new(writer))),
        }
    }

    /// Write one complete frame and flush it
    pub async fn send(&self, frame: &[u8]) -> std::io::Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }

    pub async fn shutdown(&self) -> std::io::Result<()> {
        self.inner.lock().await.shutdown().await
    }
}

impl fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}

/// What other tasks may see of a live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub writer: FrameWriter,
    closed: Arc<Notify>,
}

impl ConnectionHandle {
    /// Ask the owning connection task to stop
    ///
    /// The signal is latched, so it is seen even if the task is busy
    /// processing a frame when it is raised.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}

/// Shared set of live connections
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<Mutex<HashMap<ConnectionId, ConnectionHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection
    pub fn insert(&self, peer: SocketAddr, writer: FrameWriter) -> ConnectionHandle {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = ConnectionHandle {
            id,
            peer,
            writer,
            closed: Arc::new(Notify::new()),
        };
        self.entries.lock().insert(id, handle.clone());
        handle
    }

    /// Remove `id`; returns the handle if it was still registered
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.entries.lock().remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Point-in-time copy of every live connection, ordered by id
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        let mut handles: Vec<_> = self.entries.lock().values().cloned().collect();
        handles.sort_by_key(|handle| handle.id);
        handles
    }

    /// Remove every connection at once
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        self.entries.lock().drain().map(|(_, handle)| handle).collect()
    }
}
