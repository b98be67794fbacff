//! doip-ecu - DoIP/UDS ECU emulator
//!
//! Emulates a single DoIP entity for exercising diagnostic testers without
//! vehicle hardware.
//!
//! # Modules
//!
//! - [`config`] - TOML/YAML configuration with defaults and validation
//! - [`identity`] - Immutable entity identity built from configuration
//! - [`session`] - Per-connection diagnostic session state
//! - [`dispatcher`] - UDS service table, preconditions and handlers
//! - [`did`] - Data identifier registry
//! - [`telemetry`] - Simulated runtime values and the clock they read
//! - [`discovery`] - UDP vehicle identification responder
//! - [`registry`] - Shared set of live TCP connections
//! - [`connection`] - TCP acceptor and per-connection frame loop
//! - [`heartbeat`] - Alive check supervisor
//! - [`server`] - Socket binding, task spawning and shutdown
//!
//! # Example
//!
//! ```ignore
//! use doip_ecu::{EcuConfig, EcuServer};
//!
//! let server = EcuServer::new(EcuConfig::default()).start().await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await;
//! ```

pub mod config;
pub mod connection;
pub mod did;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod registry;
pub mod server;
pub mod session;
pub mod telemetry;

pub use config::EcuConfig;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, ServerError};
pub use identity::EntityIdentity;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use server::{EcuServer, ServerHandle};
pub use session::{DiagnosticSession, SessionType};
pub use telemetry::{Clock, ManualClock, SystemClock, Telemetry};
