//! Per-connection diagnostic session state
//!
//! A [`DiagnosticSession`] is created when a TCP connection is accepted and
//! is owned by that connection's task for its whole life. Nothing else reads
//! or writes it.

use std::fmt;
use std::time::Instant;

use doip_proto::uds::session_type;
use tracing::info;

/// Active UDS diagnostic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionType {
    #[default]
    Default,
    Programming,
    Extended,
}

impl SessionType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            session_type::DEFAULT => Some(Self::Default),
            session_type::PROGRAMMING => Some(Self::Programming),
            session_type::EXTENDED => Some(Self::Extended),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Default => session_type::DEFAULT,
            Self::Programming => session_type::PROGRAMMING,
            Self::Extended => session_type::EXTENDED,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.as_byte())
    }
}

/// CommunicationControl state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommunicationControlMode {
    #[default]
    Normal,
    Disabled,
    Enabled,
    /// Control type with no dedicated mode, kept as received
    Other(u8),
}

/// Result of a routing activation attempt on an existing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingActivation {
    /// First activation on this connection
    Activated,
    /// Same tester activated again
    Reactivated,
    /// Connection already belongs to another tester
    DifferentSource { registered: u16 },
}

/// Mutable diagnostic state of one tester connection
#[derive(Debug, Clone)]
pub struct DiagnosticSession {
    tester_address: Option<u16>,
    session_type: SessionType,
    security_level: u8,
    communication_control: CommunicationControlMode,
    last_tester_present: Instant,
    last_alive_response: Option<Instant>,
    last_reset: Option<u8>,
}

impl DiagnosticSession {
    pub fn new() -> Self {
        Self {
            tester_address: None,
            session_type: SessionType::Default,
            security_level: 0,
            communication_control: CommunicationControlMode::Normal,
            last_tester_present: Instant::now(),
            last_alive_response: None,
            last_reset: None,
        }
    }

    pub fn tester_address(&self) -> Option<u16> {
        self.tester_address
    }

    pub fn routing_activated(&self) -> bool {
        self.tester_address.is_some()
    }

    /// Register `source_address` as this connection's tester
    ///
    /// The tester address is set once; later activations only succeed for
    /// the same address.
    pub fn activate_routing(&mut self, source_address: u16) -> RoutingActivation {
        match self.tester_address {
            None => {
                self.tester_address = Some(source_address);
                RoutingActivation::Activated
            }
            Some(registered) if registered == source_address => RoutingActivation::Reactivated,
            Some(registered) => RoutingActivation::DifferentSource { registered },
        }
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn set_session_type(&mut self, session: SessionType) {
        if session != self.session_type {
            info!(
                from = %self.session_type,
                to = %session,
                "Session changed"
            );
        }
        self.session_type = session;
    }

    /// 0 = locked, 1..=4 = unlocked level
    pub fn security_level(&self) -> u8 {
        self.security_level
    }

    pub fn set_security_level(&mut self, level: u8) {
        self.security_level = level;
    }

    pub fn communication_control(&self) -> CommunicationControlMode {
        self.communication_control
    }

    pub fn set_communication_control(&mut self, mode: CommunicationControlMode) {
        self.communication_control = mode;
    }

    pub fn touch_tester_present(&mut self) {
        self.last_tester_present = Instant::now();
    }

    pub fn last_tester_present(&self) -> Instant {
        self.last_tester_present
    }

    pub fn record_alive_response(&mut self) {
        self.last_alive_response = Some(Instant::now());
    }

    pub fn last_alive_response(&self) -> Option<Instant> {
        self.last_alive_response
    }

    /// Reset type of the most recent ECUReset, if any
    pub fn last_reset(&self) -> Option<u8> {
        self.last_reset
    }

    /// Apply an accepted ECUReset
    ///
    /// Hard resets drop security access and return to the default session.
    pub fn apply_reset(&mut self, reset_type: u8, hard: bool) {
        self.last_reset = Some(reset_type);
        if hard {
            self.security_level = 0;
            self.session_type = SessionType::Default;
            info!("ECU state reset to default");
        }
    }
}

impl Default for DiagnosticSession {
    fn default() -> Self {
        Self::new()
    }
}
