//! UDS service dispatcher
//!
//! Requests are routed through a static table of [`ServiceEntry`] values.
//! For every request the dispatcher checks, in order:
//!
//! 1. the service id is in the table, else `ServiceNotSupported`
//! 2. the request is at least `min_len` bytes, else
//!    `IncorrectMessageLengthOrFormat`
//! 3. the entry's [`Guard`] passes, else `SecurityAccessDenied` (NRC `0x33`,
//!    also called `SecurityAccessRequired`)
//!
//! and only then runs the handler. Handlers return
//! `Result<PositiveResponse, NegativeResponseCode>`; this module is the only
//! place that frames an `Err` as a `0x7F` negative response.

use std::sync::Arc;

use doip_proto::uds::{
    communication_control, negative_response, reset_type, service_id, NegativeResponseCode,
    PositiveResponse,
};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{SecurityConfig, TimingConfig};
use crate::did::{self, DidContext};
use crate::identity::EntityIdentity;
use crate::session::{CommunicationControlMode, DiagnosticSession, SessionType};
use crate::telemetry::Clock;

/// Minimum security level for protected operations
pub const PROTECTED_LEVEL: u8 = 2;

type Handler = fn(
    &Dispatcher,
    &mut DiagnosticSession,
    &[u8],
) -> Result<PositiveResponse, NegativeResponseCode>;

/// Precondition checked after the length check and before the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    /// Whole service requires at least this security level
    SecurityLevel(u8),
    /// Only the listed sub-functions require the level
    SecurityForSubFunctions {
        level: u8,
        sub_functions: &'static [u8],
    },
}

impl Guard {
    pub fn check(
        &self,
        session: &DiagnosticSession,
        request: &[u8],
    ) -> Result<(), NegativeResponseCode> {
        let required = match *self {
            Guard::None => return Ok(()),
            Guard::SecurityLevel(level) => level,
            Guard::SecurityForSubFunctions {
                level,
                sub_functions,
            } => match request.get(1) {
                Some(sub) if sub_functions.contains(sub) => level,
                _ => return Ok(()),
            },
        };

        if session.security_level() < required {
            debug!(
                current = session.security_level(),
                required, "Security access required"
            );
            return Err(NegativeResponseCode::SecurityAccessDenied);
        }
        Ok(())
    }
}

/// One row of the dispatch table
pub struct ServiceEntry {
    pub service: u8,
    pub name: &'static str,
    /// Minimum request length including the service id
    pub min_len: usize,
    pub guard: Guard,
    handler: Handler,
}

const SERVICES: &[ServiceEntry] = &[
    ServiceEntry {
        service: service_id::DIAGNOSTIC_SESSION_CONTROL,
        name: "DiagnosticSessionControl",
        min_len: 2,
        guard: Guard::SecurityForSubFunctions {
            level: PROTECTED_LEVEL,
            sub_functions: &[0x02],
        },
        handler: Dispatcher::diagnostic_session_control,
    },
    ServiceEntry {
        service: service_id::ECU_RESET,
        name: "ECUReset",
        min_len: 2,
        guard: Guard::SecurityForSubFunctions {
            level: PROTECTED_LEVEL,
            sub_functions: &[reset_type::HARD_RESET, reset_type::KEY_OFF_ON_RESET],
        },
        handler: Dispatcher::ecu_reset,
    },
    ServiceEntry {
        service: service_id::READ_DATA_BY_ID,
        name: "ReadDataByIdentifier",
        min_len: 3,
        guard: Guard::None,
        handler: Dispatcher::read_data_by_identifier,
    },
    ServiceEntry {
        service: service_id::SECURITY_ACCESS,
        name: "SecurityAccess",
        min_len: 2,
        guard: Guard::None,
        handler: Dispatcher::security_access,
    },
    ServiceEntry {
        service: service_id::COMMUNICATION_CONTROL,
        name: "CommunicationControl",
        min_len: 3,
        guard: Guard::SecurityLevel(PROTECTED_LEVEL),
        handler: Dispatcher::communication_control,
    },
    ServiceEntry {
        service: service_id::TESTER_PRESENT,
        name: "TesterPresent",
        min_len: 2,
        guard: Guard::None,
        handler: Dispatcher::tester_present,
    },
];

/// Table entry for `service`
pub fn service_entry(service: u8) -> Option<&'static ServiceEntry> {
    SERVICES.iter().find(|entry| entry.service == service)
}

/// Entity-wide inputs shared by every connection's service handling
#[derive(Debug, Clone)]
pub struct Dispatcher {
    identity: Arc<EntityIdentity>,
    security: SecurityConfig,
    timing: TimingConfig,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        identity: Arc<EntityIdentity>,
        security: SecurityConfig,
        timing: TimingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            security,
            timing,
            clock,
        }
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    /// Process a UDS request and return the response bytes
    pub fn handle(&self, session: &mut DiagnosticSession, request: &[u8]) -> Vec<u8> {
        let Some(&sid) = request.first() else {
            return negative_response(0x00, NegativeResponseCode::IncorrectMessageLengthOrFormat);
        };

        match self.dispatch(session, request) {
            Ok(response) => response.encode(),
            Err(nrc) => {
                debug!(
                    service = format!("0x{:02X}", sid),
                    nrc = format!("0x{:02X}", nrc),
                    reason = %nrc,
                    "Negative response"
                );
                negative_response(sid, nrc)
            }
        }
    }

    fn dispatch(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let sid = request[0];
        let Some(entry) = service_entry(sid) else {
            debug!(service = format!("0x{:02X}", sid), "Unsupported service");
            return Err(NegativeResponseCode::ServiceNotSupported);
        };

        if request.len() < entry.min_len {
            debug!(
                service = entry.name,
                len = request.len(),
                min_len = entry.min_len,
                "Request too short"
            );
            return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
        }

        entry.guard.check(session, request)?;
        (entry.handler)(self, session, request)
    }

    fn did_context(&self, session: &DiagnosticSession) -> DidContext {
        DidContext {
            elapsed: self.clock.elapsed(),
            session_type: session.session_type(),
            last_reset: session.last_reset(),
        }
    }

    fn diagnostic_session_control(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let requested = request[1];
        let Some(session_type) = SessionType::from_byte(requested) else {
            debug!(
                session = format!("0x{:02X}", requested),
                "Unsupported session type"
            );
            return Err(NegativeResponseCode::SubFunctionNotSupported);
        };

        session.set_session_type(session_type);

        let mut data = vec![requested];
        data.extend_from_slice(&self.timing.p2_server_max.to_be_bytes());
        data.extend_from_slice(&self.timing.p2_star_server_max.to_be_bytes());
        Ok(PositiveResponse::new(service_id::DIAGNOSTIC_SESSION_CONTROL, data))
    }

    fn ecu_reset(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let reset = request[1];
        let hard = matches!(
            reset,
            reset_type::HARD_RESET | reset_type::KEY_OFF_ON_RESET
        );

        session.apply_reset(reset, hard);
        info!(reset_type = format!("0x{:02X}", reset), hard, "ECU reset");
        Ok(PositiveResponse::new(service_id::ECU_RESET, vec![reset]))
    }

    fn read_data_by_identifier(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let identifiers = &request[1..];
        if identifiers.len() % 2 != 0 {
            return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
        }

        let ctx = self.did_context(session);
        let mut data = Vec::new();
        for pair in identifiers.chunks_exact(2) {
            let did = u16::from_be_bytes([pair[0], pair[1]]);
            let value = did::read(did, &self.identity, &ctx).inspect_err(|nrc| {
                debug!(did = format!("0x{:04X}", did), reason = %nrc, "DID read rejected");
            })?;
            debug!(did = format!("0x{:04X}", did), len = value.len(), "Reading DID");
            data.extend_from_slice(&did.to_be_bytes());
            data.extend_from_slice(&value);
        }

        Ok(PositiveResponse::new(service_id::READ_DATA_BY_ID, data))
    }

    fn security_access(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let sub_function = request[1];

        if sub_function % 2 == 1 {
            let level = sub_function.div_ceil(2);
            if self.security.key_for(level).is_none() {
                return Err(NegativeResponseCode::SubFunctionNotSupported);
            }

            let seed: u16 = rand::thread_rng().gen_range(0x1000..=0xFFFF);
            info!(level, seed = format!("0x{:04X}", seed), "Security access: providing seed");

            let mut data = vec![sub_function];
            data.extend_from_slice(&seed.to_be_bytes());
            return Ok(PositiveResponse::new(service_id::SECURITY_ACCESS, data));
        }

        if request.len() < 4 {
            return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
        }

        let level = sub_function / 2;
        let expected = self
            .security
            .key_for(level)
            .ok_or(NegativeResponseCode::SubFunctionNotSupported)?;

        // Unlimited retries: no attempt counter or delay timer is kept.
        let key = u16::from_be_bytes([request[2], request[3]]);
        if key != expected {
            warn!(level, key = format!("0x{:04X}", key), "Security access: invalid key");
            return Err(NegativeResponseCode::InvalidKey);
        }

        session.set_security_level(level);
        info!(level, "Security access granted");
        Ok(PositiveResponse::new(service_id::SECURITY_ACCESS, vec![sub_function]))
    }

    fn communication_control(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let control_type = request[1];
        let communication_type = request[2];

        let mode = match control_type {
            communication_control::ENABLE_RX_AND_TX => CommunicationControlMode::Normal,
            communication_control::ENABLE_RX_DISABLE_TX => CommunicationControlMode::Disabled,
            communication_control::DISABLE_RX_ENABLE_TX => CommunicationControlMode::Enabled,
            communication_control::DISABLE_RX_AND_TX => CommunicationControlMode::Disabled,
            other => CommunicationControlMode::Other(other),
        };

        session.set_communication_control(mode);
        info!(
            control_type = format!("0x{:02X}", control_type),
            communication_type = format!("0x{:02X}", communication_type),
            ?mode,
            "Communication control"
        );
        Ok(PositiveResponse::new(
            service_id::COMMUNICATION_CONTROL,
            vec![control_type, communication_type],
        ))
    }

    fn tester_present(
        &self,
        session: &mut DiagnosticSession,
        request: &[u8],
    ) -> Result<PositiveResponse, NegativeResponseCode> {
        let sub_function = request[1] & !doip_proto::uds::SUPPRESS_POSITIVE_RESPONSE;

        session.touch_tester_present();
        debug!("Tester present");
        Ok(PositiveResponse::new(service_id::TESTER_PRESENT, vec![sub_function]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::ManualClock;
    use doip_proto::uds::standard_did;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(EntityIdentity::default()),
            SecurityConfig::default(),
            TimingConfig::default(),
            ManualClock::new(Duration::ZERO),
        )
    }

    fn unlock(dispatcher: &Dispatcher, session: &mut DiagnosticSession, level: u8) {
        let seed = dispatcher.handle(session, &[0x27, level * 2 - 1]);
        assert_eq!(seed[0], 0x67);
        let key = dispatcher.security.key_for(level).unwrap().to_be_bytes();
        let response = dispatcher.handle(session, &[0x27, level * 2, key[0], key[1]]);
        assert_eq!(response, vec![0x67, level * 2]);
    }

    #[test]
    fn test_unknown_service() {
        let mut session = DiagnosticSession::new();
        assert_eq!(
            dispatcher().handle(&mut session, &[0x34, 0x00]),
            vec![0x7F, 0x34, 0x11]
        );
        assert_eq!(
            dispatcher().handle(&mut session, &[0x36]),
            vec![0x7F, 0x36, 0x11]
        );
    }

    #[rstest]
    #[case(&[0x10])]
    #[case(&[0x11])]
    #[case(&[0x22, 0xF1])]
    #[case(&[0x27])]
    #[case(&[0x28, 0x00])]
    #[case(&[0x3E])]
    fn test_too_short(#[case] request: &[u8]) {
        let mut session = DiagnosticSession::new();
        let response = dispatcher().handle(&mut session, request);
        assert_eq!(response, vec![0x7F, request[0], 0x13]);
    }

    #[test]
    fn test_length_checked_before_guard() {
        let mut session = DiagnosticSession::new();
        assert_eq!(
            dispatcher().handle(&mut session, &[0x28, 0x01]),
            vec![0x7F, 0x28, 0x13]
        );
    }

    #[test]
    fn test_session_control() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();

        let response = dispatcher.handle(&mut session, &[0x10, 0x03]);
        assert_eq!(response, vec![0x50, 0x03, 0x01, 0x00, 0x01, 0x00]);
        assert_eq!(session.session_type(), SessionType::Extended);

        assert_eq!(
            dispatcher.handle(&mut session, &[0x10, 0x05]),
            vec![0x7F, 0x10, 0x12]
        );
        assert_eq!(session.session_type(), SessionType::Extended);
    }

    #[test]
    fn test_programming_session_requires_security() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();

        assert_eq!(
            dispatcher.handle(&mut session, &[0x10, 0x02]),
            vec![0x7F, 0x10, 0x33]
        );
        assert_eq!(session.session_type(), SessionType::Default);

        unlock(&dispatcher, &mut session, 2);
        assert_eq!(&dispatcher.handle(&mut session, &[0x10, 0x02])[..2], &[0x50, 0x02]);
        assert_eq!(session.session_type(), SessionType::Programming);
    }

    #[test]
    fn test_security_access_seed() {
        let mut session = DiagnosticSession::new();
        let response = dispatcher().handle(&mut session, &[0x27, 0x03]);
        assert_eq!(response.len(), 4);
        assert_eq!(&response[..2], &[0x67, 0x03]);
        let seed = u16::from_be_bytes([response[2], response[3]]);
        assert!(seed >= 0x1000);
        assert_eq!(session.security_level(), 0);
    }

    #[test]
    fn test_security_access_unknown_level() {
        let mut session = DiagnosticSession::new();
        let dispatcher = dispatcher();
        assert_eq!(
            dispatcher.handle(&mut session, &[0x27, 0x09]),
            vec![0x7F, 0x27, 0x12]
        );
        assert_eq!(
            dispatcher.handle(&mut session, &[0x27, 0x0A, 0x00, 0x00]),
            vec![0x7F, 0x27, 0x12]
        );
    }

    #[test]
    fn test_security_access_key() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();

        assert_eq!(
            dispatcher.handle(&mut session, &[0x27, 0x04, 0x00]),
            vec![0x7F, 0x27, 0x13]
        );
        assert_eq!(
            dispatcher.handle(&mut session, &[0x27, 0x04, 0x12, 0x34]),
            vec![0x7F, 0x27, 0x35]
        );
        assert_eq!(session.security_level(), 0);

        // No lockout after repeated failures
        for _ in 0..5 {
            dispatcher.handle(&mut session, &[0x27, 0x04, 0x00, 0x00]);
        }
        assert_eq!(
            dispatcher.handle(&mut session, &[0x27, 0x04, 0x56, 0x78]),
            vec![0x67, 0x04]
        );
        assert_eq!(session.security_level(), 2);
    }

    #[test]
    fn test_read_vin() {
        let mut session = DiagnosticSession::new();
        let response = dispatcher().handle(&mut session, &[0x22, 0xF1, 0x90]);
        let mut expected = vec![0x62, 0xF1, 0x90];
        expected.extend_from_slice(b"WBAVN31010AE12345");
        assert_eq!(response, expected);
    }

    #[test]
    fn test_read_multiple_dids() {
        let mut session = DiagnosticSession::new();
        let response = dispatcher().handle(&mut session, &[0x22, 0xF1, 0xA3, 0xF1, 0xAB]);
        assert_eq!(response, vec![0x62, 0xF1, 0xA3, b'B', b'M', b'W', 0xF1, 0xAB, 80]);
    }

    #[test]
    fn test_read_rejections() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, 0x00, 0x00]),
            vec![0x7F, 0x22, 0x31]
        );
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, 0xF1, 0x90, 0x00, 0x00]),
            vec![0x7F, 0x22, 0x31]
        );
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, 0xF1, 0xAD]),
            vec![0x7F, 0x22, 0x22]
        );
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, 0xF1, 0x90, 0xF1]),
            vec![0x7F, 0x22, 0x13]
        );
    }

    #[test]
    fn test_read_active_session() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();
        dispatcher.handle(&mut session, &[0x10, 0x03]);
        let did = standard_did::ACTIVE_DIAGNOSTIC_SESSION.to_be_bytes();
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, did[0], did[1]]),
            vec![0x62, did[0], did[1], 0x03]
        );
    }

    #[test]
    fn test_tester_present_is_idempotent() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();
        dispatcher.handle(&mut session, &[0x10, 0x03]);
        unlock(&dispatcher, &mut session, 1);

        let before = session.last_tester_present();
        for request in [[0x3E, 0x00u8], [0x3E, 0x80]] {
            for _ in 0..10 {
                assert_eq!(dispatcher.handle(&mut session, &request), vec![0x7E, 0x00]);
            }
        }
        assert_eq!(session.session_type(), SessionType::Extended);
        assert_eq!(session.security_level(), 1);
        assert!(session.last_tester_present() >= before);

        // Any sub-function is answered
        assert_eq!(dispatcher.handle(&mut session, &[0x3E, 0x01]), vec![0x7E, 0x01]);
        assert_eq!(session.security_level(), 1);
    }

    #[test]
    fn test_ecu_reset() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();

        assert_eq!(
            dispatcher.handle(&mut session, &[0x11, reset_type::SOFT_RESET]),
            vec![0x51, 0x03]
        );
        for hard in [0x01, 0x02] {
            assert_eq!(
                dispatcher.handle(&mut session, &[0x11, hard]),
                vec![0x7F, 0x11, 0x33]
            );
        }

        dispatcher.handle(&mut session, &[0x10, 0x03]);
        unlock(&dispatcher, &mut session, 2);

        // Unlisted reset types are echoed and leave the session alone
        for other in [0x04, 0x05, 0x60] {
            assert_eq!(
                dispatcher.handle(&mut session, &[0x11, other]),
                vec![0x51, other]
            );
        }
        assert_eq!(session.security_level(), 2);
        assert_eq!(session.session_type(), SessionType::Extended);

        assert_eq!(dispatcher.handle(&mut session, &[0x11, 0x01]), vec![0x51, 0x01]);
        assert_eq!(session.security_level(), 0);
        assert_eq!(session.session_type(), SessionType::Default);
        assert_eq!(
            dispatcher.handle(&mut session, &[0x22, 0xF1, 0xAD]),
            vec![0x62, 0xF1, 0xAD, 0x01]
        );
    }

    #[test]
    fn test_communication_control() {
        let dispatcher = dispatcher();
        let mut session = DiagnosticSession::new();

        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x01, 0x01]),
            vec![0x7F, 0x28, 0x33]
        );

        unlock(&dispatcher, &mut session, 1);
        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x01, 0x01]),
            vec![0x7F, 0x28, 0x33]
        );

        unlock(&dispatcher, &mut session, 2);
        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x01, 0x01]),
            vec![0x68, 0x01, 0x01]
        );
        assert_eq!(session.communication_control(), CommunicationControlMode::Disabled);

        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x00, 0x01]),
            vec![0x68, 0x00, 0x01]
        );
        assert_eq!(session.communication_control(), CommunicationControlMode::Normal);

        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x03, 0x01]),
            vec![0x68, 0x03, 0x01]
        );
        assert_eq!(session.communication_control(), CommunicationControlMode::Disabled);

        assert_eq!(
            dispatcher.handle(&mut session, &[0x28, 0x07, 0x01]),
            vec![0x68, 0x07, 0x01]
        );
        assert_eq!(
            session.communication_control(),
            CommunicationControlMode::Other(0x07)
        );
    }

    #[test]
    fn test_empty_request() {
        let mut session = DiagnosticSession::new();
        assert_eq!(dispatcher().handle(&mut session, &[]), vec![0x7F, 0x00, 0x13]);
    }

    #[test]
    fn test_telemetry_reads_clock() {
        let clock = ManualClock::new(Duration::ZERO);
        let dispatcher = Dispatcher::new(
            Arc::new(EntityIdentity::default()),
            SecurityConfig::default(),
            TimingConfig::default(),
            clock.clone(),
        );
        let mut session = DiagnosticSession::new();

        let at_start = dispatcher.handle(&mut session, &[0x22, 0xF1, 0xA6]);
        assert_eq!(&at_start[3..], &1250u32.to_be_bytes());

        clock.advance(Duration::from_secs(3 * 3600));
        let later = dispatcher.handle(&mut session, &[0x22, 0xF1, 0xA6]);
        assert_eq!(&later[3..], &1253u32.to_be_bytes());
    }
}
