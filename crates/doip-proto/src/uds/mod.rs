//! UDS (Unified Diagnostic Services, ISO 14229) message vocabulary
//!
//! Service ids, sub-function values, data identifiers and response framing
//! for the subset of services the emulated entity answers.

mod nrc;
mod response;

pub use nrc::NegativeResponseCode;
pub use response::{
    negative_response, parse_negative_response, positive_response, PositiveResponse,
    POSITIVE_RESPONSE_OFFSET,
};

/// Standard UDS service ID constants
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const READ_DATA_BY_ID: u8 = 0x22;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const COMMUNICATION_CONTROL: u8 = 0x28;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}

/// DiagnosticSessionControl (0x10) session types
pub mod session_type {
    pub const DEFAULT: u8 = 0x01;
    pub const PROGRAMMING: u8 = 0x02;
    pub const EXTENDED: u8 = 0x03;
}

/// ECUReset (0x11) sub-functions
pub mod reset_type {
    /// Hard reset - complete shutdown and restart of ECU
    pub const HARD_RESET: u8 = 0x01;
    /// Key off/on reset - simulate ignition cycle
    pub const KEY_OFF_ON_RESET: u8 = 0x02;
    /// Soft reset - application-level restart
    pub const SOFT_RESET: u8 = 0x03;
}

/// CommunicationControl (0x28) control types
pub mod communication_control {
    pub const ENABLE_RX_AND_TX: u8 = 0x00;
    pub const ENABLE_RX_DISABLE_TX: u8 = 0x01;
    pub const DISABLE_RX_ENABLE_TX: u8 = 0x02;
    pub const DISABLE_RX_AND_TX: u8 = 0x03;
}

/// Suppress-positive-response bit of a sub-function byte
pub const SUPPRESS_POSITIVE_RESPONSE: u8 = 0x80;

/// Data identifiers answered by the emulated entity
pub mod standard_did {
    // ISO 14229-1 identification block
    pub const ACTIVE_DIAGNOSTIC_SESSION: u16 = 0xF186;
    pub const SPARE_PART_NUMBER: u16 = 0xF187;
    pub const ECU_SOFTWARE_NUMBER: u16 = 0xF188;
    pub const ECU_SOFTWARE_VERSION: u16 = 0xF189;
    pub const SYSTEM_SUPPLIER_ID: u16 = 0xF18A;
    pub const ECU_MANUFACTURING_DATE: u16 = 0xF18B;
    pub const ECU_SERIAL_NUMBER: u16 = 0xF18C;
    pub const VIN: u16 = 0xF190;
    pub const ECU_HARDWARE_NUMBER: u16 = 0xF191;
    pub const SUPPLIER_HW_VERSION: u16 = 0xF193;
    pub const SUPPLIER_SW_VERSION: u16 = 0xF195;
    pub const SYSTEM_NAME: u16 = 0xF197;

    // Firmware tester block
    pub const SOFTWARE_VERSION: u16 = 0xF1A0;
    pub const HARDWARE_VERSION: u16 = 0xF1A1;
    pub const CALIBRATION_VERSION: u16 = 0xF1A2;
    pub const MANUFACTURER_CODE: u16 = 0xF1A3;

    // Runtime telemetry
    pub const OPERATING_HOURS: u16 = 0xF1A6;
    pub const VEHICLE_SPEED: u16 = 0xF1A7;
    pub const ENGINE_RPM: u16 = 0xF1A8;
    pub const BATTERY_VOLTAGE: u16 = 0xF1A9;
    pub const ENGINE_TEMPERATURE: u16 = 0xF1AA;
    pub const FUEL_LEVEL: u16 = 0xF1AB;

    // Status
    pub const ERROR_MEMORY_STATUS: u16 = 0xF1AC;
    pub const LAST_RESET_REASON: u16 = 0xF1AD;

    // Manufacturing timestamp
    pub const MANUFACTURING_YEAR: u16 = 0xF1B0;
    pub const MANUFACTURING_MONTH: u16 = 0xF1B1;
    pub const MANUFACTURING_DAY: u16 = 0xF1B2;
    pub const MANUFACTURING_HOUR: u16 = 0xF1B3;
    pub const MANUFACTURING_MINUTE: u16 = 0xF1B4;
    pub const MANUFACTURING_SECOND: u16 = 0xF1B5;

    pub const SUPPORTED_DIDS: u16 = 0xFF00;
}
