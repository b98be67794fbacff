//! ECU emulator configuration
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working entity. Values can be loaded from TOML or YAML.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use doip_proto::doip::DOIP_PORT;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Complete ECU emulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcuConfig {
    /// Entity identity and identification strings
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Socket configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Alive-check supervision
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Timing values reported by DiagnosticSessionControl
    #[serde(default)]
    pub timing: TimingConfig,

    /// Security access keys
    #[serde(default)]
    pub security: SecurityConfig,

    /// DoIP transport options
    #[serde(default)]
    pub doip: DoipConfig,
}

impl EcuConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load by file extension; `.yaml`/`.yml` are YAML, everything else TOML
    pub fn load_any(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::load_yaml(path),
            _ => Self::load(path),
        }
    }

    /// Reject values the entity cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let la = self.identity.logical_address;
        if la == 0x0000 || la == 0xFFFF {
            return Err(ConfigError::invalid(
                "identity.logical_address",
                format!("0x{:04X} is reserved", la),
            ));
        }

        if self.identity.entity_id.len() != 6 {
            return Err(ConfigError::invalid(
                "identity.entity_id",
                format!("expected 6 bytes, got {}", self.identity.entity_id.len()),
            ));
        }

        if !matches!(self.identity.group_id.len(), 2 | 6) {
            return Err(ConfigError::invalid(
                "identity.group_id",
                format!("expected 2 or 6 bytes, got {}", self.identity.group_id.len()),
            ));
        }

        if !self.identity.vin.is_ascii() {
            return Err(ConfigError::invalid("identity.vin", "VIN must be ASCII"));
        }

        for level in &self.security.levels {
            if !(1..=4).contains(&level.level) {
                return Err(ConfigError::invalid(
                    "security.levels",
                    format!("level {} outside 1..=4", level.level),
                ));
            }
        }

        if self.heartbeat.enabled && self.heartbeat.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "heartbeat.interval_secs",
                "interval must be at least one second",
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Identity Configuration
// =============================================================================

/// Entity identity and the strings served through data identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Vehicle identification number (17 ASCII characters)
    #[serde(default = "default_vin")]
    pub vin: String,

    /// DoIP logical address of this entity - "0x0001" or 1
    #[serde(default = "default_logical_address", deserialize_with = "deserialize_hex_u16")]
    pub logical_address: u16,

    /// Entity ID (EID), 6 bytes - "00:01:02:03:04:05", "000102030405" or an array
    #[serde(default = "default_entity_id", deserialize_with = "deserialize_hex_bytes_vec")]
    pub entity_id: Vec<u8>,

    /// Group ID (GID), 2 or 6 bytes
    #[serde(default = "default_group_id", deserialize_with = "deserialize_hex_bytes_vec")]
    pub group_id: Vec<u8>,

    #[serde(default = "default_software_version")]
    pub software_version: String,

    #[serde(default = "default_software_number")]
    pub software_number: String,

    #[serde(default = "default_hardware_version")]
    pub hardware_version: String,

    #[serde(default = "default_hardware_number")]
    pub hardware_number: String,

    #[serde(default = "default_calibration_version")]
    pub calibration_version: String,

    #[serde(default = "default_serial_number")]
    pub serial_number: String,

    #[serde(default = "default_part_number")]
    pub part_number: String,

    /// System supplier name
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "default_manufacturer_code")]
    pub manufacturer_code: String,

    /// Manufacturing timestamp - "2023-12-15T14:30:45"
    #[serde(default = "default_manufactured_at")]
    pub manufactured_at: NaiveDateTime,

    /// Operating hours at start-up
    #[serde(default = "default_operating_hours")]
    pub operating_hours: u32,

    /// Error memory status byte
    #[serde(default, deserialize_with = "deserialize_hex_u8")]
    pub error_memory_status: u8,
}

fn default_vin() -> String {
    "WBAVN31010AE12345".to_string()
}

fn default_logical_address() -> u16 {
    0x0001
}

fn default_entity_id() -> Vec<u8> {
    vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05]
}

fn default_group_id() -> Vec<u8> {
    vec![0x00, 0x01]
}

fn default_software_version() -> String {
    "SW_V2.1.4_Build_20231215".to_string()
}

fn default_software_number() -> String {
    "SWN-2023-0421".to_string()
}

fn default_hardware_version() -> String {
    "HW_V3.2.1_Rev_B".to_string()
}

fn default_hardware_number() -> String {
    "HWN-2023-0117".to_string()
}

fn default_calibration_version() -> String {
    "CAL_V1.8.3_20231120".to_string()
}

fn default_serial_number() -> String {
    "ECU202312150001".to_string()
}

fn default_part_number() -> String {
    "ECU-2023-001-A".to_string()
}

fn default_manufacturer() -> String {
    "BMW_AG".to_string()
}

fn default_manufacturer_code() -> String {
    "BMW".to_string()
}

fn default_manufactured_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 12, 15)
        .and_then(|date| date.and_hms_opt(14, 30, 45))
        .unwrap_or_default()
}

fn default_operating_hours() -> u32 {
    1250
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            vin: default_vin(),
            logical_address: default_logical_address(),
            entity_id: default_entity_id(),
            group_id: default_group_id(),
            software_version: default_software_version(),
            software_number: default_software_number(),
            hardware_version: default_hardware_version(),
            hardware_number: default_hardware_number(),
            calibration_version: default_calibration_version(),
            serial_number: default_serial_number(),
            part_number: default_part_number(),
            manufacturer: default_manufacturer(),
            manufacturer_code: default_manufacturer_code(),
            manufactured_at: default_manufactured_at(),
            operating_hours: default_operating_hours(),
            error_memory_status: 0x00,
        }
    }
}

// =============================================================================
// Network Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address both sockets bind to
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// UDP discovery port
    #[serde(default = "default_port")]
    pub udp_port: u16,

    /// TCP diagnostic port
    #[serde(default = "default_port")]
    pub tcp_port: u16,

    /// Largest payload accepted on TCP before the connection is dropped
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: u32,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DOIP_PORT
}

fn default_max_payload_len() -> u32 {
    4096
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            udp_port: default_port(),
            tcp_port: default_port(),
            max_payload_len: default_max_payload_len(),
        }
    }
}

// =============================================================================
// Heartbeat Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    5
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_heartbeat_interval(),
        }
    }
}

// =============================================================================
// Timing Configuration
// =============================================================================

/// P2/P2* values echoed in DiagnosticSessionControl responses
///
/// Informational only; no watchdog enforces them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_p2", deserialize_with = "deserialize_hex_u16")]
    pub p2_server_max: u16,

    #[serde(default = "default_p2", deserialize_with = "deserialize_hex_u16")]
    pub p2_star_server_max: u16,
}

fn default_p2() -> u16 {
    0x0100
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            p2_server_max: default_p2(),
            p2_star_server_max: default_p2(),
        }
    }
}

// =============================================================================
// Security Configuration
// =============================================================================

/// Fixed key for one security level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLevelDef {
    pub level: u8,

    /// 16-bit key - "0x5678" or 22136
    #[serde(deserialize_with = "deserialize_hex_u16")]
    pub key: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_security_levels")]
    pub levels: Vec<SecurityLevelDef>,
}

fn default_security_levels() -> Vec<SecurityLevelDef> {
    [(1, 0x1234), (2, 0x5678), (3, 0x9ABC), (4, 0xDEF0)]
        .into_iter()
        .map(|(level, key)| SecurityLevelDef { level, key })
        .collect()
}

impl SecurityConfig {
    /// Key configured for `level`, if the level exists
    pub fn key_for(&self, level: u8) -> Option<u16> {
        self.levels
            .iter()
            .find(|def| def.level == level)
            .map(|def| def.key)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            levels: default_security_levels(),
        }
    }
}

// =============================================================================
// DoIP Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoipConfig {
    /// Send a positive diagnostic message ACK (0x8002) before each UDS response
    #[serde(default)]
    pub send_diagnostic_ack: bool,
}

// =============================================================================
// Hex Parsing Helpers
// =============================================================================

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse hex bytes ("000102030405", "0x0001", "00:01:02:03:04:05")
pub fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    let digits: String = strip_hex_prefix(s)
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();
    if digits.is_empty() {
        return None;
    }
    hex::decode(digits).ok()
}

/// Parse a hex ("0x0E80") or decimal ("3712") u16
pub fn parse_u16(s: &str) -> Option<u16> {
    let trimmed = s.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        u16::from_str_radix(strip_hex_prefix(trimmed), 16).ok()
    } else {
        trimmed.parse().ok()
    }
}

/// Deserialize a hex u16 (supports "0xF190" or 61840)
fn deserialize_hex_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Hex(String),
        Int(u16),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Hex(s) => u16::from_str_radix(strip_hex_prefix(&s), 16)
            .map_err(|e| D::Error::custom(e.to_string())),
    }
}

/// Deserialize a hex u8 (supports "0x09" or 9)
fn deserialize_hex_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Hex(String),
        Int(u8),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Hex(s) => u8::from_str_radix(strip_hex_prefix(&s), 16)
            .map_err(|e| D::Error::custom(e.to_string())),
    }
}

/// Deserialize hex bytes vec (supports "00:01:02", "000102" or [0, 1, 2])
fn deserialize_hex_bytes_vec<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexBytes {
        Hex(String),
        Array(Vec<u8>),
    }

    match HexBytes::deserialize(deserializer)? {
        HexBytes::Array(arr) => Ok(arr),
        HexBytes::Hex(s) => {
            parse_hex_bytes(&s).ok_or_else(|| D::Error::custom("Invalid hex string"))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
