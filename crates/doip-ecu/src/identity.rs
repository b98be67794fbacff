//! Process-wide entity identity
//!
//! Built once from [`IdentityConfig`] at start-up and shared read-only by
//! the discovery responder and every connection.

use chrono::{Datelike, NaiveDateTime, Timelike};
use doip_proto::doip::payload::{VehicleIdentification, EID_LEN, GID_LEN, VIN_LEN};

use crate::config::IdentityConfig;
use crate::error::ConfigError;

/// Immutable identity of the emulated entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    /// Configured VIN, truncated to 17 characters
    pub vin: String,
    pub logical_address: u16,
    pub eid: [u8; EID_LEN],
    /// Group ID, zero-extended to the 6-byte wire field
    pub gid: [u8; GID_LEN],
    pub software_version: String,
    pub software_number: String,
    pub hardware_version: String,
    pub hardware_number: String,
    pub calibration_version: String,
    pub serial_number: String,
    pub part_number: String,
    pub manufacturer: String,
    pub manufacturer_code: String,
    pub manufactured_at: NaiveDateTime,
    pub operating_hours: u32,
    pub error_memory_status: u8,
}

impl EntityIdentity {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        if !config.vin.is_ascii() {
            return Err(ConfigError::invalid("identity.vin", "VIN must be ASCII"));
        }

        let eid: [u8; EID_LEN] = config.entity_id.as_slice().try_into().map_err(|_| {
            ConfigError::invalid(
                "identity.entity_id",
                format!("expected 6 bytes, got {}", config.entity_id.len()),
            )
        })?;

        let mut gid = [0u8; GID_LEN];
        match config.group_id.len() {
            2 | 6 => gid[..config.group_id.len()].copy_from_slice(&config.group_id),
            other => {
                return Err(ConfigError::invalid(
                    "identity.group_id",
                    format!("expected 2 or 6 bytes, got {}", other),
                ))
            }
        }

        Ok(Self {
            vin: config.vin.chars().take(VIN_LEN).collect(),
            logical_address: config.logical_address,
            eid,
            gid,
            software_version: config.software_version.clone(),
            software_number: config.software_number.clone(),
            hardware_version: config.hardware_version.clone(),
            hardware_number: config.hardware_number.clone(),
            calibration_version: config.calibration_version.clone(),
            serial_number: config.serial_number.clone(),
            part_number: config.part_number.clone(),
            manufacturer: config.manufacturer.clone(),
            manufacturer_code: config.manufacturer_code.clone(),
            manufactured_at: config.manufactured_at,
            operating_hours: config.operating_hours,
            error_memory_status: config.error_memory_status,
        })
    }

    /// VIN as the fixed 17-byte wire field, NUL-padded on the right
    pub fn vin_field(&self) -> [u8; VIN_LEN] {
        let mut field = [0u8; VIN_LEN];
        let bytes = self.vin.as_bytes();
        let len = bytes.len().min(VIN_LEN);
        field[..len].copy_from_slice(&bytes[..len]);
        field
    }

    /// Payload of a vehicle identification response
    pub fn vehicle_identification(&self) -> VehicleIdentification {
        VehicleIdentification {
            vin: self.vin_field(),
            logical_address: self.logical_address,
            eid: self.eid,
            gid: self.gid,
            further_action_required: 0x00,
            sync_status: 0x00,
        }
    }

    /// `(year, month, day, hour, minute, second)` of manufacture
    pub fn manufacturing_timestamp(&self) -> (u16, u8, u8, u8, u8, u8) {
        let at = &self.manufactured_at;
        (
            u16::try_from(at.year()).unwrap_or(0),
            at.month() as u8,
            at.day() as u8,
            at.hour() as u8,
            at.minute() as u8,
            at.second() as u8,
        )
    }
}

impl Default for EntityIdentity {
    fn default() -> Self {
        let config = IdentityConfig::default();
        Self {
            vin: config.vin,
            logical_address: config.logical_address,
            eid: [0x00, 0x01, 0x02, 0x03, 0x04, 0x05],
            gid: [0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            software_version: config.software_version,
            software_number: config.software_number,
            hardware_version: config.hardware_version,
            hardware_number: config.hardware_number,
            calibration_version: config.calibration_version,
            serial_number: config.serial_number,
            part_number: config.part_number,
            manufacturer: config.manufacturer,
            manufacturer_code: config.manufacturer_code,
            manufactured_at: config.manufactured_at,
            operating_hours: config.operating_hours,
            error_memory_status: config.error_memory_status,
        }
    }
}
