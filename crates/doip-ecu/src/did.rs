//! Data identifier registry
//!
//! A static table maps each DID to a read function. Identity strings are
//! served as raw ASCII without a length prefix; integers are big-endian.

use std::time::Duration;

use doip_proto::uds::{standard_did, NegativeResponseCode};

use crate::identity::EntityIdentity;
use crate::session::SessionType;
use crate::telemetry::Telemetry;

/// Per-read inputs that are not part of the entity identity
#[derive(Debug, Clone, Copy)]
pub struct DidContext {
    /// Time since the entity started
    pub elapsed: Duration,
    pub session_type: SessionType,
    /// Reset type of the last ECUReset on this connection
    pub last_reset: Option<u8>,
}

type DidReader = fn(&EntityIdentity, &DidContext) -> Option<Vec<u8>>;

/// One registered data identifier
pub struct DidEntry {
    pub id: u16,
    pub name: &'static str,
    read: DidReader,
}

impl DidEntry {
    const fn new(id: u16, name: &'static str, read: DidReader) -> Self {
        Self { id, name, read }
    }

    /// Current data, or `None` when the DID has nothing to report yet
    pub fn read(&self, identity: &EntityIdentity, ctx: &DidContext) -> Option<Vec<u8>> {
        (self.read)(identity, ctx)
    }
}

fn ascii(value: &str) -> Option<Vec<u8>> {
    Some(value.as_bytes().to_vec())
}

fn telemetry(identity: &EntityIdentity, ctx: &DidContext) -> Telemetry {
    Telemetry::at(ctx.elapsed, identity.operating_hours)
}

const DID_TABLE: &[DidEntry] = &[
    DidEntry::new(standard_did::ACTIVE_DIAGNOSTIC_SESSION, "active_session", |_, ctx| {
        Some(vec![ctx.session_type.as_byte()])
    }),
    DidEntry::new(standard_did::SPARE_PART_NUMBER, "part_number", |id, _| {
        ascii(&id.part_number)
    }),
    DidEntry::new(standard_did::ECU_SOFTWARE_NUMBER, "software_number", |id, _| {
        ascii(&id.software_number)
    }),
    DidEntry::new(standard_did::ECU_SOFTWARE_VERSION, "software_version", |id, _| {
        ascii(&id.software_version)
    }),
    DidEntry::new(standard_did::SYSTEM_SUPPLIER_ID, "supplier", |id, _| {
        ascii(&id.manufacturer)
    }),
    DidEntry::new(standard_did::ECU_MANUFACTURING_DATE, "manufacturing_date", |id, _| {
        let (year, month, day, ..) = id.manufacturing_timestamp();
        let mut data = year.to_be_bytes().to_vec();
        data.extend_from_slice(&[month, day]);
        Some(data)
    }),
    DidEntry::new(standard_did::ECU_SERIAL_NUMBER, "serial_number", |id, _| {
        ascii(&id.serial_number)
    }),
    DidEntry::new(standard_did::VIN, "vin", |id, _| ascii(&id.vin)),
    DidEntry::new(standard_did::ECU_HARDWARE_NUMBER, "hardware_number", |id, _| {
        ascii(&id.hardware_number)
    }),
    DidEntry::new(standard_did::SUPPLIER_HW_VERSION, "hardware_version", |id, _| {
        ascii(&id.hardware_version)
    }),
    DidEntry::new(standard_did::SUPPLIER_SW_VERSION, "supplier_software_version", |id, _| {
        ascii(&id.software_version)
    }),
    DidEntry::new(standard_did::SYSTEM_NAME, "calibration", |id, _| {
        ascii(&id.calibration_version)
    }),
    DidEntry::new(standard_did::SOFTWARE_VERSION, "sw_version", |id, _| {
        ascii(&id.software_version)
    }),
    DidEntry::new(standard_did::HARDWARE_VERSION, "hw_version", |id, _| {
        ascii(&id.hardware_version)
    }),
    DidEntry::new(standard_did::CALIBRATION_VERSION, "calibration_version", |id, _| {
        ascii(&id.calibration_version)
    }),
    DidEntry::new(standard_did::MANUFACTURER_CODE, "manufacturer_code", |id, _| {
        ascii(&id.manufacturer_code)
    }),
    DidEntry::new(standard_did::OPERATING_HOURS, "operating_hours", |id, ctx| {
        Some(telemetry(id, ctx).operating_hours.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::VEHICLE_SPEED, "vehicle_speed", |id, ctx| {
        Some(telemetry(id, ctx).vehicle_speed.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::ENGINE_RPM, "engine_rpm", |id, ctx| {
        Some(telemetry(id, ctx).engine_rpm.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::BATTERY_VOLTAGE, "battery_voltage", |id, ctx| {
        Some(telemetry(id, ctx).battery_voltage.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::ENGINE_TEMPERATURE, "engine_temperature", |id, ctx| {
        Some(telemetry(id, ctx).engine_temperature.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::FUEL_LEVEL, "fuel_level", |id, ctx| {
        Some(vec![telemetry(id, ctx).fuel_level])
    }),
    DidEntry::new(standard_did::ERROR_MEMORY_STATUS, "error_memory_status", |id, _| {
        Some(vec![id.error_memory_status])
    }),
    DidEntry::new(standard_did::LAST_RESET_REASON, "last_reset_reason", |_, ctx| {
        ctx.last_reset.map(|reset| vec![reset])
    }),
    DidEntry::new(standard_did::MANUFACTURING_YEAR, "manufacturing_year", |id, _| {
        Some(id.manufacturing_timestamp().0.to_be_bytes().to_vec())
    }),
    DidEntry::new(standard_did::MANUFACTURING_MONTH, "manufacturing_month", |id, _| {
        Some(vec![id.manufacturing_timestamp().1])
    }),
    DidEntry::new(standard_did::MANUFACTURING_DAY, "manufacturing_day", |id, _| {
        Some(vec![id.manufacturing_timestamp().2])
    }),
    DidEntry::new(standard_did::MANUFACTURING_HOUR, "manufacturing_hour", |id, _| {
        Some(vec![id.manufacturing_timestamp().3])
    }),
    DidEntry::new(standard_did::MANUFACTURING_MINUTE, "manufacturing_minute", |id, _| {
        Some(vec![id.manufacturing_timestamp().4])
    }),
    DidEntry::new(standard_did::MANUFACTURING_SECOND, "manufacturing_second", |id, _| {
        Some(vec![id.manufacturing_timestamp().5])
    }),
    DidEntry::new(standard_did::SUPPORTED_DIDS, "supported_dids", |_, _| {
        Some(supported_dids().flat_map(u16::to_be_bytes).collect())
    }),
];

/// Registry entry for `did`
pub fn lookup(did: u16) -> Option<&'static DidEntry> {
    DID_TABLE.iter().find(|entry| entry.id == did)
}

/// Every registered DID in table order
pub fn supported_dids() -> impl Iterator<Item = u16> {
    DID_TABLE.iter().map(|entry| entry.id)
}

/// Read `did`, mapping misses to the NRC a ReadDataByIdentifier answers with
pub fn read(
    did: u16,
    identity: &EntityIdentity,
    ctx: &DidContext,
) -> Result<Vec<u8>, NegativeResponseCode> {
    let entry = lookup(did).ok_or(NegativeResponseCode::RequestOutOfRange)?;
    entry
        .read(identity, ctx)
        .ok_or(NegativeResponseCode::ConditionsNotCorrect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ctx() -> DidContext {
        DidContext {
            elapsed: Duration::ZERO,
            session_type: SessionType::Default,
            last_reset: None,
        }
    }

    #[test]
    fn test_vin_is_configured_bytes() {
        let identity = EntityIdentity::default();
        assert_eq!(
            read(standard_did::VIN, &identity, &ctx()).unwrap(),
            b"WBAVN31010AE12345".to_vec()
        );
    }

    #[test]
    fn test_unknown_did() {
        let identity = EntityIdentity::default();
        assert_eq!(
            read(0x0000, &identity, &ctx()),
            Err(NegativeResponseCode::RequestOutOfRange)
        );
    }

    #[test]
    fn test_last_reset_requires_reset() {
        let identity = EntityIdentity::default();
        assert_eq!(
            read(standard_did::LAST_RESET_REASON, &identity, &ctx()),
            Err(NegativeResponseCode::ConditionsNotCorrect)
        );

        let after_reset = DidContext {
            last_reset: Some(0x03),
            ..ctx()
        };
        assert_eq!(
            read(standard_did::LAST_RESET_REASON, &identity, &after_reset),
            Ok(vec![0x03])
        );
    }

    #[test]
    fn test_active_session_follows_context() {
        let identity = EntityIdentity::default();
        let extended = DidContext {
            session_type: SessionType::Extended,
            ..ctx()
        };
        assert_eq!(
            read(standard_did::ACTIVE_DIAGNOSTIC_SESSION, &identity, &extended),
            Ok(vec![0x03])
        );
    }

    #[rstest]
    #[case(standard_did::ECU_MANUFACTURING_DATE, vec![0x07, 0xE7, 12, 15])]
    #[case(standard_did::MANUFACTURING_YEAR, vec![0x07, 0xE7])]
    #[case(standard_did::MANUFACTURING_HOUR, vec![14])]
    #[case(standard_did::MANUFACTURING_SECOND, vec![45])]
    #[case(standard_did::VEHICLE_SPEED, vec![0x00, 60])]
    #[case(standard_did::ENGINE_RPM, 2000u16.to_be_bytes().to_vec())]
    #[case(standard_did::BATTERY_VOLTAGE, 13800u16.to_be_bytes().to_vec())]
    #[case(standard_did::ENGINE_TEMPERATURE, 900i16.to_be_bytes().to_vec())]
    #[case(standard_did::FUEL_LEVEL, vec![80])]
    #[case(standard_did::OPERATING_HOURS, 1250u32.to_be_bytes().to_vec())]
    #[case(standard_did::MANUFACTURER_CODE, b"BMW".to_vec())]
    fn test_encodings(#[case] did: u16, #[case] expected: Vec<u8>) {
        let identity = EntityIdentity::default();
        assert_eq!(read(did, &identity, &ctx()).unwrap(), expected);
    }

    #[test]
    fn test_supported_list_covers_table() {
        let identity = EntityIdentity::default();
        let list = read(standard_did::SUPPORTED_DIDS, &identity, &ctx()).unwrap();
        assert_eq!(list.len(), DID_TABLE.len() * 2);
        assert!(list
            .chunks(2)
            .any(|pair| u16::from_be_bytes([pair[0], pair[1]]) == standard_did::VIN));
    }

    #[test]
    fn test_table_has_no_duplicates() {
        let mut ids: Vec<u16> = supported_dids().collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), DID_TABLE.len());
    }
}
