//! Janitza UMG 804 power analyser register map.
//!
//! All four tables share one 63000-word block. Coils and discrete inputs
//! address the bits of that block, so coil `144 * 16` is bit 0 of register
//! 144.

use crate::memory::TableKind;
use crate::{CallbackError, CallbackRegistry, Cell, ConfigError, DeviceConfig, Simulator};

/// Embedded JSON configuration of the profile.
pub const CONFIG_JSON: &str = include_str!("umg804.json");

/// Name of the callback clearing the reset register.
pub const RESET_CALLBACK: &str = "umg804_reset";

/// Register holding the serial number (`uint32`).
pub const SERIAL_NUMBER: u16 = 1;
/// Register holding the uptime in seconds (`uint32`).
pub const UPTIME: u16 = 7;
/// First word of the brand name string.
pub const BRAND_NAME: u16 = 29;
/// First word of the real-time clock record.
pub const REAL_TIME_CLOCK: u16 = 109;
/// Register cleared by [`RESET_CALLBACK`].
pub const RESET_REGISTER: u16 = 192;
/// Register holding the mains frequency (`float32`).
pub const FREQUENCY: u16 = 4900;

/// Parses the embedded configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the embedded JSON is malformed.
pub fn config() -> Result<DeviceConfig, ConfigError> {
    DeviceConfig::from_json(CONFIG_JSON)
}

/// Returns the callbacks the configuration refers to.
#[must_use]
pub fn callbacks() -> CallbackRegistry {
    CallbackRegistry::new().with(RESET_CALLBACK, clear_register)
}

/// Builds a simulator for the profile driven by the system clock.
///
/// # Errors
///
/// Returns the [`ConfigError`] raised while parsing or compiling.
pub fn simulator() -> Result<Simulator, ConfigError> {
    Simulator::new(config()?, callbacks())
}

#[allow(clippy::unnecessary_wraps)]
fn clear_register(_table: TableKind, _address: u16, cell: &mut Cell) -> Result<(), CallbackError> {
    cell.value = 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        callbacks, config, simulator, BRAND_NAME, FREQUENCY, REAL_TIME_CLOCK, RESET_REGISTER,
        SERIAL_NUMBER,
    };
    use crate::memory::{SharingMode, TableKind};
    use crate::{ManualClock, Rejection, Simulator};

    const HR: TableKind = TableKind::HoldingRegisters;
    const IR: TableKind = TableKind::InputRegisters;

    #[test]
    fn profile_compiles_into_one_shared_block() {
        let config = config().expect("embedded profile parses");
        assert_eq!(config.setup.sharing_mode(), SharingMode::Unified);
        let sim = simulator().expect("embedded profile compiles");
        assert_eq!(sim.size(HR), 63_000);
        assert_eq!(sim.size(TableKind::Coils), 63_000);
    }

    #[test]
    fn identity_registers_read_back() {
        let sim = simulator().expect("compiles");
        assert_eq!(sim.read_u32(IR, SERIAL_NUMBER), Ok(123_456_789));
        assert_eq!(sim.read_words(HR, 6, 1), Ok(vec![11]));
        assert_eq!(
            sim.read_string(IR, BRAND_NAME),
            Ok("Brand name, 32 bytes...........X".to_string())
        );
        let frequency = sim.read_f32(IR, FREQUENCY).expect("readable");
        assert!((frequency - 50.1).abs() < 1e-4);
    }

    #[test]
    fn coils_expose_register_bits() {
        let sim = simulator().expect("compiles");
        let bits = sim.read_bits(TableKind::Coils, 144 * 16, 16).expect("readable");
        assert!(bits[0]);
        assert!(bits[1..].iter().all(|bit| !bit));
    }

    #[test]
    fn invalid_gaps_are_rejected() {
        let sim = simulator().expect("compiles");
        assert_eq!(
            sim.read_words(HR, 80, 1),
            Err(Rejection::InvalidAddress {
                table: HR,
                address: 80
            })
        );
    }

    #[test]
    fn reset_register_is_cleared_by_its_callback() {
        let sim = simulator().expect("compiles");
        sim.write_words(HR, RESET_REGISTER, &[500]).expect("writable");
        assert_eq!(sim.read_words(HR, RESET_REGISTER, 1), Ok(vec![0]));
    }

    #[test]
    fn real_time_clock_reports_frozen_time() {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 30, 45)
            .single()
            .expect("valid date");
        let sim = Simulator::with_time_source(
            config().expect("parses"),
            callbacks(),
            ManualClock::new(now),
        )
        .expect("compiles");
        // 2024-06-01 was a Saturday.
        assert_eq!(
            sim.read_words(HR, REAL_TIME_CLOCK, 7),
            Ok(vec![2024, 5, 1, 6, 12, 30, 45])
        );
    }

    #[test]
    fn repeat_copies_the_measurement_template() {
        let sim = simulator().expect("compiles");
        for offset in [0_u16, 8, 24, 48, 167] {
            assert_eq!(sim.cell(HR, 2110 + offset), sim.cell(HR, 1942 + offset));
            assert_eq!(sim.cell(HR, 2278 + offset), sim.cell(HR, 1942 + offset));
        }
    }
}
