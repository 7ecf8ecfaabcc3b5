//! Reads the identity and measurement registers of the bundled UMG 804
//! profile and prints them, mirroring a client's first session.

use chrono as _;
use proptest as _;
use rand as _;
use rstest as _;
use serde as _;
use serde_json as _;
use simulator_core::devices::umg804;
use simulator_core::{Rejection, TableKind};
use tempfile as _;
use thiserror as _;
use tracing as _;

const HR: TableKind = TableKind::HoldingRegisters;
const IR: TableKind = TableKind::InputRegisters;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sim = umg804::simulator()?;

    println!(
        "serial number (1-2): {}",
        sim.read_u32(IR, umg804::SERIAL_NUMBER)?
    );
    println!("boot loader version (3): {}", sim.read_words(IR, 3, 1)?[0]);
    println!("power-up counter (6): {}", sim.read_words(HR, 6, 1)?[0]);
    println!("uptime (7-8): {}", sim.read_u32(IR, umg804::UPTIME)?);
    println!("ip address (126-127): {}", sim.read_u32(IR, 126)?);
    println!(
        "dns switch (coils 2304-2319): {:?}",
        sim.read_bits(TableKind::Coils, 144 * 16, 16)?
    );
    println!("global ct size (190): {}", sim.read_words(HR, 190, 1)?[0]);
    println!("ct sizes (200-294): {:?}", sim.read_words(HR, 200, 95)?);
    println!(
        "frequency (4900-4901): {:.2}",
        sim.read_f32(IR, umg804::FREQUENCY)?
    );
    println!(
        "real time clock (109-115): {:?}",
        sim.read_words(HR, umg804::REAL_TIME_CLOCK, 7)?
    );
    println!(
        "brand name (29-44): <<{}>>",
        sim.read_string(IR, umg804::BRAND_NAME)?
    );

    match sim.read_words(HR, 80, 1) {
        Err(rejection @ Rejection::InvalidAddress { .. }) => println!(
            "register 80: {rejection} (exception {:#04x})",
            rejection.exception_code()
        ),
        other => println!("register 80: unexpected {other:?}"),
    }

    let counters = sim.counters();
    println!(
        "served {} reads, {} rejections",
        counters.reads,
        counters.rejections()
    );
    Ok(())
}
