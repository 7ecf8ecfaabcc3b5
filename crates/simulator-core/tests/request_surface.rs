//! Request surface suite: function-code dispatch, access control and
//! rejection reporting.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

use chrono as _;
use proptest as _;
use rand as _;
use rstest::rstest;
use serde as _;
use serde_json as _;
use simulator_core::{
    request_for_function_code, AccessKind, CallbackError, CallbackRegistry, Cell, RegisterStore,
    Rejection, RejectionClass, Simulator, TableKind, Values,
};
use tempfile as _;
use thiserror as _;
use tracing as _;

const HR: TableKind = TableKind::HoldingRegisters;

fn device(extra_setup: &str, rules: &str, callbacks: CallbackRegistry) -> Simulator {
    let text = format!(
        r#"{{
            "setup": {{ "co size": 128, "di size": 128, "hr size": 8, "ir size": 8,
                        "shared blocks": true, "seed": 11 {extra_setup} }}
            {rules}
        }}"#
    );
    Simulator::from_json(&text, callbacks).expect("valid device")
}

/// Serves one request the way a protocol adapter would: function code first,
/// then the generic store.
fn dispatch<S: RegisterStore>(
    store: &S,
    code: u8,
    start: u16,
    count: u16,
    words: &[u16],
) -> Result<Values, u8> {
    let (table, kind) = request_for_function_code(code).ok_or(0x01_u8)?;
    let result = match kind {
        AccessKind::Read => store.read(table, start, count),
        AccessKind::Write if table.is_bit_table() => {
            let bits = words.iter().map(|word| *word != 0).collect();
            store.write(table, start, &Values::Bits(bits)).map(|()| Values::Bits(Vec::new()))
        }
        AccessKind::Write => store
            .write(table, start, &Values::Words(words.to_vec()))
            .map(|()| Values::Words(Vec::new())),
    };
    result.map_err(Rejection::exception_code)
}

#[rstest]
#[case(1, TableKind::Coils, AccessKind::Read)]
#[case(2, TableKind::DiscreteInputs, AccessKind::Read)]
#[case(3, TableKind::HoldingRegisters, AccessKind::Read)]
#[case(4, TableKind::InputRegisters, AccessKind::Read)]
#[case(5, TableKind::Coils, AccessKind::Write)]
#[case(6, TableKind::HoldingRegisters, AccessKind::Write)]
#[case(15, TableKind::Coils, AccessKind::Write)]
#[case(16, TableKind::HoldingRegisters, AccessKind::Write)]
fn function_codes_select_table_and_direction(
    #[case] code: u8,
    #[case] table: TableKind,
    #[case] kind: AccessKind,
) {
    assert_eq!(request_for_function_code(code), Some((table, kind)));
}

#[rstest]
#[case(0)]
#[case(7)]
#[case(17)]
#[case(43)]
fn unsupported_function_codes_are_unknown(#[case] code: u8) {
    assert_eq!(request_for_function_code(code), None);
}

#[test]
fn dispatch_maps_rejections_to_exception_codes() {
    let callbacks =
        CallbackRegistry::new().with("fail", |_: TableKind, _: u16, _: &mut Cell| {
            Err(CallbackError::new("sensor offline"))
        });
    let sim = device(
        "",
        r#", "write": [[0, 3]], "invalid": [5],
             "uint16": [{ "addr": 0, "value": 7 }, { "addr": 6, "action": "fail" }]"#,
        callbacks,
    );

    assert_eq!(dispatch(&sim, 3, 0, 1, &[]), Ok(Values::Words(vec![7])));
    assert_eq!(dispatch(&sim, 16, 1, 2, &[4, 5]), Ok(Values::Words(Vec::new())));
    assert_eq!(dispatch(&sim, 3, 1, 2, &[]), Ok(Values::Words(vec![4, 5])));
    assert_eq!(dispatch(&sim, 8, 0, 1, &[]), Err(0x01));
    assert_eq!(dispatch(&sim, 3, 7, 2, &[]), Err(0x02));
    assert_eq!(dispatch(&sim, 4, 4, 2, &[]), Err(0x02));
    assert_eq!(dispatch(&sim, 6, 4, 1, &[1]), Err(0x02));
    assert_eq!(dispatch(&sim, 3, 6, 1, &[]), Err(0x04));
}

#[test]
fn zero_count_is_out_of_range() {
    let sim = device("", "", CallbackRegistry::new());
    let rejection = sim.read(HR, 0, 0).expect_err("empty request");
    assert!(matches!(rejection, Rejection::OutOfRange { count: 0, .. }));
    assert_eq!(rejection.class(), RejectionClass::OutOfRange);
}

#[test]
fn read_only_cells_refuse_writes_but_serve_reads() {
    let sim = device(
        "",
        r#", "write": [0], "uint16": [{ "addr": 1, "value": 12 }]"#,
        CallbackRegistry::new(),
    );
    let rejection = sim.write_words(HR, 0, &[1, 2]).expect_err("cell 1 is read-only");
    assert_eq!(rejection, Rejection::AccessDenied { table: HR, address: 1 });
    assert_eq!(rejection.class(), RejectionClass::AccessDenied);
    assert_eq!(sim.read_words(HR, 0, 2), Ok(vec![0, 12]));
}

#[test]
fn composite_writes_must_cover_whole_values() {
    let sim = device(
        "",
        r#", "write": [[0, 3]], "uint32": [{ "addr": [0, 1], "value": 65537 }]"#,
        CallbackRegistry::new(),
    );
    assert_eq!(
        sim.write_words(HR, 1, &[9]),
        Err(Rejection::PartialComposite { table: HR, address: 1 })
    );
    assert_eq!(
        sim.write_words(HR, 1, &[9, 9]),
        Err(Rejection::PartialComposite { table: HR, address: 1 })
    );
    assert_eq!(sim.read_words(HR, 1, 1), Ok(vec![1]));
    assert_eq!(sim.read_u32(HR, 0), Ok(65_537));
}

#[test]
fn type_exception_enforces_request_and_cell_agreement() {
    let sim = device(
        r#", "type exception": true"#,
        r#", "bits": [{ "addr": 1, "value": 5 }], "uint32": [[2, 3]]"#,
        CallbackRegistry::new(),
    );
    assert_eq!(
        sim.read_words(HR, 3, 1),
        Err(Rejection::TypeMismatch { table: HR, address: 3 })
    );
    assert_eq!(
        sim.read_bits(TableKind::Coils, 0, 4),
        Err(Rejection::TypeMismatch {
            table: TableKind::Coils,
            address: 0
        })
    );
    assert_eq!(
        sim.read_bits(TableKind::Coils, 16, 3),
        Ok(vec![true, false, true])
    );
    assert_eq!(sim.read_words(HR, 2, 2), Ok(vec![0, 0]));
}

#[test]
fn failed_write_callback_restores_cells() {
    let callbacks = CallbackRegistry::new().with("veto", |_: TableKind, _: u16, cell: &mut Cell| {
        if cell.value > 100 {
            Err(CallbackError::new("value above limit"))
        } else {
            Ok(())
        }
    });
    let sim = device(
        "",
        r#", "write": [[0, 1]],
             "uint16": [{ "addr": 0, "value": 3 }, { "addr": 1, "value": 4, "action": "veto" }]"#,
        callbacks,
    );

    let rejection = sim.write_words(HR, 0, &[50, 500]).expect_err("vetoed");
    assert_eq!(rejection, Rejection::Callback { table: HR, address: 1 });
    assert_eq!(rejection.exception_code(), 0x04);
    assert_eq!(sim.cell(HR, 0).map(|cell| cell.value), Some(3));
    assert_eq!(sim.cell(HR, 1).map(|cell| cell.value), Some(4));

    sim.write_words(HR, 0, &[50, 60]).expect("accepted");
    assert_eq!(sim.read_words(HR, 0, 2), Ok(vec![50, 60]));
    assert_eq!(sim.counters().callback_errors, 1);
}

#[test]
fn failed_read_callback_leaves_values_untouched() {
    let callbacks = CallbackRegistry::new().with("fail", |_: TableKind, _: u16, _: &mut Cell| {
        Err(CallbackError::new("sensor offline"))
    });
    let sim = device(
        "",
        r#", "uint16": [{ "addr": 0, "value": 7, "action": "random" },
                        { "addr": 1, "value": 7, "action": "increment" },
                        { "addr": 2, "action": "fail" }]"#,
        callbacks,
    );

    assert_eq!(
        sim.read(HR, 0, 3),
        Err(Rejection::Callback { table: HR, address: 2 })
    );
    assert_eq!(sim.cell(HR, 0).map(|cell| cell.value), Some(7));
    assert_eq!(sim.cell(HR, 1).map(|cell| cell.value), Some(7));
    assert_eq!(sim.read_words(HR, 1, 1), Ok(vec![7]));
    assert_eq!(sim.read_words(HR, 1, 1), Ok(vec![8]));
}

#[test]
fn rejected_write_over_invalid_cell_stores_nothing() {
    let sim = device(
        "",
        r#", "write": [[0, 1]], "invalid": [2], "uint16": [{ "addr": 1, "value": 4 }]"#,
        CallbackRegistry::new(),
    );
    assert_eq!(
        sim.write_words(HR, 0, &[8, 9, 10]),
        Err(Rejection::InvalidAddress { table: HR, address: 2 })
    );
    assert_eq!(sim.read_words(HR, 0, 2), Ok(vec![0, 4]));
}

#[test]
fn coil_writes_cannot_reach_into_composite_words() {
    let sim = device(
        "",
        r#", "write": [[0, 3]], "uint32": [{ "addr": [2, 3], "value": 65537 }]"#,
        CallbackRegistry::new(),
    );
    assert_eq!(
        sim.write_bits(TableKind::Coils, 32, &[false]),
        Err(Rejection::PartialComposite {
            table: TableKind::Coils,
            address: 32
        })
    );
    assert_eq!(
        sim.write_bits(TableKind::Coils, 30, &[true, true, true]),
        Err(Rejection::PartialComposite {
            table: TableKind::Coils,
            address: 32
        })
    );
    assert_eq!(sim.read_u32(HR, 2), Ok(65_537));
    assert_eq!(sim.read_bits(TableKind::Coils, 32, 1), Ok(vec![true]));

    sim.write_bits(TableKind::Coils, 16, &[true]).expect("plain word");
    assert_eq!(sim.read_words(HR, 1, 1), Ok(vec![1]));
}

#[test]
fn mismatched_value_kinds_are_rejected() {
    let sim = device("", r#", "write": [0]"#, CallbackRegistry::new());
    assert_eq!(
        sim.write(HR, 0, &Values::Bits(vec![true])),
        Err(Rejection::TypeMismatch { table: HR, address: 0 })
    );
    assert_eq!(
        sim.write_bits(HR, 0, &[true]),
        Err(Rejection::TypeMismatch { table: HR, address: 0 })
    );
}

#[test]
fn rejection_messages_name_table_and_address() {
    let sim = device("", r#", "invalid": [2]"#, CallbackRegistry::new());
    let rejection = sim.read(TableKind::InputRegisters, 6, 4).expect_err("past the end");
    assert_eq!(
        rejection.to_string(),
        "input registers range 6+4 exceeds table size 8"
    );
    let rejection = sim.read(HR, 0, 4).expect_err("invalid cell");
    assert_eq!(rejection.table(), HR);
    assert_eq!(rejection.address(), 2);
}
