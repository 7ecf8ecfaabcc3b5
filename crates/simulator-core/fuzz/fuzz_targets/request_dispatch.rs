#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use simulator_core::{
    request_for_function_code, AccessKind, CallbackRegistry, Simulator, TableKind, Values,
};

const DEVICE: &str = r#"{
    "setup": { "co size": 512, "di size": 512, "hr size": 32, "ir size": 32,
               "shared blocks": true, "type exception": true, "seed": 1 },
    "invalid": [[28, 29]],
    "write": [[0, 19]],
    "bits": [[0, 3]],
    "uint16": [{ "addr": 4, "action": "increment" }, { "addr": 5, "action": "random" }],
    "uint32": [{ "addr": [6, 7], "action": "uptime" }],
    "float32": [{ "addr": [8, 9], "value": 1.5 }],
    "string": [{ "addr": [10, 13], "value": "fuzz" }],
    "repeat": [{ "addr": [4, 13], "to": [14, 23] }]
}"#;

fn device() -> &'static Simulator {
    static DEVICE_CELL: OnceLock<Simulator> = OnceLock::new();
    DEVICE_CELL.get_or_init(|| {
        Simulator::from_json(DEVICE, CallbackRegistry::new()).expect("fuzz device compiles")
    })
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    let sim = device();
    let start = u16::from_be_bytes([data[1], data[2]]);
    let count = u16::from_be_bytes([data[3], data[4]]);
    let payload = &data[5..];

    let Some((table, kind)) = request_for_function_code(data[0]) else {
        return;
    };
    match kind {
        AccessKind::Read => {
            if let Ok(values) = sim.read(table, start, count) {
                assert_eq!(values.len(), usize::from(count));
            }
        }
        AccessKind::Write if table.is_bit_table() => {
            let bits = payload.iter().map(|byte| byte & 1 == 1).collect();
            let _ = sim.write(table, start, &Values::Bits(bits));
        }
        AccessKind::Write => {
            let words = payload
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            let _ = sim.write(table, start, &Values::Words(words));
        }
    }

    let _ = sim.read_string(TableKind::HoldingRegisters, 10);
    let counters = sim.counters();
    assert!(counters.reads >= 1 || counters.rejections() >= 1 || counters.writes >= 1);
});
