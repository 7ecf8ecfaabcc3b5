//! Several protocol sessions sharing one simulated device.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use chrono as _;
use proptest as _;
use rand as _;
use rstest as _;
use serde as _;
use serde_json as _;
use simulator_core::devices::umg804;
use simulator_core::{RegisterStore, Simulator, TableKind, Values};
use tempfile as _;
use thiserror as _;
use tracing as _;

const HR: TableKind = TableKind::HoldingRegisters;
const SESSIONS: usize = 8;
const READS_PER_SESSION: usize = 125;

fn spawn_sessions<F>(sim: &Arc<Simulator>, session: F)
where
    F: Fn(&Simulator, usize) + Send + Sync + 'static,
{
    let session = Arc::new(session);
    let barrier = Arc::new(Barrier::new(SESSIONS));
    let handles: Vec<_> = (0..SESSIONS)
        .map(|id| {
            let sim = Arc::clone(sim);
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (*session)(&*sim, id);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("session finished");
    }
}

#[test]
fn every_increment_is_observed_exactly_once() {
    let sim = Arc::new(umg804::simulator().expect("profile compiles"));
    let start = sim.read_words(HR, 1700, 1).expect("readable")[0];

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    spawn_sessions(&sim, move |sim, _| {
        for _ in 0..READS_PER_SESSION {
            let words = sim.read_words(HR, 1700, 1).expect("readable");
            sink.lock().expect("not poisoned").push(words[0]);
        }
    });

    let mut seen = seen.lock().expect("not poisoned").clone();
    seen.sort_unstable();
    let mut expected: Vec<u16> = (1..=(SESSIONS * READS_PER_SESSION) as u16)
        .map(|step| start.wrapping_add(step))
        .collect();
    expected.sort_unstable();
    assert_eq!(seen, expected);
}

#[test]
fn composite_values_are_never_torn_across_sessions() {
    let sim = Arc::new(umg804::simulator().expect("profile compiles"));
    sim.write_u32(HR, 120, 0x0000_FFFF).expect("writable pair");

    let ceiling = 0x0000_FFFF + (SESSIONS / 2 * READS_PER_SESSION) as u32;
    spawn_sessions(&sim, move |sim, id| {
        for _ in 0..READS_PER_SESSION {
            if id % 2 == 0 {
                let value = sim.read_u32(HR, 120).expect("readable");
                assert!((0x0000_FFFF..=ceiling).contains(&value), "torn value {value:#x}");
            } else {
                sim.write_u32(HR, 120, 0x0000_FFFF).expect("writable pair");
            }
        }
    });

    let value = sim.read_u32(HR, 120).expect("readable");
    assert!((0x0000_FFFF..=ceiling).contains(&value));
}

#[test]
fn store_trait_objects_serve_sessions() {
    let sim: Arc<dyn RegisterStore + Send + Sync> =
        Arc::new(umg804::simulator().expect("profile compiles"));
    let handles: Vec<_> = (0..SESSIONS)
        .map(|_| {
            let store = Arc::clone(&sim);
            thread::spawn(move || store.read(HR, 3, 3))
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.join().expect("session finished"),
            Ok(Values::Words(vec![123, 101, 999]))
        );
    }
}

#[test]
fn counters_sum_over_sessions() {
    let sim = Arc::new(umg804::simulator().expect("profile compiles"));
    spawn_sessions(&sim, |sim, _| {
        for _ in 0..READS_PER_SESSION {
            let _ = sim.read_words(HR, 3, 1);
            let _ = sim.read_words(HR, 80, 1);
        }
    });
    let counters = sim.counters();
    let total = (SESSIONS * READS_PER_SESSION) as u64;
    assert_eq!(counters.reads, total);
    assert_eq!(counters.invalid_address, total);
    assert_eq!(counters.rejections(), total);
}
