//! Per-group action primitives.
//!
//! Each function receives the whole member slice of one value (a single cell
//! for plain kinds, both words for pairs) and rewrites the stored words.

use rand::Rng;

use crate::cell::{Cell, CellKind};
use crate::codec::{f32_to_words, u32_to_words, words_to_f32, words_to_u32};

/// Upper bound (exclusive) of randomly drawn float values.
pub const RANDOM_FLOAT_MAX: f32 = 100.0;

/// Draws a fresh value from the domain of the group's kind.
pub fn randomize<R: Rng>(group: &mut [Cell], rng: &mut R) {
    match group[0].kind {
        CellKind::Bit => group[0].value = u16::from(rng.gen_bool(0.5)),
        CellKind::Bits | CellKind::Uint16 => group[0].value = rng.gen(),
        CellKind::Uint32 => store_pair(group, u32_to_words(rng.gen())),
        CellKind::Float32 => store_pair(
            group,
            f32_to_words(rng.gen_range(0.0..RANDOM_FLOAT_MAX)),
        ),
        CellKind::String => {}
    }
}

/// Advances the stored value by one, wrapping at the kind's maximum.
///
/// Bit cells toggle and float pairs add `1.0`.
pub fn increment(group: &mut [Cell]) {
    match group[0].kind {
        CellKind::Bit => group[0].value ^= 1,
        CellKind::Bits | CellKind::Uint16 => group[0].value = group[0].value.wrapping_add(1),
        CellKind::Uint32 => {
            let next = words_to_u32(load_pair(group)).wrapping_add(1);
            store_pair(group, u32_to_words(next));
        }
        CellKind::Float32 => {
            let next = words_to_f32(load_pair(group)) + 1.0;
            store_pair(group, f32_to_words(next));
        }
        CellKind::String => {}
    }
}

/// Stores elapsed seconds truncated to the group's width.
#[allow(clippy::cast_possible_truncation)]
pub fn store_uptime(group: &mut [Cell], secs: u64) {
    match group[0].kind {
        CellKind::Bit => group[0].value = u16::from(secs % 2 == 1),
        CellKind::Bits | CellKind::Uint16 => group[0].value = (secs & 0xFFFF) as u16,
        CellKind::Uint32 => store_pair(group, u32_to_words((secs & 0xFFFF_FFFF) as u32)),
        CellKind::Float32 => {
            #[allow(clippy::cast_precision_loss)]
            let seconds = secs as f32;
            store_pair(group, f32_to_words(seconds));
        }
        CellKind::String => {}
    }
}

fn load_pair(group: &[Cell]) -> [u16; 2] {
    [group[0].value, group[1].value]
}

fn store_pair(group: &mut [Cell], words: [u16; 2]) {
    group[0].value = words[0];
    group[1].value = words[1];
}
