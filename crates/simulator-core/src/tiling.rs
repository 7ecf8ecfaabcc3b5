//! Cyclic copying of a resolved source range across a target range.

use crate::cell::Cell;
use crate::config::{AddressSpec, RuleGroup};
use crate::ConfigError;

/// Fills `target` with copies of the cells in `source`, cyclically.
///
/// Target offset `i` receives a copy of source offset `i % source_len`. The
/// copies are independent: mutating one never affects the source or another
/// copy. Source cells are snapshotted first, so overlapping ranges copy the
/// pre-repeat state.
///
/// # Errors
///
/// Returns [`ConfigError::ReversedRange`] or [`ConfigError::AddressOutOfBounds`]
/// for malformed ranges, [`ConfigError::RepeatInvalidSource`] when the source
/// contains an invalid cell and [`ConfigError::RepeatSplitsComposite`] when a
/// range boundary cuts through a composite value.
pub fn apply_repeat(
    cells: &mut [Cell],
    source: AddressSpec,
    target: AddressSpec,
) -> Result<(), ConfigError> {
    let (src_start, src_end) = checked_range(cells.len(), source)?;
    let (dst_start, dst_end) = checked_range(cells.len(), target)?;

    let pattern = cells[src_start..=src_end].to_vec();
    if let Some(offset) = pattern.iter().position(Cell::is_invalid) {
        return Err(ConfigError::RepeatInvalidSource {
            address: src_start + offset,
        });
    }
    if pattern[0].group_offset() != 0 {
        return Err(ConfigError::RepeatSplitsComposite { address: src_start });
    }
    if !pattern[pattern.len() - 1].is_group_tail() {
        return Err(ConfigError::RepeatSplitsComposite { address: src_end });
    }
    if cells[dst_start].group_offset() != 0 {
        return Err(ConfigError::RepeatSplitsComposite { address: dst_start });
    }
    if !cells[dst_end].is_group_tail() {
        return Err(ConfigError::RepeatSplitsComposite { address: dst_end });
    }
    let target_len = dst_end - dst_start + 1;
    if !pattern[(target_len - 1) % pattern.len()].is_group_tail() {
        return Err(ConfigError::RepeatSplitsComposite { address: dst_end });
    }

    for (offset, cell) in cells[dst_start..=dst_end].iter_mut().enumerate() {
        *cell = pattern[offset % pattern.len()].clone();
    }
    Ok(())
}

fn checked_range(len: usize, spec: AddressSpec) -> Result<(usize, usize), ConfigError> {
    let (start, end) = spec.bounds();
    if start > end {
        return Err(ConfigError::ReversedRange {
            group: RuleGroup::Repeat,
            start,
            end,
        });
    }
    let end_index = end as usize;
    if end_index >= len {
        return Err(ConfigError::AddressOutOfBounds {
            group: RuleGroup::Repeat,
            address: end,
            size: len,
        });
    }
    Ok((start as usize, end_index))
}
