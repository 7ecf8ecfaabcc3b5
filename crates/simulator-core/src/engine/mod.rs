//! Value engine: runs cell actions on read and stores values on write.
//!
//! Both entry points take a range that already passed
//! [`crate::memory::authorize`].

/// Per-group action primitives.
pub mod actions;

use rand::rngs::StdRng;
use tracing::error;

use crate::callbacks::CallbackRegistry;
use crate::cell::{Action, Cell};
use crate::clock::{timestamp_record, ClockFormat, TimeSource, TIMESTAMP_WORDS};
use crate::memory::{AddressSpace, AuthorizedRange, TableKind};
use crate::Rejection;

/// Typed values exchanged with a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Values {
    /// Bit-table values.
    Bits(Vec<bool>),
    /// Word-table values.
    Words(Vec<u16>),
}

impl Values {
    /// Number of addresses the values cover.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bits(bits) => bits.len(),
            Self::Words(words) => words.len(),
        }
    }

    /// Returns `true` when no value is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bits, or `None` for word values.
    #[must_use]
    pub fn as_bits(&self) -> Option<&[bool]> {
        match self {
            Self::Bits(bits) => Some(bits),
            Self::Words(_) => None,
        }
    }

    /// Returns the words, or `None` for bit values.
    #[must_use]
    pub fn as_words(&self) -> Option<&[u16]> {
        match self {
            Self::Words(words) => Some(words),
            Self::Bits(_) => None,
        }
    }

    /// Consumes the values, returning the bits.
    #[must_use]
    pub fn into_bits(self) -> Option<Vec<bool>> {
        match self {
            Self::Bits(bits) => Some(bits),
            Self::Words(_) => None,
        }
    }

    /// Consumes the values, returning the words.
    #[must_use]
    pub fn into_words(self) -> Option<Vec<u16>> {
        match self {
            Self::Words(words) => Some(words),
            Self::Bits(_) => None,
        }
    }
}

/// Device resources actions draw on.
pub struct EngineContext<'a> {
    /// Generator behind `random` actions.
    pub rng: &'a mut StdRng,
    /// Clock behind `clock` actions.
    pub time: &'a dyn TimeSource,
    /// Named callbacks.
    pub callbacks: &'a CallbackRegistry,
}

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Values in request order.
    pub values: Values,
    /// A `reset` cell was read; the device must be rebuilt.
    pub reset_requested: bool,
}

/// Reads an authorized range, running each touched value's action once.
///
/// `random`, `clock` and callback actions update the stored value before it
/// is returned; `increment` cells return the stored value and advance
/// afterwards. A composite touched only partly still runs its action over
/// all of its words.
///
/// # Errors
///
/// Returns [`Rejection::Callback`] when a callback fails. Every cell the
/// read's actions could have touched is then restored.
pub fn read_cells(
    space: &mut AddressSpace,
    range: &AuthorizedRange,
    ctx: &mut EngineContext<'_>,
) -> Result<ReadOutcome, Rejection> {
    let (owner_table, cells) = owner_cells(space, range);
    let heads = group_heads(cells, range);
    let (first, end) = action_span(cells, range, &heads);
    let saved = cells[first..end].to_vec();

    let mut reset_requested = false;
    let mut pending_increments = Vec::new();
    for head in heads {
        let width = cells[head].group_width();
        match cells[head].action.clone() {
            Action::None => {}
            Action::Random => actions::randomize(&mut cells[head..head + width], &mut *ctx.rng),
            Action::Increment => pending_increments.push(head),
            Action::Clock(ClockFormat::Uptime) => {
                actions::store_uptime(&mut cells[head..head + width], ctx.time.elapsed().as_secs());
            }
            Action::Clock(ClockFormat::Timestamp) => {
                let record = timestamp_record(&ctx.time.now());
                for (cell, word) in cells[head..].iter_mut().zip(record) {
                    cell.value = word;
                }
            }
            Action::Callback(name) => {
                if let Err(rejection) =
                    run_callback(ctx.callbacks, &name, owner_table, range, head, &mut cells[head])
                {
                    cells[first..end].clone_from_slice(&saved);
                    return Err(rejection);
                }
            }
            Action::Reset => reset_requested = true,
        }
    }

    let values = collect(cells, range);
    for head in pending_increments {
        let width = cells[head].group_width();
        actions::increment(&mut cells[head..head + width]);
    }

    Ok(ReadOutcome {
        values,
        reset_requested,
    })
}

/// Stores `values` into an authorized range.
///
/// Bit writes through an aliasing table set or clear one bit of the owning
/// word. Callback cells run their callback after the store; when one fails
/// every touched cell is restored.
///
/// # Errors
///
/// Returns [`Rejection::TypeMismatch`] when bit values target a word table
/// or the other way round, [`Rejection::IllegalValue`] when the value count
/// differs from the authorized count and [`Rejection::Callback`] when a
/// callback fails.
pub fn write_cells(
    space: &mut AddressSpace,
    range: &AuthorizedRange,
    values: &Values,
    callbacks: &CallbackRegistry,
) -> Result<(), Rejection> {
    let table = range.table();
    let address = range.start();
    match values {
        Values::Bits(_) if !table.is_bit_table() => {
            return Err(Rejection::TypeMismatch { table, address })
        }
        Values::Words(_) if table.is_bit_table() => {
            return Err(Rejection::TypeMismatch { table, address })
        }
        _ if values.len() != usize::from(range.count()) => {
            return Err(Rejection::IllegalValue { table, address })
        }
        _ => {}
    }

    let (owner_table, cells) = owner_cells(space, range);
    let (first, last) = range.cells();
    let saved = cells[first..=last].to_vec();

    match values {
        Values::Bits(bits) => {
            for (offset, on) in bits.iter().enumerate() {
                match range.position(offset) {
                    (index, Some(bit)) => cells[index].set_bit(bit, *on),
                    (index, None) => cells[index].value = u16::from(*on),
                }
            }
        }
        Values::Words(words) => {
            for (cell, word) in cells[first..=last].iter_mut().zip(words) {
                cell.value = *word;
            }
        }
    }

    for head in group_heads(cells, range) {
        if let Action::Callback(name) = cells[head].action.clone() {
            if let Err(rejection) =
                run_callback(callbacks, &name, owner_table, range, head, &mut cells[head])
            {
                cells[first..=last].clone_from_slice(&saved);
                return Err(rejection);
            }
        }
    }
    Ok(())
}

/// Returns the table that owns the touched cells and the block holding them.
fn owner_cells<'s>(
    space: &'s mut AddressSpace,
    range: &AuthorizedRange,
) -> (TableKind, &'s mut [Cell]) {
    let owner = if range.is_bit_over_word() {
        space
            .layout()
            .bit_owner(range.table())
            .unwrap_or(range.table())
    } else {
        range.table()
    };
    (owner, space.block_mut(range.block()))
}

/// First cell index of every value the range touches, in address order.
fn group_heads(cells: &[Cell], range: &AuthorizedRange) -> Vec<usize> {
    let (first, last) = range.cells();
    let mut heads: Vec<usize> = Vec::new();
    for index in first..=last {
        let head = index - cells[index].group_offset();
        if heads.last() != Some(&head) {
            heads.push(head);
        }
    }
    heads
}

/// Half-open span of cell indices a read's actions may write: every touched
/// group plus the record behind any timestamp head.
fn action_span(cells: &[Cell], range: &AuthorizedRange, heads: &[usize]) -> (usize, usize) {
    let (first, last) = range.cells();
    let start = heads.first().copied().unwrap_or(first);
    let end = heads.iter().fold(last + 1, |end, &head| {
        let reach = match cells[head].action {
            Action::Clock(ClockFormat::Timestamp) => TIMESTAMP_WORDS,
            _ => cells[head].group_width(),
        };
        end.max(head + reach)
    });
    (start, end.min(cells.len()))
}

fn collect(cells: &[Cell], range: &AuthorizedRange) -> Values {
    let count = usize::from(range.count());
    if range.table().is_bit_table() {
        Values::Bits(
            (0..count)
                .map(|offset| match range.position(offset) {
                    (index, Some(bit)) => cells[index].bit(bit),
                    (index, None) => cells[index].value != 0,
                })
                .collect(),
        )
    } else {
        let (first, last) = range.cells();
        Values::Words(cells[first..=last].iter().map(|cell| cell.value).collect())
    }
}

fn run_callback(
    callbacks: &CallbackRegistry,
    name: &str,
    table: TableKind,
    range: &AuthorizedRange,
    head: usize,
    cell: &mut Cell,
) -> Result<(), Rejection> {
    let address = u16::try_from(head).unwrap_or(u16::MAX);
    callbacks
        .invoke(name, table, address, cell)
        .map_err(|err| {
            error!(
                callback = name,
                table = %table,
                address,
                error = %err,
                "callback failed"
            );
            Rejection::Callback {
                table: range.table(),
                address: range.address_of(head),
            }
        })
}
