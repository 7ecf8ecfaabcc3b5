//! Core crate of the register simulator.
//!
//! A device is described by a JSON [`DeviceConfig`], compiled into an
//! [`AddressSpace`] of typed cells and served through a [`Simulator`].

/// Register cell model: kinds, access and per-read actions.
pub mod cell;
pub use cell::{Access, Action, Cell, CellKind, Group};

/// Wall-clock and uptime sources.
pub mod clock;
pub use clock::{
    timestamp_record, ClockFormat, ManualClock, SystemClock, TimeSource, TIMESTAMP_WORDS,
};

/// Big-endian word codecs for composite values.
pub mod codec;
pub use codec::{
    f32_to_words, string_to_words, u32_to_words, words_to_f32, words_to_string, words_to_u32,
};

/// Rejection and configuration error taxonomy.
pub mod fault;
pub use fault::{CallbackError, ConfigError, Rejection, RejectionClass};

/// Table layout, block sharing and the access controller.
pub mod memory;
pub use memory::{
    authorize, request_for_function_code, AccessKind, AddressSpace, Addressing, AuthorizedRange,
    BitAlias, BlockKind, BlockSpec, CellLocation, SharingMode, TableKind, TableLayout,
    TableSizes, TableView, BITS_PER_WORD, MAX_TABLE_CELLS,
};

/// Declarative device configuration.
pub mod config;
pub use config::{
    AddressSpec, DefaultActions, DefaultValues, Defaults, DeviceConfig, RepeatRule, Rule,
    RuleEntry, RuleException, RuleGroup, RuleValue, Setup,
};

/// Named host callbacks attached to cells.
pub mod callbacks;
pub use callbacks::{CallbackFn, CallbackRegistry};

/// Repeat rules copying cell templates across a range.
pub mod tiling;
pub use tiling::apply_repeat;

/// Configuration compiler.
pub mod compiler;
pub use compiler::compile;

/// Read/write engine running cell actions.
pub mod engine;
pub use engine::{read_cells, write_cells, EngineContext, ReadOutcome, Values};

/// Request counters.
pub mod diag;
pub use diag::RequestCounters;

/// Public host-facing device surface.
pub mod api;
pub use api::{RegisterStore, Simulator};

/// Bundled device profiles.
pub mod devices;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
