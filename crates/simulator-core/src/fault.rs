use std::path::PathBuf;

use thiserror::Error;

use crate::config::RuleGroup;
use crate::memory::TableKind;

/// Rejection classes used for request counters and adapter policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionClass {
    /// Request range exceeds the table size.
    OutOfRange,
    /// Request touched an address marked invalid.
    InvalidAddress,
    /// Request violated a permission or typing rule.
    AccessDenied,
    /// A registered callback failed.
    CallbackError,
}

/// Per-request rejection returned by the access controller and value engine.
///
/// Requests rejected before the value engine runs leave device state
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Rejection {
    /// Range `start..start + count` does not fit the table, or `count` is zero.
    #[error("{table} range {start}+{count} exceeds table size {size}")]
    OutOfRange {
        /// Addressed table.
        table: TableKind,
        /// First requested address.
        start: u16,
        /// Requested count.
        count: u32,
        /// Declared table size.
        size: u32,
    },
    /// A requested address is marked invalid.
    #[error("{table} address {address} is invalid")]
    InvalidAddress {
        /// Addressed table.
        table: TableKind,
        /// First invalid address in the request.
        address: u16,
    },
    /// A write targeted a read-only address.
    #[error("{table} address {address} is read-only")]
    AccessDenied {
        /// Addressed table.
        table: TableKind,
        /// First read-only address in the request.
        address: u16,
    },
    /// A write covered only part of a composite value.
    #[error("{table} write splits the composite value at address {address}")]
    PartialComposite {
        /// Addressed table.
        table: TableKind,
        /// Address of the split composite word.
        address: u16,
    },
    /// Request type does not match the cell type.
    #[error("{table} address {address} has a different type than requested")]
    TypeMismatch {
        /// Addressed table.
        table: TableKind,
        /// First mismatching address.
        address: u16,
    },
    /// Supplied value cannot be stored in the addressed cells.
    #[error("{table} value does not fit the cells at address {address}")]
    IllegalValue {
        /// Addressed table.
        table: TableKind,
        /// First addressed cell.
        address: u16,
    },
    /// A named callback reported an error.
    #[error("callback failed at {table} address {address}")]
    Callback {
        /// Addressed table.
        table: TableKind,
        /// Address of the cell whose callback failed.
        address: u16,
    },
}

impl Rejection {
    /// Returns the rejection class for this rejection.
    #[must_use]
    pub const fn class(self) -> RejectionClass {
        match self {
            Self::OutOfRange { .. } => RejectionClass::OutOfRange,
            Self::InvalidAddress { .. } => RejectionClass::InvalidAddress,
            Self::AccessDenied { .. }
            | Self::PartialComposite { .. }
            | Self::TypeMismatch { .. }
            | Self::IllegalValue { .. } => RejectionClass::AccessDenied,
            Self::Callback { .. } => RejectionClass::CallbackError,
        }
    }

    /// Returns the Modbus exception code an adapter should answer with.
    ///
    /// `0x02` illegal data address, `0x03` illegal data value, `0x04` server
    /// device failure.
    #[must_use]
    pub const fn exception_code(self) -> u8 {
        match self {
            Self::IllegalValue { .. } => 0x03,
            Self::Callback { .. } => 0x04,
            Self::OutOfRange { .. }
            | Self::InvalidAddress { .. }
            | Self::AccessDenied { .. }
            | Self::PartialComposite { .. }
            | Self::TypeMismatch { .. } => 0x02,
        }
    }

    /// Returns the table the rejected request addressed.
    #[must_use]
    pub const fn table(self) -> TableKind {
        match self {
            Self::OutOfRange { table, .. }
            | Self::InvalidAddress { table, .. }
            | Self::AccessDenied { table, .. }
            | Self::PartialComposite { table, .. }
            | Self::TypeMismatch { table, .. }
            | Self::IllegalValue { table, .. }
            | Self::Callback { table, .. } => table,
        }
    }

    /// Returns the address the rejection refers to.
    #[must_use]
    pub const fn address(self) -> u16 {
        match self {
            Self::OutOfRange { start, .. } => start,
            Self::InvalidAddress { address, .. }
            | Self::AccessDenied { address, .. }
            | Self::PartialComposite { address, .. }
            | Self::TypeMismatch { address, .. }
            | Self::IllegalValue { address, .. }
            | Self::Callback { address, .. } => address,
        }
    }
}

/// Error reported by a named callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    /// Human-readable failure description.
    pub message: String,
}

impl CallbackError {
    /// Creates a callback error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fatal configuration error raised while loading or compiling a device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration text is not valid JSON or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(String),
    /// Configuration file could not be read.
    #[error("cannot read {}: {message}", path.display())]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },
    /// A table size exceeds the 16-bit address space.
    #[error("{table} size {size} exceeds 65536")]
    TableTooLarge {
        /// Oversized table.
        table: TableKind,
        /// Declared size.
        size: u32,
    },
    /// An aliasing bit table has more bits than its backing block provides.
    #[error("{table} size {size} exceeds the {available} bits of its backing block")]
    BitTableExceedsBlock {
        /// Bit table.
        table: TableKind,
        /// Declared size.
        size: u32,
        /// Bits available in the backing block.
        available: u32,
    },
    /// A rule addresses cells outside its block.
    #[error("{group} rule address {address} is outside the block of size {size}")]
    AddressOutOfBounds {
        /// Rule list.
        group: RuleGroup,
        /// Offending address.
        address: u32,
        /// Block size.
        size: usize,
    },
    /// A range is written with its end before its start.
    #[error("{group} rule range [{start}, {end}] is reversed")]
    ReversedRange {
        /// Rule list.
        group: RuleGroup,
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
    },
    /// A composite range is not a multiple of the composite width.
    #[error("{group} rule range starting at {address} is not a multiple of {width} words")]
    CompositeWidth {
        /// Rule list.
        group: RuleGroup,
        /// Range start.
        address: u32,
        /// Composite width in words.
        width: u16,
    },
    /// A later rule overwrote only part of a composite value.
    #[error("composite value at address {address} is only partly covered by a later rule")]
    TornComposite {
        /// Address of the first surviving composite word.
        address: usize,
    },
    /// Members of one composite value have different access.
    #[error("composite value at address {address} mixes access permissions")]
    MixedCompositeAccess {
        /// Address of the first composite word.
        address: usize,
    },
    /// An action name is neither built in nor registered as a callback.
    #[error("{group} rule at address {address} names unknown action {name:?}")]
    UnknownAction {
        /// Rule list.
        group: RuleGroup,
        /// Rule address.
        address: u32,
        /// Unknown name.
        name: String,
    },
    /// An action cannot be applied to the rule's value type.
    #[error("{group} rule at address {address} does not support action {name:?}")]
    UnsupportedAction {
        /// Rule list.
        group: RuleGroup,
        /// Rule address.
        address: u32,
        /// Action name.
        name: String,
    },
    /// A value does not fit the rule's value type.
    #[error("{group} rule at address {address} has a value outside its type")]
    InvalidValue {
        /// Rule list.
        group: RuleGroup,
        /// Rule address.
        address: u32,
    },
    /// A string value is longer than its range.
    #[error("string rule at address {address} holds {length} bytes but only {capacity} fit")]
    StringTooLong {
        /// Rule address.
        address: u32,
        /// Encoded value length in bytes.
        length: usize,
        /// Range capacity in bytes.
        capacity: usize,
    },
    /// A table selector is not valid for the group or sharing mode.
    #[error("{group} rule at address {address} cannot target table {table}")]
    TableSelector {
        /// Rule list.
        group: RuleGroup,
        /// Rule address.
        address: u32,
        /// Requested table.
        table: TableKind,
    },
    /// A repeat source contains an invalid cell.
    #[error("repeat source contains invalid address {address}")]
    RepeatInvalidSource {
        /// Invalid source address.
        address: usize,
    },
    /// A repeat source or target boundary cuts through a composite value.
    #[error("repeat boundary at address {address} splits a composite value")]
    RepeatSplitsComposite {
        /// Boundary address.
        address: usize,
    },
    /// A timestamp cell has fewer than seven words left in its block.
    #[error("timestamp at address {address} needs seven words inside the block")]
    TimestampOutOfBounds {
        /// Clocked cell address.
        address: usize,
    },
    /// A timestamp record cell has its own type or action.
    #[error("timestamp at address {address} overlaps cell {cell} with its own type or action")]
    TimestampRecordOccupied {
        /// Clocked cell address.
        address: usize,
        /// Conflicting record cell.
        cell: usize,
    },
    /// An `except` entry does not name a member of its rule's range.
    #[error("{group} rule exception at address {address} is not a member of the rule range")]
    ExceptionOutsideRange {
        /// Rule list.
        group: RuleGroup,
        /// Exception address.
        address: u32,
    },
}
