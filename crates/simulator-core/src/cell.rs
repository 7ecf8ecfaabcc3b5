//! Resolved per-address cell model shared by every table block.

use std::sync::Arc;

use serde::Deserialize;

use crate::clock::ClockFormat;

/// Value type carried by a cell.
///
/// Composite kinds (`Uint32`, `Float32`, `String`) span several consecutive
/// word cells tied together by a [`Group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Single bit owned by a bit table (`value` is `0` or `1`).
    Bit,
    /// Word whose sixteen bits are individually addressable through a bit table.
    Bits,
    /// Plain unsigned 16-bit word.
    Uint16,
    /// One word of a big-endian unsigned 32-bit pair.
    Uint32,
    /// One word of a big-endian IEEE-754 binary32 pair.
    Float32,
    /// One word (two characters) of a fixed-length string.
    String,
}

impl CellKind {
    /// Returns the fixed word width for pair composites.
    ///
    /// Strings take their width from the configured range instead.
    #[must_use]
    pub const fn pair_width(self) -> Option<u16> {
        match self {
            Self::Uint32 | Self::Float32 => Some(2),
            Self::Bit | Self::Bits | Self::Uint16 | Self::String => None,
        }
    }

    /// Returns `true` for kinds that span several words.
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Uint32 | Self::Float32 | Self::String)
    }

    /// Returns `true` for kinds addressable by bit tables.
    #[must_use]
    pub const fn is_bit_addressable(self) -> bool {
        matches!(self, Self::Bit | Self::Bits)
    }
}

/// Read/write permission of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Readable, writes are denied.
    #[default]
    ReadOnly,
    /// Readable and writable.
    ReadWrite,
    /// Unreachable by any operation.
    Invalid,
}

/// Behaviour executed when a cell is accessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Action {
    /// Stored value is returned unchanged.
    #[default]
    None,
    /// A fresh value is drawn from the type's domain on every read.
    Random,
    /// The stored value is returned, then advanced by one.
    Increment,
    /// The value is derived from the device clock.
    Clock(ClockFormat),
    /// A callback registered under this name runs on every access.
    Callback(Arc<str>),
    /// The device is rebuilt from its configuration after the read completes.
    Reset,
}

impl Action {
    /// Returns the configuration name of the action.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Random => "random",
            Self::Increment => "increment",
            Self::Clock(ClockFormat::Uptime) => "uptime",
            Self::Clock(ClockFormat::Timestamp) => "timestamp",
            Self::Callback(name) => name,
            Self::Reset => "reset",
        }
    }
}

/// Membership of a cell in a composite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    /// Number of words in the composite.
    pub width: u16,
    /// Position of this cell inside the composite (`0` is the first word).
    pub ordinal: u16,
}

/// One addressable unit of a table block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Value type.
    pub kind: CellKind,
    /// Permission.
    pub access: Access,
    /// Behaviour on access.
    pub action: Action,
    /// Raw stored word (`0`/`1` for [`CellKind::Bit`]).
    pub value: u16,
    /// Composite membership, when the cell is part of a multi-word value.
    pub group: Option<Group>,
}

impl Cell {
    /// Creates a read-only, action-free cell.
    #[must_use]
    pub const fn new(kind: CellKind, value: u16) -> Self {
        Self {
            kind,
            access: Access::ReadOnly,
            action: Action::None,
            value,
            group: None,
        }
    }

    /// Returns `true` when the cell is marked unreachable.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self.access, Access::Invalid)
    }

    /// Returns `true` when the cell accepts writes.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        matches!(self.access, Access::ReadWrite)
    }

    /// Offset from this cell back to the first word of its composite.
    #[must_use]
    pub const fn group_offset(&self) -> usize {
        match self.group {
            Some(group) => group.ordinal as usize,
            None => 0,
        }
    }

    /// Number of words in this cell's composite (`1` for plain cells).
    #[must_use]
    pub const fn group_width(&self) -> usize {
        match self.group {
            Some(group) => group.width as usize,
            None => 1,
        }
    }

    /// Returns `true` when this cell is the last word of its composite.
    #[must_use]
    pub const fn is_group_tail(&self) -> bool {
        match self.group {
            Some(group) => group.ordinal + 1 == group.width,
            None => true,
        }
    }

    /// Reads bit `index` of the stored word.
    #[must_use]
    pub const fn bit(&self, index: u8) -> bool {
        (self.value >> index) & 1 != 0
    }

    /// Sets or clears bit `index` of the stored word, leaving the others intact.
    pub const fn set_bit(&mut self, index: u8, on: bool) {
        if on {
            self.value |= 1 << index;
        } else {
            self.value &= !(1 << index);
        }
    }
}
