//! Compiled address space: resolved cell blocks behind the four tables.

/// Request authorization ahead of value computation.
pub mod access;
/// Table-to-block layout and bit-over-word decoding.
pub mod map;

pub use access::{authorize, request_for_function_code, AccessKind, AuthorizedRange};
pub use map::{
    Addressing, BitAlias, BlockKind, BlockSpec, SharingMode, TableKind, TableLayout, TableSizes,
    TableView, BITS_PER_WORD, MAX_TABLE_CELLS,
};

use crate::cell::Cell;

/// Location of a table address inside the backing blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellLocation {
    /// Backing block index.
    pub block: usize,
    /// Cell index inside the block.
    pub index: usize,
    /// Bit position for bit-over-word addressing.
    pub bit: Option<u8>,
}

/// Fully resolved cells of a device.
///
/// Produced by [`crate::compile`]; every address of every block holds exactly
/// one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    layout: TableLayout,
    blocks: Vec<Vec<Cell>>,
    type_exception: bool,
    string_pad: u8,
}

impl AddressSpace {
    pub(crate) const fn from_parts(
        layout: TableLayout,
        blocks: Vec<Vec<Cell>>,
        type_exception: bool,
        string_pad: u8,
    ) -> Self {
        Self {
            layout,
            blocks,
            type_exception,
            string_pad,
        }
    }

    /// Returns the table layout.
    #[must_use]
    pub const fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Returns the sharing mode of the device.
    #[must_use]
    pub const fn sharing_mode(&self) -> SharingMode {
        self.layout.mode()
    }

    /// Returns the declared size of `table`.
    #[must_use]
    pub const fn size(&self, table: TableKind) -> u32 {
        self.layout.view(table).size
    }

    /// Returns `true` when type mismatches are rejected.
    #[must_use]
    pub const fn type_exception(&self) -> bool {
        self.type_exception
    }

    /// Returns the string padding byte.
    #[must_use]
    pub const fn string_pad(&self) -> u8 {
        self.string_pad
    }

    /// Resolves `address` of `table` to its block location.
    ///
    /// Returns `None` when the address is outside the table.
    #[must_use]
    pub fn locate(&self, table: TableKind, address: u16) -> Option<CellLocation> {
        let view = self.layout.view(table);
        if u32::from(address) >= view.size {
            return None;
        }
        let location = match view.addressing {
            Addressing::Direct => CellLocation {
                block: view.block,
                index: usize::from(address),
                bit: None,
            },
            Addressing::BitOverWord => {
                let alias = BitAlias::decode(table, address);
                CellLocation {
                    block: view.block,
                    index: usize::from(alias.word_address),
                    bit: Some(alias.bit_index),
                }
            }
        };
        (location.index < self.blocks[view.block].len()).then_some(location)
    }

    /// Returns the cell behind `address` of `table`.
    ///
    /// For aliasing bit tables this is the owning word cell. Returns `None`
    /// for addresses outside the table.
    #[must_use]
    pub fn cell_at(&self, table: TableKind, address: u16) -> Option<&Cell> {
        let location = self.locate(table, address)?;
        self.blocks[location.block].get(location.index)
    }

    /// Returns the word bit behind `address` of an aliasing bit table.
    ///
    /// Returns `None` for word tables, bit tables with their own block and
    /// addresses outside the table.
    #[must_use]
    pub fn bit_cell_at(&self, table: TableKind, address: u16) -> Option<BitAlias> {
        let owner = self.layout.bit_owner(table)?;
        self.locate(table, address)?;
        Some(BitAlias::decode(owner, address))
    }

    /// Returns the cells of backing block `block`.
    #[must_use]
    pub fn block(&self, block: usize) -> &[Cell] {
        match self.blocks.get(block) {
            Some(cells) => cells,
            None => &[],
        }
    }

    pub(crate) fn block_mut(&mut self, block: usize) -> &mut [Cell] {
        &mut self.blocks[block]
    }
}
