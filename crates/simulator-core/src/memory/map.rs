//! Table-to-block layout and bit-over-word address decoding.

use std::fmt;

use serde::Deserialize;

use crate::ConfigError;

/// Number of bit addresses carried by one word.
pub const BITS_PER_WORD: u32 = 16;
/// Largest table size addressable with a 16-bit start address.
pub const MAX_TABLE_CELLS: u32 = u16::MAX as u32 + 1;

/// One of the four addressable tables of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum TableKind {
    /// Read/write bits.
    #[serde(rename = "co", alias = "coils")]
    Coils,
    /// Read-only bits.
    #[serde(rename = "di", alias = "discrete_inputs")]
    DiscreteInputs,
    /// Read/write words.
    #[serde(rename = "hr", alias = "holding_registers")]
    HoldingRegisters,
    /// Read-only words.
    #[serde(rename = "ir", alias = "input_registers")]
    InputRegisters,
}

impl TableKind {
    /// Tables in their canonical order.
    pub const ALL: [Self; 4] = [
        Self::Coils,
        Self::DiscreteInputs,
        Self::HoldingRegisters,
        Self::InputRegisters,
    ];

    /// Returns the canonical index of the table in [`TableKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Coils => 0,
            Self::DiscreteInputs => 1,
            Self::HoldingRegisters => 2,
            Self::InputRegisters => 3,
        }
    }

    /// Returns `true` for tables addressed in single bits.
    #[must_use]
    pub const fn is_bit_table(self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    /// Returns the word table a bit table aliases when bits live over words.
    #[must_use]
    pub const fn word_counterpart(self) -> Self {
        match self {
            Self::Coils | Self::HoldingRegisters => Self::HoldingRegisters,
            Self::DiscreteInputs | Self::InputRegisters => Self::InputRegisters,
        }
    }

    /// Returns a human-readable table name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Coils => "coils",
            Self::DiscreteInputs => "discrete inputs",
            Self::HoldingRegisters => "holding registers",
            Self::InputRegisters => "input registers",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How tables are mapped onto backing blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// Every table owns its own block.
    #[default]
    Separate,
    /// Word tables own their blocks; bit tables alias the bits of their word
    /// counterpart (coils over holding registers, discrete inputs over input
    /// registers).
    BitsOverWords,
    /// One word block backs every table; bit tables alias its bits.
    Unified,
}

/// Declared number of addresses per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableSizes {
    /// Coil count.
    pub coils: u32,
    /// Discrete-input count.
    pub discrete_inputs: u32,
    /// Holding-register count.
    pub holding_registers: u32,
    /// Input-register count.
    pub input_registers: u32,
}

impl TableSizes {
    /// Returns the declared size of `table`.
    #[must_use]
    pub const fn get(&self, table: TableKind) -> u32 {
        match table {
            TableKind::Coils => self.coils,
            TableKind::DiscreteInputs => self.discrete_inputs,
            TableKind::HoldingRegisters => self.holding_registers,
            TableKind::InputRegisters => self.input_registers,
        }
    }
}

/// Native cell type of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Block of single bits owned by a bit table.
    Bits,
    /// Block of 16-bit words.
    Words,
}

/// Backing block descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSpec {
    /// Native cell type.
    pub kind: BlockKind,
    /// Number of cells.
    pub len: usize,
}

/// Address translation from a table onto its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// Table address `a` is block cell `a`.
    Direct,
    /// Table address `a` is bit `a % 16` of block cell `a / 16`.
    BitOverWord,
}

/// Resolved view of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableView {
    /// Index of the backing block.
    pub block: usize,
    /// Declared table size.
    pub size: u32,
    /// Address translation.
    pub addressing: Addressing,
}

/// Bit of a word cell addressed through an aliasing bit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitAlias {
    /// Word table that owns the cell.
    pub word_table: TableKind,
    /// Address of the owning word.
    pub word_address: u16,
    /// Bit position inside the word (`0` is least significant).
    pub bit_index: u8,
}

impl BitAlias {
    /// Decodes bit address `address` of a bit table aliasing `word_table`.
    #[must_use]
    pub const fn decode(word_table: TableKind, address: u16) -> Self {
        Self {
            word_table,
            word_address: address / 16,
            bit_index: (address % 16) as u8,
        }
    }
}

/// Complete mapping of the four tables onto backing blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableLayout {
    mode: SharingMode,
    views: [TableView; 4],
    blocks: Vec<BlockSpec>,
}

impl TableLayout {
    /// Builds the layout for `mode` and the declared table sizes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TableTooLarge`] when a size exceeds
    /// [`MAX_TABLE_CELLS`] and [`ConfigError::BitTableExceedsBlock`] when an
    /// aliasing bit table declares more bits than its block holds.
    pub fn new(mode: SharingMode, sizes: TableSizes) -> Result<Self, ConfigError> {
        for table in TableKind::ALL {
            let size = sizes.get(table);
            if size > MAX_TABLE_CELLS {
                return Err(ConfigError::TableTooLarge { table, size });
            }
        }

        let direct = |block, table| TableView {
            block,
            size: sizes.get(table),
            addressing: Addressing::Direct,
        };
        let aliased = |block, table| TableView {
            block,
            size: sizes.get(table),
            addressing: Addressing::BitOverWord,
        };
        let words = |len: u32| BlockSpec {
            kind: BlockKind::Words,
            len: len as usize,
        };

        let layout = match mode {
            SharingMode::Separate => Self {
                mode,
                views: [
                    direct(0, TableKind::Coils),
                    direct(1, TableKind::DiscreteInputs),
                    direct(2, TableKind::HoldingRegisters),
                    direct(3, TableKind::InputRegisters),
                ],
                blocks: vec![
                    BlockSpec {
                        kind: BlockKind::Bits,
                        len: sizes.coils as usize,
                    },
                    BlockSpec {
                        kind: BlockKind::Bits,
                        len: sizes.discrete_inputs as usize,
                    },
                    words(sizes.holding_registers),
                    words(sizes.input_registers),
                ],
            },
            SharingMode::BitsOverWords => Self {
                mode,
                views: [
                    aliased(0, TableKind::Coils),
                    aliased(1, TableKind::DiscreteInputs),
                    direct(0, TableKind::HoldingRegisters),
                    direct(1, TableKind::InputRegisters),
                ],
                blocks: vec![
                    words(sizes.holding_registers),
                    words(sizes.input_registers),
                ],
            },
            SharingMode::Unified => Self {
                mode,
                views: [
                    aliased(0, TableKind::Coils),
                    aliased(0, TableKind::DiscreteInputs),
                    direct(0, TableKind::HoldingRegisters),
                    direct(0, TableKind::InputRegisters),
                ],
                blocks: vec![words(
                    sizes.holding_registers.max(sizes.input_registers),
                )],
            },
        };

        for table in [TableKind::Coils, TableKind::DiscreteInputs] {
            let view = layout.view(table);
            if view.addressing == Addressing::BitOverWord {
                let block_len = u32::try_from(layout.blocks[view.block].len).unwrap_or(u32::MAX);
                let available = block_len.saturating_mul(BITS_PER_WORD);
                if view.size > available {
                    return Err(ConfigError::BitTableExceedsBlock {
                        table,
                        size: view.size,
                        available,
                    });
                }
            }
        }

        Ok(layout)
    }

    /// Returns the sharing mode the layout was built for.
    #[must_use]
    pub const fn mode(&self) -> SharingMode {
        self.mode
    }

    /// Returns the view of `table`.
    #[must_use]
    pub const fn view(&self, table: TableKind) -> TableView {
        self.views[table.index()]
    }

    /// Returns all backing block descriptors.
    #[must_use]
    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    /// Returns the word table that owns the cells behind an aliasing bit table.
    #[must_use]
    pub const fn bit_owner(&self, table: TableKind) -> Option<TableKind> {
        if !table.is_bit_table() {
            return None;
        }
        match self.mode {
            SharingMode::Separate => None,
            SharingMode::BitsOverWords => Some(table.word_counterpart()),
            SharingMode::Unified => Some(TableKind::HoldingRegisters),
        }
    }

    /// Returns the table whose block a rule targets.
    ///
    /// `selector` is the rule's optional `table` key. Bit tables that alias
    /// words resolve to the word table that owns their block. Returns `None`
    /// when the selector is not meaningful for the sharing mode or kind of
    /// rule (`bit_rule` for `bits` rules, `word_rule` for value rules other
    /// than bits).
    #[must_use]
    pub const fn rule_target(
        &self,
        selector: Option<TableKind>,
        bit_rule: bool,
        word_rule: bool,
    ) -> Option<TableKind> {
        match self.mode {
            SharingMode::Unified => match selector {
                None => Some(TableKind::HoldingRegisters),
                Some(_) => None,
            },
            SharingMode::BitsOverWords => match selector {
                None => Some(TableKind::HoldingRegisters),
                Some(table) => Some(table.word_counterpart()),
            },
            SharingMode::Separate => match selector {
                None if bit_rule => Some(TableKind::Coils),
                None => Some(TableKind::HoldingRegisters),
                Some(table) if bit_rule && !table.is_bit_table() => None,
                Some(table) if word_rule && table.is_bit_table() => None,
                Some(table) => Some(table),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Addressing, BitAlias, BlockKind, SharingMode, TableKind, TableLayout, TableSizes,
    };
    use crate::ConfigError;

    const SIZES: TableSizes = TableSizes {
        coils: 32,
        discrete_inputs: 16,
        holding_registers: 10,
        input_registers: 4,
    };

    #[test]
    fn separate_mode_gives_every_table_its_own_block() {
        let layout = TableLayout::new(SharingMode::Separate, SIZES).expect("valid layout");
        assert_eq!(layout.blocks().len(), 4);
        assert_eq!(layout.blocks()[0].kind, BlockKind::Bits);
        assert_eq!(layout.blocks()[0].len, 32);
        assert_eq!(layout.blocks()[3].kind, BlockKind::Words);
        for table in TableKind::ALL {
            assert_eq!(layout.view(table).addressing, Addressing::Direct);
            assert_eq!(layout.view(table).block, table.index());
        }
        assert_eq!(layout.bit_owner(TableKind::Coils), None);
    }

    #[test]
    fn bits_over_words_aliases_word_counterparts() {
        let layout = TableLayout::new(SharingMode::BitsOverWords, SIZES).expect("valid layout");
        assert_eq!(layout.blocks().len(), 2);
        assert_eq!(layout.view(TableKind::Coils).block, 0);
        assert_eq!(layout.view(TableKind::DiscreteInputs).block, 1);
        assert_eq!(
            layout.view(TableKind::Coils).addressing,
            Addressing::BitOverWord
        );
        assert_eq!(
            layout.bit_owner(TableKind::DiscreteInputs),
            Some(TableKind::InputRegisters)
        );
    }

    #[test]
    fn unified_mode_uses_one_block_sized_for_both_word_tables() {
        let layout = TableLayout::new(SharingMode::Unified, SIZES).expect("valid layout");
        assert_eq!(layout.blocks().len(), 1);
        assert_eq!(layout.blocks()[0].len, 10);
        assert!(TableKind::ALL
            .iter()
            .all(|table| layout.view(*table).block == 0));
        assert_eq!(
            layout.bit_owner(TableKind::DiscreteInputs),
            Some(TableKind::HoldingRegisters)
        );
    }

    #[test]
    fn aliasing_bit_table_must_fit_its_block() {
        let sizes = TableSizes {
            discrete_inputs: 65,
            ..SIZES
        };
        assert_eq!(
            TableLayout::new(SharingMode::BitsOverWords, sizes),
            Err(ConfigError::BitTableExceedsBlock {
                table: TableKind::DiscreteInputs,
                size: 65,
                available: 64,
            })
        );
    }

    #[test]
    fn oversized_table_is_rejected() {
        let sizes = TableSizes {
            holding_registers: 65_537,
            ..SIZES
        };
        assert!(matches!(
            TableLayout::new(SharingMode::Separate, sizes),
            Err(ConfigError::TableTooLarge { size: 65_537, .. })
        ));
    }

    #[test]
    fn bit_alias_decodes_lsb_first() {
        assert_eq!(
            BitAlias::decode(TableKind::HoldingRegisters, 37),
            BitAlias {
                word_table: TableKind::HoldingRegisters,
                word_address: 2,
                bit_index: 5,
            }
        );
    }

    #[test]
    fn rule_targets_follow_sharing_mode() {
        let separate = TableLayout::new(SharingMode::Separate, SIZES).expect("valid layout");
        assert_eq!(
            separate.rule_target(None, true, false),
            Some(TableKind::Coils)
        );
        assert_eq!(
            separate.rule_target(Some(TableKind::HoldingRegisters), true, false),
            None
        );
        assert_eq!(
            separate.rule_target(Some(TableKind::Coils), false, true),
            None
        );
        assert_eq!(
            separate.rule_target(Some(TableKind::DiscreteInputs), false, false),
            Some(TableKind::DiscreteInputs)
        );

        let over = TableLayout::new(SharingMode::BitsOverWords, SIZES).expect("valid layout");
        assert_eq!(
            over.rule_target(Some(TableKind::DiscreteInputs), true, false),
            Some(TableKind::InputRegisters)
        );

        let unified = TableLayout::new(SharingMode::Unified, SIZES).expect("valid layout");
        assert_eq!(
            unified.rule_target(None, false, true),
            Some(TableKind::HoldingRegisters)
        );
        assert_eq!(
            unified.rule_target(Some(TableKind::InputRegisters), false, true),
            None
        );
    }
}
