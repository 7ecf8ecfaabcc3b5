//! Request authorization against bounds, invalid markers and permissions.
//!
//! [`authorize`] runs before any value is computed or stored, so a rejected
//! request never changes device state.

use crate::memory::{AddressSpace, Addressing, TableKind};
use crate::Rejection;

/// Direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Values are read (and actions run).
    Read,
    /// Values are stored.
    Write,
}

/// Maps a Modbus function code to the table and direction it addresses.
///
/// Covers read coils (1), read discrete inputs (2), read holding registers
/// (3), read input registers (4), write single coil (5), write single
/// register (6), write multiple coils (15) and write multiple registers (16).
#[must_use]
pub const fn request_for_function_code(code: u8) -> Option<(TableKind, AccessKind)> {
    match code {
        1 => Some((TableKind::Coils, AccessKind::Read)),
        2 => Some((TableKind::DiscreteInputs, AccessKind::Read)),
        3 => Some((TableKind::HoldingRegisters, AccessKind::Read)),
        4 => Some((TableKind::InputRegisters, AccessKind::Read)),
        5 | 15 => Some((TableKind::Coils, AccessKind::Write)),
        6 | 16 => Some((TableKind::HoldingRegisters, AccessKind::Write)),
        _ => None,
    }
}

/// Range that passed every authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthorizedRange {
    table: TableKind,
    kind: AccessKind,
    start: u16,
    count: u16,
    block: usize,
    first: usize,
    last: usize,
    bit_over_word: bool,
}

impl AuthorizedRange {
    /// Addressed table.
    #[must_use]
    pub const fn table(&self) -> TableKind {
        self.table
    }

    /// Request direction.
    #[must_use]
    pub const fn kind(&self) -> AccessKind {
        self.kind
    }

    /// First table address.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Number of table addresses.
    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Backing block index.
    #[must_use]
    pub const fn block(&self) -> usize {
        self.block
    }

    /// Inclusive range of touched cell indices inside the block.
    #[must_use]
    pub const fn cells(&self) -> (usize, usize) {
        (self.first, self.last)
    }

    /// Returns `true` when table addresses are bits of word cells.
    #[must_use]
    pub const fn is_bit_over_word(&self) -> bool {
        self.bit_over_word
    }

    /// Returns the block cell index and optional bit position of the
    /// `offset`-th requested address.
    #[must_use]
    pub const fn position(&self, offset: usize) -> (usize, Option<u8>) {
        let address = self.start as usize + offset;
        if self.bit_over_word {
            (address / 16, Some((address % 16) as u8))
        } else {
            (address, None)
        }
    }

    /// Returns the first table address that maps onto block cell `index`.
    #[must_use]
    pub fn address_of(&self, index: usize) -> u16 {
        let address = if self.bit_over_word {
            (index * 16).max(usize::from(self.start))
        } else {
            index
        };
        u16::try_from(address).unwrap_or(u16::MAX)
    }
}

/// Validates a request before any value is computed.
///
/// Checks run in this order: bounds (including `count == 0`), invalid cells,
/// write permission, whole-composite writes and, when the device enables type
/// exceptions, request/cell type agreement. Bit writes never reach into a
/// composite word. The first failing check decides
/// the rejection.
///
/// # Errors
///
/// Returns [`Rejection::OutOfRange`], [`Rejection::InvalidAddress`],
/// [`Rejection::AccessDenied`], [`Rejection::PartialComposite`] or
/// [`Rejection::TypeMismatch`] for the first failing check.
pub fn authorize(
    space: &AddressSpace,
    table: TableKind,
    start: u16,
    count: usize,
    kind: AccessKind,
) -> Result<AuthorizedRange, Rejection> {
    let size = space.size(table);
    let end = usize::from(start).saturating_add(count);
    let out_of_range = Rejection::OutOfRange {
        table,
        start,
        count: u32::try_from(count).unwrap_or(u32::MAX),
        size,
    };
    if count == 0 || end > size as usize {
        return Err(out_of_range);
    }
    let Ok(count) = u16::try_from(count) else {
        return Err(out_of_range);
    };

    let view = space.layout().view(table);
    let bit_over_word = view.addressing == Addressing::BitOverWord;
    let (first, last) = if bit_over_word {
        (usize::from(start) / 16, (end - 1) / 16)
    } else {
        (usize::from(start), end - 1)
    };
    let range = AuthorizedRange {
        table,
        kind,
        start,
        count,
        block: view.block,
        first,
        last,
        bit_over_word,
    };

    let cells = space.block(view.block);
    let Some(touched) = cells.get(first..=last) else {
        return Err(out_of_range);
    };
    let at = |position: usize| range.address_of(first + position);

    if let Some(position) = touched.iter().position(|cell| cell.is_invalid()) {
        return Err(Rejection::InvalidAddress {
            table,
            address: at(position),
        });
    }

    if kind == AccessKind::Write {
        if let Some(position) = touched.iter().position(|cell| !cell.is_writable()) {
            return Err(Rejection::AccessDenied {
                table,
                address: at(position),
            });
        }
    }

    let whole_words = !table.is_bit_table();
    let splits_composite = whole_words
        && (touched[0].group_offset() != 0 || !touched[touched.len() - 1].is_group_tail());
    if splits_composite && kind == AccessKind::Write {
        return Err(Rejection::PartialComposite {
            table,
            address: split_address(&range, touched),
        });
    }
    if bit_over_word && kind == AccessKind::Write {
        if let Some(position) = touched.iter().position(|cell| cell.group.is_some()) {
            return Err(Rejection::PartialComposite {
                table,
                address: at(position),
            });
        }
    }

    if space.type_exception() {
        if table.is_bit_table() {
            if let Some(position) = touched
                .iter()
                .position(|cell| !cell.kind.is_bit_addressable())
            {
                return Err(Rejection::TypeMismatch {
                    table,
                    address: at(position),
                });
            }
        } else if splits_composite {
            return Err(Rejection::TypeMismatch {
                table,
                address: split_address(&range, touched),
            });
        }
    }

    Ok(range)
}

fn split_address(range: &AuthorizedRange, touched: &[crate::cell::Cell]) -> u16 {
    if touched[0].group_offset() != 0 {
        range.address_of(range.first)
    } else {
        range.address_of(range.last)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{authorize, request_for_function_code, AccessKind};
    use crate::cell::{Access, Cell, CellKind, Group};
    use crate::memory::{AddressSpace, SharingMode, TableKind, TableLayout, TableSizes};
    use crate::Rejection;

    const HR: TableKind = TableKind::HoldingRegisters;

    /// Ten holding registers: 0..=1 read-write, 2 invalid, 4..=5 a read-write
    /// uint32 pair, 6..=9 read-only; sixteen coils over the same words.
    fn space(type_exception: bool) -> AddressSpace {
        let sizes = TableSizes {
            coils: 160,
            discrete_inputs: 0,
            holding_registers: 10,
            input_registers: 10,
        };
        let layout = TableLayout::new(SharingMode::Unified, sizes).expect("valid layout");
        let mut cells = vec![Cell::new(CellKind::Uint16, 0); 10];
        cells[0].access = Access::ReadWrite;
        cells[1].access = Access::ReadWrite;
        cells[1].kind = CellKind::Bits;
        cells[2].access = Access::Invalid;
        for ordinal in 0..2 {
            let cell = &mut cells[4 + usize::from(ordinal)];
            cell.kind = CellKind::Uint32;
            cell.access = Access::ReadWrite;
            cell.group = Some(Group { width: 2, ordinal });
        }
        AddressSpace::from_parts(layout, vec![cells], type_exception, b' ')
    }

    #[rstest]
    #[case(0, 0)]
    #[case(9, 2)]
    #[case(10, 1)]
    #[case(u16::MAX, 1)]
    fn bounds_are_checked_first(#[case] start: u16, #[case] count: usize) {
        let rejection = authorize(&space(false), HR, start, count, AccessKind::Read)
            .expect_err("out of range");
        assert!(matches!(rejection, Rejection::OutOfRange { .. }));
    }

    #[test]
    fn invalid_cell_rejects_read_and_write() {
        let space = space(false);
        for kind in [AccessKind::Read, AccessKind::Write] {
            assert_eq!(
                authorize(&space, HR, 0, 4, kind),
                Err(Rejection::InvalidAddress {
                    table: HR,
                    address: 2
                })
            );
        }
    }

    #[test]
    fn read_only_cell_rejects_write() {
        assert_eq!(
            authorize(&space(false), HR, 5, 2, AccessKind::Write),
            Err(Rejection::AccessDenied {
                table: HR,
                address: 6
            })
        );
    }

    #[test]
    fn write_must_cover_whole_composite() {
        let space = space(false);
        assert_eq!(
            authorize(&space, HR, 5, 1, AccessKind::Write),
            Err(Rejection::PartialComposite {
                table: HR,
                address: 5
            })
        );
        assert!(authorize(&space, HR, 4, 2, AccessKind::Write).is_ok());
    }

    #[test]
    fn bit_write_into_composite_word_is_partial() {
        let space = space(false);
        assert_eq!(
            authorize(&space, TableKind::Coils, 64, 8, AccessKind::Write),
            Err(Rejection::PartialComposite {
                table: TableKind::Coils,
                address: 64
            })
        );
        assert!(authorize(&space, TableKind::Coils, 64, 1, AccessKind::Read).is_ok());
    }

    #[test]
    fn partial_composite_read_is_allowed_without_type_exception() {
        assert!(authorize(&space(false), HR, 5, 1, AccessKind::Read).is_ok());
        assert_eq!(
            authorize(&space(true), HR, 5, 1, AccessKind::Read),
            Err(Rejection::TypeMismatch {
                table: HR,
                address: 5
            })
        );
    }

    #[test]
    fn type_exception_restricts_bit_access_to_bit_fields() {
        let space = space(true);
        assert!(authorize(&space, TableKind::Coils, 16, 16, AccessKind::Read).is_ok());
        assert_eq!(
            authorize(&space, TableKind::Coils, 0, 1, AccessKind::Read),
            Err(Rejection::TypeMismatch {
                table: TableKind::Coils,
                address: 0
            })
        );
    }

    #[test]
    fn bit_range_reports_first_bit_of_offending_word() {
        assert_eq!(
            authorize(&space(false), TableKind::Coils, 20, 20, AccessKind::Read),
            Err(Rejection::InvalidAddress {
                table: TableKind::Coils,
                address: 32
            })
        );
    }

    #[test]
    fn authorized_range_maps_bit_positions() {
        let range = authorize(&space(false), TableKind::Coils, 18, 3, AccessKind::Write)
            .expect("writable bits");
        assert_eq!(range.cells(), (1, 1));
        assert_eq!(range.position(0), (1, Some(2)));
        assert_eq!(range.position(2), (1, Some(4)));
    }

    #[rstest]
    #[case(1, Some((TableKind::Coils, AccessKind::Read)))]
    #[case(4, Some((TableKind::InputRegisters, AccessKind::Read)))]
    #[case(5, Some((TableKind::Coils, AccessKind::Write)))]
    #[case(16, Some((TableKind::HoldingRegisters, AccessKind::Write)))]
    #[case(7, None)]
    fn function_codes_map_to_tables(
        #[case] code: u8,
        #[case] expected: Option<(TableKind, AccessKind)>,
    ) {
        assert_eq!(request_for_function_code(code), expected);
    }
}
