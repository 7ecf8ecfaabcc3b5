//! Rule compiler: declarative configuration to resolved cell blocks.

use std::sync::Arc;

use tracing::info;

use crate::callbacks::CallbackRegistry;
use crate::cell::{Access, Action, Cell, CellKind, Group};
use crate::clock::{ClockFormat, TIMESTAMP_WORDS};
use crate::codec::{f32_to_words, string_to_words, u32_to_words};
use crate::config::{DeviceConfig, Rule, RuleGroup, RuleValue, Setup};
use crate::memory::{AddressSpace, BlockKind, TableKind, TableLayout};
use crate::tiling::apply_repeat;
use crate::ConfigError;

/// Compiles `config` into a fully resolved address space.
///
/// Every block is first filled with its native default cell (plain words for
/// word blocks, single bits for owned bit blocks). Rule lists are then applied
/// in the order `invalid`, `write`, `bits`, `uint16`, `uint32`, `float32`,
/// `string`, each overwriting what earlier lists set, followed by `repeat`.
/// Finally every composite value is checked to be intact and uniformly
/// accessible.
///
/// # Errors
///
/// Returns a [`ConfigError`] naming the first offending rule or address.
pub fn compile(
    config: &DeviceConfig,
    callbacks: &CallbackRegistry,
) -> Result<AddressSpace, ConfigError> {
    let setup = &config.setup;
    let layout = TableLayout::new(setup.sharing_mode(), setup.sizes())?;
    let mut compiler = Compiler {
        setup,
        callbacks,
        layout,
        blocks: Vec::new(),
    };
    compiler.fill_defaults()?;

    let mut rule_count = 0_usize;
    for (group, entries) in config.ordered_rules() {
        for entry in entries {
            compiler.apply_rule(group, &entry.to_rule())?;
        }
        rule_count += entries.len();
    }
    for repeat in &config.repeat {
        let start = repeat.addr.bounds().0;
        let block = compiler.block_index(RuleGroup::Repeat, start, repeat.table, false, false)?;
        apply_repeat(&mut compiler.blocks[block], repeat.addr, repeat.to)?;
    }
    rule_count += config.repeat.len();

    for cells in &compiler.blocks {
        verify_block(cells)?;
    }

    let string_pad = pad_byte(setup.string_pad);
    let Compiler { layout, blocks, .. } = compiler;
    info!(
        sharing = ?layout.mode(),
        coils = setup.co_size,
        discrete_inputs = setup.di_size,
        holding_registers = setup.hr_size,
        input_registers = setup.ir_size,
        blocks = blocks.len(),
        rules = rule_count,
        "compiled device address space"
    );
    Ok(AddressSpace::from_parts(
        layout,
        blocks,
        setup.type_exception,
        string_pad,
    ))
}

fn pad_byte(pad: char) -> u8 {
    u8::try_from(pad).unwrap_or(b' ')
}

struct Compiler<'a> {
    setup: &'a Setup,
    callbacks: &'a CallbackRegistry,
    layout: TableLayout,
    blocks: Vec<Vec<Cell>>,
}

/// Attributes shared by every member of a rule's range.
struct Member {
    value: Option<RuleValue>,
    action: Action,
    access: Option<Access>,
}

impl Compiler<'_> {
    fn fill_defaults(&mut self) -> Result<(), ConfigError> {
        let defaults = &self.setup.defaults;
        let bit = Cell {
            action: self.resolve_action(
                RuleGroup::Bits,
                0,
                CellKind::Bit,
                defaults.action.bits.as_deref(),
            )?,
            ..Cell::new(CellKind::Bit, u16::from(defaults.value.bits != 0))
        };
        let word = Cell {
            action: self.resolve_action(
                RuleGroup::Uint16,
                0,
                CellKind::Uint16,
                defaults.action.uint16.as_deref(),
            )?,
            ..Cell::new(CellKind::Uint16, defaults.value.uint16)
        };
        self.blocks = self
            .layout
            .blocks()
            .iter()
            .map(|spec| match spec.kind {
                BlockKind::Bits => vec![bit.clone(); spec.len],
                BlockKind::Words => vec![word.clone(); spec.len],
            })
            .collect();
        Ok(())
    }

    fn block_index(
        &self,
        group: RuleGroup,
        address: u32,
        selector: Option<TableKind>,
        bit_rule: bool,
        word_rule: bool,
    ) -> Result<usize, ConfigError> {
        let table = self
            .layout
            .rule_target(selector, bit_rule, word_rule)
            .ok_or(ConfigError::TableSelector {
                group,
                address,
                table: selector.unwrap_or(TableKind::HoldingRegisters),
            })?;
        Ok(self.layout.view(table).block)
    }

    fn apply_rule(&mut self, group: RuleGroup, rule: &Rule) -> Result<(), ConfigError> {
        let (start, end) = rule.addr.bounds();
        if start > end {
            return Err(ConfigError::ReversedRange { group, start, end });
        }
        let is_bits = group == RuleGroup::Bits;
        let is_word_value = matches!(
            group,
            RuleGroup::Uint16 | RuleGroup::Uint32 | RuleGroup::Float32 | RuleGroup::String
        );
        let block = self.block_index(group, start, rule.table, is_bits, is_word_value)?;
        let size = self.blocks[block].len();
        if end as usize >= size {
            return Err(ConfigError::AddressOutOfBounds {
                group,
                address: end,
                size,
            });
        }

        let bit_block = self.layout.blocks()[block].kind == BlockKind::Bits;
        let (kind, width) = match group {
            RuleGroup::Invalid | RuleGroup::Write => {
                check_exceptions(group, rule, start, end, 1)?;
                let access = if group == RuleGroup::Invalid {
                    Access::Invalid
                } else {
                    Access::ReadWrite
                };
                for cell in &mut self.blocks[block][start as usize..=end as usize] {
                    cell.access = access;
                }
                return Ok(());
            }
            RuleGroup::Bits if bit_block => (CellKind::Bit, 1),
            RuleGroup::Bits => (CellKind::Bits, 1),
            RuleGroup::Uint16 => (CellKind::Uint16, 1),
            RuleGroup::Uint32 => (CellKind::Uint32, 2),
            RuleGroup::Float32 => (CellKind::Float32, 2),
            RuleGroup::String => {
                let width = u16::try_from(end - start + 1).map_err(|_| {
                    ConfigError::AddressOutOfBounds {
                        group,
                        address: end,
                        size,
                    }
                })?;
                (CellKind::String, width)
            }
            RuleGroup::Repeat => return Ok(()),
        };

        let span = end - start + 1;
        if span % u32::from(width) != 0 {
            return Err(ConfigError::CompositeWidth {
                group,
                address: start,
                width,
            });
        }
        check_exceptions(group, rule, start, end, width)?;

        let default_action = self.setup.defaults.action.for_group(group);
        let rule_action = rule
            .action
            .as_ref()
            .map_or(default_action, Option::as_deref);
        let base = Member {
            value: rule.value.clone(),
            action: self.resolve_action(group, start, kind, rule_action)?,
            access: rule.access,
        };

        let mut head = start;
        while head <= end {
            let member = match rule.exception_at(head) {
                Some(exception) => Member {
                    value: exception.value.clone().or_else(|| base.value.clone()),
                    action: match &exception.action {
                        Some(name) => self.resolve_action(group, head, kind, name.as_deref())?,
                        None => base.action.clone(),
                    },
                    access: exception.access.or(base.access),
                },
                None => Member {
                    value: base.value.clone(),
                    action: base.action.clone(),
                    access: base.access,
                },
            };
            let words = self.encode(group, kind, head, width, member.value.as_ref())?;
            let cells = &mut self.blocks[block][head as usize..head as usize + words.len()];
            for ((ordinal, cell), word) in (0_u16..).zip(cells.iter_mut()).zip(words) {
                cell.kind = kind;
                cell.value = word;
                cell.action = member.action.clone();
                cell.group = kind.is_composite().then_some(Group { width, ordinal });
                if let Some(access) = member.access {
                    cell.access = access;
                }
            }
            head += u32::from(width);
        }
        Ok(())
    }

    fn encode(
        &self,
        group: RuleGroup,
        kind: CellKind,
        address: u32,
        width: u16,
        value: Option<&RuleValue>,
    ) -> Result<Vec<u16>, ConfigError> {
        let defaults = &self.setup.defaults.value;
        let invalid = || ConfigError::InvalidValue { group, address };
        let words = match kind {
            CellKind::Bit => {
                let bit = integer(value, i64::from(defaults.bits)).ok_or_else(invalid)?;
                if !(0..=1).contains(&bit) {
                    return Err(invalid());
                }
                vec![u16::from(bit == 1)]
            }
            CellKind::Bits | CellKind::Uint16 => {
                let fallback = if kind == CellKind::Bits {
                    defaults.bits
                } else {
                    defaults.uint16
                };
                let word = integer(value, i64::from(fallback)).ok_or_else(invalid)?;
                vec![u16::try_from(word).map_err(|_| invalid())?]
            }
            CellKind::Uint32 => {
                let number = integer(value, i64::from(defaults.uint32)).ok_or_else(invalid)?;
                u32_to_words(u32::try_from(number).map_err(|_| invalid())?).to_vec()
            }
            CellKind::Float32 => {
                let number = match value {
                    None => defaults.float32,
                    Some(RuleValue::Float(number)) => narrow(*number).ok_or_else(invalid)?,
                    Some(RuleValue::Integer(number)) => {
                        #[allow(clippy::cast_precision_loss)]
                        let number = *number as f64;
                        narrow(number).ok_or_else(invalid)?
                    }
                    Some(RuleValue::Text(_)) => return Err(invalid()),
                };
                f32_to_words(number).to_vec()
            }
            CellKind::String => {
                let text = match value {
                    None => defaults.string.as_str(),
                    Some(RuleValue::Text(text)) => text.as_str(),
                    Some(RuleValue::Integer(_) | RuleValue::Float(_)) => return Err(invalid()),
                };
                let count = usize::from(width);
                string_to_words(text, count, pad_byte(self.setup.string_pad)).ok_or(
                    ConfigError::StringTooLong {
                        address,
                        length: text.len(),
                        capacity: count * 2,
                    },
                )?
            }
        };
        Ok(words)
    }

    fn resolve_action(
        &self,
        group: RuleGroup,
        address: u32,
        kind: CellKind,
        name: Option<&str>,
    ) -> Result<Action, ConfigError> {
        let Some(name) = name else {
            return Ok(Action::None);
        };
        let action = match name {
            "none" => Action::None,
            "random" => Action::Random,
            "increment" => Action::Increment,
            "clock" => Action::Clock(self.setup.clock),
            "uptime" => Action::Clock(ClockFormat::Uptime),
            "timestamp" => Action::Clock(ClockFormat::Timestamp),
            "reset" => Action::Reset,
            custom if self.callbacks.contains(custom) => Action::Callback(Arc::from(custom)),
            unknown => {
                return Err(ConfigError::UnknownAction {
                    group,
                    address,
                    name: unknown.to_string(),
                })
            }
        };
        let supported = match action {
            Action::Random | Action::Increment | Action::Clock(ClockFormat::Uptime) => {
                kind != CellKind::String
            }
            Action::Clock(ClockFormat::Timestamp) => kind == CellKind::Uint16,
            Action::None | Action::Callback(_) | Action::Reset => true,
        };
        if supported {
            Ok(action)
        } else {
            Err(ConfigError::UnsupportedAction {
                group,
                address,
                name: name.to_string(),
            })
        }
    }
}

fn check_exceptions(
    group: RuleGroup,
    rule: &Rule,
    start: u32,
    end: u32,
    width: u16,
) -> Result<(), ConfigError> {
    let width = u32::from(width);
    let stray = rule.exceptions.iter().find(|exception| {
        exception.addr < start || exception.addr > end || (exception.addr - start) % width != 0
    });
    match stray {
        Some(exception) => Err(ConfigError::ExceptionOutsideRange {
            group,
            address: exception.addr,
        }),
        None => Ok(()),
    }
}

fn integer(value: Option<&RuleValue>, fallback: i64) -> Option<i64> {
    match value {
        None => Some(fallback),
        Some(RuleValue::Integer(number)) => Some(*number),
        Some(RuleValue::Float(_) | RuleValue::Text(_)) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(number: f64) -> Option<f32> {
    let narrowed = number as f32;
    narrowed.is_finite().then_some(narrowed)
}

/// Checks that every composite is intact and uniformly accessible, and that
/// each timestamp cell is followed by six plain `uint16` cells without
/// actions to hold its record.
fn verify_block(cells: &[Cell]) -> Result<(), ConfigError> {
    let mut index = 0;
    while index < cells.len() {
        let head = &cells[index];
        if matches!(head.action, Action::Clock(ClockFormat::Timestamp)) {
            let Some(record) = cells.get(index + 1..index + TIMESTAMP_WORDS) else {
                return Err(ConfigError::TimestampOutOfBounds { address: index });
            };
            if let Some(offset) = record.iter().position(|cell| {
                cell.kind != CellKind::Uint16 || cell.group.is_some() || cell.action != Action::None
            }) {
                return Err(ConfigError::TimestampRecordOccupied {
                    address: index,
                    cell: index + 1 + offset,
                });
            }
        }
        let Some(group) = head.group else {
            index += 1;
            continue;
        };
        let width = usize::from(group.width);
        let intact = group.ordinal == 0
            && cells.get(index..index + width).is_some_and(|members| {
                (0_u16..).zip(members).all(|(ordinal, member)| {
                    member.kind == head.kind
                        && member.group
                            == Some(Group {
                                width: group.width,
                                ordinal,
                            })
                })
            });
        if !intact {
            return Err(ConfigError::TornComposite { address: index });
        }
        if cells[index..index + width]
            .iter()
            .any(|member| member.access != head.access)
        {
            return Err(ConfigError::MixedCompositeAccess { address: index });
        }
        index += width;
    }
    Ok(())
}
