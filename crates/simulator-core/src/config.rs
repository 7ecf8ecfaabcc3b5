//! Declarative device configuration.
//!
//! A configuration is a JSON document with a `setup` section and one ordered
//! rule list per semantic type:
//!
//! ```json
//! {
//!   "setup": {
//!     "co size": 100, "di size": 100, "hr size": 100, "ir size": 100,
//!     "shared blocks": true,
//!     "defaults": { "value": { "uint16": 0 }, "action": { "uint16": null } }
//!   },
//!   "invalid": [[90, 99]],
//!   "write": [5, [10, 11]],
//!   "bits": [{ "addr": 4, "value": 1 }],
//!   "uint16": [{ "addr": 5, "value": 123 }, { "addr": 6, "action": "increment" }],
//!   "uint32": [{ "addr": [10, 11], "value": 123456 }],
//!   "float32": [{ "addr": 12, "value": 3.5 }],
//!   "string": [{ "addr": [20, 23], "value": "test" }],
//!   "repeat": [{ "addr": [10, 13], "to": [30, 41] }]
//! }
//! ```
//!
//! Rule lists are applied in the fixed order of [`RuleGroup::ORDERED`], later
//! groups overwriting cells set by earlier ones.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::cell::Access;
use crate::clock::ClockFormat;
use crate::memory::{SharingMode, TableKind, TableSizes};
use crate::ConfigError;

/// Complete configuration of one simulated device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Table sizes, sharing mode and type defaults.
    pub setup: Setup,
    /// Addresses that reject every access.
    #[serde(default)]
    pub invalid: Vec<RuleEntry>,
    /// Addresses that accept writes.
    #[serde(default)]
    pub write: Vec<RuleEntry>,
    /// Bit cells, or words whose bits are exposed through bit tables.
    #[serde(default)]
    pub bits: Vec<RuleEntry>,
    /// Plain 16-bit words.
    #[serde(default, alias = "word16")]
    pub uint16: Vec<RuleEntry>,
    /// Big-endian 32-bit unsigned pairs.
    #[serde(default, alias = "word32")]
    pub uint32: Vec<RuleEntry>,
    /// Big-endian binary32 pairs.
    #[serde(default)]
    pub float32: Vec<RuleEntry>,
    /// Fixed-length strings, two characters per word.
    #[serde(default)]
    pub string: Vec<RuleEntry>,
    /// Tiling directives applied after all typed rules.
    #[serde(default)]
    pub repeat: Vec<RepeatRule>,
}

impl DeviceConfig {
    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its content is not a valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Returns the typed rule lists in application order.
    #[must_use]
    pub fn ordered_rules(&self) -> [(RuleGroup, &[RuleEntry]); 7] {
        [
            (RuleGroup::Invalid, &self.invalid),
            (RuleGroup::Write, &self.write),
            (RuleGroup::Bits, &self.bits),
            (RuleGroup::Uint16, &self.uint16),
            (RuleGroup::Uint32, &self.uint32),
            (RuleGroup::Float32, &self.float32),
            (RuleGroup::String, &self.string),
        ]
    }
}

/// Device-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Setup {
    /// Number of coil addresses.
    #[serde(rename = "co size", alias = "co_size")]
    pub co_size: u32,
    /// Number of discrete-input addresses.
    #[serde(rename = "di size", alias = "di_size")]
    pub di_size: u32,
    /// Number of holding-register addresses.
    #[serde(rename = "hr size", alias = "hr_size")]
    pub hr_size: u32,
    /// Number of input-register addresses.
    #[serde(rename = "ir size", alias = "ir_size")]
    pub ir_size: u32,
    /// Legacy switch: `true` selects [`SharingMode::Unified`].
    #[serde(rename = "shared blocks", alias = "shared_blocks", default)]
    pub shared_blocks: bool,
    /// Explicit sharing mode, overriding `shared blocks`.
    #[serde(default)]
    pub sharing: Option<SharingMode>,
    /// Rejects accesses whose request type does not match the cell type.
    #[serde(rename = "type exception", alias = "type_exception", default)]
    pub type_exception: bool,
    /// Seed for the random action generator; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Encoding used by the generic `clock` action.
    #[serde(default)]
    pub clock: ClockFormat,
    /// Byte used to pad strings to their full width.
    #[serde(
        rename = "string pad",
        alias = "string_pad",
        default = "Setup::default_string_pad"
    )]
    pub string_pad: char,
    /// Default value and action per semantic type.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Setup {
    const fn default_string_pad() -> char {
        ' '
    }

    /// Returns the effective sharing mode.
    #[must_use]
    pub fn sharing_mode(&self) -> SharingMode {
        self.sharing.unwrap_or(if self.shared_blocks {
            SharingMode::Unified
        } else {
            SharingMode::Separate
        })
    }

    /// Returns the declared table sizes.
    #[must_use]
    pub const fn sizes(&self) -> TableSizes {
        TableSizes {
            coils: self.co_size,
            discrete_inputs: self.di_size,
            holding_registers: self.hr_size,
            input_registers: self.ir_size,
        }
    }
}

/// Per-type defaults applied to unmentioned addresses and to rules that omit
/// a value or action.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Default values.
    #[serde(default)]
    pub value: DefaultValues,
    /// Default action names (`null` for none).
    #[serde(default)]
    pub action: DefaultActions,
}

/// Default value per semantic type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DefaultValues {
    /// Bit cells and bit-field words.
    pub bits: u16,
    /// Plain words.
    pub uint16: u16,
    /// 32-bit pairs.
    pub uint32: u32,
    /// Float pairs.
    pub float32: f32,
    /// Strings.
    pub string: String,
}

impl Default for DefaultValues {
    fn default() -> Self {
        Self {
            bits: 0,
            uint16: 0,
            uint32: 0,
            float32: 0.0,
            string: String::from(" "),
        }
    }
}

/// Default action name per semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DefaultActions {
    /// Bit cells and bit-field words.
    pub bits: Option<String>,
    /// Plain words.
    pub uint16: Option<String>,
    /// 32-bit pairs.
    pub uint32: Option<String>,
    /// Float pairs.
    pub float32: Option<String>,
    /// Strings.
    pub string: Option<String>,
}

impl DefaultActions {
    /// Returns the default action name for a typed group.
    #[must_use]
    pub fn for_group(&self, group: RuleGroup) -> Option<&str> {
        match group {
            RuleGroup::Bits => self.bits.as_deref(),
            RuleGroup::Uint16 => self.uint16.as_deref(),
            RuleGroup::Uint32 => self.uint32.as_deref(),
            RuleGroup::Float32 => self.float32.as_deref(),
            RuleGroup::String => self.string.as_deref(),
            RuleGroup::Invalid | RuleGroup::Write | RuleGroup::Repeat => None,
        }
    }
}

/// Rule list identifier, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleGroup {
    /// `invalid` list.
    Invalid,
    /// `write` list.
    Write,
    /// `bits` list.
    Bits,
    /// `uint16` list.
    Uint16,
    /// `uint32` list.
    Uint32,
    /// `float32` list.
    Float32,
    /// `string` list.
    String,
    /// `repeat` list.
    Repeat,
}

impl RuleGroup {
    /// Groups in the order the compiler applies them.
    pub const ORDERED: [Self; 8] = [
        Self::Invalid,
        Self::Write,
        Self::Bits,
        Self::Uint16,
        Self::Uint32,
        Self::Float32,
        Self::String,
        Self::Repeat,
    ];

    /// Returns the configuration key of the group.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Write => "write",
            Self::Bits => "bits",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::String => "string",
            Self::Repeat => "repeat",
        }
    }
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Single address or inclusive `[start, end]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AddressSpec {
    /// One address.
    Single(u32),
    /// Inclusive range.
    Range([u32; 2]),
}

impl AddressSpec {
    /// Returns the inclusive `(start, end)` bounds as written.
    #[must_use]
    pub const fn bounds(self) -> (u32, u32) {
        match self {
            Self::Single(addr) => (addr, addr),
            Self::Range([start, end]) => (start, end),
        }
    }
}

/// Entry of a rule list: a bare address/range or a detailed rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    /// Bare address or range using the group defaults.
    Address(AddressSpec),
    /// Rule with explicit attributes.
    Detailed(Rule),
}

impl RuleEntry {
    /// Expands a bare entry into a rule with default attributes.
    #[must_use]
    pub fn to_rule(&self) -> Rule {
        match self {
            Self::Address(addr) => Rule::at(*addr),
            Self::Detailed(rule) => rule.clone(),
        }
    }
}

/// Detailed rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Address or range covered by the rule.
    pub addr: AddressSpec,
    /// Fixed initial value; the group default when absent.
    #[serde(default)]
    pub value: Option<RuleValue>,
    /// Action name: absent uses the group default, `null` disables actions.
    #[serde(default, deserialize_with = "explicit_null")]
    pub action: Option<Option<String>>,
    /// Access override; access set by `invalid`/`write` is kept when absent.
    #[serde(default)]
    pub access: Option<Access>,
    /// Target table for non-unified sharing modes.
    #[serde(default)]
    pub table: Option<TableKind>,
    /// Per-address overrides inside the range.
    #[serde(default, rename = "except")]
    pub exceptions: Vec<RuleException>,
}

impl Rule {
    /// Creates a rule covering `addr` with default attributes.
    #[must_use]
    pub const fn at(addr: AddressSpec) -> Self {
        Self {
            addr,
            value: None,
            action: None,
            access: None,
            table: None,
            exceptions: Vec::new(),
        }
    }

    /// Returns the exception registered for `addr`, if any.
    #[must_use]
    pub fn exception_at(&self, addr: u32) -> Option<&RuleException> {
        self.exceptions.iter().find(|exception| exception.addr == addr)
    }
}

/// Override of one member of a rule's range.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleException {
    /// Address of the member (the first word for composites).
    pub addr: u32,
    /// Value override.
    #[serde(default)]
    pub value: Option<RuleValue>,
    /// Action override, with the same tri-state meaning as [`Rule::action`].
    #[serde(default, deserialize_with = "explicit_null")]
    pub action: Option<Option<String>>,
    /// Access override.
    #[serde(default)]
    pub access: Option<Access>,
}

/// Literal value of a rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// Text literal.
    Text(String),
}

/// Tiling directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatRule {
    /// Source range.
    pub addr: AddressSpec,
    /// Target range filled cyclically from the source.
    pub to: AddressSpec,
    /// Block selector for non-unified sharing modes.
    #[serde(default)]
    pub table: Option<TableKind>,
}

/// Keeps an explicit `null` distinct from an absent field.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
