//! Host-facing device surface.
//!
//! A [`Simulator`] owns one compiled device behind a single mutex; it is
//! meant to be shared between protocol sessions through an `Arc`. Every
//! request runs the access checks first and touches cells only once they
//! pass.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::callbacks::CallbackRegistry;
use crate::cell::{Cell, CellKind};
use crate::clock::{SystemClock, TimeSource};
use crate::codec::{
    f32_to_words, string_to_words, u32_to_words, words_to_f32, words_to_string, words_to_u32,
};
use crate::config::DeviceConfig;
use crate::diag::RequestCounters;
use crate::engine::{read_cells, write_cells, EngineContext, Values};
use crate::memory::{authorize, AccessKind, AddressSpace, TableKind};
use crate::{compile, ConfigError, Rejection};

/// Read/write contract consumed by protocol adapters.
pub trait RegisterStore {
    /// Reads `count` consecutive addresses of `table` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the request fails authorization or a
    /// callback fails.
    fn read(&self, table: TableKind, start: u16, count: u16) -> Result<Values, Rejection>;

    /// Writes `values` to consecutive addresses of `table` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the request fails authorization, the
    /// values do not match the table or a callback fails.
    fn write(&self, table: TableKind, start: u16, values: &Values) -> Result<(), Rejection>;
}

struct DeviceState {
    space: AddressSpace,
    rng: StdRng,
    time: Box<dyn TimeSource>,
    counters: RequestCounters,
}

/// One simulated device.
pub struct Simulator {
    config: DeviceConfig,
    callbacks: CallbackRegistry,
    pristine: AddressSpace,
    state: Mutex<DeviceState>,
}

impl Simulator {
    /// Compiles `config` into a device driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] raised by compilation.
    pub fn new(config: DeviceConfig, callbacks: CallbackRegistry) -> Result<Self, ConfigError> {
        Self::with_time_source(config, callbacks, SystemClock::new())
    }

    /// Compiles `config` into a device driven by `time`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] raised by compilation.
    pub fn with_time_source(
        config: DeviceConfig,
        callbacks: CallbackRegistry,
        time: impl TimeSource + 'static,
    ) -> Result<Self, ConfigError> {
        let pristine = compile(&config, &callbacks)?;
        let state = DeviceState {
            space: pristine.clone(),
            rng: seeded_rng(config.setup.seed),
            time: Box::new(time),
            counters: RequestCounters::new(),
        };
        Ok(Self {
            config,
            callbacks,
            pristine,
            state: Mutex::new(state),
        })
    }

    /// Parses and compiles a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed text and any compilation
    /// error.
    pub fn from_json(text: &str, callbacks: CallbackRegistry) -> Result<Self, ConfigError> {
        Self::new(DeviceConfig::from_json(text)?, callbacks)
    }

    /// Returns the configuration the device was built from.
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Returns the declared size of `table`.
    #[must_use]
    pub const fn size(&self, table: TableKind) -> u32 {
        self.pristine.size(table)
    }

    /// Returns a copy of the cell behind `address` of `table`.
    ///
    /// Aliasing bit tables return the owning word cell.
    #[must_use]
    pub fn cell(&self, table: TableKind, address: u16) -> Option<Cell> {
        self.lock().space.cell_at(table, address).cloned()
    }

    /// Returns a snapshot of the request counters.
    #[must_use]
    pub fn counters(&self) -> RequestCounters {
        self.lock().counters
    }

    /// Reads `count` addresses of `table` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the request fails authorization or a
    /// callback fails.
    pub fn read(&self, table: TableKind, start: u16, count: u16) -> Result<Values, Rejection> {
        let mut state = self.lock();
        self.read_locked(&mut state, table, start, count)
    }

    /// Writes `values` starting at `start` of `table`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the request fails authorization, the
    /// values do not match the table or a callback fails.
    pub fn write(&self, table: TableKind, start: u16, values: &Values) -> Result<(), Rejection> {
        let mut state = self.lock();
        self.write_locked(&mut state, table, start, values)
    }

    /// Reads `count` bits of a bit table.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::TypeMismatch`] for word tables and any rejection
    /// of [`Simulator::read`].
    pub fn read_bits(
        &self,
        table: TableKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>, Rejection> {
        self.expect_table(table, start, true)?;
        self.read(table, start, count)?
            .into_bits()
            .ok_or(Rejection::TypeMismatch {
                table,
                address: start,
            })
    }

    /// Reads `count` words of a word table.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::TypeMismatch`] for bit tables and any rejection
    /// of [`Simulator::read`].
    pub fn read_words(
        &self,
        table: TableKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, Rejection> {
        self.expect_table(table, start, false)?;
        self.read(table, start, count)?
            .into_words()
            .ok_or(Rejection::TypeMismatch {
                table,
                address: start,
            })
    }

    /// Writes bits to a bit table.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::write`].
    pub fn write_bits(
        &self,
        table: TableKind,
        start: u16,
        bits: &[bool],
    ) -> Result<(), Rejection> {
        self.write(table, start, &Values::Bits(bits.to_vec()))
    }

    /// Writes words to a word table.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::write`].
    pub fn write_words(
        &self,
        table: TableKind,
        start: u16,
        words: &[u16],
    ) -> Result<(), Rejection> {
        self.write(table, start, &Values::Words(words.to_vec()))
    }

    /// Reads the big-endian 32-bit value at `address`.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::read_words`].
    pub fn read_u32(&self, table: TableKind, address: u16) -> Result<u32, Rejection> {
        let words = self.read_words(table, address, 2)?;
        Ok(words_to_u32([words[0], words[1]]))
    }

    /// Writes a big-endian 32-bit value at `address`.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::write_words`].
    pub fn write_u32(&self, table: TableKind, address: u16, value: u32) -> Result<(), Rejection> {
        self.write_words(table, address, &u32_to_words(value))
    }

    /// Reads the big-endian binary32 value at `address`.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::read_words`].
    pub fn read_f32(&self, table: TableKind, address: u16) -> Result<f32, Rejection> {
        let words = self.read_words(table, address, 2)?;
        Ok(words_to_f32([words[0], words[1]]))
    }

    /// Writes a big-endian binary32 value at `address`.
    ///
    /// # Errors
    ///
    /// Returns any rejection of [`Simulator::write_words`].
    pub fn write_f32(&self, table: TableKind, address: u16, value: f32) -> Result<(), Rejection> {
        self.write_words(table, address, &f32_to_words(value))
    }

    /// Reads the whole string starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::TypeMismatch`] when `address` is not the first
    /// word of a string and any rejection of [`Simulator::read`].
    pub fn read_string(&self, table: TableKind, address: u16) -> Result<String, Rejection> {
        self.expect_table(table, address, false)?;
        let mut state = self.lock();
        let width = string_width(&state.space, table, address)
            .map_err(|rejection| reject(&mut state.counters, rejection))?;
        let values = self.read_locked(&mut state, table, address, width)?;
        let words = values.as_words().unwrap_or_default();
        Ok(words_to_string(words, state.space.string_pad()))
    }

    /// Writes `text` to the string starting at `address`, padding it to the
    /// string's width.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::TypeMismatch`] when `address` is not the first
    /// word of a string, [`Rejection::IllegalValue`] when `text` does not fit
    /// and any rejection of [`Simulator::write`].
    pub fn write_string(
        &self,
        table: TableKind,
        address: u16,
        text: &str,
    ) -> Result<(), Rejection> {
        self.expect_table(table, address, false)?;
        let mut state = self.lock();
        let width = string_width(&state.space, table, address)
            .map_err(|rejection| reject(&mut state.counters, rejection))?;
        let pad = state.space.string_pad();
        let Some(words) = string_to_words(text, usize::from(width), pad) else {
            return Err(reject(
                &mut state.counters,
                Rejection::IllegalValue { table, address },
            ));
        };
        self.write_locked(&mut state, table, address, &Values::Words(words))
    }

    /// Rebuilds the device from its configuration and restarts its clock.
    pub fn reset(&self) {
        let mut state = self.lock();
        self.rebuild(&mut state);
    }

    fn expect_table(&self, table: TableKind, address: u16, bits: bool) -> Result<(), Rejection> {
        if table.is_bit_table() == bits {
            Ok(())
        } else {
            Err(reject(
                &mut self.lock().counters,
                Rejection::TypeMismatch { table, address },
            ))
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rebuild(&self, state: &mut DeviceState) {
        state.space = self.pristine.clone();
        state.rng = seeded_rng(self.config.setup.seed);
        state.time.restart();
        state.counters.record_reset();
        debug!("device rebuilt from configuration");
    }

    fn read_locked(
        &self,
        state: &mut DeviceState,
        table: TableKind,
        start: u16,
        count: u16,
    ) -> Result<Values, Rejection> {
        debug!(table = %table, start, count, "read request");
        let DeviceState {
            space, rng, time, ..
        } = state;
        let outcome = authorize(space, table, start, usize::from(count), AccessKind::Read)
            .and_then(|range| {
                let mut ctx = EngineContext {
                    rng,
                    time: &**time,
                    callbacks: &self.callbacks,
                };
                read_cells(space, &range, &mut ctx)
            });
        match outcome {
            Ok(outcome) => {
                state.counters.record_read();
                if outcome.reset_requested {
                    self.rebuild(state);
                }
                Ok(outcome.values)
            }
            Err(rejection) => Err(reject(&mut state.counters, rejection)),
        }
    }

    fn write_locked(
        &self,
        state: &mut DeviceState,
        table: TableKind,
        start: u16,
        values: &Values,
    ) -> Result<(), Rejection> {
        debug!(table = %table, start, count = values.len(), "write request");
        let result = authorize(&state.space, table, start, values.len(), AccessKind::Write)
            .and_then(|range| write_cells(&mut state.space, &range, values, &self.callbacks));
        match result {
            Ok(()) => {
                state.counters.record_write();
                Ok(())
            }
            Err(rejection) => Err(reject(&mut state.counters, rejection)),
        }
    }
}

impl RegisterStore for Simulator {
    fn read(&self, table: TableKind, start: u16, count: u16) -> Result<Values, Rejection> {
        Self::read(self, table, start, count)
    }

    fn write(&self, table: TableKind, start: u16, values: &Values) -> Result<(), Rejection> {
        Self::write(self, table, start, values)
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("sharing", &self.pristine.sharing_mode())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

fn string_width(space: &AddressSpace, table: TableKind, address: u16) -> Result<u16, Rejection> {
    match space.cell_at(table, address) {
        Some(cell) if cell.kind == CellKind::String && cell.group_offset() == 0 => {
            u16::try_from(cell.group_width())
                .map_err(|_| Rejection::TypeMismatch { table, address })
        }
        Some(_) => Err(Rejection::TypeMismatch { table, address }),
        None => Err(Rejection::OutOfRange {
            table,
            start: address,
            count: 1,
            size: space.size(table),
        }),
    }
}

fn reject(counters: &mut RequestCounters, rejection: Rejection) -> Rejection {
    match rejection {
        Rejection::OutOfRange { .. } => {
            warn!(%rejection, "request outside table bounds");
        }
        Rejection::InvalidAddress { .. } => {
            warn!(%rejection, "request touches an invalid address");
        }
        _ => warn!(%rejection, "request rejected"),
    }
    counters.record_rejection(rejection);
    rejection
}
