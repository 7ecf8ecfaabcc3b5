//! Named callbacks supplied by the embedding application.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cell::Cell;
use crate::memory::TableKind;
use crate::CallbackError;

/// Function invoked for a cell whose action names a registered callback.
///
/// Receives the addressed table, the cell's address inside that table and
/// the cell itself; changes made to the cell are kept.
pub type CallbackFn =
    dyn Fn(TableKind, u16, &mut Cell) -> Result<(), CallbackError> + Send + Sync + 'static;

/// Name-to-function mapping consulted by the compiler and the value engine.
///
/// Built-in action names (`random`, `increment`, `clock`, `uptime`,
/// `timestamp`, `reset`, `none`) take precedence over callbacks registered
/// under the same name.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Arc<CallbackFn>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(TableKind, u16, &mut Cell) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let _ = self.callbacks.insert(name.into(), Arc::new(callback));
    }

    /// Builder form of [`CallbackRegistry::register`].
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(TableKind, u16, &mut Cell) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.register(name, callback);
        self
    }

    /// Returns `true` when a callback is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` when no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invokes the callback registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns the callback's own error, or a [`CallbackError`] naming the
    /// callback when nothing is registered under `name`.
    pub fn invoke(
        &self,
        name: &str,
        table: TableKind,
        address: u16,
        cell: &mut Cell,
    ) -> Result<(), CallbackError> {
        let callback = self
            .callbacks
            .get(name)
            .ok_or_else(|| CallbackError::new(format!("no callback registered as {name:?}")))?;
        callback(table, address, cell)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CallbackRegistry")
            .field("names", &names)
            .finish()
    }
}
