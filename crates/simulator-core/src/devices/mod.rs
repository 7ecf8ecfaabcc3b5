//! Device profiles bundled with the simulator.
//!
//! Each profile ships its configuration as embedded JSON together with the
//! callbacks the configuration names.

pub mod umg804;
