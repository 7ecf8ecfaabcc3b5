//! Request counters kept per simulated device.

use crate::{Rejection, RejectionClass};

/// Saturating counters of served requests and rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestCounters {
    /// Read requests served successfully.
    pub reads: u64,
    /// Write requests served successfully.
    pub writes: u64,
    /// Device rebuilds, explicit or triggered by a `reset` cell.
    pub resets: u64,
    /// Rejections of the out-of-range class.
    pub out_of_range: u64,
    /// Rejections of the invalid-address class.
    pub invalid_address: u64,
    /// Rejections of the access-denied class.
    pub access_denied: u64,
    /// Rejections of the callback-error class.
    pub callback_errors: u64,
    /// The most recent rejection, if any.
    pub last_rejection: Option<Rejection>,
}

impl RequestCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a served read.
    pub const fn record_read(&mut self) {
        self.reads = self.reads.saturating_add(1);
    }

    /// Records a served write.
    pub const fn record_write(&mut self) {
        self.writes = self.writes.saturating_add(1);
    }

    /// Records a device rebuild.
    pub const fn record_reset(&mut self) {
        self.resets = self.resets.saturating_add(1);
    }

    /// Records a rejection, bumping the counter of its class.
    pub const fn record_rejection(&mut self, rejection: Rejection) {
        self.last_rejection = Some(rejection);
        let counter = match rejection.class() {
            RejectionClass::OutOfRange => &mut self.out_of_range,
            RejectionClass::InvalidAddress => &mut self.invalid_address,
            RejectionClass::AccessDenied => &mut self.access_denied,
            RejectionClass::CallbackError => &mut self.callback_errors,
        };
        *counter = counter.saturating_add(1);
    }

    /// Total rejections across all classes.
    #[must_use]
    pub const fn rejections(&self) -> u64 {
        self.out_of_range
            .saturating_add(self.invalid_address)
            .saturating_add(self.access_denied)
            .saturating_add(self.callback_errors)
    }
}
