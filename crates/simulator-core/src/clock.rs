//! Device clock sources and the encodings used by clock-driven cells.
//!
//! Two encodings are supported:
//!
//! - [`ClockFormat::Uptime`]: whole seconds since the device started (or was
//!   last reset), truncated to the cell's width. A bit cell reports the parity
//!   of the count, a 16-bit word the low 16 bits, a 32-bit pair the low 32 bits
//!   and a float pair the count as binary32.
//! - [`ClockFormat::Timestamp`]: a seven-word UTC wall-clock record written
//!   from the clocked cell onward: year, month (`0..=11`), day of month,
//!   weekday (`1` = Monday .. `7` = Sunday), hour, minute, second.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Deserialize;

/// Number of words in a [`ClockFormat::Timestamp`] record.
pub const TIMESTAMP_WORDS: usize = 7;

/// Encoding policy for clock-driven cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockFormat {
    /// Seconds elapsed since device start.
    #[default]
    Uptime,
    /// Seven-word calendar record of the current UTC time.
    Timestamp,
}

/// Source of elapsed and wall-clock time for a simulated device.
pub trait TimeSource: Send {
    /// Time elapsed since the device started or was last restarted.
    fn elapsed(&self) -> Duration;

    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Restarts the elapsed-time counter from zero.
    fn restart(&mut self);
}

/// [`TimeSource`] backed by the host's monotonic and system clocks.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    /// Starts a clock at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn restart(&mut self) {
        self.started = Instant::now();
    }
}

/// Manually driven [`TimeSource`] for deterministic replays and tests.
///
/// Clones share the same elapsed counter, so a handle kept by the caller can
/// advance a clock owned by a simulator.
#[derive(Clone)]
pub struct ManualClock {
    elapsed_secs: Arc<AtomicU64>,
    now: DateTime<Utc>,
}

impl ManualClock {
    /// Creates a clock frozen at `now` with zero elapsed time.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            now,
        }
    }

    /// Advances the elapsed counter by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        let _ = self.elapsed_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("elapsed_secs", &self.elapsed_secs.load(Ordering::SeqCst))
            .field("now", &self.now)
            .finish()
    }
}

impl TimeSource for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_secs(self.elapsed_secs.load(Ordering::SeqCst))
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn restart(&mut self) {
        self.elapsed_secs.store(0, Ordering::SeqCst);
    }
}

/// Builds the seven-word timestamp record for `now`.
#[must_use]
pub fn timestamp_record(now: &DateTime<Utc>) -> [u16; TIMESTAMP_WORDS] {
    [
        u16::try_from(now.year()).unwrap_or(0),
        field(now.month0()),
        field(now.day()),
        field(now.weekday().number_from_monday()),
        field(now.hour()),
        field(now.minute()),
        field(now.second()),
    ]
}

fn field(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{timestamp_record, ManualClock, TimeSource};

    #[test]
    fn timestamp_record_uses_zero_based_month_and_monday_first_weekday() {
        // 2024-03-05 was a Tuesday.
        let now = Utc
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .expect("valid date");
        assert_eq!(timestamp_record(&now), [2024, 2, 5, 2, 14, 7, 9]);
    }

    #[test]
    fn manual_clock_clones_share_elapsed_counter() {
        let now = Utc.timestamp_opt(0, 0).single().expect("epoch");
        let mut owned = ManualClock::new(now);
        let handle = owned.clone();

        handle.advance(42);
        assert_eq!(owned.elapsed().as_secs(), 42);

        owned.restart();
        assert_eq!(handle.elapsed().as_secs(), 0);
    }
}
