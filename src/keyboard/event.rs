//! Raw press/release events and the monotonic timestamp they carry

use super::KeyCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// Process-wide origin for [`Timestamp::now`]
static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// Monotonic clock value in microseconds.
///
/// Values produced by [`Timestamp::now`] are measured from a process-wide
/// epoch taken the first time the clock is read, so they are comparable
/// across capture threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    /// Read the monotonic clock
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Convert an `Instant` onto this clock. Instants before the epoch saturate to zero.
    pub fn from_instant(instant: Instant) -> Self {
        let since = instant.saturating_duration_since(*EPOCH);
        Self(since.as_micros().min(u64::MAX as u128) as u64)
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// A single press or release as delivered by a capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// The key code
    pub key: KeyCode,
    /// Type of event (press/release)
    pub event_type: KeyEventType,
    /// When the event occurred
    pub timestamp: Timestamp,
}

impl RawEvent {
    pub fn new(key: KeyCode, event_type: KeyEventType, timestamp: Timestamp) -> Self {
        Self {
            key,
            event_type,
            timestamp,
        }
    }

    pub fn press(code: u16, timestamp: Timestamp) -> Self {
        Self::new(KeyCode(code), KeyEventType::Press, timestamp)
    }

    pub fn release(code: u16, timestamp: Timestamp) -> Self {
        Self::new(KeyCode(code), KeyEventType::Release, timestamp)
    }

    pub fn is_press(&self) -> bool {
        self.event_type == KeyEventType::Press
    }
}
