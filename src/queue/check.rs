//! Result of a `check` call

use super::ScoredKeyState;
use crate::device::DeviceHandle;
use crate::keyboard::{KeyCode, Timestamp};
use std::collections::BTreeMap;

/// Snapshot of every key scored since the previous check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub device: DeviceHandle,
    /// Keys with nonzero counts, ordered by code
    pub keys: BTreeMap<KeyCode, ScoredKeyState>,
    /// The queue dropped events since the previous check
    pub overflowed: bool,
    /// How many events were dropped
    pub dropped: u64,
}

impl CheckReport {
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            keys: BTreeMap::new(),
            overflowed: false,
            dropped: 0,
        }
    }

    /// Whether any key was pressed since the previous check
    pub fn pressed(&self) -> bool {
        self.keys.values().any(|s| s.press_count > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: KeyCode) -> Option<&ScoredKeyState> {
        self.keys.get(&key)
    }

    pub fn first_press(&self, key: KeyCode) -> Option<Timestamp> {
        self.get(key).and_then(|s| s.first_press_time)
    }

    pub fn last_release(&self, key: KeyCode) -> Option<Timestamp> {
        self.get(key).and_then(|s| s.last_release_time)
    }

    /// Key with the earliest first press, if any
    pub fn earliest_press(&self) -> Option<(KeyCode, Timestamp)> {
        self.keys
            .iter()
            .filter_map(|(k, s)| s.first_press_time.map(|t| (*k, t)))
            .min_by_key(|(_, t)| *t)
    }
}
