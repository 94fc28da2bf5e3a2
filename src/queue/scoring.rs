//! Per-key aggregation of drained events

use crate::keyboard::{KeyCode, KeyEventType, RawEvent, Timestamp};
use crate::utils::FirstLastExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate press/release state for one key since it was last reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredKeyState {
    pub press_count: u32,
    pub release_count: u32,
    pub first_press_time: Option<Timestamp>,
    pub last_press_time: Option<Timestamp>,
    pub first_release_time: Option<Timestamp>,
    pub last_release_time: Option<Timestamp>,
}

impl ScoredKeyState {
    /// Fold one event into the state
    pub fn record(&mut self, event_type: KeyEventType, timestamp: Timestamp) {
        match event_type {
            KeyEventType::Press => {
                self.press_count = self.press_count.saturating_add(1);
                self.first_press_time.record_first(timestamp);
                self.last_press_time.record_last(timestamp);
            }
            KeyEventType::Release => {
                self.release_count = self.release_count.saturating_add(1);
                self.first_release_time.record_first(timestamp);
                self.last_release_time.record_last(timestamp);
            }
        }
    }

    /// Whether anything has been scored
    pub fn is_active(&self) -> bool {
        self.press_count > 0 || self.release_count > 0
    }

    /// Whether the last scored event for this key was a press
    pub fn is_held(&self) -> bool {
        match (self.last_press_time, self.last_release_time) {
            (Some(_), None) => true,
            (Some(press), Some(release)) => press > release,
            _ => false,
        }
    }
}

/// Scoring engine: folds raw events into [`ScoredKeyState`]s
#[derive(Debug, Default)]
pub struct Scorer {
    keys: BTreeMap<KeyCode, ScoredKeyState>,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one event
    pub fn score(&mut self, event: &RawEvent) {
        self.keys
            .entry(event.key)
            .or_default()
            .record(event.event_type, event.timestamp);
    }

    /// Score a drained batch in order. Returns the number of events scored.
    pub fn drain<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = RawEvent>,
    {
        let mut count = 0;
        for event in events {
            self.score(&event);
            count += 1;
        }
        count
    }

    /// Current state of one key
    pub fn get(&self, key: KeyCode) -> Option<&ScoredKeyState> {
        self.keys.get(&key)
    }

    /// Hand out every key with nonzero counts and reset those keys
    pub fn take_reported(&mut self) -> BTreeMap<KeyCode, ScoredKeyState> {
        let (reported, idle): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut self.keys)
            .into_iter()
            .partition(|(_, state)| state.is_active());
        self.keys = idle;
        reported
    }

    /// Zero every key
    pub fn reset(&mut self) {
        self.keys.clear();
    }

    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }
}
