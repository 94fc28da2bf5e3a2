//! Bounded event buffer shared between one capture producer and the consumer
//!
//! The producer pushes through a [`CaptureSink`]; the consumer detaches the
//! whole contents with [`EventQueue::pop_all`]. Both sides take the same
//! short-lived lock, so a push never waits on anything but another O(1)
//! critical section. When the buffer is full the oldest entry is dropped.

use super::KeyFilter;
use crate::device::DeviceHandle;
use crate::keyboard::{RawEvent, Timestamp};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What happened to a pushed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended to the queue
    Queued,
    /// Appended after dropping the oldest entry
    Overflowed,
    /// Key excluded by the filter
    Filtered,
    /// Queue is not running, or the device is in an error state
    Rejected,
}

impl PushOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued | Self::Overflowed)
    }
}

/// Events detached from the queue in one `pop_all`
#[derive(Debug, Default)]
pub struct Batch {
    /// Oldest first
    pub events: VecDeque<RawEvent>,
    /// Whether entries were dropped since the previous batch
    pub overflowed: bool,
    /// How many entries were dropped since the previous batch
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Inner {
    events: VecDeque<RawEvent>,
    accepting: bool,
    overflowed: bool,
    dropped: u64,
    newest: Option<Timestamp>,
    device_error: Option<String>,
}

/// Bounded, timestamp-ordered buffer of raw events
#[derive(Debug)]
pub struct EventQueue {
    capacity: usize,
    filter: KeyFilter,
    inner: Mutex<Inner>,
}

impl EventQueue {
    /// Create an empty queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize, filter: KeyFilter) -> Self {
        Self {
            capacity: capacity.max(1),
            filter,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn filter(&self) -> &KeyFilter {
        &self.filter
    }

    /// Producer side. Never blocks beyond the queue's own critical section.
    pub fn push(&self, mut event: RawEvent) -> PushOutcome {
        if !self.filter.allows(event.key) {
            return PushOutcome::Filtered;
        }

        let mut inner = self.lock();
        if !inner.accepting || inner.device_error.is_some() {
            return PushOutcome::Rejected;
        }

        // Keep the queue non-decreasing even if a source reorders slightly
        if let Some(newest) = inner.newest {
            if event.timestamp < newest {
                event.timestamp = newest;
            }
        }
        inner.newest = Some(event.timestamp);

        let mut outcome = PushOutcome::Queued;
        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
            inner.dropped += 1;
            if !inner.overflowed {
                log::warn!(
                    "event queue full ({} events), dropping oldest",
                    self.capacity
                );
            }
            inner.overflowed = true;
            outcome = PushOutcome::Overflowed;
        }
        inner.events.push_back(event);
        outcome
    }

    /// Consumer side: detach everything queued so far, leaving an empty queue
    pub fn pop_all(&self) -> Batch {
        let mut inner = self.lock();
        let batch = Batch {
            events: std::mem::take(&mut inner.events),
            overflowed: inner.overflowed,
            dropped: inner.dropped,
        };
        inner.overflowed = false;
        inner.dropped = 0;
        batch
    }

    /// Discard everything queued. Returns the number discarded.
    ///
    /// The overflow record survives until the next `pop_all` reports it.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let discarded = inner.events.len();
        inner.events.clear();
        discarded
    }

    /// Open or close the producer gate.
    ///
    /// Closing takes the same lock as `push`, so once this returns no push
    /// can land until the gate is reopened.
    pub fn set_accepting(&self, accepting: bool) {
        self.lock().accepting = accepting;
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    /// Latch a capture failure. Only the first message is kept until taken.
    pub fn latch_error(&self, message: String) {
        let mut inner = self.lock();
        if inner.device_error.is_none() {
            inner.device_error = Some(message);
        }
    }

    /// Take the latched failure, clearing it
    pub fn take_error(&self) -> Option<String> {
        self.lock().device_error.take()
    }

    pub fn has_error(&self) -> bool {
        self.lock().device_error.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }
}

/// Producer handle for one device's queue
#[derive(Debug, Clone)]
pub struct CaptureSink {
    device: DeviceHandle,
    queue: Arc<EventQueue>,
}

impl CaptureSink {
    pub fn new(device: DeviceHandle, queue: Arc<EventQueue>) -> Self {
        Self { device, queue }
    }

    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    /// Deliver one event
    pub fn push(&self, event: RawEvent) -> PushOutcome {
        self.queue.push(event)
    }

    /// Whether pushes are currently accepted. Capture threads may use this to idle.
    pub fn is_open(&self) -> bool {
        self.queue.is_accepting()
    }

    /// Report that the device failed; later pushes are dropped until the
    /// consumer has seen the error.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: capture error: {}", self.device, message);
        self.queue.latch_error(message);
    }
}
