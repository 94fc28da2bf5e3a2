//! Queue lifecycle: create, start, stop, check, flush, release

use super::{CaptureSink, CheckReport, EventQueue, KeyFilter, Scorer};
use crate::config::QueueConfig;
use crate::device::{CaptureSource, DeviceHandle, DeviceInfo, DeviceRegistry, InputBackend};
use crate::error::{QueueError, Result};
use crate::keyboard::RawEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Lifecycle state of a device's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Never created
    Uninitialized,
    /// Allocated, capture not started
    Created,
    /// Capture is delivering events
    Running,
    /// Capture paused, queued and scored data kept
    Stopped,
    /// Torn down; `create` is required again
    Released,
}

/// Everything owned by one live queue
struct LiveQueue {
    info: DeviceInfo,
    state: QueueState,
    queue: Arc<EventQueue>,
    scorer: Scorer,
    capture: Box<dyn CaptureSource>,
}

impl LiveQueue {
    fn sink(&self) -> CaptureSink {
        CaptureSink::new(self.info.handle, Arc::clone(&self.queue))
    }

    /// Close the gate, then stop the source. No push lands after this returns.
    fn halt_capture(&mut self) {
        self.queue.set_accepting(false);
        self.capture.stop();
    }

    /// Report a latched device error once. The failed source has given up,
    /// so a running queue is stopped first; `start` reopens the device.
    fn take_device_error(&mut self) -> Result<()> {
        if !self.queue.has_error() {
            return Ok(());
        }
        if self.state == QueueState::Running {
            self.halt_capture();
            self.state = QueueState::Stopped;
            log::info!("{}: capture stopped after device error", self.info.handle);
        }
        match self.queue.take_error() {
            Some(message) => Err(QueueError::DeviceError {
                device: self.info.handle,
                message,
            }),
            None => Ok(()),
        }
    }
}

/// Owns one queue per device and drives its state machine.
///
/// All operations run on the consumer's thread. Capture sources deliver
/// events concurrently through the [`CaptureSink`] each queue hands them.
pub struct QueueController {
    registry: DeviceRegistry,
    config: QueueConfig,
    queues: HashMap<DeviceHandle, LiveQueue>,
    released: HashSet<DeviceHandle>,
    /// Device the default selector resolved to at its last `create`
    default: Option<DeviceHandle>,
}

impl QueueController {
    pub fn new(backend: Box<dyn InputBackend>, config: QueueConfig) -> Self {
        Self {
            registry: DeviceRegistry::new(backend),
            config,
            queues: HashMap::new(),
            released: HashSet::new(),
            default: None,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Devices currently exposed by the backend
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.registry.devices()
    }

    /// Device the default selector currently refers to, if a queue was
    /// created through it and not yet released
    pub fn default_device(&self) -> Option<DeviceHandle> {
        self.default
    }

    /// Map an optional index to a handle. Explicit indices are taken as-is.
    /// The default selector sticks to the device `create` resolved it to and
    /// only goes through the registry when no such queue exists.
    fn handle_for(&self, device: Option<usize>) -> Result<DeviceHandle> {
        match (device, self.default) {
            (Some(index), _) => Ok(DeviceHandle::new(index)),
            (None, Some(handle)) => Ok(handle),
            (None, None) => Ok(self.registry.resolve(None)?.handle),
        }
    }

    fn live_mut(&mut self, device: Option<usize>) -> Result<&mut LiveQueue> {
        let handle = self.handle_for(device)?;
        self.queues
            .get_mut(&handle)
            .ok_or(QueueError::NotCreated(handle))
    }

    /// Create a queue for the requested (or default) device.
    ///
    /// An existing queue on the same device is released first, as is the
    /// previous default queue when the default selector now resolves to a
    /// different device. Capture does not begin until [`start`](Self::start).
    pub fn create(&mut self, device: Option<usize>, keys: Option<&[u16]>) -> Result<DeviceHandle> {
        let filter = keys
            .map(|codes| KeyFilter::from_codes(codes.iter().copied()))
            .unwrap_or_default();
        self.create_filtered(device, filter)
    }

    /// [`create`](Self::create) with a prebuilt filter
    pub fn create_filtered(&mut self, device: Option<usize>, filter: KeyFilter) -> Result<DeviceHandle> {
        let info = self.registry.resolve(device)?;
        let handle = info.handle;

        if device.is_none() {
            if let Some(previous) = self.default.filter(|h| *h != handle) {
                log::debug!("default selector moved from {} to {}", previous, handle);
                self.default = None;
                if let Err(e) = self.release_handle(previous) {
                    log::warn!("{}: discarded on re-create: {}", previous, e);
                }
            }
        }

        if self.queues.contains_key(&handle) {
            log::debug!("{}: replacing existing queue", handle);
            if let Err(e) = self.release_handle(handle) {
                log::warn!("{}: discarded on re-create: {}", handle, e);
            }
        }

        let capture = self.registry.acquire(&info)?;
        let filter_desc = if filter.is_all() {
            "all keys".to_string()
        } else {
            format!("{} keys", filter.len())
        };
        let queue = Arc::new(EventQueue::new(self.config.effective_capacity(), filter));

        log::info!(
            "{} ({:?} \"{}\"): queue created, capacity {}, {}",
            handle,
            info.category,
            info.name,
            queue.capacity(),
            filter_desc
        );

        self.released.remove(&handle);
        if device.is_none() {
            self.default = Some(handle);
        }
        self.queues.insert(
            handle,
            LiveQueue {
                info,
                state: QueueState::Created,
                queue,
                scorer: Scorer::new(),
                capture,
            },
        );
        Ok(handle)
    }

    /// Begin delivering events. Starting a running queue is a no-op.
    pub fn start(&mut self, device: Option<usize>) -> Result<()> {
        let live = self.live_mut(device)?;
        match live.state {
            QueueState::Running => return Ok(()),
            QueueState::Created | QueueState::Stopped => {}
            QueueState::Uninitialized | QueueState::Released => {
                return Err(QueueError::NotCreated(live.info.handle));
            }
        }

        live.queue.set_accepting(true);
        let sink = live.sink();
        if let Err(e) = live.capture.start(sink) {
            live.queue.set_accepting(false);
            return Err(e);
        }
        live.state = QueueState::Running;
        log::info!("{}: capture started", live.info.handle);
        Ok(())
    }

    /// Stop delivering events; queued and scored data are kept.
    ///
    /// Stopping a queue that is not running is a no-op. A latched device
    /// error is reported once the queue has stopped.
    pub fn stop(&mut self, device: Option<usize>) -> Result<()> {
        let live = self.live_mut(device)?;
        if live.state == QueueState::Running {
            live.halt_capture();
            live.state = QueueState::Stopped;
            log::info!("{}: capture stopped", live.info.handle);
        }
        live.take_device_error()
    }

    /// Score everything queued, then hand out and reset every scored key.
    ///
    /// A latched device error is returned instead; queued events stay put
    /// and are scored by the next call.
    pub fn check(&mut self, device: Option<usize>) -> Result<CheckReport> {
        let live = self.live_mut(device)?;
        live.take_device_error()?;

        let batch = live.queue.pop_all();
        let scored = live.scorer.drain(batch.events);

        let mut report = CheckReport::new(live.info.handle);
        report.keys = live.scorer.take_reported();
        report.overflowed = batch.overflowed;
        report.dropped = batch.dropped;

        log::debug!(
            "{}: check scored {} events, {} keys reported{}",
            live.info.handle,
            scored,
            report.keys.len(),
            if report.overflowed { " (overflowed)" } else { "" }
        );
        Ok(report)
    }

    /// Discard unscored events and zero every scored key without changing state.
    /// An unreported overflow stays pending for the next check.
    pub fn flush(&mut self, device: Option<usize>) -> Result<()> {
        let live = self.live_mut(device)?;
        let discarded = live.queue.clear();
        live.scorer.reset();
        log::debug!("{}: flushed {} events", live.info.handle, discarded);
        Ok(())
    }

    /// Tear down the queue and release the device.
    ///
    /// Releasing a device with no live queue is a no-op, as is a default
    /// selector with no queue behind it that resolves to nothing. A latched
    /// device error is reported after teardown completes.
    pub fn release(&mut self, device: Option<usize>) -> Result<()> {
        let handle = match self.handle_for(device) {
            Ok(handle) => handle,
            Err(_) => return Ok(()),
        };
        if self.default == Some(handle) {
            self.default = None;
        }
        self.release_handle(handle)
    }

    fn release_handle(&mut self, handle: DeviceHandle) -> Result<()> {
        let Some(mut live) = self.queues.remove(&handle) else {
            return Ok(());
        };

        live.halt_capture();
        let error = live.take_device_error();
        self.registry.release(handle);
        self.released.insert(handle);
        log::info!("{}: queue released", handle);
        error
    }

    /// Release every live queue, logging any latched device errors
    pub fn release_all(&mut self) {
        self.default = None;
        let handles: Vec<DeviceHandle> = self.queues.keys().copied().collect();
        for handle in handles {
            if let Err(e) = self.release_handle(handle) {
                log::warn!("{}", e);
            }
        }
    }

    /// Lifecycle state for a device
    pub fn state(&self, handle: DeviceHandle) -> QueueState {
        match self.queues.get(&handle) {
            Some(live) => live.state,
            None if self.released.contains(&handle) => QueueState::Released,
            None => QueueState::Uninitialized,
        }
    }

    /// Number of events queued but not yet scored
    pub fn pending(&self, handle: DeviceHandle) -> Option<usize> {
        self.queues.get(&handle).map(|live| live.queue.len())
    }

    /// Producer handle for a device's queue, for capture driven by the host
    pub fn sink(&self, handle: DeviceHandle) -> Result<CaptureSink> {
        self.queues
            .get(&handle)
            .map(LiveQueue::sink)
            .ok_or(QueueError::NotCreated(handle))
    }

    /// Deliver one event to a device's queue. Returns whether it was queued.
    pub fn capture_push(&self, handle: DeviceHandle, event: RawEvent) -> bool {
        self.queues
            .get(&handle)
            .map(|live| live.queue.push(event).is_queued())
            .unwrap_or(false)
    }
}

impl Drop for QueueController {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for QueueController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueController")
            .field("registry", &self.registry)
            .field("live", &self.queues.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}
