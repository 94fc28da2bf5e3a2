//! Cross-platform capture that polls the global key state via `device_query`
//!
//! The OS gives no per-device view here, so the backend exposes a single
//! system keyboard. Presses and releases are derived by diffing successive
//! key-state snapshots on a background thread.

use super::{CaptureSource, DeviceCategory, DeviceInfo, InputBackend};
use crate::config::CaptureConfig;
use crate::error::{QueueError, Result};
use crate::keyboard::{KeyCode, KeyEventType, RawEvent, Timestamp};
use crate::queue::CaptureSink;
use device_query::{DeviceQuery, DeviceState, Keycode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Backend exposing the system keyboard through `device_query`
#[derive(Debug, Clone, Default)]
pub struct PollingBackend {
    config: CaptureConfig,
}

impl PollingBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl InputBackend for PollingBackend {
    fn name(&self) -> &'static str {
        "device_query"
    }

    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(vec![DeviceInfo::new(0, DeviceCategory::Keyboard, "system keyboard")])
    }

    fn open(&self, _device: &DeviceInfo) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(PollingCapture::new(self.config.clone())))
    }
}

/// Diffs key-state snapshots into press/release events
#[derive(Debug, Default)]
struct KeyStateDiff {
    last_keys: Vec<Keycode>,
}

impl KeyStateDiff {
    /// Emit events for keys that changed since the previous snapshot
    fn update(&mut self, current: Vec<Keycode>, now: Timestamp, mut emit: impl FnMut(RawEvent)) {
        let mut send = |key: Keycode, event_type| {
            let code = KeyCode::from(key);
            // Keys outside the scancode table have no stable code
            if !code.is_reserved() {
                emit(RawEvent::new(code, event_type, now));
            }
        };

        for key in &current {
            if !self.last_keys.contains(key) {
                send(*key, KeyEventType::Press);
            }
        }

        for key in &self.last_keys {
            if !current.contains(key) {
                send(*key, KeyEventType::Release);
            }
        }

        self.last_keys = current;
    }
}

/// Background polling thread for one queue
struct PollingCapture {
    config: CaptureConfig,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PollingCapture {
    fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl CaptureSource for PollingCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        self.shutdown.store(false, Ordering::SeqCst);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.config.poll_interval();

        let worker = thread::Builder::new()
            .name(format!("kbqueue-poll-{}", sink.device().index()))
            .spawn(move || {
                // DeviceState is not Send on every platform; build it on this thread
                let device_state = DeviceState::new();
                let mut diff = KeyStateDiff {
                    last_keys: device_state.get_keys(),
                };

                while !shutdown.load(Ordering::SeqCst) {
                    let keys = device_state.get_keys();
                    diff.update(keys, Timestamp::now(), |event| {
                        sink.push(event);
                    });
                    thread::sleep(interval);
                }
                log::debug!("{}: polling thread exiting", sink.device());
            })
            .map_err(|e| QueueError::Capture(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("polling capture thread panicked");
            }
        }
    }
}

impl Drop for PollingCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
