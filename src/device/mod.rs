//! Input device enumeration and capture backends
//!
//! A backend lists the devices the OS exposes and opens a [`CaptureSource`]
//! for one of them. The capture source runs independently of the consumer
//! and delivers events through the [`CaptureSink`] it is started with.
//!
//! | Backend | Platforms | Devices |
//! |---------|-----------|---------|
//! | [`EvdevBackend`] | Linux | every `/dev/input/event*` with key capabilities |
//! | [`PollingBackend`] | all | one system keyboard, polled via `device_query` |
//! | [`StaticBackend`] | all | a fixed list, events pushed by the host |

mod polling;
mod registry;

#[cfg(target_os = "linux")]
mod evdev_backend;

pub use polling::PollingBackend;
pub use registry::DeviceRegistry;

#[cfg(target_os = "linux")]
pub use evdev_backend::{evdev_status, EvdevBackend};

use crate::error::Result;
use crate::queue::CaptureSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque identifier for an enumerated input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Enumeration index this handle was resolved from
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.0)
    }
}

/// Coarse device class used for default selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    Keyboard,
    Keypad,
    /// Anything else with buttons, e.g. a mouse
    Other,
}

/// One enumerated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub handle: DeviceHandle,
    pub category: DeviceCategory,
    /// Human-readable product name
    pub name: String,
    /// Device node, when the backend has one
    pub path: Option<PathBuf>,
}

impl DeviceInfo {
    pub fn new(index: usize, category: DeviceCategory, name: impl Into<String>) -> Self {
        Self {
            handle: DeviceHandle::new(index),
            category,
            name: name.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

/// Source of device lists and capture sessions
pub trait InputBackend: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// List devices in index order
    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Prepare capture for a device. Capture does not begin until [`CaptureSource::start`].
    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn CaptureSource>>;
}

/// Producer of raw events for one device
pub trait CaptureSource: Send {
    /// Begin delivering events to `sink`
    fn start(&mut self, sink: CaptureSink) -> Result<()>;

    /// Stop delivering events. Must not return while a delivery is in flight.
    fn stop(&mut self);
}

/// Host-maintained device list whose events are pushed by the host through
/// [`QueueController::sink`](crate::queue::QueueController::sink).
///
/// Clones share the list, so a host can keep one clone and plug or unplug
/// devices while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct StaticBackend {
    devices: Arc<Mutex<Vec<DeviceInfo>>>,
}

fn static_devices(categories: &[DeviceCategory]) -> Vec<DeviceInfo> {
    categories
        .iter()
        .enumerate()
        .map(|(i, c)| DeviceInfo::new(i, *c, format!("static {:?} {}", c, i)))
        .collect()
}

impl StaticBackend {
    /// Devices are indexed in the order given
    pub fn new(categories: &[DeviceCategory]) -> Self {
        Self::from_devices(static_devices(categories))
    }

    pub fn from_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DeviceInfo>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the device list, as if devices were plugged or unplugged
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.lock() = devices;
    }

    /// [`set_devices`](Self::set_devices) from categories, indexed in order
    pub fn set_categories(&self, categories: &[DeviceCategory]) {
        self.set_devices(static_devices(categories));
    }
}

impl InputBackend for StaticBackend {
    fn name(&self) -> &'static str {
        "static"
    }

    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.lock().clone())
    }

    fn open(&self, _device: &DeviceInfo) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(ExternalCapture))
    }
}

/// Capture driven entirely from outside; start and stop only gate the sink
struct ExternalCapture;

impl CaptureSource for ExternalCapture {
    fn start(&mut self, _sink: CaptureSink) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Best backend for the current platform
pub fn default_backend(config: &crate::config::CaptureConfig) -> Box<dyn InputBackend> {
    #[cfg(target_os = "linux")]
    {
        match EvdevBackend::new(config.clone()).enumerate() {
            Ok(devices) if !devices.is_empty() => {
                log::info!("using evdev backend ({} devices)", devices.len());
                return Box::new(EvdevBackend::new(config.clone()));
            }
            Ok(_) => log::warn!("evdev: no accessible input devices, falling back to polling"),
            Err(e) => log::warn!("evdev unavailable ({}), falling back to polling", e),
        }
    }
    Box::new(PollingBackend::new(config.clone()))
}
