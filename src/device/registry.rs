//! Device resolution and handle bookkeeping

use super::{CaptureSource, DeviceCategory, DeviceHandle, DeviceInfo, InputBackend};
use crate::error::{QueueError, Result};
use std::collections::HashSet;

/// Resolves device selectors against a backend and tracks which handles
/// have a live queue.
pub struct DeviceRegistry {
    backend: Box<dyn InputBackend>,
    held: HashSet<DeviceHandle>,
}

impl DeviceRegistry {
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        Self {
            backend,
            held: HashSet::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// All devices the backend currently exposes
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.backend.enumerate()
    }

    /// Resolve an explicit index, or pick the default device.
    ///
    /// The default is the lowest-index keyboard, then the lowest-index
    /// keypad, then the lowest-index device of any other kind.
    pub fn resolve(&self, requested: Option<usize>) -> Result<DeviceInfo> {
        let devices = self.backend.enumerate()?;

        if let Some(index) = requested {
            return devices
                .into_iter()
                .find(|d| d.handle.index() == index)
                .ok_or(QueueError::DeviceNotFound(index));
        }

        [
            DeviceCategory::Keyboard,
            DeviceCategory::Keypad,
            DeviceCategory::Other,
        ]
        .iter()
        .find_map(|category| {
            devices
                .iter()
                .filter(|d| d.category == *category)
                .min_by_key(|d| d.handle)
                .cloned()
        })
        .ok_or(QueueError::NoSuitableDevice)
    }

    /// Open a capture source and record the hold on `device`
    pub fn acquire(&mut self, device: &DeviceInfo) -> Result<Box<dyn CaptureSource>> {
        let source = self.backend.open(device)?;
        self.held.insert(device.handle);
        Ok(source)
    }

    /// Drop the hold on `handle`. Returns whether it was held.
    pub fn release(&mut self, handle: DeviceHandle) -> bool {
        self.held.remove(&handle)
    }

    pub fn is_held(&self, handle: DeviceHandle) -> bool {
        self.held.contains(&handle)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("backend", &self.backend.name())
            .field("held", &self.held)
            .finish()
    }
}
