//! Shared test utilities for queue modules
//!
//! Provides event constructors and a controller over a static device list,
//! optionally keeping a host handle for plugging and unplugging devices.

use super::QueueController;
use crate::config::QueueConfig;
use crate::device::{DeviceCategory, StaticBackend};
use crate::keyboard::{RawEvent, Timestamp};

/// Creates a press event at `us` microseconds.
pub fn press_at(code: u16, us: u64) -> RawEvent {
    RawEvent::press(code, Timestamp::from_micros(us))
}

/// Creates a release event at `us` microseconds.
pub fn release_at(code: u16, us: u64) -> RawEvent {
    RawEvent::release(code, Timestamp::from_micros(us))
}

/// Controller over a static backend with the given devices and queue capacity.
pub fn controller_with(categories: &[DeviceCategory], capacity: usize) -> QueueController {
    QueueController::new(
        Box::new(StaticBackend::new(categories)),
        QueueConfig { capacity },
    )
}

/// Controller plus a shared handle on its device list.
pub fn hot_plug_controller(
    categories: &[DeviceCategory],
    capacity: usize,
) -> (QueueController, StaticBackend) {
    let backend = StaticBackend::new(categories);
    let host = backend.clone();
    let ctl = QueueController::new(Box::new(backend), QueueConfig { capacity });
    (ctl, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{KeyCode, KeyEventType};

    #[test]
    fn press_at_builds_press() {
        let event = press_at(30, 500);
        assert_eq!(event.key, KeyCode(30));
        assert_eq!(event.event_type, KeyEventType::Press);
        assert_eq!(event.timestamp.as_micros(), 500);
    }

    #[test]
    fn hot_plug_handle_changes_controller_devices() {
        let (ctl, host) = hot_plug_controller(&[DeviceCategory::Keyboard], 4);
        assert_eq!(ctl.devices().unwrap().len(), 1);
        host.set_devices(Vec::new());
        assert!(ctl.devices().unwrap().is_empty());
    }

    #[test]
    fn release_at_builds_release() {
        let event = release_at(31, 100);
        assert_eq!(event.event_type, KeyEventType::Release);
    }
}
