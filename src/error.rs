//! Error type for queue and device operations

use crate::device::DeviceHandle;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors reported synchronously by queue operations.
///
/// Releasing a queue that is already released (or was never created) is not
/// an error and has no variant here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// An explicit device index does not name an enumerable device
    #[error("no input device with index {0}")]
    DeviceNotFound(usize),

    /// No device index was given and there is no keyboard, keypad or other device
    #[error("no suitable default input device found")]
    NoSuitableDevice,

    /// The operation needs a queue that has not been created (or was released)
    #[error("no queue created for {0}")]
    NotCreated(DeviceHandle),

    /// The capture source failed mid-session; reported once, then cleared
    #[error("capture on {device} failed: {message}")]
    DeviceError { device: DeviceHandle, message: String },

    /// The backend could not list devices
    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    /// The backend could not open or start capture on a device
    #[error("could not start capture: {0}")]
    Capture(String),
}
