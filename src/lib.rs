//! kbqueue - asynchronous keyboard/HID event queue
//!
//! Captures key press and release events from an input device on a
//! background thread and scores them per key for a consumer that checks
//! periodically. One queue lives per device; see [`QueueController`].

pub mod config;
pub mod device;
pub mod error;
pub mod keyboard;
pub mod queue;
pub mod report;
pub mod utils;

pub use config::Config;
pub use error::{QueueError, Result};
pub use queue::{CheckReport, QueueController, QueueState};
