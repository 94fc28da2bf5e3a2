//! Key codes, timestamps and raw press/release events

mod event;
pub mod keymap;

pub use event::{KeyEventType, RawEvent, Timestamp};
pub use keymap::KeyCode;
