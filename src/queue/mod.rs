//! Event queue, key filter, scoring engine and queue lifecycle
//!
//! Data flows one way: a capture source pushes [`RawEvent`](crate::keyboard::RawEvent)s
//! through a [`CaptureSink`] into a bounded [`EventQueue`]; the consumer calls
//! [`QueueController::check`], which drains the queue into a [`Scorer`] and
//! hands out a [`CheckReport`].

mod buffer;
mod check;
mod controller;
mod filter;
mod scoring;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use buffer::{Batch, CaptureSink, EventQueue, PushOutcome};
pub use check::CheckReport;
pub use controller::{QueueController, QueueState};
pub use filter::KeyFilter;
pub use scoring::{ScoredKeyState, Scorer};
