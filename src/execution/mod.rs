//! Fan-out Execution Module
//!
//! Runs a fan-out: launches units, enforces the concurrency ceiling and
//! assembles the index-aligned outcome.
//!
//! # Architecture
//!
//! - [`engine`]: [`FanOut`] builder and entry point
//! - `launcher`: Starts units and reports each resolution with its index
//! - `scheduler`: Ramp-up / drain admission loop
//! - [`aggregate`]: Result slots, outcome and caller handle

pub mod aggregate;
pub mod engine;
pub(crate) mod launcher;
pub(crate) mod scheduler;

pub use aggregate::{AggregateHandle, AggregateOutcome};
pub use engine::FanOut;
