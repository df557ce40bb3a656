//! Monitoring Module
//!
//! Utilities for observing a fan-out run after the fact.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: unit launch/resolve timing, peak concurrency,
//!   Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
