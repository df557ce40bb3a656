//! Fan-out Definition Module
//!
//! Data structures that describe a fan-out before it runs.
//!
//! # Structure
//!
//! - [`config`]: Concurrency options and YAML loading
//! - [`source`]: Fixed and generator input sources
//! - [`error`]: Configuration, cancellation and per-unit errors

pub mod config;
pub mod error;
pub mod source;

pub use config::{FanOutConfig, DEFAULT_CONCURRENCY};
pub use error::{BoxError, CombinedError, FanOutError, UnitError, UnitFailure};
pub use source::{GeneratorFn, InputGenerator, InputSource};
