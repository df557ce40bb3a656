//! FanRunner - Bounded-Concurrency Fan-out Engine
//!
//! Runs one activity over an ordered set of inputs with at most N units in
//! flight, and returns the outputs in input order together with a combined
//! error listing every unit that failed.
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`fanout`]: Configuration, input sources and error types
//! - [`activity`]: The unit-of-work capability and its adapters
//! - [`execution`]: Launcher, admission scheduler and aggregate handle
//! - [`context`]: Runtime and cancellation scope for fan-outs
//! - [`monitoring`]: Launch/resolve timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use fanrunner::activity::FnActivity;
//! use fanrunner::fanout::BoxError;
//! use fanrunner::{ExecutionContext, FanOut};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecutionContext::current()?;
//!
//!     // Fetch 100 pages, 8 at a time
//!     let fetch = FnActivity::new("fetch", |offset: usize| async move {
//!         Ok::<_, BoxError>(format!("page at {}", offset))
//!     });
//!     let handle = FanOut::new(fetch)
//!         .with_concurrency(8)
//!         .with_generator(100, |i| i * 50)
//!         .start(&ctx)?;
//!
//!     let (pages, error) = handle.get().await?.into_parts();
//!     if let Some(e) = error {
//!         eprintln!("{}", e);
//!     }
//!     println!("{} pages", pages.len());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod context;
pub mod execution;
pub mod fanout;
pub mod monitoring;

// Re-export commonly used types
pub use activity::{Activity, FnActivity, ShellActivity};
pub use context::ExecutionContext;
pub use execution::{AggregateHandle, AggregateOutcome, FanOut};
pub use fanout::{CombinedError, FanOutConfig, FanOutError, UnitError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FanRunner";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "FanRunner");
    }

    #[test]
    fn test_module_exports_config() {
        let config = FanOutConfig::default();
        assert_eq!(config.concurrency, fanout::DEFAULT_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_module_exports_fan_out() {
        let ctx = ExecutionContext::current().unwrap();
        let handle = FanOut::new(FnActivity::new("len", |s: String| async move {
            Ok::<_, fanout::BoxError>(s.len())
        }))
        .with_inputs(vec!["a".to_string(), "bcd".to_string()])
        .start(&ctx)
        .unwrap();

        assert_eq!(handle.get().await.unwrap().outputs(), &[1, 3]);
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
