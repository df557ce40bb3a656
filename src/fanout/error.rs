//! Fan-out Error Types
//!
//! Two families of errors exist:
//!
//! - [`FanOutError`]: conditions that stop a whole fan-out (bad
//!   configuration, cancellation) or that a caller asked to be raised.
//! - [`UnitError`]: one unit of work failed. These never stop the
//!   scheduler; they are merged into a [`CombinedError`] in ascending
//!   index order.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by an activity invocation.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors that halt a fan-out or are surfaced to its caller.
#[derive(Debug, Clone, Error)]
pub enum FanOutError {
    /// Invalid concurrency ceiling, conflicting or missing input source,
    /// or an unreadable configuration file.
    ///
    /// Raised synchronously at construction; no unit is launched.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The enclosing execution context (or the fan-out itself) was cancelled
    /// before every unit resolved.
    #[error("Fan-out cancelled before all units resolved")]
    Cancelled,

    /// One or more units failed. Only produced on request, see
    /// [`AggregateOutcome::into_result`](crate::execution::AggregateOutcome::into_result).
    #[error(transparent)]
    Units(CombinedError),

    /// The scheduler stopped without publishing an outcome, typically
    /// because the runtime shut down underneath it.
    #[error("Fan-out interrupted: {message}")]
    Interrupted {
        /// What was observed when the scheduler went away.
        message: String,
    },
}

impl FanOutError {
    /// Shorthand for a [`FanOutError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Why a single unit of work did not produce an output.
#[derive(Debug, Clone, Error)]
pub enum UnitFailure {
    /// The activity returned an error. The original error is preserved.
    #[error(transparent)]
    Activity(Arc<dyn Error + Send + Sync>),

    /// The activity panicked while running.
    #[error("unit panicked: {0}")]
    Panicked(String),

    /// The unit was aborted before it resolved.
    #[error("unit aborted")]
    Aborted,

    /// The input source had no value for this index.
    #[error("input source yielded no value")]
    MissingInput,

    /// The run ended without a result for this unit.
    #[error("unit never resolved")]
    Unresolved,
}

impl From<BoxError> for UnitFailure {
    fn from(error: BoxError) -> Self {
        Self::Activity(Arc::from(error))
    }
}

/// Failure of the unit at `index`.
#[derive(Debug, Clone, Error)]
#[error("unit {index}: {failure}")]
pub struct UnitError {
    /// Ordinal position of the failed unit.
    pub index: usize,
    /// What went wrong.
    #[source]
    pub failure: UnitFailure,
}

impl UnitError {
    /// Creates a unit error for `index`.
    pub fn new(index: usize, failure: impl Into<UnitFailure>) -> Self {
        Self {
            index,
            failure: failure.into(),
        }
    }
}

/// Every unit error from one fan-out run, ordered by ascending index.
///
/// Errors are neither deduplicated nor truncated.
#[derive(Debug, Clone)]
pub struct CombinedError {
    errors: Vec<UnitError>,
}

impl CombinedError {
    /// Merges unit errors into one value, sorting by index.
    ///
    /// Returns `None` when `errors` is empty.
    pub fn from_errors(mut errors: Vec<UnitError>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        errors.sort_by_key(|e| e.index);
        Some(Self { errors })
    }

    /// Returns the individual unit errors.
    pub fn errors(&self) -> &[UnitError] {
        &self.errors
    }

    /// Returns the indices of the failed units.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.index).collect()
    }

    /// Number of failed units.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false for a constructed value; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for CombinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "unit" } else { "units" };
        write!(f, "{} {} failed: ", self.errors.len(), noun)?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl Error for CombinedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn Error + 'static))
    }
}

impl IntoIterator for CombinedError {
    type Item = UnitError;
    type IntoIter = std::vec::IntoIter<UnitError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
