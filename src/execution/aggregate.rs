//! Aggregate Handle
//!
//! Collects per-unit results in original index order and hands the finished
//! outcome to the caller.
//!
//! - `ResultSlots`: one record per index, resolved once
//! - [`AggregateOutcome`]: index-aligned outputs plus the combined error
//! - [`AggregateHandle`]: what the caller holds while the fan-out runs

use std::sync::Arc;

use log::{error, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::fanout::{CombinedError, FanOutError, UnitError, UnitFailure};
use crate::monitoring::ExecutionTimeline;

/// Result record for one unit.
#[derive(Debug, Clone)]
pub(crate) enum ResultSlot<R> {
    /// Unit has not resolved yet
    Pending,
    /// Unit resolved with an output or an error
    Resolved(Result<R, UnitError>),
}

impl<R> ResultSlot<R> {
    /// Returns true once the unit has resolved.
    pub(crate) fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Result records for every index of one fan-out.
#[derive(Debug)]
pub(crate) struct ResultSlots<R> {
    slots: Vec<ResultSlot<R>>,
    resolved: usize,
}

impl<R> ResultSlots<R> {
    /// Creates `count` pending slots.
    pub(crate) fn new(count: usize) -> Self {
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, || ResultSlot::Pending);
        Self { slots, resolved: 0 }
    }

    /// Records the result of unit `index`.
    ///
    /// A slot is written at most once; later writes and out-of-range
    /// indices are ignored and return false.
    pub(crate) fn resolve(&mut self, index: usize, result: Result<R, UnitError>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if !slot.is_resolved() => {
                *slot = ResultSlot::Resolved(result);
                self.resolved += 1;
                true
            }
            Some(_) => {
                warn!("Result for unit {} already recorded; ignoring", index);
                false
            }
            None => {
                error!(
                    "Result for unit {} is outside the {} known units",
                    index,
                    self.slots.len()
                );
                false
            }
        }
    }

    /// Number of resolved slots.
    pub(crate) fn resolved(&self) -> usize {
        self.resolved
    }

    /// Returns true once every slot has resolved.
    pub(crate) fn is_complete(&self) -> bool {
        self.resolved == self.slots.len()
    }
}

impl<R: Default> ResultSlots<R> {
    /// Builds the outcome. Failed slots contribute `R::default()` to the
    /// outputs and their error to the combined error; a slot still pending
    /// counts as failed with [`UnitFailure::Unresolved`].
    pub(crate) fn into_outcome(self, timeline: ExecutionTimeline) -> AggregateOutcome<R> {
        if !self.is_complete() {
            error!(
                "Building outcome with {} of {} units resolved",
                self.resolved(),
                self.slots.len()
            );
        }

        let mut outputs = Vec::with_capacity(self.slots.len());
        let mut errors = Vec::new();

        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                ResultSlot::Resolved(Ok(output)) => outputs.push(output),
                ResultSlot::Resolved(Err(e)) => {
                    outputs.push(R::default());
                    errors.push(e);
                }
                ResultSlot::Pending => {
                    outputs.push(R::default());
                    errors.push(UnitError::new(index, UnitFailure::Unresolved));
                }
            }
        }

        AggregateOutcome {
            outputs,
            error: CombinedError::from_errors(errors),
            timeline,
        }
    }
}

/// Finished result of a fan-out.
#[derive(Debug, Clone)]
pub struct AggregateOutcome<R> {
    outputs: Vec<R>,
    error: Option<CombinedError>,
    timeline: ExecutionTimeline,
}

impl<R> AggregateOutcome<R> {
    /// Outcome of a fan-out with no units.
    pub fn empty() -> Self {
        Self {
            outputs: Vec::new(),
            error: None,
            timeline: ExecutionTimeline::new(),
        }
    }

    /// Outputs aligned with input order.
    pub fn outputs(&self) -> &[R] {
        &self.outputs
    }

    /// Combined error of every failed unit, if any failed.
    pub fn error(&self) -> Option<&CombinedError> {
        self.error.as_ref()
    }

    /// Launch/resolve history of the run.
    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Returns true if no unit failed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Number of units in the run.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if the run had no units.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Splits into the output sequence and the combined error.
    pub fn into_parts(self) -> (Vec<R>, Option<CombinedError>) {
        (self.outputs, self.error)
    }

    /// Returns the outputs, or the combined error if any unit failed.
    pub fn into_result(self) -> Result<Vec<R>, FanOutError> {
        match self.error {
            None => Ok(self.outputs),
            Some(e) => Err(FanOutError::Units(e)),
        }
    }
}

/// State published by the scheduler to the handle.
#[derive(Debug)]
pub(crate) struct FanOutStatus<R> {
    pub(crate) resolved: usize,
    pub(crate) total: usize,
    pub(crate) outcome: Option<Result<Arc<AggregateOutcome<R>>, FanOutError>>,
}

impl<R> FanOutStatus<R> {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            resolved: 0,
            total,
            outcome: None,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Caller-side view of a running fan-out.
///
/// Cloning the handle is cheap; every clone observes the same run.
#[derive(Debug, Clone)]
pub struct AggregateHandle<R> {
    status: watch::Receiver<FanOutStatus<R>>,
    cancel: CancellationToken,
}

impl<R> AggregateHandle<R> {
    pub(crate) fn new(status: watch::Receiver<FanOutStatus<R>>, cancel: CancellationToken) -> Self {
        Self { status, cancel }
    }

    /// Returns true once every unit has resolved. Never suspends.
    pub fn is_ready(&self) -> bool {
        matches!(self.status.borrow().outcome, Some(Ok(_)))
    }

    /// Returns true once the run has stopped for any reason, including
    /// cancellation. Never suspends.
    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_finished()
    }

    /// Returns `(resolved, total)`. Never suspends.
    ///
    /// After a cancellation this still reports how many units resolved
    /// before the run stopped.
    pub fn progress(&self) -> (usize, usize) {
        let status = self.status.borrow();
        (status.resolved, status.total)
    }

    /// Number of units in this fan-out.
    pub fn total(&self) -> usize {
        self.status.borrow().total
    }

    /// Cancels this fan-out: no further units are admitted, outstanding
    /// units are aborted, and [`get`](Self::get) returns
    /// [`FanOutError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<R: Clone> AggregateHandle<R> {
    /// Waits for every unit to resolve and returns the outcome.
    ///
    /// Calling this again returns the same outcome without re-running
    /// anything.
    pub async fn get(&self) -> Result<AggregateOutcome<R>, FanOutError> {
        let mut status = self.status.clone();
        let finished = status.wait_for(FanOutStatus::is_finished).await.map_err(|_| {
            FanOutError::Interrupted {
                message: "scheduler stopped without publishing an outcome".to_string(),
            }
        })?;

        match &finished.outcome {
            Some(Ok(outcome)) => Ok(outcome.as_ref().clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FanOutError::Interrupted {
                message: "scheduler reported completion without an outcome".to_string(),
            }),
        }
    }
}
