//! Admission Scheduler
//!
//! The bounded-concurrency control loop of a fan-out:
//!
//! 1. Ramp-up: launch units in index order until the ceiling is reached or
//!    the input source is exhausted.
//! 2. Drain: wait for at least one unit to resolve, record every resolved
//!    unit in ascending index order, and launch one replacement per
//!    resolution while inputs remain.
//! 3. Finish when nothing is outstanding and every index was launched.
//!
//! A failed unit is recorded and the loop continues. Cancellation stops
//! admission, aborts every outstanding unit and ends the run.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::aggregate::{AggregateOutcome, FanOutStatus, ResultSlots};
use super::launcher::{ResolvedUnit, UnitLauncher};
use crate::fanout::{FanOutError, InputSource, UnitError, UnitFailure};
use crate::monitoring::{EventType, ExecutionTimeline};

/// Drives one fan-out run from first launch to published outcome.
///
/// Owns all scheduling state: the input cursor, the outstanding units (via
/// the launcher) and the result slots. Nothing else mutates them.
pub(crate) struct AdmissionScheduler<T, R> {
    source: InputSource<T>,
    launcher: UnitLauncher<T, R>,
    ceiling: usize,
    count: usize,
    cursor: usize,
    slots: ResultSlots<R>,
    timeline: ExecutionTimeline,
    status: watch::Sender<FanOutStatus<R>>,
    cancel: CancellationToken,
}

impl<T, R> AdmissionScheduler<T, R>
where
    T: Clone + Send + 'static,
    R: Default + Send + 'static,
{
    pub(crate) fn new(
        source: InputSource<T>,
        launcher: UnitLauncher<T, R>,
        ceiling: usize,
        status: watch::Sender<FanOutStatus<R>>,
        cancel: CancellationToken,
    ) -> Self {
        let count = source.size();
        Self {
            source,
            launcher,
            ceiling,
            count,
            cursor: 0,
            slots: ResultSlots::new(count),
            timeline: ExecutionTimeline::new(),
            status,
            cancel,
        }
    }

    /// Runs the fan-out to completion and publishes the outcome.
    pub(crate) async fn run(mut self) {
        let result = self.drive().await;
        let resolved = self.status.borrow().resolved;

        match &result {
            Ok(outcome) => match outcome.error() {
                None => info!("Fan-out completed: {} units succeeded", outcome.len()),
                Some(e) => warn!(
                    "Fan-out completed: {} units, {} failed",
                    outcome.len(),
                    e.len()
                ),
            },
            Err(e) => warn!(
                "Fan-out stopped after {} of {} units resolved: {}",
                resolved, self.count, e
            ),
        }

        self.status
            .send_modify(|status| status.outcome = Some(result.map(Arc::new)));
    }

    async fn drive(&mut self) -> Result<AggregateOutcome<R>, FanOutError> {
        info!(
            "Starting fan-out of {} units from {} source (concurrency: {})",
            self.count,
            self.source.kind(),
            self.ceiling
        );

        if self.count == 0 {
            return Ok(AggregateOutcome::empty());
        }

        if self.cancel.is_cancelled() {
            warn!("Fan-out cancelled before the first launch");
            return Err(FanOutError::Cancelled);
        }

        // Ramp-up
        while self.launcher.outstanding() < self.ceiling && self.admit_next() {}

        // Drain loop
        while self.launcher.outstanding() > 0 {
            let resolved = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                resolved = self.launcher.next_resolved() => Some(resolved),
            };

            let Some(resolved) = resolved else {
                return Err(self.abort_outstanding().await);
            };

            if resolved.is_empty() {
                return Err(FanOutError::Interrupted {
                    message: format!(
                        "{} units reported outstanding but none could be collected",
                        self.launcher.outstanding()
                    ),
                });
            }

            for unit in resolved {
                self.record(unit);
                self.admit_next();
            }
        }

        debug!(
            "All {} launched units resolved ({} inputs)",
            self.launcher.launched(),
            self.count
        );

        let timeline = std::mem::take(&mut self.timeline);
        let slots = std::mem::replace(&mut self.slots, ResultSlots::new(0));
        Ok(slots.into_outcome(timeline))
    }

    /// Stops admission and aborts every outstanding unit.
    async fn abort_outstanding(&mut self) -> FanOutError {
        let aborted = self.launcher.abort_all().await;
        warn!(
            "Fan-out cancelled; aborted {} outstanding units {:?}",
            aborted.len(),
            aborted
        );
        FanOutError::Cancelled
    }

    /// Launches the next unit that has an input.
    ///
    /// Indices without an input are recorded as failed and skipped, so a
    /// call either launches one unit or exhausts the cursor. Returns true if
    /// a unit was launched.
    fn admit_next(&mut self) -> bool {
        while self.cursor < self.count {
            let index = self.cursor;
            self.cursor += 1;

            match self.source.value(index) {
                Some(input) => {
                    if self.launcher.launch(index, input) {
                        self.timeline.add_event(index, EventType::Launched);
                        return true;
                    }
                }
                None => {
                    warn!("Input source yielded no value for unit {}", index);
                    self.record(ResolvedUnit {
                        index,
                        result: Err(UnitError::new(index, UnitFailure::MissingInput)),
                    });
                }
            }
        }
        false
    }

    /// Writes a resolved unit into its slot.
    fn record(&mut self, unit: ResolvedUnit<R>) {
        let event = match &unit.result {
            Ok(_) => {
                debug!("Unit {} completed", unit.index);
                EventType::Completed
            }
            Err(e) => {
                warn!("Unit {} failed: {}", unit.index, e.failure);
                EventType::Failed
            }
        };

        if self.slots.resolve(unit.index, unit.result) {
            self.timeline.add_event(unit.index, event);
            self.status.send_modify(|status| status.resolved += 1);
        }
    }
}
