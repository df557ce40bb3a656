//! Unit Launcher
//!
//! Starts activity invocations and keeps track of which ordinal index each
//! running task belongs to. Launching is the only place external work is
//! started. Every launched unit eventually comes back from
//! [`UnitLauncher::next_resolved`] as either an output or a [`UnitError`];
//! panics and aborts are reported per unit, never as a launcher failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, error};
use tokio::runtime::Handle;
use tokio::task::{Id, JoinError, JoinSet};

use crate::activity::Activity;
use crate::fanout::{BoxError, UnitError, UnitFailure};

/// A unit that has finished running.
#[derive(Debug)]
pub(crate) struct ResolvedUnit<R> {
    /// Ordinal index of the unit.
    pub(crate) index: usize,
    /// Output or failure of the unit.
    pub(crate) result: Result<R, UnitError>,
}

/// Launches units on a runtime and collects them as they resolve.
pub(crate) struct UnitLauncher<T, R> {
    activity: Arc<dyn Activity<T, R>>,
    runtime: Handle,
    units: JoinSet<Result<R, BoxError>>,
    outstanding: HashMap<Id, usize>,
    launched: HashSet<usize>,
}

impl<T, R> UnitLauncher<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Creates a launcher that invokes `activity` on `runtime`.
    pub(crate) fn new(activity: Arc<dyn Activity<T, R>>, runtime: Handle) -> Self {
        Self {
            activity,
            runtime,
            units: JoinSet::new(),
            outstanding: HashMap::new(),
            launched: HashSet::new(),
        }
    }

    /// Starts the unit at `index` with `input`.
    ///
    /// Returns false, without starting anything, if `index` was launched
    /// before.
    pub(crate) fn launch(&mut self, index: usize, input: T) -> bool {
        if !self.launched.insert(index) {
            error!(
                "Unit {} was already launched by '{}'; refusing to launch it again",
                index,
                self.activity.name()
            );
            return false;
        }

        let activity = Arc::clone(&self.activity);
        let abort = self
            .units
            .spawn_on(async move { activity.invoke(input).await }, &self.runtime);
        self.outstanding.insert(abort.id(), index);

        debug!(
            "Launched unit {} via '{}' ({} outstanding)",
            index,
            self.activity.name(),
            self.outstanding.len()
        );
        true
    }

    /// Number of launched units that have not been collected yet.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Number of distinct indices launched so far.
    pub(crate) fn launched(&self) -> usize {
        self.launched.len()
    }

    /// Waits until at least one unit resolves, then returns every unit that
    /// has resolved by that point, ordered by ascending index.
    ///
    /// Returns an empty list when nothing is outstanding. Cancel safe: if the
    /// returned future is dropped before completing, no resolution is lost.
    pub(crate) async fn next_resolved(&mut self) -> Vec<ResolvedUnit<R>> {
        let Some(first) = self.units.join_next_with_id().await else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        resolved.extend(self.settle(first));
        while let Some(next) = self.units.try_join_next_with_id() {
            resolved.extend(self.settle(next));
        }

        resolved.sort_by_key(|unit| unit.index);
        resolved
    }

    /// Aborts every outstanding unit and waits for them to stop.
    ///
    /// Returns the indices that were still outstanding, in ascending order.
    pub(crate) async fn abort_all(&mut self) -> Vec<usize> {
        let mut aborted: Vec<usize> = self.outstanding.drain().map(|(_, index)| index).collect();
        aborted.sort_unstable();

        self.units.shutdown().await;
        aborted
    }

    fn settle(
        &mut self,
        joined: Result<(Id, Result<R, BoxError>), JoinError>,
    ) -> Option<ResolvedUnit<R>> {
        let (id, result) = match joined {
            Ok((id, Ok(output))) => (id, Ok(output)),
            Ok((id, Err(e))) => (id, Err(UnitFailure::from(e))),
            Err(e) if e.is_panic() => (e.id(), Err(UnitFailure::Panicked(e.to_string()))),
            Err(e) => (e.id(), Err(UnitFailure::Aborted)),
        };

        let Some(index) = self.outstanding.remove(&id) else {
            error!("Resolved task {} does not belong to any launched unit", id);
            return None;
        };

        Some(ResolvedUnit {
            index,
            result: result.map_err(|failure| UnitError::new(index, failure)),
        })
    }
}
