//! Fan-out Entry Point
//!
//! [`FanOut`] collects the pieces of one fan-out (activity, concurrency,
//! input source), validates them, and starts the admission scheduler on the
//! execution context's runtime. Validation happens synchronously: an
//! invalid configuration is returned from [`FanOut::start`] before any unit
//! is launched.

use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

use super::aggregate::{AggregateHandle, FanOutStatus};
use super::launcher::UnitLauncher;
use super::scheduler::AdmissionScheduler;
use crate::activity::Activity;
use crate::context::ExecutionContext;
use crate::fanout::{FanOutConfig, FanOutError, InputGenerator, InputSource};

/// Builder for one bounded-concurrency fan-out.
///
/// # Example
///
/// ```rust,no_run
/// use fanrunner::activity::FnActivity;
/// use fanrunner::fanout::BoxError;
/// use fanrunner::{ExecutionContext, FanOut};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = ExecutionContext::current()?;
/// let double = FnActivity::new("double", |x: u64| async move { Ok::<_, BoxError>(x * 2) });
///
/// let handle = FanOut::new(double)
///     .with_concurrency(2)
///     .with_inputs(vec![1, 2, 3])
///     .start(&ctx)?;
///
/// let outcome = handle.get().await?;
/// assert_eq!(outcome.outputs(), &[2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub struct FanOut<T, R> {
    activity: Arc<dyn Activity<T, R>>,
    config: FanOutConfig,
    inputs: Option<Arc<[T]>>,
    generator: Option<InputGenerator<T>>,
}

impl<T, R> FanOut<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    /// Creates a fan-out that runs `activity` once per input.
    pub fn new(activity: impl Activity<T, R> + 'static) -> Self {
        Self::with_activity(Arc::new(activity))
    }

    /// Creates a fan-out from a shared activity.
    pub fn with_activity(activity: Arc<dyn Activity<T, R>>) -> Self {
        Self {
            activity,
            config: FanOutConfig::default(),
            inputs: None,
            generator: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: FanOutConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum number of outstanding units.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Uses a fixed, ordered collection of inputs.
    ///
    /// Passing an `Arc<[T]>` lets several fan-outs read the same collection.
    pub fn with_inputs(mut self, inputs: impl Into<Arc<[T]>>) -> Self {
        self.inputs = Some(inputs.into());
        self
    }

    /// Produces `count` inputs on demand by calling `generate(index)`.
    ///
    /// `generate` is called exactly once per index, in ascending order, as
    /// units are admitted.
    pub fn with_generator<F>(mut self, count: usize, generate: F) -> Self
    where
        F: FnMut(usize) -> T + Send + 'static,
    {
        self.generator = Some(InputGenerator::new(count, generate));
        self
    }

    /// Uses a prepared generator.
    pub fn with_input_generator(mut self, generator: InputGenerator<T>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Validates the fan-out and starts it on `ctx`'s runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(handle)` - The scheduler is running; poll or await the handle
    /// * `Err(FanOutError::Configuration)` - Nothing was launched
    pub fn start(self, ctx: &ExecutionContext) -> Result<AggregateHandle<R>, FanOutError> {
        self.config.validate()?;
        let source = InputSource::from_parts(self.inputs, self.generator)?;
        let total = source.size();

        debug!(
            "Starting '{}' over {} inputs (concurrency: {})",
            self.activity.name(),
            total,
            self.config.concurrency
        );

        let cancel = ctx.cancellation_token().child_token();
        let (status_tx, status_rx) = watch::channel(FanOutStatus::new(total));

        let launcher = UnitLauncher::new(self.activity, ctx.runtime().clone());
        let scheduler = AdmissionScheduler::new(
            source,
            launcher,
            self.config.concurrency,
            status_tx,
            cancel.clone(),
        );
        ctx.runtime().spawn(scheduler.run());

        Ok(AggregateHandle::new(status_rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::FnActivity;
    use crate::fanout::{BoxError, UnitFailure};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Observes how an activity is driven.
    #[derive(Default)]
    struct Tracker {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<u64>>,
    }

    struct InFlight(Arc<Tracker>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Tracker {
        fn enter(self: &Arc<Self>, input: u64) -> InFlight {
            self.calls.lock().unwrap().push(input);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            InFlight(Arc::clone(self))
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }

        fn histogram(&self) -> HashMap<u64, usize> {
            let mut counts = HashMap::new();
            for input in self.calls() {
                *counts.entry(input).or_insert(0) += 1;
            }
            counts
        }
    }

    /// Doubles its input after `delay_ms(input)` virtual milliseconds and
    /// fails the inputs `fails(input)` selects.
    struct TrackedActivity {
        tracker: Arc<Tracker>,
        delay_ms: fn(u64) -> u64,
        fails: fn(u64) -> bool,
    }

    impl TrackedActivity {
        fn new(tracker: &Arc<Tracker>, delay_ms: fn(u64) -> u64) -> Self {
            Self {
                tracker: Arc::clone(tracker),
                delay_ms,
                fails: |_| false,
            }
        }

        fn failing(mut self, fails: fn(u64) -> bool) -> Self {
            self.fails = fails;
            self
        }
    }

    #[async_trait]
    impl Activity<u64, u64> for TrackedActivity {
        fn name(&self) -> &str {
            "tracked"
        }

        async fn invoke(&self, input: u64) -> Result<u64, BoxError> {
            let _guard = self.tracker.enter(input);
            tokio::time::sleep(Duration::from_millis((self.delay_ms)(input))).await;
            if (self.fails)(input) {
                return Err(format!("input {} rejected", input).into());
            }
            Ok(input * 2)
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::current().unwrap()
    }

    fn doubling() -> FnActivity<impl Fn(u64) -> std::future::Ready<Result<u64, BoxError>>> {
        FnActivity::new("double", |x: u64| std::future::ready(Ok::<u64, BoxError>(x * 2)))
    }

    #[tokio::test]
    async fn test_fixed_inputs_all_succeed() {
        let handle = FanOut::new(doubling())
            .with_concurrency(2)
            .with_inputs(vec![1, 2, 3])
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.outputs(), &[2, 4, 6]);
        assert!(outcome.error().is_none());
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_failed_unit_gets_zero_placeholder() {
        let activity = FnActivity::new("boom-on-two", |x: u64| async move {
            if x == 2 {
                Err::<u64, BoxError>("boom".into())
            } else {
                Ok(x * 2)
            }
        });

        let handle = FanOut::new(activity)
            .with_concurrency(1)
            .with_inputs(vec![1, 2, 3])
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.timeline().peak_outstanding(), 1);

        let (outputs, error) = outcome.into_parts();
        assert_eq!(outputs, vec![2, 0, 6]);

        let error = error.expect("one unit should have failed");
        assert_eq!(error.failed_indices(), vec![1]);
        assert_eq!(error.to_string().matches("boom").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_offsets() {
        const CHUNK_SIZE: u64 = 10;
        let tracker = Arc::new(Tracker::default());
        let generated = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&generated);

        let handle = FanOut::new(TrackedActivity::new(&tracker, |offset| 50 - offset))
            .with_concurrency(2)
            .with_generator(5, move |i| {
                recorder.lock().unwrap().push(i);
                i as u64 * CHUNK_SIZE
            })
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();

        assert_eq!(*generated.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        let mut launched = tracker.calls();
        launched.sort_unstable();
        assert_eq!(launched, vec![0, 10, 20, 30, 40]);
        assert_eq!(outcome.outputs(), &[0, 20, 40, 60, 80]);
        assert!(tracker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected_before_launch() {
        let tracker = Arc::new(Tracker::default());
        let generated = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&generated);

        let result = FanOut::new(TrackedActivity::new(&tracker, |_| 0))
            .with_concurrency(0)
            .with_generator(3, move |i| {
                counter.fetch_add(1, Ordering::SeqCst);
                i as u64
            })
            .start(&ctx());

        assert!(matches!(result, Err(FanOutError::Configuration { .. })));
        tokio::task::yield_now().await;
        assert!(tracker.calls().is_empty());
        assert_eq!(generated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflicting_sources_rejected() {
        let result = FanOut::new(doubling())
            .with_inputs(vec![1])
            .with_generator(1, |i| i as u64)
            .start(&ctx());

        assert!(matches!(result, Err(FanOutError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_missing_source_rejected() {
        let result = FanOut::new(doubling()).start(&ctx());
        assert!(matches!(result, Err(FanOutError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_empty_inputs_launch_nothing() {
        let tracker = Arc::new(Tracker::default());
        let handle = FanOut::new(TrackedActivity::new(&tracker, |_| 0))
            .with_inputs(Vec::<u64>::new())
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.error().is_none());
        assert!(tracker.calls().is_empty());
        assert_eq!(handle.progress(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outstanding_never_exceeds_ceiling() {
        let tracker = Arc::new(Tracker::default());
        let inputs: Vec<u64> = (0..20).collect();

        let handle = FanOut::new(TrackedActivity::new(&tracker, |x| 5 + (x * 7) % 13))
            .with_concurrency(3)
            .with_inputs(inputs)
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();

        assert_eq!(tracker.peak.load(Ordering::SeqCst), 3);
        assert!(outcome.timeline().peak_outstanding() <= 3);
        assert_eq!(outcome.timeline().launch_count(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_above_count() {
        let tracker = Arc::new(Tracker::default());

        let handle = FanOut::new(TrackedActivity::new(&tracker, |_| 10))
            .with_concurrency(50)
            .with_inputs(vec![1u64, 2, 3, 4])
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.timeline().peak_outstanding(), 4);
        assert!(tracker.peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_index_launched_once() {
        let tracker = Arc::new(Tracker::default());
        let inputs: Vec<u64> = (0..25).collect();

        let handle = FanOut::new(TrackedActivity::new(&tracker, |x| x % 4))
            .with_concurrency(4)
            .with_inputs(inputs)
            .start(&ctx())
            .unwrap();
        handle.get().await.unwrap();

        let histogram = tracker.histogram();
        assert_eq!(histogram.len(), 25);
        assert!(histogram.values().all(|&count| count == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_resolution_keeps_input_order() {
        let tracker = Arc::new(Tracker::default());

        let handle = FanOut::new(TrackedActivity::new(&tracker, |x| (5 - x) * 10))
            .with_concurrency(5)
            .with_inputs(vec![0u64, 1, 2, 3, 4])
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.outputs(), &[0, 2, 4, 6, 8]);

        let resolved_order: Vec<usize> = outcome
            .timeline()
            .get_events()
            .iter()
            .filter(|e| e.event_type != crate::monitoring::EventType::Launched)
            .map(|e| e.index)
            .collect();
        assert_eq!(resolved_order, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_combined_in_index_order() {
        let tracker = Arc::new(Tracker::default());

        let handle = FanOut::new(
            TrackedActivity::new(&tracker, |x| 100 - x * 10).failing(|x| x % 2 == 1),
        )
        .with_concurrency(3)
        .with_inputs(vec![0u64, 1, 2, 3, 4, 5])
        .start(&ctx())
        .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.outputs(), &[0, 0, 4, 0, 8, 0]);

        let error = outcome.error().unwrap();
        assert_eq!(error.failed_indices(), vec![1, 3, 5]);
        let text = error.to_string();
        assert!(text.contains("input 1 rejected"));
        assert!(text.contains("input 3 rejected"));
        assert!(text.contains("input 5 rejected"));
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let activity = FnActivity::new("odd-fails", |x: u64| async move {
            if x % 2 == 1 {
                Err::<u64, BoxError>(format!("odd {}", x).into())
            } else {
                Ok(x * 2)
            }
        });

        let handle = FanOut::new(activity)
            .with_concurrency(2)
            .with_inputs(vec![1, 2, 3, 4])
            .start(&ctx())
            .unwrap();

        let first = handle.get().await.unwrap();
        let second = handle.get().await.unwrap();

        assert_eq!(first.outputs(), second.outputs());
        assert_eq!(
            first.error().map(|e| e.to_string()),
            second.error().map(|e| e.to_string())
        );
    }

    #[tokio::test]
    async fn test_panicking_unit_is_recorded() {
        let activity = FnActivity::new("panics-on-one", |x: u64| async move {
            if x == 1 {
                panic!("unit exploded");
            }
            Ok::<_, BoxError>(x)
        });

        let handle = FanOut::new(activity)
            .with_concurrency(2)
            .with_inputs(vec![0, 1, 2])
            .start(&ctx())
            .unwrap();

        let outcome = handle.get().await.unwrap();
        assert_eq!(outcome.outputs(), &[0, 0, 2]);

        let errors = outcome.error().unwrap().errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].failure, UnitFailure::Panicked(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_cancellation_aborts_outstanding() {
        let tracker = Arc::new(Tracker::default());
        let ctx = ctx();

        // Input 0 finishes at once; the rest never finish on their own.
        let never_after_first = |x| if x == 0 { 0 } else { 3_600_000 };
        let handle = FanOut::new(TrackedActivity::new(&tracker, never_after_first))
            .with_concurrency(2)
            .with_inputs(vec![0u64, 1, 2, 3])
            .start(&ctx)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.progress(), (1, 4));
        assert!(!handle.is_ready());

        ctx.cancel();

        assert!(matches!(handle.get().await, Err(FanOutError::Cancelled)));
        assert!(handle.is_finished());
        assert!(!handle.is_ready());
        assert_eq!(handle.progress(), (1, 4));
        assert_eq!(tracker.in_flight.load(Ordering::SeqCst), 0);
        // 0 and 1 at ramp-up, 2 replacing 0.
        assert_eq!(tracker.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cancel_leaves_context_alive() {
        let tracker = Arc::new(Tracker::default());
        let ctx = ctx();

        let handle = FanOut::new(TrackedActivity::new(&tracker, |_| 3_600_000))
            .with_inputs(vec![1u64, 2])
            .start(&ctx)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.cancel();

        assert!(matches!(handle.get().await, Err(FanOutError::Cancelled)));
        assert!(!ctx.is_cancelled());
        assert_eq!(tracker.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_launches_nothing() {
        let tracker = Arc::new(Tracker::default());
        let ctx = ctx();
        ctx.cancel();

        let handle = FanOut::new(TrackedActivity::new(&tracker, |_| 0))
            .with_inputs(vec![1u64, 2, 3])
            .start(&ctx)
            .unwrap();

        assert!(matches!(handle.get().await, Err(FanOutError::Cancelled)));
        assert!(tracker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shared_inputs_across_fan_outs() {
        let inputs: Arc<[u64]> = Arc::from(vec![1, 2, 3]);
        let ctx = ctx();

        let first = FanOut::new(doubling())
            .with_inputs(Arc::clone(&inputs))
            .start(&ctx)
            .unwrap();
        let second = FanOut::new(doubling())
            .with_concurrency(1)
            .with_inputs(Arc::clone(&inputs))
            .start(&ctx)
            .unwrap();

        let (a, b) = tokio::join!(first.get(), second.get());
        assert_eq!(a.unwrap().outputs(), b.unwrap().outputs());
    }

    #[tokio::test]
    async fn test_with_config() {
        let handle = FanOut::new(doubling())
            .with_config(FanOutConfig::new(1))
            .with_inputs(vec![5])
            .start(&ctx())
            .unwrap();

        assert_eq!(handle.get().await.unwrap().outputs(), &[10]);
    }

    #[tokio::test]
    async fn test_prepared_input_generator() {
        let generator = InputGenerator::new(3, |i| (i as u64 + 1) * 100);
        assert_eq!(generator.count(), 3);

        let handle = FanOut::new(doubling())
            .with_input_generator(generator)
            .start(&ctx())
            .unwrap();

        assert_eq!(handle.total(), 3);
        assert_eq!(handle.get().await.unwrap().outputs(), &[200, 400, 600]);
    }
}
