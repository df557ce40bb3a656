//! Execution Timeline
//!
//! Records when each unit of a fan-out was launched and when it resolved,
//! for concurrency reports and Gantt charts.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Unit was launched
    Launched,
    /// Unit resolved with an output
    Completed,
    /// Unit resolved with an error
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Ordinal index of the unit
    pub index: usize,
    /// Type of event
    pub event_type: EventType,
    /// When the event occurred
    pub timestamp: Instant,
}

/// Tracks the launch/resolve history of one fan-out run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a unit.
    pub fn add_event(&mut self, index: usize, event_type: EventType) {
        self.events.push(TimelineEvent {
            index,
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Returns all recorded events in the order they were recorded.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Number of launch events recorded.
    pub fn launch_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == EventType::Launched)
            .count()
    }

    /// Highest number of units outstanding at any point, replaying events
    /// in recorded order.
    pub fn peak_outstanding(&self) -> usize {
        let mut outstanding = 0usize;
        let mut peak = 0usize;

        for event in &self.events {
            match event.event_type {
                EventType::Launched => {
                    outstanding += 1;
                    peak = peak.max(outstanding);
                }
                EventType::Completed | EventType::Failed => {
                    outstanding = outstanding.saturating_sub(1);
                }
            }
        }

        peak
    }

    /// Returns unit durations in milliseconds, keyed by index.
    pub fn get_durations(&self) -> BTreeMap<usize, u128> {
        let mut starts: BTreeMap<usize, u128> = BTreeMap::new();
        let mut durations: BTreeMap<usize, u128> = BTreeMap::new();

        for event in &self.events {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Launched => {
                    starts.insert(event.index, elapsed);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.get(&event.index) {
                        durations.insert(event.index, elapsed - start);
                    }
                }
            }
        }

        durations
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each unit is shown as a bar indicating when it was outstanding
    /// relative to the total run time. Failed units are drawn with `x`.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = Instant::now().duration_since(self.start_time).as_millis();

        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        // index -> (start, end, failed)
        let mut unit_times: BTreeMap<usize, (u128, u128, bool)> = BTreeMap::new();

        for event in &self.events {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Launched => {
                    unit_times.entry(event.index).or_insert((elapsed, 0, false)).0 = elapsed;
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(times) = unit_times.get_mut(&event.index) {
                        times.1 = elapsed;
                        times.2 = event.event_type == EventType::Failed;
                    }
                }
            }
        }

        for (index, (start, end, failed)) in unit_times {
            if end < start {
                continue;
            }
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;
            let mark = if failed { "x" } else { "#" };

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&mark.repeat(width));

            output.push_str(&format!(
                "unit {:>6} |{}| ({} ms)\n",
                index,
                bar,
                end - start
            ));
        }

        output.push_str(&format!(
            "\nPeak outstanding: {}\nTotal: {} ms\n",
            self.peak_outstanding(),
            total_time
        ));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}
