//! Aggregation of begin/end trace notifications into per-thread task
//! status and per-label timing statistics.
//!
//! Instrumented code emits a [`TraceNotification`] when a labelled task
//! starts and another, with the same label, when it ends. Tasks nest: each
//! thread keeps a stack of open labels, and a notification whose label
//! matches the top of the stack closes it. An empty label is a
//! synchronization token that discards the thread's open tasks.
//!
//! For every batch the tracker emits [`ProfilingEvent`]s to a
//! [`ProfilingSink`]: the task now running at each thread/depth (or idle),
//! and the duration of each completed task.

use crate::clock::EpochNanos;
use crate::task_stats::RunningTimeStats;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{error, trace};

/// One begin or end marker from instrumented code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNotification {
    pub thread_id: u64,
    pub label: String,
    pub ns_since_epoch: u64,
}

impl TraceNotification {
    pub fn new(thread_id: u64, label: impl Into<String>, ns_since_epoch: u64) -> Self {
        Self {
            thread_id,
            label: label.into(),
            ns_since_epoch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProfilingEvent {
    /// The task running on `thread`'s `depth` changed at `stamp_ns`. `None`
    /// means nothing runs there any more.
    Status {
        thread: usize,
        depth: usize,
        stamp_ns: u64,
        label: Option<String>,
    },
    /// A task completed.
    TaskDuration { label: String, seconds: f64 },
}

/// Receives events produced while processing a batch.
pub trait ProfilingSink {
    fn record(&mut self, event: ProfilingEvent);
}

impl ProfilingSink for Vec<ProfilingEvent> {
    fn record(&mut self, event: ProfilingEvent) {
        self.push(event);
    }
}

/// Publishes completed task durations through the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl ProfilingSink for MetricsSink {
    fn record(&mut self, event: ProfilingEvent) {
        match event {
            ProfilingEvent::TaskDuration { label, seconds } => {
                metrics::histogram!("task_duration_seconds", "task" => label).record(seconds);
            }
            ProfilingEvent::Status {
                thread,
                depth,
                label,
                ..
            } => {
                trace!(thread, depth, label = ?label, "Task status changed.");
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfilingError {
    #[error("label '{label}' is already open on thread {thread}")]
    DuplicateLabel { label: String, thread: usize },
}

#[derive(Debug, Default)]
struct ThreadState {
    stack: Vec<usize>,
    open: HashSet<usize>,
}

/// Depths whose task ended during a batch, with the end stamp, in the order
/// threads and depths first ended.
#[derive(Debug, Default)]
struct PendingIdle {
    threads: Vec<(usize, Vec<(usize, u64)>)>,
}

impl PendingIdle {
    fn depths_mut(&mut self, thread: usize) -> Option<&mut Vec<(usize, u64)>> {
        self.threads
            .iter_mut()
            .find(|(t, _)| *t == thread)
            .map(|(_, depths)| depths)
    }

    fn clear_thread(&mut self, thread: usize) {
        if let Some(depths) = self.depths_mut(thread) {
            depths.clear();
        }
    }

    fn take(&mut self, thread: usize, depth: usize) -> Option<u64> {
        let depths = self.depths_mut(thread)?;
        let pos = depths.iter().position(|(d, _)| *d == depth)?;
        Some(depths.remove(pos).1)
    }

    fn mark(&mut self, thread: usize, depth: usize, stamp_ns: u64) {
        let index = match self.threads.iter().position(|(t, _)| *t == thread) {
            Some(i) => i,
            None => {
                self.threads.push((thread, Vec::new()));
                self.threads.len() - 1
            }
        };
        let depths = &mut self.threads[index].1;
        match depths.iter_mut().find(|(d, _)| *d == depth) {
            Some(slot) => slot.1 = stamp_ns,
            None => depths.push((depth, stamp_ns)),
        }
    }
}

#[derive(Debug)]
struct LabelState {
    name: String,
    started_ns: u64,
    stats: RunningTimeStats<EpochNanos>,
}

/// Tracks open tasks per thread and timing statistics per label.
#[derive(Debug, Default)]
pub struct ProfilingTracker {
    thread_indices: HashMap<u64, usize>,
    threads: Vec<ThreadState>,
    label_indices: HashMap<String, usize>,
    labels: Vec<LabelState>,
}

impl ProfilingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one batch in order.
    ///
    /// A start for a label that is already open on the same thread aborts
    /// the batch with [`ProfilingError::DuplicateLabel`]; events emitted
    /// before it stay emitted.
    pub fn process(
        &mut self,
        batch: &[TraceNotification],
        sink: &mut dyn ProfilingSink,
    ) -> Result<(), ProfilingError> {
        // Resolved to idle at the end unless a new task starts there.
        let mut to_end = PendingIdle::default();

        for note in batch {
            let thread = self.thread_index(note.thread_id);

            if note.label.is_empty() {
                let state = &mut self.threads[thread];
                state.stack.clear();
                state.open.clear();
                to_end.clear_thread(thread);
                continue;
            }

            let label = self.label_index(&note.label);
            let state = &mut self.threads[thread];

            if state.stack.last() != Some(&label) {
                if !state.open.insert(label) {
                    error!(
                        label = %note.label,
                        thread,
                        "Received duplicate label; discarding the rest of the batch."
                    );
                    return Err(ProfilingError::DuplicateLabel {
                        label: note.label.clone(),
                        thread,
                    });
                }
                state.stack.push(label);
                let depth = state.stack.len() - 1;

                if let Some(ended_ns) = to_end.take(thread, depth) {
                    if ended_ns != note.ns_since_epoch {
                        sink.record(ProfilingEvent::Status {
                            thread,
                            depth,
                            stamp_ns: ended_ns,
                            label: None,
                        });
                    }
                }

                self.labels[label].started_ns = note.ns_since_epoch;
                sink.record(ProfilingEvent::Status {
                    thread,
                    depth,
                    stamp_ns: note.ns_since_epoch,
                    label: Some(note.label.clone()),
                });
            } else {
                state.stack.pop();
                state.open.remove(&label);
                let depth = state.stack.len();
                to_end.mark(thread, depth, note.ns_since_epoch);

                let entry = &mut self.labels[label];
                let seconds = entry.stats.add_sample(entry.started_ns, note.ns_since_epoch);
                sink.record(ProfilingEvent::TaskDuration {
                    label: note.label.clone(),
                    seconds,
                });
            }
        }

        for (thread, depths) in to_end.threads {
            for (depth, stamp_ns) in depths {
                sink.record(ProfilingEvent::Status {
                    thread,
                    depth,
                    stamp_ns,
                    label: None,
                });
            }
        }
        Ok(())
    }

    /// Timing statistics for a label, if it has ever been seen.
    pub fn stats(&self, label: &str) -> Option<&RunningTimeStats<EpochNanos>> {
        self.label_indices.get(label).map(|&i| &self.labels[i].stats)
    }

    /// Labels in first-seen order with their statistics.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &RunningTimeStats<EpochNanos>)> {
        self.labels.iter().map(|l| (l.name.as_str(), &l.stats))
    }

    /// Number of tasks currently open on the given OS thread.
    pub fn open_depth(&self, thread_id: u64) -> usize {
        self.thread_indices
            .get(&thread_id)
            .map(|&i| self.threads[i].stack.len())
            .unwrap_or(0)
    }

    fn thread_index(&mut self, thread_id: u64) -> usize {
        let next = self.threads.len();
        let index = *self.thread_indices.entry(thread_id).or_insert(next);
        if index == next {
            self.threads.push(ThreadState::default());
        }
        index
    }

    fn label_index(&mut self, label: &str) -> usize {
        if let Some(&i) = self.label_indices.get(label) {
            return i;
        }
        let index = self.labels.len();
        self.label_indices.insert(label.to_string(), index);
        self.labels.push(LabelState {
            name: label.to_string(),
            started_ns: 0,
            stats: RunningTimeStats::new(),
        });
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    fn status(thread: usize, depth: usize, stamp_ns: u64, label: Option<&str>) -> ProfilingEvent {
        ProfilingEvent::Status {
            thread,
            depth,
            stamp_ns,
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn nested_tasks_report_status_and_durations() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(7, "loop", 0),
            TraceNotification::new(7, "plan", 10 * MS),
            TraceNotification::new(7, "plan", 30 * MS),
            TraceNotification::new(7, "loop", 50 * MS),
        ];
        tracker.process(&batch, &mut events).unwrap();

        assert_eq!(
            events,
            vec![
                status(0, 0, 0, Some("loop")),
                status(0, 1, 10 * MS, Some("plan")),
                ProfilingEvent::TaskDuration {
                    label: "plan".into(),
                    seconds: 0.02
                },
                ProfilingEvent::TaskDuration {
                    label: "loop".into(),
                    seconds: 0.05
                },
                status(0, 1, 30 * MS, None),
                status(0, 0, 50 * MS, None),
            ]
        );
        assert_eq!(tracker.open_depth(7), 0);
        assert_eq!(tracker.stats("plan").unwrap().num_samples(), 1);
    }

    #[test]
    fn trailing_idle_markers_follow_end_order() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(2, "outer", 0),
            TraceNotification::new(1, "work", 0),
            TraceNotification::new(2, "inner", 1),
            TraceNotification::new(1, "work", 2),
            TraceNotification::new(2, "inner", 3),
            TraceNotification::new(2, "outer", 4),
        ];
        tracker.process(&batch, &mut events).unwrap();

        let idle: Vec<_> = events
            .into_iter()
            .filter(|e| matches!(e, ProfilingEvent::Status { label: None, .. }))
            .collect();
        assert_eq!(
            idle,
            vec![
                status(1, 0, 2, None),
                status(0, 1, 3, None),
                status(0, 0, 4, None),
            ]
        );
    }

    #[test]
    fn back_to_back_task_suppresses_idle_marker() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(1, "a", 0),
            TraceNotification::new(1, "a", 5 * MS),
            TraceNotification::new(1, "b", 5 * MS),
        ];
        tracker.process(&batch, &mut events).unwrap();

        assert_eq!(events.last(), Some(&status(0, 0, 5 * MS, Some("b"))));
        assert!(!events.contains(&status(0, 0, 5 * MS, None)));
    }

    #[test]
    fn gap_between_tasks_emits_idle_first() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(1, "a", 0),
            TraceNotification::new(1, "a", 5 * MS),
            TraceNotification::new(1, "b", 8 * MS),
        ];
        tracker.process(&batch, &mut events).unwrap();

        let tail = &events[events.len() - 2..];
        assert_eq!(tail, &[status(0, 0, 5 * MS, None), status(0, 0, 8 * MS, Some("b"))]);
    }

    #[test]
    fn duplicate_open_label_aborts_batch() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(1, "a", 0),
            TraceNotification::new(1, "b", 1),
            TraceNotification::new(1, "a", 2),
            TraceNotification::new(1, "b", 3),
        ];
        let err = tracker.process(&batch, &mut events).unwrap_err();

        assert_eq!(
            err,
            ProfilingError::DuplicateLabel {
                label: "a".into(),
                thread: 0
            }
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn empty_label_resets_thread() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(3, "a", 0),
            TraceNotification::new(3, "b", 1),
            TraceNotification::new(3, "", 2),
            TraceNotification::new(3, "a", 3),
        ];
        tracker.process(&batch, &mut events).unwrap();

        assert_eq!(tracker.open_depth(3), 1);
        assert_eq!(events.last(), Some(&status(0, 0, 3, Some("a"))));
    }

    #[test]
    fn threads_are_indexed_in_first_seen_order() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        let batch = [
            TraceNotification::new(900, "x", 0),
            TraceNotification::new(12, "y", 0),
        ];
        tracker.process(&batch, &mut events).unwrap();

        assert_eq!(events, vec![status(0, 0, 0, Some("x")), status(1, 0, 0, Some("y"))]);
    }

    #[test]
    fn repeated_task_accumulates_period() {
        let mut tracker = ProfilingTracker::new();
        let mut events = Vec::new();
        for i in 0..4u64 {
            let start = i * 100 * MS;
            let batch = [
                TraceNotification::new(1, "tick", start),
                TraceNotification::new(1, "tick", start + 10 * MS),
            ];
            tracker.process(&batch, &mut events).unwrap();
        }

        let stats = tracker.stats("tick").unwrap();
        assert_eq!(stats.num_samples(), 4);
        assert!((stats.avg_time() - 0.01).abs() < 1e-12);
        assert!((stats.avg_period() - 0.1).abs() < 1e-12);
    }
}
