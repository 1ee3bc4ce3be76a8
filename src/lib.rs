//! procwatch - lightweight runtime telemetry for a process and its host
//!
//! The core is two incremental aggregators with constant memory and update
//! cost: [`cpu::CpuUtilizationTracker`], which turns OS tick counters into
//! a CPU utilization series, and [`task_stats::RunningTimeStats`], which
//! keeps running duration and period statistics for a recurring task.
//! Everything else reads OS data for them or reports what they compute.

pub mod average;
pub mod clock;
pub mod cpu;
pub mod profiling;
pub mod process_stats;
pub mod sources;
pub mod task_stats;

pub mod cli;
pub mod config;
pub mod internal_metrics;
pub mod task_manager;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the aggregators for convenience
pub use cpu::CpuUtilizationTracker;
pub use process_stats::{ProcessStats, StatsSnapshot};
pub use task_stats::RunningTimeStats;
