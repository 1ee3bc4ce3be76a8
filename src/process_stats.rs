//! Per-process snapshot combining CPU, memory and temperature readings.

use crate::cpu::CpuUtilizationTracker;
use crate::sources::{
    memory, sensors, MemorySource, ProcessTimes, TemperatureSource, TickSource,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reportable state of the process at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    /// `-1.0` when no sensor is available.
    pub cpu_temp: f32,
    pub mem_usage_mb: f32,
    pub num_threads: u32,
}

/// Owns a [`CpuUtilizationTracker`] and the readers needed to turn it into
/// a [`StatsSnapshot`].
pub struct ProcessStats<S: TickSource = ProcessTimes> {
    cpu: CpuUtilizationTracker<S>,
    memory: Box<dyn MemorySource>,
    temperature: Box<dyn TemperatureSource>,
}

impl ProcessStats<ProcessTimes> {
    /// Monitors the current process with the platform's default readers.
    pub fn new(read_temperature: bool) -> Self {
        Self::from_parts(
            CpuUtilizationTracker::new(),
            memory::default_source(),
            sensors::temperature_source(read_temperature),
        )
    }
}

impl<S: TickSource> ProcessStats<S> {
    pub fn from_parts(
        cpu: CpuUtilizationTracker<S>,
        memory: Box<dyn MemorySource>,
        temperature: Box<dyn TemperatureSource>,
    ) -> Self {
        Self {
            cpu,
            memory,
            temperature,
        }
    }

    /// Advances the CPU tracker by one sample.
    pub fn update(&mut self) {
        self.cpu.update();
    }

    pub fn cpu(&self) -> &CpuUtilizationTracker<S> {
        &self.cpu
    }

    pub fn has_temperature(&self) -> bool {
        self.temperature.is_supported()
    }

    /// Reads memory and temperature and pairs them with the latest CPU
    /// sample. Does not advance the CPU tracker.
    pub fn snapshot(&mut self) -> StatsSnapshot {
        let usage = self.memory.read_usage();
        StatsSnapshot {
            timestamp: Utc::now(),
            cpu_percent: self.cpu.curr_cpu_percent() as f32,
            cpu_temp: self.temperature.read_celsius() as f32,
            mem_usage_mb: usage.resident_mb as f32,
            num_threads: usage.threads,
        }
    }
}
