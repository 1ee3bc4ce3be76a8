//! # External Data Sources
//!
//! Readers for the raw OS data the aggregators consume: process tick
//! counters, resident memory and thread count, CPU temperature, and CPU
//! identification.
//!
//! Every reader absorbs its own failures. Internally they return
//! [`SourceError`], but the public trait methods always hand back a value,
//! using `0`, `-1.0` or an empty string to mean "unknown". Nothing read
//! here can make a statistics update fail.

use thiserror::Error;

pub mod cpu_info;
pub mod memory;
pub mod sensors;
pub mod ticks;

pub use cpu_info::{CpuInfoSource, HostCpuInfo, UnsupportedCpuInfo};
pub use memory::{MemorySource, MemoryUsage, ProcSelfStat, SysinfoMemory};
pub use sensors::{HwmonTemperature, TemperatureSource, UnsupportedTemperature};
pub use ticks::{ProcessTimes, TickSnapshot, TickSource};

/// Temperature reported when no sensor is available.
pub const TEMPERATURE_UNAVAILABLE: f64 = -1.0;

/// Failures inside a data source. Never crosses the source boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {what}: {detail}")]
    Parse { what: &'static str, detail: String },
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("system call {call} failed")]
    Syscall { call: &'static str },
}

/// Number of logical processors, never less than one.
pub fn processor_count() -> usize {
    num_cpus::get().max(1)
}
