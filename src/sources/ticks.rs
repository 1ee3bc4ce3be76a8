//! Process CPU-time tick counters.

use super::SourceError;
use log::debug;

/// One reading of the scheduler's tick counters.
///
/// `total` is the elapsed real time in ticks; `system` and `user` are the
/// ticks the process spent in kernel and user mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSnapshot {
    pub total: u64,
    pub system: u64,
    pub user: u64,
}

impl TickSnapshot {
    pub fn new(total: u64, system: u64, user: u64) -> Self {
        Self { total, system, user }
    }
}

/// Something that can report the current [`TickSnapshot`].
pub trait TickSource: Send {
    /// Reads the counters. Returns an all-zero snapshot if they cannot be
    /// read.
    fn read_ticks(&mut self) -> TickSnapshot;
}

/// Reads the calling process's counters with `times(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTimes;

impl ProcessTimes {
    #[cfg(unix)]
    fn try_read(&self) -> Result<TickSnapshot, SourceError> {
        // SAFETY: `tms` is a plain C struct that `times` fully overwrites.
        let mut tms: libc::tms = unsafe { std::mem::zeroed() };
        let now = unsafe { libc::times(&mut tms) };
        if now == -1i64 as libc::clock_t {
            return Err(SourceError::Syscall { call: "times" });
        }
        Ok(TickSnapshot {
            total: now as u64,
            system: tms.tms_stime as u64,
            user: tms.tms_utime as u64,
        })
    }

    #[cfg(not(unix))]
    fn try_read(&self) -> Result<TickSnapshot, SourceError> {
        Err(SourceError::Unsupported("process tick counters"))
    }
}

impl TickSource for ProcessTimes {
    fn read_ticks(&mut self) -> TickSnapshot {
        self.try_read().unwrap_or_else(|e| {
            debug!("Tick counters unavailable: {}", e);
            TickSnapshot::default()
        })
    }
}
