//! Resident memory and thread count of the current process.

use super::SourceError;
use log::debug;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, System};

const PROC_SELF_STAT: &str = "/proc/self/stat";

/// Resident set size and thread count at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryUsage {
    /// Resident set size in megabytes (1000 kB).
    pub resident_mb: f64,
    pub threads: u32,
}

pub trait MemorySource: Send {
    /// Reads current usage, or `MemoryUsage::default()` when unknown.
    fn read_usage(&mut self) -> MemoryUsage;
}

/// Picks the cheapest reader the platform offers.
pub fn default_source() -> Box<dyn MemorySource> {
    if Path::new(PROC_SELF_STAT).exists() {
        Box::new(ProcSelfStat::new())
    } else {
        Box::new(SysinfoMemory::new())
    }
}

/// Parses `/proc/<pid>/stat`.
#[derive(Debug, Clone)]
pub struct ProcSelfStat {
    path: PathBuf,
    page_size_kb: f64,
}

impl ProcSelfStat {
    pub fn new() -> Self {
        Self::with_path(PROC_SELF_STAT)
    }

    /// Reads from `path` instead of the current process's stat file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_size_kb: page_size_bytes() as f64 / 1024.0,
        }
    }

    fn try_read(&self) -> Result<MemoryUsage, SourceError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| SourceError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        let fields = parse_stat_fields(&contents)?;
        Ok(MemoryUsage {
            resident_mb: fields.rss_pages as f64 * self.page_size_kb / 1000.0,
            threads: fields.num_threads,
        })
    }
}

impl Default for ProcSelfStat {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for ProcSelfStat {
    fn read_usage(&mut self) -> MemoryUsage {
        self.try_read().unwrap_or_else(|e| {
            debug!("Memory usage unavailable: {}", e);
            MemoryUsage::default()
        })
    }
}

#[derive(Debug, PartialEq)]
struct StatFields {
    num_threads: u32,
    rss_pages: u64,
}

/// Extracts `num_threads` (field 20) and `rss` (field 24) from a stat line.
///
/// The command name (field 2) is parenthesised and may itself contain
/// spaces or parentheses, so counting starts after the last `)`.
fn parse_stat_fields(line: &str) -> Result<StatFields, SourceError> {
    let after_comm = line
        .rfind(')')
        .map(|i| &line[i + 1..])
        .ok_or_else(|| SourceError::Parse {
            what: "stat line",
            detail: "missing command name".to_string(),
        })?;
    // Index 0 here is field 3 (state).
    let rest: Vec<&str> = after_comm.split_whitespace().collect();
    let truncated = || SourceError::Parse {
        what: "stat line",
        detail: format!("only {} fields", rest.len() + 2),
    };
    let parse_err = |name: &'static str, raw: &str| SourceError::Parse {
        what: name,
        detail: raw.to_string(),
    };

    let threads_raw = *rest.get(20 - 3).ok_or_else(truncated)?;
    let rss_raw = *rest.get(24 - 3).ok_or_else(truncated)?;
    let num_threads = threads_raw
        .parse::<u32>()
        .map_err(|_| parse_err("num_threads", threads_raw))?;
    // rss can be reported negative for kernel threads; treat as zero.
    let rss_pages = rss_raw
        .parse::<i64>()
        .map_err(|_| parse_err("rss", rss_raw))?
        .max(0) as u64;

    Ok(StatFields {
        num_threads,
        rss_pages,
    })
}

#[cfg(unix)]
fn page_size_bytes() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn page_size_bytes() -> u64 {
    4096
}

/// Cross-platform reader backed by `sysinfo`.
pub struct SysinfoMemory {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoMemory {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!("Failed to get current PID: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SysinfoMemory {
    fn read_usage(&mut self) -> MemoryUsage {
        let Some(pid) = self.pid else {
            return MemoryUsage::default();
        };
        if !self.system.refresh_process(pid) {
            debug!("Process {} not found while reading memory usage.", pid);
            return MemoryUsage::default();
        }
        match self.system.process(pid) {
            Some(process) => MemoryUsage {
                resident_mb: process.memory() as f64 / 1_000_000.0,
                threads: process.tasks().map(|t| t.len() as u32).unwrap_or(0),
            },
            None => MemoryUsage::default(),
        }
    }
}
