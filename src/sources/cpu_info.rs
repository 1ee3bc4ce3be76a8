//! CPU brand string and current frequency.

use super::SourceError;
use log::debug;
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

const CPUFREQ_ROOT: &str = "/sys/devices/system/cpu/cpufreq";

/// Informational CPU identification. Unsupported platforms report an empty
/// brand and a frequency of zero.
pub trait CpuInfoSource: Send {
    fn brand(&self) -> String;

    /// Current frequency in hertz of the given cpufreq policy (usually one
    /// per core or cluster).
    fn frequency_hz(&mut self, policy: usize) -> f64;
}

pub fn cpu_info_source(enabled: bool) -> Box<dyn CpuInfoSource> {
    if enabled {
        Box::new(HostCpuInfo::new())
    } else {
        Box::new(UnsupportedCpuInfo)
    }
}

/// Reads cpufreq from sysfs where present and falls back to `sysinfo`.
pub struct HostCpuInfo {
    system: System,
    brand: String,
    cpufreq_root: PathBuf,
}

impl HostCpuInfo {
    pub fn new() -> Self {
        Self::with_cpufreq_root(CPUFREQ_ROOT)
    }

    pub fn with_cpufreq_root(root: impl Into<PathBuf>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_frequency()),
        );
        let brand = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();
        Self {
            system,
            brand,
            cpufreq_root: root.into(),
        }
    }

    fn sysfs_frequency(&self, policy: usize) -> Result<f64, SourceError> {
        let path = self
            .cpufreq_root
            .join(format!("policy{policy}"))
            .join("scaling_cur_freq");
        read_khz(&path).map(|khz| khz * 1000.0)
    }

    fn sysinfo_frequency(&mut self, policy: usize) -> f64 {
        self.system
            .refresh_cpu_specifics(CpuRefreshKind::new().with_frequency());
        self.system
            .cpus()
            .get(policy)
            .map(|cpu| cpu.frequency() as f64 * 1_000_000.0)
            .unwrap_or(0.0)
    }
}

impl Default for HostCpuInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuInfoSource for HostCpuInfo {
    fn brand(&self) -> String {
        self.brand.clone()
    }

    fn frequency_hz(&mut self, policy: usize) -> f64 {
        match self.sysfs_frequency(policy) {
            Ok(hz) => hz,
            Err(e) => {
                debug!("cpufreq unavailable ({}); asking sysinfo.", e);
                self.sysinfo_frequency(policy)
            }
        }
    }
}

fn read_khz(path: &Path) -> Result<f64, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    raw.trim().parse::<f64>().map_err(|_| SourceError::Parse {
        what: "scaling_cur_freq",
        detail: raw.trim().to_string(),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCpuInfo;

impl CpuInfoSource for UnsupportedCpuInfo {
    fn brand(&self) -> String {
        String::new()
    }

    fn frequency_hz(&mut self, _policy: usize) -> f64 {
        0.0
    }
}
