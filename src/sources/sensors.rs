//! CPU temperature readings.
//!
//! Hardware sensors are enumerated once per process. The enumeration lives
//! in a process-wide [`SensorContext`] that is built on the first read and
//! torn down by [`shutdown`], which the owning application calls once on
//! exit. Reads after shutdown report [`TEMPERATURE_UNAVAILABLE`].

use super::TEMPERATURE_UNAVAILABLE;
use log::{debug, info};
use std::sync::{Mutex, MutexGuard};
use sysinfo::Components;

/// Label fragments that identify a CPU package or core sensor.
const CPU_SENSOR_HINTS: &[&str] = &["cpu", "package", "tctl", "tdie", "coretemp", "k10temp", "core 0"];

pub trait TemperatureSource: Send {
    fn is_supported(&self) -> bool;

    /// Degrees Celsius, or [`TEMPERATURE_UNAVAILABLE`].
    fn read_celsius(&mut self) -> f64;
}

/// Picks the hardware-backed source when enabled and a sensor exists.
pub fn temperature_source(enabled: bool) -> Box<dyn TemperatureSource> {
    if enabled {
        if let Some(source) = HwmonTemperature::detect() {
            return Box::new(source);
        }
        info!("No CPU temperature sensor found; temperature will be reported as unavailable.");
    }
    Box::new(UnsupportedTemperature)
}

/// Reads the CPU sensor through the process-wide context.
#[derive(Debug, Clone, Copy)]
pub struct HwmonTemperature {
    _private: (),
}

impl HwmonTemperature {
    /// Returns a source if the context has (or can find) a CPU sensor.
    pub fn detect() -> Option<Self> {
        let mut state = lock_state();
        state.context().filter(|ctx| ctx.has_sensor())?;
        Some(Self { _private: () })
    }
}

impl TemperatureSource for HwmonTemperature {
    fn is_supported(&self) -> bool {
        true
    }

    fn read_celsius(&mut self) -> f64 {
        read_cpu_temp()
    }
}

/// Used where no sensor exists or temperature reading is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTemperature;

impl TemperatureSource for UnsupportedTemperature {
    fn is_supported(&self) -> bool {
        false
    }

    fn read_celsius(&mut self) -> f64 {
        TEMPERATURE_UNAVAILABLE
    }
}

/// The enumerated sensors and the one chosen as the CPU sensor.
pub struct SensorContext {
    components: Components,
    cpu_index: Option<usize>,
}

impl SensorContext {
    /// Enumerates hardware sensors.
    pub fn init() -> Self {
        let components = Components::new_with_refreshed_list();
        let labels: Vec<&str> = components.list().iter().map(|c| c.label()).collect();
        let cpu_index = pick_cpu_sensor(&labels);
        match cpu_index {
            Some(i) => debug!("Using sensor '{}' for CPU temperature.", labels[i]),
            None => debug!("No hardware sensors detected."),
        }
        Self {
            components,
            cpu_index,
        }
    }

    pub fn has_sensor(&self) -> bool {
        self.cpu_index.is_some()
    }

    pub fn read(&mut self) -> f64 {
        let Some(component) = self
            .cpu_index
            .and_then(|i| self.components.list_mut().get_mut(i))
        else {
            return TEMPERATURE_UNAVAILABLE;
        };
        component.refresh();
        let celsius = component.temperature() as f64;
        if celsius.is_finite() {
            celsius
        } else {
            TEMPERATURE_UNAVAILABLE
        }
    }
}

/// Prefers a sensor whose label looks CPU-related, else the first one.
fn pick_cpu_sensor(labels: &[&str]) -> Option<usize> {
    labels
        .iter()
        .position(|label| {
            let label = label.to_lowercase();
            CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint))
        })
        .or(if labels.is_empty() { None } else { Some(0) })
}

enum SensorState {
    Uninitialized,
    Ready(SensorContext),
    ShutDown,
}

impl SensorState {
    fn context(&mut self) -> Option<&mut SensorContext> {
        if matches!(self, SensorState::Uninitialized) {
            *self = SensorState::Ready(SensorContext::init());
        }
        match self {
            SensorState::Ready(ctx) => Some(ctx),
            _ => None,
        }
    }
}

static SENSOR_STATE: Mutex<SensorState> = Mutex::new(SensorState::Uninitialized);

fn lock_state() -> MutexGuard<'static, SensorState> {
    // A panic while holding the lock leaves the state itself intact.
    SENSOR_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reads the CPU temperature, enumerating sensors on first use.
pub fn read_cpu_temp() -> f64 {
    lock_state()
        .context()
        .map(SensorContext::read)
        .unwrap_or(TEMPERATURE_UNAVAILABLE)
}

/// Releases the sensor context. Returns `true` only for the call that
/// actually tore it down; later calls, and calls before any read, are
/// no-ops apart from preventing further initialization.
pub fn shutdown() -> bool {
    let previous = std::mem::replace(&mut *lock_state(), SensorState::ShutDown);
    match previous {
        SensorState::Ready(ctx) => {
            drop(ctx);
            debug!("Sensor context released.");
            true
        }
        SensorState::Uninitialized | SensorState::ShutDown => false,
    }
}

#[cfg(test)]
fn reset_for_test() {
    *lock_state() = SensorState::Uninitialized;
}
