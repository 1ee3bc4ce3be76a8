//! Deterministic stand-ins for clocks and OS readers.

use crate::clock::Clock;
use crate::sources::{MemorySource, MemoryUsage, TickSnapshot, TickSource};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A clock whose time points are plain seconds.
///
/// `now()` always returns zero; tests construct time points directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeClock;

impl Clock for FakeClock {
    type TimePoint = f64;

    fn epoch() -> f64 {
        0.0
    }

    fn now() -> f64 {
        0.0
    }

    fn seconds_between(earlier: f64, later: f64) -> f64 {
        later - earlier
    }
}

/// Replays a fixed list of tick snapshots, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedTicks {
    queue: Arc<Mutex<VecDeque<TickSnapshot>>>,
    last: TickSnapshot,
}

impl ScriptedTicks {
    pub fn new(readings: &[(u64, u64, u64)]) -> Self {
        Self {
            queue: Arc::new(Mutex::new(
                readings
                    .iter()
                    .map(|&(total, system, user)| TickSnapshot::new(total, system, user))
                    .collect(),
            )),
            last: TickSnapshot::default(),
        }
    }

    /// Appends a reading. Clones share the same script.
    pub fn push(&self, total: u64, system: u64, user: u64) {
        self.queue
            .lock()
            .unwrap()
            .push_back(TickSnapshot::new(total, system, user));
    }
}

impl TickSource for ScriptedTicks {
    fn read_ticks(&mut self) -> TickSnapshot {
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// Always reports the same memory usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemory(pub MemoryUsage);

impl MemorySource for FixedMemory {
    fn read_usage(&mut self) -> MemoryUsage {
        self.0
    }
}
