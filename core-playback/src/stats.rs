//! # Load Telemetry
//!
//! High-water marks of the cycles spent in each scheduler phase, reported as
//! a percentage of the reference interval (one frame period).

use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Maximum observed phase durations, in CPU cycles.
#[derive(Debug, Default)]
pub struct LoadMonitor {
    decode_max: AtomicU32,
    read_max: AtomicU32,
}

impl LoadMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decode(&self, cycles: u32) {
        self.decode_max.fetch_max(cycles, Ordering::Relaxed);
    }

    pub fn record_read(&self, cycles: u32) {
        self.read_max.fetch_max(cycles, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.decode_max.store(0, Ordering::Relaxed);
        self.read_max.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self, frequency_hz: u32, reference: Duration) -> LoadStats {
        LoadStats {
            max_decode_cycles: self.decode_max.load(Ordering::Relaxed),
            max_read_cycles: self.read_max.load(Ordering::Relaxed),
            reference_cycles: (frequency_hz as f64 * reference.as_secs_f64()) as u64,
        }
    }
}

/// Snapshot of the load high-water marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadStats {
    pub max_decode_cycles: u32,
    pub max_read_cycles: u32,
    /// Cycles in one reference interval.
    pub reference_cycles: u64,
}

impl LoadStats {
    pub fn decode_percent(&self) -> f32 {
        Self::percent(self.max_decode_cycles, self.reference_cycles)
    }

    pub fn read_percent(&self) -> f32 {
        Self::percent(self.max_read_cycles, self.reference_cycles)
    }

    fn percent(cycles: u32, reference: u64) -> f32 {
        if reference == 0 {
            return 0.0;
        }
        (cycles as f64 / reference as f64 * 100.0) as f32
    }
}
