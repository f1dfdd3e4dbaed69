//! Cycle counter derived from `std::time::Instant`

use bridge_traits::time::CycleCounter;
use std::time::Instant;

/// Default emulated CPU clock (600 MHz, a Cortex-M7 class part).
pub const DEFAULT_FREQUENCY_HZ: u32 = 600_000_000;

/// Emulates a free-running 32-bit cycle counter at a fixed frequency.
#[derive(Debug, Clone)]
pub struct MonotonicCycleCounter {
    origin: Instant,
    frequency_hz: u32,
}

impl MonotonicCycleCounter {
    pub fn new() -> Self {
        Self::with_frequency(DEFAULT_FREQUENCY_HZ)
    }

    pub fn with_frequency(frequency_hz: u32) -> Self {
        Self {
            origin: Instant::now(),
            frequency_hz: frequency_hz.max(1),
        }
    }
}

impl Default for MonotonicCycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for MonotonicCycleCounter {
    fn cycles(&self) -> u32 {
        let nanos = self.origin.elapsed().as_nanos();
        // Truncation emulates the hardware counter wrapping.
        (nanos * self.frequency_hz as u128 / 1_000_000_000) as u32
    }

    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cycles_advance_with_time() {
        let counter = MonotonicCycleCounter::with_frequency(1_000_000);
        let start = counter.cycles();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = counter.cycles().wrapping_sub(start);
        assert!(elapsed >= 4_000, "elapsed {elapsed} cycles");
    }

    #[test]
    fn test_zero_frequency_is_clamped() {
        assert_eq!(MonotonicCycleCounter::with_frequency(0).frequency_hz(), 1);
    }
}
