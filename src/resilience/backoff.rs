//! Multiplicative backoff schedules.

use std::time::Duration;

/// Delay schedule: `initial × multiplier^n`, optionally capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Growth factor applied after every retry.
    pub multiplier: f64,
    /// Upper bound for any single delay.
    pub max_delay: Option<Duration>,
}

impl Backoff {
    /// Create an uncapped schedule.
    pub const fn new(initial: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            multiplier,
            max_delay: None,
        }
    }

    /// Create a schedule from millisecond values, as found in config files.
    pub fn from_millis(initial_ms: u64, multiplier: f64, max_ms: Option<u64>) -> Self {
        Self {
            initial: Duration::from_millis(initial_ms),
            multiplier,
            max_delay: max_ms.map(Duration::from_millis),
        }
    }

    /// Delay to wait before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        self.scale(self.initial, factor)
    }

    fn scale(&self, base: Duration, factor: f64) -> Duration {
        let ms = (base.as_millis() as f64 * factor).round();
        let ms = if ms.is_finite() && ms < u64::MAX as f64 {
            ms.max(0.0) as u64
        } else {
            u64::MAX
        };
        let delay = Duration::from_millis(ms);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
