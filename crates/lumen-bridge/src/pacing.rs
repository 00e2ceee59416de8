//! Adaptive send pacing
//!
//! Fast while sends succeed, slow after a failure, fast again after the next
//! success. Owned by the frame streamer alone.

use std::time::Duration;

/// Default nominal frame period
pub const NOMINAL_INTERVAL: Duration = Duration::from_millis(30);

/// Default period while the device is failing
pub const RELAXED_INTERVAL: Duration = Duration::from_secs(5);

/// Current inter-send interval.
///
/// # Example
///
/// ```
/// use lumen_bridge::PacingState;
/// use std::time::Duration;
///
/// let mut pacing = PacingState::default();
/// pacing.on_failure();
/// assert_eq!(pacing.period(), Duration::from_secs(5));
/// pacing.on_success();
/// assert_eq!(pacing.period(), Duration::from_millis(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingState {
    nominal: Duration,
    relaxed: Duration,
    current: Duration,
}

impl PacingState {
    pub fn new(nominal: Duration, relaxed: Duration) -> Self {
        Self {
            nominal,
            relaxed,
            current: nominal,
        }
    }

    /// Wait before the next frame.
    pub fn period(&self) -> Duration {
        self.current
    }

    pub fn on_failure(&mut self) {
        self.current = self.relaxed;
    }

    pub fn on_success(&mut self) {
        self.current = self.nominal;
    }

    pub fn is_degraded(&self) -> bool {
        self.current != self.nominal
    }

    pub fn nominal(&self) -> Duration {
        self.nominal
    }

    pub fn relaxed(&self) -> Duration {
        self.relaxed
    }
}

impl Default for PacingState {
    fn default() -> Self {
        Self::new(NOMINAL_INTERVAL, RELAXED_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_nominal() {
        let pacing = PacingState::default();
        assert_eq!(pacing.period(), NOMINAL_INTERVAL);
        assert!(!pacing.is_degraded());
    }

    #[test]
    fn test_repeated_failures_stay_relaxed() {
        let mut pacing = PacingState::new(Duration::from_millis(10), Duration::from_secs(1));
        for _ in 0..5 {
            pacing.on_failure();
            assert_eq!(pacing.period(), Duration::from_secs(1));
            assert!(pacing.is_degraded());
        }
        pacing.on_success();
        assert_eq!(pacing.period(), Duration::from_millis(10));
        assert!(!pacing.is_degraded());
    }
}
