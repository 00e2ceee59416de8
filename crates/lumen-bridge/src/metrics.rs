//! Bridge counters
//!
//! Lock-free atomic counters, safe to read from any thread while the loops run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live bridge counters
///
/// # Example
///
/// ```rust
/// use lumen_bridge::BridgeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BridgeMetrics::new();
/// metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Status messages from the home source stored in the cache
    pub status_accepted: AtomicU64,
    /// Status messages dropped because they came from another source
    pub status_ignored: AtomicU64,
    /// Successful renderer invocations
    pub renders: AtomicU64,
    /// Failed renderer invocations (including fingerprint failures)
    pub render_failures: AtomicU64,
    /// Device messages written
    pub frames_sent: AtomicU64,
    /// Device messages that failed to send
    pub send_failures: AtomicU64,
    /// Errors handed to the observer
    pub errors_delivered: AtomicU64,
    /// Errors written to the local log because the observer was unavailable
    pub errors_fallback: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            status_accepted: self.status_accepted.load(Ordering::Relaxed),
            status_ignored: self.status_ignored.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            errors_delivered: self.errors_delivered.load(Ordering::Relaxed),
            errors_fallback: self.errors_fallback.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.status_accepted.store(0, Ordering::Relaxed);
        self.status_ignored.store(0, Ordering::Relaxed);
        self.renders.store(0, Ordering::Relaxed);
        self.render_failures.store(0, Ordering::Relaxed);
        self.frames_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
        self.errors_delivered.store(0, Ordering::Relaxed);
        self.errors_fallback.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`BridgeMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub status_accepted: u64,
    pub status_ignored: u64,
    pub renders: u64,
    pub render_failures: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub errors_delivered: u64,
    pub errors_fallback: u64,
}

impl MetricsSnapshot {
    /// Fraction of send attempts that failed, 0.0 when nothing was attempted.
    pub fn send_failure_rate(&self) -> f64 {
        let attempts = self.frames_sent + self.send_failures;
        if attempts == 0 {
            0.0
        } else {
            self.send_failures as f64 / attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BridgeMetrics::new();
        metrics.renders.fetch_add(3, Ordering::Relaxed);
        metrics.send_failures.fetch_add(1, Ordering::Relaxed);
        metrics.frames_sent.fetch_add(3, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.renders, 3);
        assert!((snapshot.send_failure_rate() - 0.25).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(MetricsSnapshot::default().send_failure_rate(), 0.0);
    }
}
