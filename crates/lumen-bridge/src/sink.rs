//! Best-effort error reporting
//!
//! Producers hand errors to a bounded channel but never wait longer than a
//! short bound for the observer. Anything the observer cannot take in time is
//! written to the local log instead, so a slow or absent observer can never
//! stall a loop.

use crate::BridgeError;
use crate::metrics::BridgeMetrics;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::warn;

/// Producer end of the error channel.
///
/// The channel closes once the last clone is dropped; each loop owns one, so
/// the observer sees disconnection when every loop has exited.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: Sender<BridgeError>,
    timeout: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl ErrorSink {
    /// Create a sink and the observer's receiving end.
    pub fn channel(capacity: usize, timeout: Duration) -> (Self, Receiver<BridgeError>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let sink = Self {
            tx,
            timeout,
            metrics: Arc::new(BridgeMetrics::new()),
        };
        (sink, rx)
    }

    /// Count deliveries in a shared metrics block.
    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Report an error without blocking for longer than the configured bound.
    ///
    /// Returns `true` if the observer's channel accepted it.
    pub fn report(&self, err: BridgeError) -> bool {
        match self.tx.send_timeout(err, self.timeout) {
            Ok(()) => {
                self.metrics.errors_delivered.fetch_add(1, Ordering::Relaxed);
                true
            },
            Err(SendTimeoutError::Timeout(err)) => {
                self.metrics.errors_fallback.fetch_add(1, Ordering::Relaxed);
                warn!("Error observer busy, logging locally: {}", err);
                false
            },
            Err(SendTimeoutError::Disconnected(err)) => {
                self.metrics.errors_fallback.fetch_add(1, Ordering::Relaxed);
                warn!("Error observer gone, logging locally: {}", err);
                false
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
