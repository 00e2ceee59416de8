//! Broadcast shutdown signal
//!
//! Built on a crossbeam channel nobody ever sends on. Triggering drops the
//! only sender, so every receiver clone observes disconnection at once and a
//! `select!` arm on it fires immediately, now and forever after.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Owner side of the shutdown signal.
///
/// Cloning shares the same trigger. Dropping every clone without calling
/// [`Shutdown::trigger`] also raises the signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: ShutdownSignal,
}

/// Observer side of the shutdown signal, handed to every loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: ShutdownSignal { rx },
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Raise the signal. Idempotent.
    pub fn trigger(&self) {
        if self.trigger.lock().take().is_some() {
            debug!("Shutdown signal raised");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.is_triggered()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Receiver to put in a `select!` arm; it becomes ready once triggered.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `timeout` unless shutdown arrives first.
    ///
    /// Returns `true` if shutdown was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Block until shutdown is raised.
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnect
        while self.rx.recv().is_ok() {}
    }
}
