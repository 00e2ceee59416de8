//! Change-gated render loop
//!
//! Every tick the loop copies the cached status, fingerprints it and calls
//! the renderer only when the fingerprint moved. Render failures are reported
//! and the loop carries on.

use crate::error::{BridgeError, RenderError};
use crate::fingerprint::ChangeDetector;
use crate::metrics::BridgeMetrics;
use crate::shutdown::ShutdownSignal;
use crate::sink::ErrorSink;
use crate::status::StatusCache;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// External rendering capability.
///
/// Any `FnMut(f32, &S) -> Result<(), RenderError> + Send` closure works.
pub trait Renderer<S>: Send {
    fn render(&mut self, intensity: f32, status: &S) -> Result<(), RenderError>;
}

impl<S, F> Renderer<S> for F
where
    F: FnMut(f32, &S) -> Result<(), RenderError> + Send,
{
    fn render(&mut self, intensity: f32, status: &S) -> Result<(), RenderError> {
        self(intensity, status)
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Status unchanged, nothing rendered
    Idle,
    /// Status changed and the renderer succeeded
    Rendered,
    /// Status changed (or could not be fingerprinted) and the attempt failed
    Failed,
}

/// Render loop state. Owns its change detector; shares only the cache.
pub struct RenderLoop<S, R> {
    cache: Arc<StatusCache<S>>,
    renderer: R,
    detector: ChangeDetector,
    // Set while the cached status cannot be fingerprinted
    unhashable: bool,
    intensity: f32,
    interval: Duration,
    endpoint: String,
    sink: ErrorSink,
    metrics: Arc<BridgeMetrics>,
}

impl<S, R> RenderLoop<S, R>
where
    S: Clone + Default + Serialize,
    R: Renderer<S>,
{
    /// # Parameters
    /// - `endpoint`: device address attached to reported render failures
    /// - `interval`: tick period (nominally 200 ms)
    pub fn new(
        cache: Arc<StatusCache<S>>,
        renderer: R,
        intensity: f32,
        interval: Duration,
        endpoint: impl Into<String>,
        sink: ErrorSink,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            cache,
            renderer,
            detector: ChangeDetector::new(),
            unhashable: false,
            intensity,
            interval,
            endpoint: endpoint.into(),
            sink,
            metrics,
        }
    }

    /// One sampling pass.
    ///
    /// The new fingerprint is kept even when rendering fails, so a failed
    /// render is not retried until the status changes again.
    pub fn tick(&mut self) -> TickOutcome {
        let snapshot = self.cache.read();
        let observed = self.detector.observe(&snapshot);
        if observed.is_ok() {
            self.unhashable = false;
        }

        match observed {
            Ok(false) => {
                trace!("Status unchanged");
                TickOutcome::Idle
            },
            Ok(true) => {
                debug!(
                    "Status changed ({:?}), rendering at intensity {}",
                    self.detector.last(),
                    self.intensity
                );
                match self.renderer.render(self.intensity, &snapshot) {
                    Ok(()) => {
                        self.metrics.renders.fetch_add(1, Ordering::Relaxed);
                        TickOutcome::Rendered
                    },
                    Err(source) => {
                        self.metrics.render_failures.fetch_add(1, Ordering::Relaxed);
                        self.sink.report(BridgeError::Render {
                            endpoint: self.endpoint.clone(),
                            source,
                        });
                        TickOutcome::Failed
                    },
                }
            },
            Err(e) => {
                self.metrics.render_failures.fetch_add(1, Ordering::Relaxed);
                if self.unhashable {
                    debug!("Status still cannot be fingerprinted: {}", e);
                } else {
                    warn!("Cannot fingerprint status: {}", e);
                    self.unhashable = true;
                    self.sink.report(e);
                }
                TickOutcome::Failed
            },
        }
    }

    /// Tick every `interval` until shutdown.
    pub fn run(mut self, shutdown: ShutdownSignal) {
        debug!("Render loop started ({:?} tick)", self.interval);

        loop {
            crossbeam_channel::select! {
                recv(crossbeam_channel::after(self.interval)) -> _ => {
                    self.tick();
                },
                recv(shutdown.receiver()) -> _ => break,
            }
        }

        debug!("Render loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use crossbeam_channel::Receiver;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    fn render_loop<R: Renderer<String>>(
        renderer: R,
    ) -> (
        RenderLoop<String, R>,
        Arc<StatusCache<String>>,
        Receiver<BridgeError>,
    ) {
        let cache = Arc::new(StatusCache::new());
        let (sink, errors) = ErrorSink::channel(8, Duration::from_millis(20));
        let looped = RenderLoop::new(
            cache.clone(),
            renderer,
            0.15,
            Duration::from_millis(10),
            "127.0.0.1:7890",
            sink,
            Arc::new(BridgeMetrics::new()),
        );
        (looped, cache, errors)
    }

    #[test]
    fn test_first_tick_renders_empty_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (mut looped, _cache, _errors) =
            render_loop(move |_: f32, _: &String| -> Result<(), RenderError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        assert_eq!(looped.tick(), TickOutcome::Rendered);
        assert_eq!(looped.tick(), TickOutcome::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_render_per_transition() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = seen.clone();
        let (mut looped, cache, _errors) =
            render_loop(move |intensity: f32, status: &String| -> Result<(), RenderError> {
                assert!((intensity - 0.15).abs() < f32::EPSILON);
                log.lock().push(status.clone());
                Ok(())
            });

        let outcomes: Vec<TickOutcome> = ["A", "A", "B", "B", "A"]
            .iter()
            .map(|s| {
                cache.update(s.to_string());
                looped.tick()
            })
            .collect();

        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Rendered,
                TickOutcome::Idle,
                TickOutcome::Rendered,
                TickOutcome::Idle,
                TickOutcome::Rendered,
            ]
        );
        assert_eq!(*seen.lock(), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_render_failure_reported_with_endpoint() {
        let (mut looped, cache, errors) =
            render_loop(|_: f32, _: &String| Err::<(), RenderError>("no effect loaded".into()));

        cache.update("A".to_string());
        assert_eq!(looped.tick(), TickOutcome::Failed);
        // Not retried until the status changes
        assert_eq!(looped.tick(), TickOutcome::Idle);

        match errors.try_recv() {
            Ok(BridgeError::Render { endpoint, source }) => {
                assert_eq!(endpoint, "127.0.0.1:7890");
                assert_eq!(source.to_string(), "no effect loaded");
            },
            other => panic!("Expected render error, got {other:?}"),
        }
        assert!(errors.try_recv().is_err());
    }

    #[test]
    fn test_unhashable_status_reported_once() {
        // Tuple keys cannot become JSON object keys
        type Keyed = HashMap<(u8, u8), String>;
        let bad: Keyed = HashMap::from([((1, 2), "x".to_string())]);

        let cache = Arc::new(StatusCache::<Keyed>::new());
        let (sink, errors) = ErrorSink::channel(8, Duration::from_millis(20));
        let mut looped = RenderLoop::new(
            cache.clone(),
            |_: f32, _: &Keyed| -> Result<(), RenderError> { Ok(()) },
            0.15,
            Duration::from_millis(10),
            "127.0.0.1:7890",
            sink,
            Arc::new(BridgeMetrics::new()),
        );

        cache.update(bad.clone());
        for _ in 0..5 {
            assert_eq!(looped.tick(), TickOutcome::Failed);
        }
        assert!(matches!(errors.try_recv(), Ok(BridgeError::Fingerprint(_))));
        assert!(errors.try_recv().is_err());

        // A serializable status clears the condition; the next failure reports again
        cache.update(Keyed::new());
        assert_eq!(looped.tick(), TickOutcome::Rendered);
        cache.update(bad);
        assert_eq!(looped.tick(), TickOutcome::Failed);
        assert!(matches!(errors.try_recv(), Ok(BridgeError::Fingerprint(_))));
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (looped, cache, _errors) =
            render_loop(move |_: f32, _: &String| -> Result<(), RenderError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        cache.update("steady".to_string());

        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        let handle = thread::spawn(move || looped.run(signal));

        thread::sleep(Duration::from_millis(100));
        let start = Instant::now();
        shutdown.trigger();
        handle.join().unwrap();

        assert!(start.elapsed() < Duration::from_millis(500));
        // Many ticks, one unchanged status: exactly one render
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
