//! Bridge lifecycle: wiring, thread startup and orderly shutdown

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::pacing::PacingState;
use crate::render::{RenderLoop, Renderer};
use crate::shutdown::Shutdown;
use crate::sink::ErrorSink;
use crate::status::{StatusCache, StatusHub, status_listener};
use crate::streamer::{FrameStreamer, SequencerFactory};
use crossbeam_channel::Receiver;
use lumen_device::{Connector, DeviceConnection};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long `Drop` waits for each loop thread
const DROP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How each loop thread ended.
#[derive(Debug)]
pub struct BridgeExit {
    pub status: Result<(), BridgeError>,
    pub render: Result<(), BridgeError>,
    pub stream: Result<(), BridgeError>,
}

impl BridgeExit {
    /// All three loops returned normally.
    pub fn is_clean(&self) -> bool {
        self.status.is_ok() && self.render.is_ok() && self.stream.is_ok()
    }
}

/// Running bridge.
///
/// Owns the three loop threads. Dropping it raises shutdown and waits
/// (bounded) for the threads.
///
/// # Example
///
/// ```no_run
/// use lumen_bridge::{
///     Bridge, BridgeConfig, RenderError, SequencerError, Shutdown, StatusHub, TcpConnector,
/// };
///
/// let config = BridgeConfig::default();
/// let hub: StatusHub<String> = StatusHub::new(config.status_capacity);
/// let shutdown = Shutdown::new();
///
/// let (bridge, errors) = Bridge::start(
///     &config,
///     &hub,
///     |_: f32, status: &String| -> Result<(), RenderError> {
///         println!("render {status}");
///         Ok(())
///     },
///     Box::new(|| Err(SequencerError::Unavailable("none".into()))),
///     &TcpConnector::default(),
///     shutdown.clone(),
/// )
/// .unwrap();
///
/// shutdown.trigger();
/// let exit = bridge.join();
/// for err in errors.iter() {
///     eprintln!("{err}");
/// }
/// # let _ = exit;
/// ```
pub struct Bridge<S> {
    shutdown: Shutdown,
    cache: Arc<StatusCache<S>>,
    metrics: Arc<BridgeMetrics>,
    status_thread: Option<JoinHandle<()>>,
    render_thread: Option<JoinHandle<()>>,
    stream_thread: Option<JoinHandle<Result<(), BridgeError>>>,
}

impl<S> Bridge<S>
where
    S: Clone + Default + Serialize + Send + 'static,
{
    /// Connect once, then start the status listener, render loop and frame
    /// streamer.
    ///
    /// A failed connection is reported on the returned error channel and the
    /// streamer runs in the not-connected state. The channel closes once all
    /// three loops have exited.
    pub fn start<R, C>(
        config: &BridgeConfig,
        hub: &StatusHub<S>,
        renderer: R,
        sequencer: SequencerFactory,
        connector: &C,
        shutdown: Shutdown,
    ) -> Result<(Self, Receiver<BridgeError>), BridgeError>
    where
        R: Renderer<S> + 'static,
        C: Connector,
    {
        config.validate()?;

        let metrics = Arc::new(BridgeMetrics::new());
        let cache = Arc::new(StatusCache::new());
        let (sink, errors) = ErrorSink::channel(config.error_capacity, config.error_timeout());
        let sink = sink.with_metrics(metrics.clone());

        let connection = match DeviceConnection::connect(config.server.as_str(), connector) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Output device unavailable, streaming disconnected: {}", e);
                sink.report(e.into());
                DeviceConnection::disconnected(config.server.as_str())
            },
        };

        // Bridge from here on so an early return tears down what already runs
        let mut bridge = Self {
            shutdown: shutdown.clone(),
            cache: cache.clone(),
            metrics: metrics.clone(),
            status_thread: None,
            render_thread: None,
            stream_thread: None,
        };

        // === Status listener ===
        let rx = hub.subscribe();
        let status_cache = cache.clone();
        let status_signal = shutdown.signal();
        let status_metrics = metrics.clone();
        bridge.status_thread = Some(spawn_named("lumen-status", move || {
            status_listener(rx, status_cache, status_signal, status_metrics)
        })?);

        // === Render loop ===
        let render_loop = RenderLoop::new(
            cache,
            renderer,
            config.intensity,
            config.render_interval(),
            config.server.clone(),
            sink.clone(),
            metrics.clone(),
        );
        let render_signal = shutdown.signal();
        bridge.render_thread = Some(spawn_named("lumen-render", move || {
            render_loop.run(render_signal)
        })?);

        // === Frame streamer ===
        let pacing = PacingState::new(config.frame_interval(), config.retry_interval());
        let stream_signal = shutdown.signal();
        bridge.stream_thread = Some(spawn_named("lumen-stream", move || {
            FrameStreamer::start(sequencer, connection, pacing, sink, metrics)?.run(stream_signal)
        })?);

        info!(
            "Bridge started: device {}, render every {:?}, frames every {:?}",
            config.server,
            config.render_interval(),
            config.frame_interval()
        );

        Ok((bridge, errors))
    }
}

impl<S> Bridge<S> {
    /// Raise the shared shutdown signal.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<StatusCache<S>> {
        &self.cache
    }

    /// Wait for every loop to exit.
    ///
    /// Does not raise shutdown itself; the status listener alone may also end
    /// when the publisher closes.
    pub fn join(mut self) -> BridgeExit {
        let status = join_loop("status listener", self.status_thread.take());
        let render = join_loop("render loop", self.render_thread.take());
        let stream = match self.stream_thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| BridgeError::ThreadPanicked("frame streamer"))
                .and_then(|result| result),
            None => Ok(()),
        };

        BridgeExit {
            status,
            render,
            stream,
        }
    }
}

impl<S> Drop for Bridge<S> {
    fn drop(&mut self) {
        self.shutdown.trigger();

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut pending = 0;
        for handle in [self.status_thread.take(), self.render_thread.take()]
            .into_iter()
            .flatten()
        {
            pending += 1;
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(handle.join().is_ok());
            });
        }
        if let Some(handle) = self.stream_thread.take() {
            pending += 1;
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(handle.join().is_ok());
            });
        }
        drop(tx);

        let deadline = crossbeam_channel::after(DROP_JOIN_TIMEOUT);
        for _ in 0..pending {
            crossbeam_channel::select! {
                recv(rx) -> joined => {
                    if !joined.unwrap_or(false) {
                        error!("Bridge thread panicked");
                    }
                },
                recv(deadline) -> _ => {
                    error!("Bridge threads did not exit within {:?}", DROP_JOIN_TIMEOUT);
                    break;
                },
            }
        }
    }
}

fn spawn_named<T, F>(name: &'static str, f: F) -> Result<JoinHandle<T>, BridgeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| BridgeError::Spawn { name, source })
}

fn join_loop(name: &'static str, handle: Option<JoinHandle<()>>) -> Result<(), BridgeError> {
    match handle {
        Some(handle) => handle.join().map_err(|_| {
            error!("{} panicked", name);
            BridgeError::ThreadPanicked(name)
        }),
        None => Ok(()),
    }
}
