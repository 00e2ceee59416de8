//! Frame streamer
//!
//! Each cycle advances the sequencing engine, stages every universe, then
//! frames and sends one message per active strand. The wait between cycles
//! comes from [`PacingState`]: nominal while sends succeed, relaxed after a
//! failure.

use crate::error::{BridgeError, SequencerError};
use crate::metrics::BridgeMetrics;
use crate::pacing::PacingState;
use crate::sequencer::{FrameStore, Sequencer, Topology};
use crate::shutdown::ShutdownSignal;
use crate::sink::ErrorSink;
use lumen_device::DeviceConnection;
use lumen_protocol::DeviceMessage;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Deferred sequencer lookup, resolved on the streamer thread at startup.
pub type SequencerFactory =
    Box<dyn FnOnce() -> Result<Box<dyn Sequencer>, SequencerError> + Send>;

/// Result of one streaming cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Messages written
    pub sent: usize,
    /// Messages that failed to frame or send
    pub failed: usize,
    /// Zero-length strands passed over
    pub skipped: usize,
}

/// Frame streamer state. Owns the device connection and the pacing state.
pub struct FrameStreamer {
    sequencer: Box<dyn Sequencer>,
    topology: Topology,
    store: FrameStore,
    connection: DeviceConnection,
    pacing: PacingState,
    sink: ErrorSink,
    metrics: Arc<BridgeMetrics>,
}

impl FrameStreamer {
    /// Resolve the sequencer and its topology.
    ///
    /// Either failing is fatal to the streamer: the error is reported, this
    /// streamer's sink is dropped and the error is returned.
    pub fn start(
        factory: SequencerFactory,
        connection: DeviceConnection,
        pacing: PacingState,
        sink: ErrorSink,
        metrics: Arc<BridgeMetrics>,
    ) -> Result<Self, BridgeError> {
        let startup = factory().and_then(|sequencer| {
            let topology = sequencer.topology()?;
            topology.validate()?;
            Ok((sequencer, topology))
        });

        let (sequencer, topology) = match startup {
            Ok(ready) => ready,
            Err(e) => {
                error!("Frame streamer cannot start: {}", e);
                sink.report(BridgeError::Sequencer(e.clone()));
                return Err(BridgeError::Sequencer(e));
            },
        };

        info!(
            "Frame streamer ready: {} device(s), {} active strand(s), {} universe(s)",
            topology.device_count(),
            topology.active_strands(),
            sequencer.universes().len()
        );

        Ok(Self {
            sequencer,
            topology,
            store: FrameStore::new(),
            connection,
            pacing,
            sink,
            metrics,
        })
    }

    pub fn pacing(&self) -> &PacingState {
        &self.pacing
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn connection(&self) -> &DeviceConnection {
        &self.connection
    }

    /// Advance to `now` and push one message per active strand.
    ///
    /// A failing strand never stops the sweep; since every strand shares the
    /// one connection, a failure slows the whole streamer until some later
    /// send succeeds.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        // === Advancing ===
        self.sequencer.advance(now);
        for universe in self.sequencer.universes() {
            let data = self.sequencer.universe_data(universe);
            self.store.update_universe(universe, data);
        }

        // === Streaming ===
        let mut report = FrameReport::default();
        for (device, strands) in self.topology.devices() {
            for (index, layout) in strands.iter().enumerate() {
                if layout.len == 0 {
                    report.skipped += 1;
                    continue;
                }

                let strand = index + 1;
                let pixels = self.store.strand_data(layout);
                let message = match DeviceMessage::from_buffer(layout.channel, &pixels) {
                    Ok(message) => message,
                    Err(source) => {
                        report.failed += 1;
                        self.sink.report(BridgeError::Protocol {
                            device: device.0,
                            strand,
                            source,
                        });
                        continue;
                    },
                };

                match self.connection.send(&message) {
                    Ok(()) => {
                        if self.pacing.is_degraded() {
                            info!("Output device {} recovered", self.connection.endpoint());
                        }
                        self.pacing.on_success();
                        self.metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
                        report.sent += 1;
                    },
                    Err(e) => {
                        self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                        report.failed += 1;

                        if self.pacing.is_degraded() {
                            debug!("{} strand {} send failed: {}", device, strand, e);
                        } else {
                            warn!(
                                "{} strand {} send failed, slowing to {:?}: {}",
                                device,
                                strand,
                                self.pacing.relaxed(),
                                e
                            );
                            self.sink.report(e.into());
                        }
                        self.pacing.on_failure();
                    },
                }
            }
        }

        trace!(
            "Frame: sent={} failed={} skipped={} next in {:?}",
            report.sent,
            report.failed,
            report.skipped,
            self.pacing.period()
        );
        report
    }

    /// Stream until shutdown. The wait is re-read from the pacing state every cycle.
    pub fn run(mut self, shutdown: ShutdownSignal) -> Result<(), BridgeError> {
        debug!("Frame streamer started");

        loop {
            let period = self.pacing.period();
            crossbeam_channel::select! {
                recv(crossbeam_channel::after(period)) -> _ => {
                    self.frame(Instant::now());
                },
                recv(shutdown.receiver()) -> _ => break,
            }
        }

        debug!("Frame streamer exited");
        Ok(())
    }
}
