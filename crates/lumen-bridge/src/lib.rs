//! # Lumen Bridge
//!
//! Drives OPC output devices from an intermittently updated status object.
//!
//! Three independently timed loops run on their own threads:
//!
//! ```text
//! StatusHub ──StatusMessage──▶ status listener ──update──▶ StatusCache
//!                                                            │ read (copy)
//!                                                            ▼
//!                              RenderLoop (200 ms) ── fingerprint changed? ──▶ Renderer
//!
//! Sequencer ──universe data──▶ FrameStreamer (30 ms / 5 s) ──DeviceMessage──▶ DeviceConnection
//!
//! every loop ──BridgeError──▶ ErrorSink ──(bounded, try-for-20ms)──▶ observer | local log
//! ```
//!
//! All loops observe a single [`Shutdown`] signal and exit within one wait.

mod bridge;
pub mod config;
mod error;
pub mod fingerprint;
pub mod metrics;
pub mod pacing;
pub mod render;
pub mod sequencer;
pub mod shutdown;
pub mod sink;
pub mod status;
pub mod streamer;

pub use bridge::{Bridge, BridgeExit};
pub use config::BridgeConfig;
pub use error::{BridgeError, RenderError, SequencerError};
pub use fingerprint::{ChangeDetector, Fingerprint, fingerprint, has_changed};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use pacing::PacingState;
pub use render::{RenderLoop, Renderer, TickOutcome};
pub use sequencer::{DeviceId, FrameStore, Sequencer, StrandLayout, Topology, UniverseId};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use sink::ErrorSink;
pub use status::{StatusCache, StatusHub, StatusMessage, StatusSubscription, status_listener};
pub use streamer::{FrameReport, FrameStreamer, SequencerFactory};

pub use lumen_device::{Connector, DeviceConnection, DeviceError, TcpConnector, Transport};
pub use lumen_protocol::{ChannelBuffer, DeviceMessage, Rgba};
