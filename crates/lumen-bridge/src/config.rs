//! Bridge configuration
//!
//! Plain data passed into each component at construction. Durations are
//! stored as milliseconds so the struct maps one-to-one onto a TOML file.

use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bridge configuration
///
/// # Example
///
/// ```
/// use lumen_bridge::BridgeConfig;
///
/// // defaults: 200 ms render tick, 30 ms frames, 5 s retry pacing
/// let config = BridgeConfig::default();
/// assert_eq!(config.frame_interval().as_millis(), 30);
///
/// // partial TOML, everything else defaulted
/// let config = BridgeConfig::from_toml_str(r#"
///     server = "10.0.0.5:7890"
///     intensity = 0.5
/// "#).unwrap();
/// assert_eq!(config.server, "10.0.0.5:7890");
/// assert_eq!(config.render_interval_ms, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// OPC server address (`host:port`)
    pub server: String,
    /// Render loop tick (ms)
    pub render_interval_ms: u64,
    /// Nominal frame streaming period (ms)
    pub frame_interval_ms: u64,
    /// Frame streaming period while sends are failing (ms)
    pub retry_interval_ms: u64,
    /// Intensity handed to the renderer, 0.0..=1.0
    pub intensity: f32,
    /// How long a report may wait for the error observer before falling back to the local log (ms)
    pub error_timeout_ms: u64,
    /// Error channel capacity
    pub error_capacity: usize,
    /// Per-subscriber status channel capacity
    pub status_capacity: usize,
    /// TCP connect timeout (ms)
    pub connect_timeout_ms: u64,
    /// TCP write timeout (ms)
    pub write_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:7890".to_string(),
            render_interval_ms: 200,
            frame_interval_ms: 30,
            retry_interval_ms: 5_000,
            intensity: 0.15,
            error_timeout_ms: 20,
            error_capacity: 16,
            status_capacity: 1,
            connect_timeout_ms: 1_000,
            write_timeout_ms: 1_000,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, BridgeError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn error_timeout(&self) -> Duration {
        Duration::from_millis(self.error_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Reject values the loops cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.server.trim().is_empty() {
            return Err(BridgeError::Config("server must not be empty".into()));
        }
        if self.render_interval_ms == 0 || self.frame_interval_ms == 0 {
            return Err(BridgeError::Config(
                "render and frame intervals must be non-zero".into(),
            ));
        }
        if self.retry_interval_ms < self.frame_interval_ms {
            return Err(BridgeError::Config(format!(
                "retry interval ({} ms) shorter than frame interval ({} ms)",
                self.retry_interval_ms, self.frame_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(BridgeError::Config(format!(
                "intensity {} outside 0.0..=1.0",
                self.intensity
            )));
        }
        if self.error_capacity == 0 || self.status_capacity == 0 {
            return Err(BridgeError::Config(
                "channel capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
