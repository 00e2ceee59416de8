//! Bridge error types

use lumen_device::DeviceError;
use lumen_protocol::ProtocolError;
use thiserror::Error;

/// Error returned by a [`Renderer`](crate::Renderer).
///
/// Rendering is an external capability, so its failures are opaque here.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Sequencing engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// The engine could not be obtained at startup
    #[error("Sequencer unavailable: {0}")]
    Unavailable(String),

    /// The physical layout is missing or unusable
    #[error("Invalid topology: {0}")]
    Topology(String),
}

/// Bridge error type
///
/// Everything that reaches the error channel is one of these.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Device connection or send failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A strand could not be framed
    #[error("Cannot frame device {device} strand {strand}: {source}")]
    Protocol {
        device: u32,
        strand: usize,
        #[source]
        source: ProtocolError,
    },

    /// The external renderer failed
    #[error("Render failed for {endpoint}: {source}")]
    Render {
        endpoint: String,
        #[source]
        source: RenderError,
    },

    /// Sequencing engine failure
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Status could not be serialized for fingerprinting
    #[error("Cannot fingerprint status: {0}")]
    Fingerprint(#[from] serde_json::Error),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Cannot parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Worker thread could not be spawned
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread panicked
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::Location;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Render {
            endpoint: "127.0.0.1:7890".to_string(),
            source: "effect missing".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:7890") && msg.contains("effect missing"));

        let err = BridgeError::Sequencer(SequencerError::Unavailable("no runner".into()));
        assert_eq!(err.to_string(), "Sequencer unavailable: no runner");

        let err = BridgeError::ThreadPanicked("render");
        assert_eq!(err.to_string(), "render thread panicked");
    }

    #[test]
    fn test_from_device_error_keeps_context() {
        let device = DeviceError::NotConnected {
            endpoint: "dev:1".to_string(),
            location: Location::caller(),
        };
        let err: BridgeError = device.into();
        match err {
            BridgeError::Device(e) => assert_eq!(e.endpoint(), "dev:1"),
            other => panic!("Expected Device variant, got {other:?}"),
        }
    }
}
