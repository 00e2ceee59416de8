//! # Lumen Device Layer
//!
//! Transport abstraction plus the validated [`DeviceConnection`] the frame
//! streamer sends through.
//!
//! Connection establishment is attempted exactly once. A failed attempt leaves
//! the connection in the not-connected state and every later `send` fails fast;
//! retry pacing belongs to the caller.

use std::io;
use std::panic::Location;
use thiserror::Error;

mod connection;
#[cfg(feature = "mock")]
pub mod mock;
pub mod tcp;

pub use connection::DeviceConnection;
pub use tcp::{TcpConnector, TcpTransport};

/// Device layer error
///
/// Every variant carries the endpoint and the call site that produced it, so
/// whoever receives the error can decide on retry/backoff without guessing.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Initial connection attempt failed
    #[error("failed to connect to {endpoint} ({location}): {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
        location: &'static Location<'static>,
    },

    /// No connection was ever established
    #[error("device {endpoint} not online ({location})")]
    NotConnected {
        endpoint: String,
        location: &'static Location<'static>,
    },

    /// Message is empty or otherwise unusable
    #[error("invalid message for {endpoint} ({location}): {reason}")]
    InvalidMessage {
        endpoint: String,
        reason: &'static str,
        location: &'static Location<'static>,
    },

    /// Underlying write failed
    #[error("transport failure on {endpoint} ({location}): {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: io::Error,
        location: &'static Location<'static>,
    },
}

impl DeviceError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Connect { endpoint, .. }
            | Self::NotConnected { endpoint, .. }
            | Self::InvalidMessage { endpoint, .. }
            | Self::Transport { endpoint, .. } => endpoint,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Self::Connect { location, .. }
            | Self::NotConnected { location, .. }
            | Self::InvalidMessage { location, .. }
            | Self::Transport { location, .. } => location,
        }
    }
}

/// Raw byte pipe to an output device.
///
/// Implementations must return promptly; bounding a stuck write (socket
/// timeouts etc.) is the transport's job.
pub trait Transport: Send {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write_frame(frame)
    }
}

/// Opens transports to an endpoint.
pub trait Connector {
    fn connect(&self, endpoint: &str) -> io::Result<Box<dyn Transport>>;
}
