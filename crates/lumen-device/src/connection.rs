//! Validated device connection

use crate::{Connector, DeviceError, Transport};
use lumen_protocol::DeviceMessage;
use std::panic::Location;
use tracing::{debug, info};

/// Connection to one OPC endpoint.
///
/// Owned by the frame streamer; nothing else sends on it.
///
/// # Example
///
/// ```
/// use lumen_device::{DeviceConnection, DeviceError};
/// use lumen_protocol::DeviceMessage;
///
/// // A connection that never came up fails fast on every send
/// let mut conn = DeviceConnection::disconnected("127.0.0.1:7890");
/// let msg = DeviceMessage::new(1, 8).unwrap();
/// assert!(matches!(conn.send(&msg), Err(DeviceError::NotConnected { .. })));
/// ```
pub struct DeviceConnection {
    endpoint: String,
    transport: Option<Box<dyn Transport>>,
}

impl DeviceConnection {
    /// Attempt the one and only connection to `endpoint`.
    ///
    /// Callers that want to keep running after a failure fall back to
    /// [`DeviceConnection::disconnected`].
    #[track_caller]
    pub fn connect(
        endpoint: impl Into<String>,
        connector: &impl Connector,
    ) -> Result<Self, DeviceError> {
        let location = Location::caller();
        let endpoint = endpoint.into();

        match connector.connect(&endpoint) {
            Ok(transport) => {
                info!("Connected to output device at {}", endpoint);
                Ok(Self {
                    endpoint,
                    transport: Some(transport),
                })
            },
            Err(source) => Err(DeviceError::Connect {
                endpoint,
                source,
                location,
            }),
        }
    }

    /// A connection in the not-connected state.
    pub fn disconnected(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: None,
        }
    }

    /// Wrap an already open transport.
    pub fn with_transport(endpoint: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: Some(transport),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// - `NotConnected`: no connection was ever established
    /// - `InvalidMessage`: the message carries no pixels
    /// - `Transport`: the write failed; the connection stays usable for later attempts
    #[track_caller]
    pub fn send(&mut self, message: &DeviceMessage) -> Result<(), DeviceError> {
        let location = Location::caller();

        let Some(transport) = self.transport.as_mut() else {
            return Err(DeviceError::NotConnected {
                endpoint: self.endpoint.clone(),
                location,
            });
        };

        if message.is_empty() {
            return Err(DeviceError::InvalidMessage {
                endpoint: self.endpoint.clone(),
                reason: "message carries no pixels",
                location,
            });
        }

        transport.write_frame(message.as_bytes()).map_err(|source| {
            debug!("Write to {} failed: {}", self.endpoint, source);
            DeviceError::Transport {
                endpoint: self.endpoint.clone(),
                source,
                location,
            }
        })
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_protocol::Rgba;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    struct RecordingTransport {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: bool,
    }

    impl Transport for RecordingTransport {
        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.frames.lock().push(frame.to_vec());
            Ok(())
        }
    }

    struct RefusingConnector;

    impl Connector for RefusingConnector {
        fn connect(&self, _endpoint: &str) -> io::Result<Box<dyn Transport>> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    fn message() -> DeviceMessage {
        DeviceMessage::from_buffer(1, &[Rgba::opaque(1, 2, 3)]).unwrap()
    }

    #[test]
    fn test_send_writes_frame_bytes() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            frames: frames.clone(),
            fail: false,
        };
        let mut conn = DeviceConnection::with_transport("dev:1", Box::new(transport));

        conn.send(&message()).unwrap();

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![1, 0, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_connect_failure_carries_context() {
        let err = DeviceConnection::connect("10.0.0.1:7890", &RefusingConnector).unwrap_err();
        match &err {
            DeviceError::Connect { endpoint, .. } => assert_eq!(endpoint, "10.0.0.1:7890"),
            other => panic!("Expected Connect, got {other:?}"),
        }
        assert!(err.location().file().ends_with("connection.rs"));
    }

    #[test]
    fn test_not_connected_fails_fast() {
        let mut conn = DeviceConnection::disconnected("dev:1");
        assert!(!conn.is_connected());
        let err = conn.send(&message()).unwrap_err();
        assert!(matches!(err, DeviceError::NotConnected { .. }));
        assert_eq!(err.endpoint(), "dev:1");
    }

    #[test]
    fn test_empty_message_rejected() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            frames: frames.clone(),
            fail: false,
        };
        let mut conn = DeviceConnection::with_transport("dev:1", Box::new(transport));

        let empty = DeviceMessage::new(1, 0).unwrap();
        let err = conn.send(&empty).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidMessage { .. }));
        assert!(frames.lock().is_empty());
    }

    #[test]
    fn test_transport_failure_keeps_connection() {
        let transport = RecordingTransport {
            frames: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut conn = DeviceConnection::with_transport("dev:1", Box::new(transport));

        let err = conn.send(&message()).unwrap_err();
        assert!(matches!(err, DeviceError::Transport { .. }));
        assert!(conn.is_connected());
        assert!(err.to_string().contains("broken") || err.to_string().contains("pipe"));
    }
}
