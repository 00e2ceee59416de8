//! DeviceConnection driven through the scripted mock transport.

use lumen_device::mock::{MockConnector, MockHandle};
use lumen_device::{DeviceConnection, DeviceError};
use lumen_protocol::{DeviceMessage, Rgba};

fn strand(channel: u8) -> DeviceMessage {
    DeviceMessage::from_buffer(channel, &[Rgba::opaque(10, 20, 30), Rgba::OFF]).unwrap()
}

#[test]
fn test_scripted_failures_then_recovery() {
    let handle = MockHandle::new();
    handle.fail_next(2);
    let connector = MockConnector::new(handle.clone());
    let mut conn = DeviceConnection::connect("mock:1", &connector).unwrap();

    assert!(matches!(conn.send(&strand(1)), Err(DeviceError::Transport { .. })));
    assert!(matches!(conn.send(&strand(1)), Err(DeviceError::Transport { .. })));
    conn.send(&strand(2)).unwrap();

    assert_eq!(handle.attempts(), 3);
    let sent = handle.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel(), 2);
    assert_eq!(sent[0].pixel(1), Some([0, 0, 0]));
}

#[test]
fn test_refused_connection_is_reported_once() {
    let err = DeviceConnection::connect("mock:down", &MockConnector::refusing()).unwrap_err();
    assert!(matches!(err, DeviceError::Connect { .. }));
    assert!(err.to_string().contains("mock:down"));

    // Caller falls back to a disconnected connection; sends fail fast
    let mut conn = DeviceConnection::disconnected(err.endpoint());
    for _ in 0..3 {
        assert!(matches!(conn.send(&strand(1)), Err(DeviceError::NotConnected { .. })));
    }
}
