//! Scripted in-memory transport
//!
//! Enabled with the `mock` feature. Frames written through a [`MockTransport`]
//! are kept in a shared log; failures can be scripted up front.

use crate::{Connector, Transport};
use lumen_protocol::DeviceMessage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    sent: Vec<Vec<u8>>,
    attempts: usize,
    // true = fail this attempt; empty queue means succeed
    script: VecDeque<bool>,
    fail_always: bool,
}

/// Handle for inspecting and scripting a [`MockTransport`] from a test.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that shares this handle's log and script.
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            shared: self.shared.clone(),
        }
    }

    /// Fail the next `count` writes, then succeed.
    pub fn fail_next(&self, count: usize) {
        let mut shared = self.shared.lock();
        shared.script.extend(std::iter::repeat_n(true, count));
    }

    /// Fail every write until cleared.
    pub fn set_fail_always(&self, fail: bool) {
        self.shared.lock().fail_always = fail;
    }

    /// Frames written successfully, decoded.
    pub fn sent(&self) -> Vec<DeviceMessage> {
        self.shared
            .lock()
            .sent
            .iter()
            .filter_map(|raw| DeviceMessage::parse(raw).ok())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.shared.lock().sent.len()
    }

    /// Writes attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.shared.lock().attempts
    }
}

/// Transport half of a [`MockHandle`].
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl Transport for MockTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut shared = self.shared.lock();
        shared.attempts += 1;

        let scripted_failure = shared.script.pop_front().unwrap_or(false);
        if shared.fail_always || scripted_failure {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "mock transport failure",
            ));
        }

        shared.sent.push(frame.to_vec());
        Ok(())
    }
}

/// Connector that hands out mock transports, or refuses.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    handle: MockHandle,
    refuse: bool,
}

impl MockConnector {
    pub fn new(handle: MockHandle) -> Self {
        Self {
            handle,
            refuse: false,
        }
    }

    /// Connector whose connection attempt always fails.
    pub fn refusing() -> Self {
        Self {
            handle: MockHandle::new(),
            refuse: true,
        }
    }

    pub fn handle(&self) -> &MockHandle {
        &self.handle
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &str) -> io::Result<Box<dyn Transport>> {
        if self.refuse {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("mock refused {endpoint}"),
            ));
        }
        Ok(Box::new(self.handle.transport()))
    }
}
