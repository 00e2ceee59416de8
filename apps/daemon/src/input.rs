//! Status input: one JSON status message per line.

use lumen_bridge::{StatusHub, StatusMessage};
use serde_json::Value;
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub type Status = Value;

/// Parse one input line.
///
/// Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<StatusMessage<Status>>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Publish every well-formed line of `reader`; malformed lines are logged
/// and skipped. Returns the number of messages published.
pub fn pump<R: BufRead>(reader: R, hub: &StatusHub<Status>) -> io::Result<usize> {
    let mut published = 0;
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(&line) {
            Ok(Some(msg)) => {
                let delivered = hub.publish(msg);
                debug!("Status line {} delivered to {} subscriber(s)", number + 1, delivered);
                published += 1;
            },
            Ok(None) => {},
            Err(e) => warn!("Ignoring status line {}: {}", number + 1, e),
        }
    }
    Ok(published)
}

/// Read stdin on a detached thread until EOF.
///
/// The thread is never joined: a blocking read cannot observe shutdown, and
/// the process exit ends it.
pub fn spawn_stdin_reader(hub: StatusHub<Status>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("lumen-stdin".into())
        .spawn(move || match pump(io::stdin().lock(), &hub) {
            Ok(count) => info!("Status input closed after {} message(s)", count),
            Err(e) => warn!("Status input failed: {}", e),
        })
}
