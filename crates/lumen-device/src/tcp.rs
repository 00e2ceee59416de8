//! TCP transport (the usual way to reach an OPC server such as `fcserver`)

use crate::{Connector, Transport};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// Opens [`TcpTransport`]s with bounded connect and write timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
        }
    }
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
        }
    }

    /// Connect to the first resolved address that answers.
    pub fn open(&self, endpoint: &str) -> io::Result<TcpTransport> {
        let mut last_err = None;

        for addr in endpoint.to_socket_addrs()? {
            trace!("Trying {} for {}", addr, endpoint);
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    debug!("TCP connection to {} established", addr);
                    return Ok(TcpTransport { stream });
                },
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{endpoint} did not resolve to any address"),
            )
        }))
    }
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &str) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.open(endpoint)?))
    }
}

/// Blocking TCP stream carrying OPC frames.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_frames_arrive_on_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 7];
            socket.read_exact(&mut buf).unwrap();
            buf
        });

        let mut transport = TcpConnector::default().open(&addr).unwrap();
        transport.write_frame(&[1, 0, 0, 3, 9, 8, 7]).unwrap();

        assert_eq!(server.join().unwrap(), [1, 0, 0, 3, 9, 8, 7]);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new(Duration::from_millis(200), Duration::from_millis(200));
        assert!(connector.open(&format!("127.0.0.1:{port}")).is_err());
    }

    #[test]
    fn test_unresolvable_endpoint() {
        assert!(TcpConnector::default().open("/dev/null").is_err());
    }
}
