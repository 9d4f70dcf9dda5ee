use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use ciservice_config::ServerEndpoint;

use super::errors::ConnectionError;

/// Byte stream to the server as seen by the connection manager.
pub trait Transport: Write + Send {
    /// Independent read handle consumed by the reader thread.
    ///
    /// # Errors
    ///
    /// Returns the socket error when the handle cannot be duplicated.
    fn reader(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Applies socket options once the connection is up.
    ///
    /// # Errors
    ///
    /// Returns the socket error when an option is rejected.
    fn configure(&self, write_timeout: Duration) -> io::Result<()>;

    /// Half-closes, then fully closes the stream, waking the reader.
    ///
    /// # Errors
    ///
    /// Returns the socket error when shutdown fails.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens transports to an endpoint. Called on a helper thread.
pub trait Connector: Send + Sync {
    /// Connects to `endpoint`, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when no connection could be made.
    fn connect(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// Connector using blocking TCP sockets.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Builds a connector giving each address `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(super::CONNECT_TIMEOUT)
    }
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn Transport>, ConnectionError> {
        let addresses = (endpoint.host(), endpoint.port())
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.connect_timeout) {
                Ok(stream) => return Ok(Box::new(TcpTransport::new(stream))),
                Err(error) => last_error = Some(error),
            }
        }
        Err(match last_error {
            Some(source) => ConnectionError::Connect {
                endpoint: endpoint.to_string(),
                source,
            },
            None => ConnectionError::NoAddress {
                endpoint: endpoint.to_string(),
            },
        })
    }
}

/// [`Transport`] over a TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wraps a connected stream.
    #[must_use]
    pub const fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.stream.try_clone()?))
    }

    fn configure(&self, write_timeout: Duration) -> io::Result<()> {
        self.stream.set_nodelay(true)?;
        self.stream.set_write_timeout(Some(write_timeout))
    }

    fn close(&mut self) -> io::Result<()> {
        ignore_not_connected(self.stream.flush())?;
        ignore_not_connected(self.stream.shutdown(Shutdown::Write))?;
        ignore_not_connected(self.stream.shutdown(Shutdown::Both))
    }
}

fn ignore_not_connected(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(error) if error.kind() == ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}
