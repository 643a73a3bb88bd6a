use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// Smallest timeout handed to the socket; the OS rejects a zero duration.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// A connected TCP stream: implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
pub struct WireStream {
    inner: TcpStream,
}

impl Read for WireStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl From<TcpStream> for WireStream {
    fn from(inner: TcpStream) -> Self {
        Self { inner }
    }
}

impl WireStream {
    /// Set read timeout on the underlying stream.
    ///
    /// `None` blocks indefinitely. A zero duration is clamped to 1 ms.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout.map(clamp_timeout))
            .map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_write_timeout(timeout.map(clamp_timeout))
            .map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self::from(self.inner.try_clone()?))
    }

    /// Shut down both directions of the connection.
    ///
    /// Any thread blocked reading from a clone of this stream wakes up with
    /// EOF or an error. Shutting down an already closed stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Toggle `TCP_NODELAY`.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.max(MIN_TIMEOUT)
}

impl std::fmt::Debug for WireStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("WireStream");
        if let Ok(peer) = self.inner.peer_addr() {
            dbg.field("peer", &peer);
        }
        dbg.finish()
    }
}
