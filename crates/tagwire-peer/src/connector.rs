use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tagwire_codec::{Codec, Value};
use tagwire_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use tagwire_transport::{TcpTransport, WireStream};
use tracing::{debug, info, warn};

use crate::config::ConnectorConfig;
use crate::error::{PeerError, Result};
use crate::link::{Link, PeerSender, Role, ShutdownHandle};

/// Initiating side of a connection.
///
/// ```text
/// let reply = PeerConnector::connect("127.0.0.1", 9000)?
///     .send(&request)?
///     .receive_and_close(None)?;
/// ```
pub struct PeerConnector {
    reader: Option<FrameReader<WireStream>>,
    host_addr: SocketAddr,
    codec: Codec,
    config: ConnectorConfig,
    link: Arc<Link>,
}

impl PeerConnector {
    /// Connect to `host:port` with default configuration (3 s timeout).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, ConnectorConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config(host: &str, port: u16, config: ConnectorConfig) -> Result<Self> {
        let codec = config.codec()?;
        let stream = TcpTransport::connect(host, port, Some(config.timeout))?;
        let host_addr = stream.peer_addr()?;

        let frame = FrameConfig {
            read_timeout: Some(config.read_timeout()),
            ..config.frame.clone()
        };
        let control = stream.try_clone()?;
        let reader = FrameReader::with_config_wire(stream.try_clone()?, frame.clone())?;
        let writer = FrameWriter::with_config_wire(stream, frame)?;

        let link = Arc::new(Link::new(Role::Connector));
        link.attach(host_addr, control, writer);
        info!(host = %host_addr, "connected");

        Ok(Self {
            reader: Some(reader),
            host_addr,
            codec,
            config,
            link,
        })
    }

    /// Send one message.
    pub fn send(&mut self, value: &Value) -> Result<&mut Self> {
        if self.reader.is_none() {
            return Err(PeerError::NotConnected);
        }
        self.link.send(&self.codec, value)?;
        Ok(self)
    }

    /// Receive the next message.
    ///
    /// `None` waits for the configured read timeout. Returns `Ok(None)` when
    /// the host closes the connection, after which the connector is closed.
    /// A timeout is [`PeerError::ReceiveTimeout`] and leaves the connection
    /// open. An oversized frame is an error and closes the connection.
    pub fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Value>> {
        let timeout = timeout.unwrap_or(self.config.read_timeout());
        let reader = self.reader.as_mut().ok_or(PeerError::NotConnected)?;
        match reader.receive_value_timeout(&self.codec, Some(timeout)) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                debug!(host = %self.host_addr, "host closed connection");
                self.close();
                Ok(None)
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => {
                warn!(host = %self.host_addr, error = %err, "oversized frame, closing connection");
                self.close();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Receive one message, then close whether or not the receive succeeded.
    pub fn receive_and_close(&mut self, timeout: Option<Duration>) -> Result<Option<Value>> {
        let result = self.receive(timeout);
        self.close();
        result
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        self.link.close();
        if self.reader.take().is_some() {
            info!(host = %self.host_addr, "connection closed");
        }
    }

    /// Handle that closes this connection from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.link), None)
    }

    /// Handle that sends on this connection from another thread.
    pub fn sender(&self) -> PeerSender {
        PeerSender::new(Arc::clone(&self.link), self.codec.clone())
    }

    /// Address of the host this connector dialed.
    pub fn host_addr(&self) -> SocketAddr {
        self.host_addr
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some() && !self.link.is_closed()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }
}

impl Drop for PeerConnector {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PeerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnector")
            .field("host", &self.host_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}
