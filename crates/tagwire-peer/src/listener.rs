use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tagwire_codec::{Codec, Value};
use tagwire_frame::{FrameError, FrameReader, FrameWriter};
use tagwire_transport::TcpTransport;
use tracing::{debug, info, warn};

use crate::config::ListenerConfig;
use crate::error::{PeerError, Result};
use crate::link::{AcceptWake, Link, PeerSender, Role, ShutdownHandle};

struct ConnectedPeer {
    addr: SocketAddr,
    reader: FrameReader<tagwire_transport::WireStream>,
}

/// Listening side of a connection: accepts one peer at a time.
///
/// ```text
/// let mut listener = PeerListener::bind("127.0.0.1", 9000)?;
/// loop {
///     let request = listener.accept()?.receive(None, false)?;
///     listener.send(&Value::from("ok"))?;
/// }
/// ```
///
/// Accepting a new peer disconnects the previous one.
pub struct PeerListener {
    transport: Option<TcpTransport>,
    local_addr: SocketAddr,
    peer: Option<ConnectedPeer>,
    codec: Codec,
    config: ListenerConfig,
    link: Arc<Link>,
    wake: Arc<AcceptWake>,
}

impl PeerListener {
    /// Bind and listen on `host:port` with default configuration.
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        Self::bind_with_config(host, port, ListenerConfig::default())
    }

    /// Bind and listen with explicit configuration.
    pub fn bind_with_config(host: &str, port: u16, config: ListenerConfig) -> Result<Self> {
        let codec = config.codec()?;
        let transport = TcpTransport::bind_with_backlog(host, port, config.backlog)?;
        let local_addr = transport.local_addr();
        Ok(Self {
            transport: Some(transport),
            local_addr,
            peer: None,
            codec,
            config,
            link: Arc::new(Link::new(Role::Listener)),
            wake: Arc::new(AcceptWake::new(local_addr)),
        })
    }

    /// Wait for the next peer, disconnecting the current one first.
    ///
    /// Fails with [`PeerError::Closed`] when the listener was closed, including
    /// when a [`ShutdownHandle`] fires while this call is blocked.
    pub fn accept(&mut self) -> Result<&mut Self> {
        self.disconnect();

        self.wake.set_accepting(true);
        if self.link.is_closed() {
            self.wake.set_accepting(false);
            return Err(PeerError::Closed);
        }
        let accepted = match self.transport.as_ref() {
            Some(transport) => transport.accept(),
            None => {
                self.wake.set_accepting(false);
                return Err(PeerError::Closed);
            }
        };
        self.wake.set_accepting(false);

        let (stream, addr) = accepted?;
        if self.link.is_closed() {
            debug!(peer = %addr, "discarding connection accepted during shutdown");
            let _ = stream.shutdown();
            return Err(PeerError::Closed);
        }

        let control = stream.try_clone()?;
        let reader = FrameReader::with_config_wire(stream.try_clone()?, self.config.frame.clone())?;
        let writer = FrameWriter::with_config_wire(stream, self.config.frame.clone())?;
        self.link.attach(addr, control, writer);
        if self.link.is_closed() {
            self.link.detach();
            return Err(PeerError::Closed);
        }

        info!(peer = %addr, "peer connected");
        self.peer = Some(ConnectedPeer { addr, reader });
        Ok(self)
    }

    /// Send one message to the connected peer.
    pub fn send(&mut self, value: &Value) -> Result<&mut Self> {
        if self.peer.is_none() {
            return Err(PeerError::NoPeerConnected);
        }
        self.link.send(&self.codec, value)?;
        Ok(self)
    }

    /// Receive the next message from the connected peer.
    ///
    /// `timeout` bounds the wait for a message to start; `None` blocks
    /// indefinitely. Returns `Ok(None)` when the timeout elapses (the peer is
    /// disconnected first if `close_on_timeout` is set) and when the peer
    /// closes the connection. A frame longer than the configured maximum is
    /// an error and disconnects the peer.
    pub fn receive(
        &mut self,
        timeout: Option<Duration>,
        close_on_timeout: bool,
    ) -> Result<Option<Value>> {
        let peer = self.peer.as_mut().ok_or(PeerError::NoPeerConnected)?;
        match peer.reader.receive_value_timeout(&self.codec, timeout) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                debug!(peer = %peer.addr, "peer closed connection");
                self.disconnect();
                Ok(None)
            }
            Err(FrameError::ReceiveTimeout) => {
                if close_on_timeout {
                    debug!(peer = %peer.addr, ?timeout, "receive timed out, disconnecting peer");
                    self.disconnect();
                }
                Ok(None)
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => {
                // The rest of the stream cannot be re-synchronised.
                warn!(peer = %peer.addr, error = %err, "oversized frame, disconnecting peer");
                self.disconnect();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Disconnect the current peer, if any. The listener keeps listening.
    pub fn disconnect(&mut self) {
        if let Some(peer) = self.peer.take() {
            self.link.detach();
            info!(peer = %peer.addr, "peer disconnected");
        }
    }

    /// Close the peer connection, then the listening socket.
    ///
    /// Idempotent. To close from another thread, use [`PeerListener::shutdown_handle`].
    pub fn close(&mut self) {
        self.link.close();
        self.peer = None;
        if self.transport.take().is_some() {
            info!(local_addr = %self.local_addr, "listener closed");
        }
    }

    /// Handle that closes this listener from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.link), Some(Arc::clone(&self.wake)))
    }

    /// Handle that sends to the current peer from another thread.
    pub fn sender(&self) -> PeerSender {
        PeerSender::new(Arc::clone(&self.link), self.codec.clone())
    }

    /// The bound address, with the OS-assigned port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.as_ref().map(|peer| peer.addr)
    }

    pub fn is_peer_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Returns true while some thread is blocked in [`PeerListener::accept`].
    pub fn is_accepting(&self) -> bool {
        self.wake.is_accepting()
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}

impl Drop for PeerListener {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PeerListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerListener")
            .field("local_addr", &self.local_addr)
            .field("peer", &self.peer_addr())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpStream;
    use std::thread;
    use std::time::Instant;

    use tagwire_frame::FrameWriter;
    use tagwire_transport::WireStream;

    use super::*;

    fn bind_local() -> PeerListener {
        PeerListener::bind("127.0.0.1", 0).expect("listener should bind")
    }

    fn dial(addr: SocketAddr) -> WireStream {
        WireStream::from(TcpStream::connect(addr).expect("client should connect"))
    }

    #[test]
    fn send_and_receive_without_peer_fail() {
        let mut listener = bind_local();
        assert!(matches!(
            listener.send(&Value::Null),
            Err(PeerError::NoPeerConnected)
        ));
        assert!(matches!(
            listener.receive(None, false),
            Err(PeerError::NoPeerConnected)
        ));
    }

    #[test]
    fn accept_records_peer_and_receives() {
        let mut listener = bind_local();
        let addr = listener.local_addr();

        let client = thread::spawn(move || {
            let mut writer = FrameWriter::new(dial(addr));
            writer
                .send_value(&Codec::new(), &Value::bytes(vec![0xff, 0x00]))
                .expect("client should send");
            writer
        });

        listener.accept().expect("listener should accept");
        assert!(listener.is_peer_connected());
        assert!(listener.peer_addr().is_some());

        let value = listener.receive(Some(Duration::from_secs(5)), false).unwrap();
        assert_eq!(value, Some(Value::bytes(vec![0xff, 0x00])));
        let _writer = client.join().expect("client thread should finish");
    }

    #[test]
    fn accept_evicts_previous_peer() {
        let mut listener = bind_local();
        let addr = listener.local_addr();

        let mut first = dial(addr);
        listener.accept().expect("first accept");
        let first_addr = listener.peer_addr();

        let _second = dial(addr);
        listener.accept().expect("second accept");
        assert_ne!(listener.peer_addr(), first_addr);

        // The first peer sees EOF.
        first
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(first.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn timeout_keeps_or_drops_peer_per_flag() {
        let mut listener = bind_local();
        let _client = dial(listener.local_addr());
        listener.accept().unwrap();

        let start = Instant::now();
        let value = listener
            .receive(Some(Duration::from_millis(100)), false)
            .unwrap();
        assert!(value.is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(listener.is_peer_connected());

        let value = listener
            .receive(Some(Duration::from_millis(100)), true)
            .unwrap();
        assert!(value.is_none());
        assert!(!listener.is_peer_connected());
    }

    #[test]
    fn oversized_frame_disconnects_peer() {
        use std::io::Write;

        let mut listener = bind_local();
        let mut client = dial(listener.local_addr());
        listener.accept().unwrap();

        let mut wire = u32::MAX.to_be_bytes().to_vec();
        let mut valid = bytes::BytesMut::new();
        tagwire_frame::encode_frame(b"1", &mut valid).unwrap();
        wire.extend_from_slice(&valid);
        client.write_all(&wire).unwrap();

        let err = listener
            .receive(Some(Duration::from_secs(5)), false)
            .unwrap_err();
        assert!(matches!(
            err,
            PeerError::Frame(FrameError::PayloadTooLarge { .. })
        ));
        assert!(!listener.is_peer_connected());
        assert!(matches!(
            listener.receive(Some(Duration::from_millis(50)), false),
            Err(PeerError::NoPeerConnected)
        ));

        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(client.read(&mut buf), Ok(0) | Err(_)));
    }

    #[test]
    fn graceful_peer_close_clears_peer() {
        let mut listener = bind_local();
        let client = dial(listener.local_addr());
        listener.accept().unwrap();
        drop(client);

        let value = listener.receive(Some(Duration::from_secs(5)), false).unwrap();
        assert!(value.is_none());
        assert!(!listener.is_peer_connected());
    }

    #[test]
    fn close_is_idempotent_and_accept_fails_after() {
        let mut listener = bind_local();
        listener.close();
        listener.close();
        assert!(listener.is_closed());
        assert!(matches!(listener.accept(), Err(PeerError::Closed)));
    }

    #[test]
    fn shutdown_handle_unblocks_accept() {
        let mut listener = bind_local();
        let handle = listener.shutdown_handle();

        let acceptor = thread::spawn(move || {
            let result = listener.accept().map(|_| ());
            (listener, result)
        });

        // Either order works: a shutdown that lands before the accept starts
        // is seen by the closed check, one that lands after is woken.
        thread::sleep(Duration::from_millis(50));
        handle.shutdown();

        let (listener, result) = acceptor.join().expect("accept thread should finish");
        assert!(matches!(result, Err(PeerError::Closed)));
        assert!(listener.is_closed());
        assert!(!listener.is_accepting());
    }

    #[test]
    fn bind_on_wildcard_can_still_be_woken() {
        let mut listener = PeerListener::bind("0.0.0.0", 0).expect("wildcard bind");
        let handle = listener.shutdown_handle();
        let acceptor = thread::spawn(move || listener.accept().map(|_| ()));

        thread::sleep(Duration::from_millis(50));
        handle.shutdown();
        let result = acceptor.join().expect("accept thread should finish");
        assert!(matches!(result, Err(PeerError::Closed)));
    }
}
