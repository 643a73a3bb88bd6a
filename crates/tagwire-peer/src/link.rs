//! State shared between a peer and the handles it gives out to other threads.
//!
//! The owning peer keeps the read half of the connection. The write half and
//! a control clone of the socket live here so that a [`PeerSender`] can write
//! and a [`ShutdownHandle`] can unblock the owner from any thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tagwire_codec::{Codec, Value};
use tagwire_frame::FrameWriter;
use tagwire_transport::{wake_address, TcpTransport, WireStream};
use tracing::{debug, warn};

use crate::error::{PeerError, Result};

const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Listener,
    Connector,
}

impl Role {
    fn missing(self) -> PeerError {
        match self {
            Role::Listener => PeerError::NoPeerConnected,
            Role::Connector => PeerError::NotConnected,
        }
    }
}

struct Attached {
    addr: SocketAddr,
    writer: FrameWriter<WireStream>,
}

pub(crate) struct Link {
    role: Role,
    closed: AtomicBool,
    control: Mutex<Option<WireStream>>,
    writer: Mutex<Option<Attached>>,
}

impl Link {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            closed: AtomicBool::new(false),
            control: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Install the write half of a new connection, shutting down any previous one.
    pub(crate) fn attach(&self, addr: SocketAddr, control: WireStream, writer: FrameWriter<WireStream>) {
        if let Some(old) = lock(&self.control).replace(control) {
            if let Err(err) = old.shutdown() {
                debug!(error = %err, "socket shutdown failed");
            }
        }
        *lock(&self.writer) = Some(Attached { addr, writer });
    }

    /// Shut the current connection down and forget it.
    ///
    /// Returns false when nothing was attached.
    pub(crate) fn detach(&self) -> bool {
        let control = lock(&self.control).take();
        let had_control = control.is_some();
        if let Some(stream) = control {
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "socket shutdown failed");
            }
        }
        let had_writer = lock(&self.writer).take().is_some();
        had_control || had_writer
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.detach();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_attached(&self) -> bool {
        lock(&self.control).is_some()
    }

    pub(crate) fn send(&self, codec: &Codec, value: &Value) -> Result<()> {
        let mut guard = lock(&self.writer);
        let attached = guard.as_mut().ok_or_else(|| self.role.missing())?;
        attached.writer.send_value(codec, value)?;
        Ok(())
    }

    pub(crate) fn addr(&self) -> Option<SocketAddr> {
        lock(&self.writer).as_ref().map(|attached| attached.addr)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks whether the owning listener is blocked in `accept()`.
pub(crate) struct AcceptWake {
    accepting: AtomicBool,
    local_addr: SocketAddr,
}

impl AcceptWake {
    pub(crate) fn new(local_addr: SocketAddr) -> Self {
        Self {
            accepting: AtomicBool::new(false),
            local_addr,
        }
    }

    pub(crate) fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Unblock a pending accept by connecting to the listener and hanging up.
    fn wake(&self) {
        if !self.is_accepting() {
            return;
        }
        let target = wake_address(self.local_addr);
        match TcpTransport::connect(
            &target.ip().to_string(),
            target.port(),
            Some(WAKE_CONNECT_TIMEOUT),
        ) {
            Ok(stream) => {
                debug!(%target, "woke pending accept");
                drop(stream);
            }
            Err(err) => warn!(%target, error = %err, "failed to wake pending accept"),
        }
    }
}

/// Cross-thread handle that shuts a peer down.
///
/// Shutting down closes the active connection, so a thread blocked in
/// `receive` sees the peer go away. For a listener blocked in `accept`, the
/// handle opens and immediately drops a loopback connection to the listening
/// address so the accept returns; the listener then reports
/// [`PeerError::Closed`].
#[derive(Clone)]
pub struct ShutdownHandle {
    link: Arc<Link>,
    wake: Option<Arc<AcceptWake>>,
}

impl ShutdownHandle {
    pub(crate) fn new(link: Arc<Link>, wake: Option<Arc<AcceptWake>>) -> Self {
        Self { link, wake }
    }

    /// Close the peer. Safe to call more than once and from any thread.
    pub fn shutdown(&self) {
        self.link.close();
        if let Some(wake) = &self.wake {
            wake.wake();
        }
    }

    /// Returns true once the peer has been shut down or closed.
    pub fn is_shutdown(&self) -> bool {
        self.link.is_closed()
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("role", &self.link.role)
            .field("closed", &self.link.is_closed())
            .finish()
    }
}

/// Cross-thread handle that sends to whichever connection is current.
///
/// Sends are serialized with the owner's own sends, so frames never
/// interleave.
#[derive(Clone)]
pub struct PeerSender {
    link: Arc<Link>,
    codec: Codec,
}

impl PeerSender {
    pub(crate) fn new(link: Arc<Link>, codec: Codec) -> Self {
        Self { link, codec }
    }

    /// Encode and send one message.
    pub fn send(&self, value: &Value) -> Result<()> {
        self.link.send(&self.codec, value)
    }

    /// Address of the connection messages currently go to.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.addr()
    }

    /// Returns true while a connection is attached.
    pub fn is_connected(&self) -> bool {
        self.link.is_attached()
    }
}

impl std::fmt::Debug for PeerSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSender")
            .field("role", &self.link.role)
            .field("peer", &self.link.addr())
            .finish()
    }
}
