use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// Listen backlog used by [`TcpTransport::bind`].
pub const DEFAULT_BACKLOG: i32 = 5;

/// Listening TCP transport.
///
/// Provides bind/accept over TCP, plus a blocking `connect` for the
/// initiating side. The listening socket is closed when this value drops.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `host:port` with the default backlog.
    ///
    /// Port 0 asks the OS for a free port; see [`TcpTransport::local_addr`].
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        Self::bind_with_backlog(host, port, DEFAULT_BACKLOG)
    }

    /// Bind and listen on `host:port` with an explicit backlog.
    ///
    /// `SO_REUSEADDR` is set so a restarted listener can rebind a port that
    /// still has connections in `TIME_WAIT`.
    pub fn bind_with_backlog(host: &str, port: u16, backlog: i32) -> Result<Self> {
        let addr = resolve_first(host, port)?;
        let bind_err = |source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        };

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.listen(backlog).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(%local_addr, backlog, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(WireStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((WireStream::from(stream), peer))
    }

    /// Connect to a listening TCP endpoint (blocking).
    ///
    /// With `Some(timeout)` each resolved address is tried with that connect
    /// timeout; the first success wins.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<WireStream> {
        let label = format!("{host}:{port}");
        let addrs = resolve_all(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout.max(Duration::from_millis(1))),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected to tcp endpoint");
                    let stream = WireStream::from(stream);
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: label,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address to connect to")
            }),
        })
    }

    /// The address this listener is bound to (with the OS-assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// Address a local client should dial to reach a listener bound to `addr`.
///
/// Wildcard binds (`0.0.0.0`, `::`) are not connectable on every platform, so
/// they are rewritten to the loopback address of the same family.
pub fn wake_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

fn resolve_all(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let label = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Connect {
            addr: label.clone(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Unresolved { addr: label });
    }
    Ok(addrs)
}

fn resolve_first(host: &str, port: u16) -> Result<SocketAddr> {
    let label = format!("{host}:{port}");
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Bind {
            addr: label.clone(),
            source,
        })?;
    addrs
        .next()
        .ok_or(TransportError::Unresolved { addr: label })
}
