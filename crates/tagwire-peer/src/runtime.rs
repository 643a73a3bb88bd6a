//! Background threads that drive a peer and dispatch lifecycle callbacks.
//!
//! Callbacks run on the runtime's own thread, never on the thread that
//! started it. Errors a callback returns end the current session when they
//! mean the connection is gone; any other error is handed to
//! `on_unhandled_error`, after which the task ends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tagwire_codec::Value;
use tracing::{debug, error, info};

use crate::connector::PeerConnector;
use crate::error::{PeerError, Result};
use crate::link::{PeerSender, ShutdownHandle};
use crate::listener::PeerListener;

/// Reply channel handed to callbacks for the connection being served.
pub struct Responder<'a> {
    sender: &'a PeerSender,
    addr: SocketAddr,
}

impl<'a> Responder<'a> {
    fn new(sender: &'a PeerSender, addr: SocketAddr) -> Self {
        Self { sender, addr }
    }

    /// Send a message back on the current connection.
    pub fn send(&mut self, value: &Value) -> Result<()> {
        self.sender.send(value)
    }

    /// Address of the other end of the current connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Callbacks for a [`ListenerRuntime`].
pub trait ListenerHandler: Send + 'static {
    /// A peer connected.
    fn on_peer_connected(&mut self, _addr: SocketAddr, _responder: &mut Responder<'_>) -> Result<()> {
        Ok(())
    }

    /// A message arrived from the connected peer.
    fn on_message(&mut self, value: Value, responder: &mut Responder<'_>) -> Result<()>;

    /// The peer went away: it hung up, failed, or stayed idle too long.
    fn on_peer_disconnected(&mut self, _addr: SocketAddr) {}

    /// An error that is not a disconnect. Returning `Err` makes the task
    /// fail with it; returning `Ok` ends the task cleanly.
    fn on_unhandled_error(&mut self, err: PeerError) -> Result<()> {
        Err(err)
    }
}

/// Callbacks for a [`ConnectorRuntime`].
pub trait ConnectorHandler: Send + 'static {
    /// A message arrived from the host.
    fn on_message(&mut self, value: Value, responder: &mut Responder<'_>) -> Result<()>;

    /// The connection to the host ended.
    fn on_host_disconnected(&mut self, _addr: SocketAddr) {}

    /// See [`ListenerHandler::on_unhandled_error`].
    fn on_unhandled_error(&mut self, err: PeerError) -> Result<()> {
        Err(err)
    }
}

/// How a runtime task ended.
#[derive(Debug)]
pub struct Finished<H> {
    /// The handler, with whatever state it accumulated.
    pub handler: H,
    /// `Err` when the task ended on an error the handler did not absorb.
    pub result: Result<()>,
}

struct Task<H> {
    running: Arc<AtomicBool>,
    shutdown: ShutdownHandle,
    handle: Option<JoinHandle<Finished<H>>>,
}

impl<H> Task<H> {
    fn spawn<F>(name: &str, running: Arc<AtomicBool>, shutdown: ShutdownHandle, body: F) -> Result<Self>
    where
        F: FnOnce() -> Finished<H> + Send + 'static,
        H: Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(PeerError::Spawn)?;
        Ok(Self {
            running,
            shutdown,
            handle: Some(handle),
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn stop(&mut self) -> Result<Finished<H>> {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.shutdown();
        self.join()
    }

    fn join(&mut self) -> Result<Finished<H>> {
        let handle = self.handle.take().ok_or(PeerError::Closed)?;
        handle.join().map_err(|_| PeerError::TaskPanicked)
    }
}

impl<H> Drop for Task<H> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}

/// Runs a [`PeerListener`] on a background thread.
///
/// The task accepts a peer, serves it until it hangs up or stays silent
/// for the listener's idle timeout, then accepts the next one. Dropping the
/// runtime stops it.
pub struct ListenerRuntime<H: ListenerHandler> {
    task: Task<H>,
    local_addr: SocketAddr,
    sender: PeerSender,
}

impl<H: ListenerHandler> ListenerRuntime<H> {
    /// Start serving `listener` on a new thread.
    pub fn start(listener: PeerListener, mut handler: H) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let local_addr = listener.local_addr();
        let sender = listener.sender();
        let shutdown = listener.shutdown_handle();

        let flag = Arc::clone(&running);
        let task = Task::spawn("tagwire-listener", running, shutdown, move || {
            let mut listener = listener;
            let result = match run_listener(&mut listener, &mut handler, &flag) {
                Ok(()) => Ok(()),
                Err(err) => {
                    error!(error = %err, "listener runtime error");
                    handler.on_unhandled_error(err)
                }
            };
            flag.store(false, Ordering::SeqCst);
            listener.close();
            info!(%local_addr, "listener runtime stopped");
            Finished { handler, result }
        })?;

        Ok(Self {
            task,
            local_addr,
            sender,
        })
    }

    /// Stop the task and wait for it.
    ///
    /// Unblocks a pending accept or receive. Returns the handler.
    pub fn stop(mut self) -> Result<Finished<H>> {
        self.task.stop()
    }

    /// Wait for the task to end on its own.
    pub fn join(mut self) -> Result<Finished<H>> {
        self.task.join()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// The listening address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send to the current peer from outside the callbacks.
    pub fn send(&self, value: &Value) -> Result<()> {
        self.sender.send(value)
    }

    /// Address of the current peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.sender.peer_addr()
    }
}

fn run_listener<H: ListenerHandler>(
    listener: &mut PeerListener,
    handler: &mut H,
    running: &AtomicBool,
) -> Result<()> {
    let idle_timeout = listener.config().idle_timeout;
    let sender = listener.sender();

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok(_) => {}
            Err(PeerError::Closed) => break,
            Err(err) => return Err(err),
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let Some(addr) = listener.peer_addr() else {
            continue;
        };

        let outcome = serve_peer(listener, handler, &sender, addr, idle_timeout);
        listener.disconnect();
        handler.on_peer_disconnected(addr);
        outcome?;
    }
    Ok(())
}

fn serve_peer<H: ListenerHandler>(
    listener: &mut PeerListener,
    handler: &mut H,
    sender: &PeerSender,
    addr: SocketAddr,
    idle_timeout: std::time::Duration,
) -> Result<()> {
    let mut responder = Responder::new(sender, addr);
    if let Err(err) = handler.on_peer_connected(addr, &mut responder) {
        return absorb_disconnect(err);
    }

    loop {
        let value = match listener.receive(Some(idle_timeout), true) {
            Ok(Some(value)) => value,
            Ok(None) | Err(PeerError::NoPeerConnected) => return Ok(()),
            Err(err) if !listener.is_peer_connected() => {
                debug!(peer = %addr, error = %err, "receive error dropped the peer");
                return Ok(());
            }
            Err(err) => return absorb_disconnect(err),
        };
        if let Err(err) = handler.on_message(value, &mut responder) {
            return absorb_disconnect(err);
        }
    }
}

/// Disconnects end the session quietly; everything else propagates.
fn absorb_disconnect(err: PeerError) -> Result<()> {
    if err.is_disconnect() {
        debug!(error = %err, "connection lost");
        Ok(())
    } else {
        Err(err)
    }
}

/// Runs a [`PeerConnector`] on a background thread.
///
/// The task receives until the host hangs up or the connection fails, then
/// calls `on_host_disconnected` and ends. Receive timeouts are idle polls.
pub struct ConnectorRuntime<H: ConnectorHandler> {
    task: Task<H>,
    host_addr: SocketAddr,
    sender: PeerSender,
}

impl<H: ConnectorHandler> ConnectorRuntime<H> {
    /// Start receiving on `connector` on a new thread.
    pub fn start(connector: PeerConnector, mut handler: H) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let host_addr = connector.host_addr();
        let sender = connector.sender();
        let shutdown = connector.shutdown_handle();

        let flag = Arc::clone(&running);
        let task = Task::spawn("tagwire-connector", running, shutdown, move || {
            let mut connector = connector;
            let result = match run_connector(&mut connector, &mut handler, &flag) {
                Ok(()) => Ok(()),
                Err(err) => {
                    error!(error = %err, "connector runtime error");
                    handler.on_unhandled_error(err)
                }
            };
            flag.store(false, Ordering::SeqCst);
            connector.close();
            info!(host = %host_addr, "connector runtime stopped");
            Finished { handler, result }
        })?;

        Ok(Self {
            task,
            host_addr,
            sender,
        })
    }

    /// Stop the task and wait for it.
    pub fn stop(mut self) -> Result<Finished<H>> {
        self.task.stop()
    }

    /// Wait for the task to end on its own.
    pub fn join(mut self) -> Result<Finished<H>> {
        self.task.join()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn host_addr(&self) -> SocketAddr {
        self.host_addr
    }

    /// Send to the host from outside the callbacks.
    pub fn send(&self, value: &Value) -> Result<()> {
        self.sender.send(value)
    }
}

fn run_connector<H: ConnectorHandler>(
    connector: &mut PeerConnector,
    handler: &mut H,
    running: &AtomicBool,
) -> Result<()> {
    let host = connector.host_addr();
    let sender = connector.sender();
    let mut responder = Responder::new(&sender, host);

    let outcome = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        let value = match connector.receive(None) {
            Ok(Some(value)) => value,
            Ok(None) | Err(PeerError::NotConnected) => break Ok(()),
            Err(PeerError::ReceiveTimeout) => continue,
            Err(err) if !connector.is_connected() => {
                debug!(%host, error = %err, "receive error closed the connection");
                break Ok(());
            }
            Err(err) => break absorb_disconnect(err),
        };
        if let Err(err) = handler.on_message(value, &mut responder) {
            break absorb_disconnect(err);
        }
    };

    connector.close();
    handler.on_host_disconnected(host);
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::*;

    struct Silent;

    impl ListenerHandler for Silent {
        fn on_message(&mut self, _value: Value, _responder: &mut Responder<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stop_unblocks_pending_accept() {
        let listener = PeerListener::bind("127.0.0.1", 0).expect("listener should bind");
        let runtime = ListenerRuntime::start(listener, Silent).expect("runtime should start");
        assert!(runtime.is_running());
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        let finished = runtime.stop().expect("task should not panic");
        assert!(finished.result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    struct Reporting {
        events: mpsc::Sender<String>,
    }

    impl ListenerHandler for Reporting {
        fn on_message(&mut self, _value: Value, _responder: &mut Responder<'_>) -> Result<()> {
            Err(PeerError::Closed)
        }

        fn on_unhandled_error(&mut self, err: PeerError) -> Result<()> {
            let _ = self.events.send(err.to_string());
            Ok(())
        }
    }

    #[test]
    fn unhandled_error_reaches_handler_and_ends_task() {
        let listener = PeerListener::bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr();
        let (tx, rx) = mpsc::channel();
        let runtime = ListenerRuntime::start(listener, Reporting { events: tx }).unwrap();

        let mut client = PeerConnector::connect("127.0.0.1", addr.port()).unwrap();
        client.send(&Value::from(1)).unwrap();

        let reported = rx.recv_timeout(Duration::from_secs(5)).expect("error should be reported");
        assert!(reported.contains("closed"));

        let finished = runtime.join().unwrap();
        assert!(finished.result.is_ok());
    }

    #[test]
    fn default_unhandled_error_fails_the_task() {
        struct Failing;
        impl ListenerHandler for Failing {
            fn on_message(&mut self, _value: Value, _responder: &mut Responder<'_>) -> Result<()> {
                Err(PeerError::ReceiveTimeout)
            }
        }

        let listener = PeerListener::bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr();
        let runtime = ListenerRuntime::start(listener, Failing).unwrap();

        let mut client = PeerConnector::connect("127.0.0.1", addr.port()).unwrap();
        client.send(&Value::Null).unwrap();

        let finished = runtime.join().unwrap();
        assert!(matches!(finished.result, Err(PeerError::ReceiveTimeout)));
    }

    #[test]
    fn responder_error_after_disconnect_is_not_unhandled() {
        let err = absorb_disconnect(PeerError::Frame(tagwire_frame::FrameError::ConnectionClosed));
        assert!(err.is_ok());
        assert!(absorb_disconnect(PeerError::Closed).is_err());
    }
}
