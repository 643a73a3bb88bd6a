use std::net::SocketAddr;
use std::sync::mpsc;

use tagwire_codec::Value;
use tagwire_peer::{ListenerConfig, ListenerHandler, ListenerRuntime, PeerError, PeerListener, Responder};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

enum Event {
    Message { peer: SocketAddr, value: Value },
    Failed(PeerError),
    Interrupted,
}

/// Forwards runtime callbacks to the printing thread.
struct Forwarder {
    events: mpsc::Sender<Event>,
}

impl ListenerHandler for Forwarder {
    fn on_message(&mut self, value: Value, responder: &mut Responder<'_>) -> tagwire_peer::Result<()> {
        let _ = self.events.send(Event::Message {
            peer: responder.peer_addr(),
            value,
        });
        Ok(())
    }

    fn on_unhandled_error(&mut self, err: PeerError) -> tagwire_peer::Result<()> {
        let _ = self.events.send(Event::Failed(err));
        Ok(())
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ListenerConfig {
        idle_timeout: parse_duration(&args.idle_timeout)?,
        custom_kinds: args.kinds.clone(),
        ..ListenerConfig::default()
    };
    let listener = PeerListener::bind_with_config(&args.endpoint.host, args.endpoint.port, config)
        .map_err(|err| peer_error("bind failed", err))?;
    let codec = listener.codec().clone();
    info!(local_addr = %listener.local_addr(), "listening");

    let (events, inbox) = mpsc::channel();
    install_ctrlc_handler(events.clone(), || Event::Interrupted)?;
    let runtime = ListenerRuntime::start(listener, Forwarder { events })
        .map_err(|err| peer_error("runtime start failed", err))?;

    let mut printed = 0usize;
    let mut failure = None;
    while let Ok(event) = inbox.recv() {
        match event {
            Event::Message { peer, value } => {
                print_message(&codec, peer, &value, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Event::Failed(err) => {
                failure = Some(err);
                break;
            }
            Event::Interrupted => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    if let Err(err) = runtime.stop() {
        warn!(error = %err, "listener runtime did not stop cleanly");
    }

    match failure {
        Some(err) => Err(peer_error("receive failed", err)),
        None => Ok(SUCCESS),
    }
}
