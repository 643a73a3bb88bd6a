use std::sync::mpsc;

use tagwire_codec::Value;
use tagwire_peer::{ListenerConfig, ListenerHandler, ListenerRuntime, PeerError, PeerListener, Responder};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, EchoArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::kind_label;

enum Event {
    Failed(PeerError),
    Interrupted,
}

struct Echo {
    events: mpsc::Sender<Event>,
    echoed: usize,
}

impl ListenerHandler for Echo {
    fn on_message(&mut self, value: Value, responder: &mut Responder<'_>) -> tagwire_peer::Result<()> {
        info!(peer = %responder.peer_addr(), kind = %kind_label(&value), "echoing message");
        responder.send(&value)?;
        self.echoed = self.echoed.saturating_add(1);
        Ok(())
    }

    fn on_unhandled_error(&mut self, err: PeerError) -> tagwire_peer::Result<()> {
        let _ = self.events.send(Event::Failed(err));
        Ok(())
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let config = ListenerConfig {
        idle_timeout: parse_duration(&args.idle_timeout)?,
        custom_kinds: args.kinds.clone(),
        ..ListenerConfig::default()
    };
    let listener = PeerListener::bind_with_config(&args.endpoint.host, args.endpoint.port, config)
        .map_err(|err| peer_error("bind failed", err))?;
    info!(local_addr = %listener.local_addr(), "echo server listening");

    let (events, inbox) = mpsc::channel();
    install_ctrlc_handler(events.clone(), || Event::Interrupted)?;
    let runtime = ListenerRuntime::start(listener, Echo { events, echoed: 0 })
        .map_err(|err| peer_error("runtime start failed", err))?;

    let failure = match inbox.recv() {
        Ok(Event::Failed(err)) => Some(err),
        Ok(Event::Interrupted) | Err(_) => None,
    };

    match runtime.stop() {
        Ok(finished) => info!(echoed = finished.handler.echoed, "echo server stopped"),
        Err(err) => warn!(error = %err, "echo runtime did not stop cleanly"),
    }

    match failure {
        Some(err) => Err(peer_error("echo failed", err)),
        None => Ok(SUCCESS),
    }
}
