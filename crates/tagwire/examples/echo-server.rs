//! Minimal echo server: accepts one peer at a time and echoes messages back.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:9400 \
//!     --json '{"hello":{"_decode_type":"bytes","_content":"ff00"}}' --wait

use std::time::Duration;

use tagwire::peer::PeerListener;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut listener = PeerListener::bind("127.0.0.1", 9400)?;
    eprintln!("Listening on {}", listener.local_addr());

    loop {
        listener.accept()?;
        let peer = listener
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        eprintln!("Peer connected: {peer}");

        // Drop peers that stay silent for 30 seconds.
        while let Some(value) = listener.receive(Some(Duration::from_secs(30)), true)? {
            eprintln!("Received {value:?}");
            listener.send(&value)?;
        }
        eprintln!("Peer disconnected: {peer}");
    }
}
