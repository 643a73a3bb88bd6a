use std::fmt;
use std::str::FromStr;
use std::sync::mpsc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// `host:port`, with IPv6 hosts in brackets (`[::1]:9000`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| format!("expected HOST:PORT, got '{input}'"))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(format!("missing host in '{input}'"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("invalid port in '{input}'"))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (HOST:PORT).
    pub endpoint: Endpoint,
    /// Disconnect a peer after this long without a message (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub idle_timeout: String,
    /// Custom wrapper kinds to accept (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (HOST:PORT).
    pub endpoint: Endpoint,
    /// Message in wire JSON. Tagged wrappers are decoded before sending.
    #[arg(long)]
    pub json: String,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub wait_timeout: String,
    /// Custom wrapper kinds to accept (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (HOST:PORT).
    pub endpoint: Endpoint,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Disconnect a peer after this long without a message (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub idle_timeout: String,
    /// Custom wrapper kinds to accept (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Route Ctrl-C into the command's event channel.
pub fn install_ctrlc_handler<E: Send + 'static>(events: mpsc::Sender<E>, event: fn() -> E) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = events.send(event());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn endpoint_parsing() {
        let ep: Endpoint = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(ep.host, "127.0.0.1");
        assert_eq!(ep.port, 9000);

        let ep: Endpoint = "[::1]:80".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.to_string(), "[::1]:80");

        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":80".parse::<Endpoint>().is_err());
        assert!("localhost:99999".parse::<Endpoint>().is_err());
    }
}
