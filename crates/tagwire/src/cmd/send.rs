use tagwire_codec::{Codec, Value};
use tagwire_peer::{ConnectorConfig, PeerConnector, PeerError};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{codec_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = ConnectorConfig {
        custom_kinds: args.kinds.clone(),
        ..ConnectorConfig::default()
    };
    let value = resolve_payload(&args, &config)?;

    let mut connector =
        PeerConnector::connect_with_config(&args.endpoint.host, args.endpoint.port, config)
            .map_err(|err| peer_error("connect failed", err))?;
    connector
        .send(&value)
        .map_err(|err| peer_error("send failed", err))?;

    if args.wait {
        let host = connector.host_addr();
        let codec = connector.codec().clone();
        match wait_for_reply(&mut connector, wait_timeout) {
            Ok(reply) => print_message(&codec, host, &reply, format),
            Err(err) => return Err(peer_error("receive failed", err)),
        }
    } else {
        connector.close();
    }

    Ok(SUCCESS)
}

/// Parse `--json` as wire JSON, so wrappers like `{"_decode_type":"bytes",...}`
/// travel as the typed values they describe.
fn resolve_payload(args: &SendArgs, config: &ConnectorConfig) -> CliResult<Value> {
    let codec = Codec::with_kinds(config.custom_kinds.iter().cloned())
        .map_err(|err| codec_error("invalid --kinds", err))?;
    codec
        .from_slice(args.json.as_bytes())
        .map_err(|err| CliError::new(USAGE, format!("--json is not a valid message: {err}")))
}

trait ReplyReceiver {
    fn receive_reply(&mut self, timeout: std::time::Duration) -> Result<Option<Value>, PeerError>;
}

impl ReplyReceiver for PeerConnector {
    fn receive_reply(&mut self, timeout: std::time::Duration) -> Result<Option<Value>, PeerError> {
        self.receive_and_close(Some(timeout))
    }
}

/// A host that hangs up without replying is an error for `--wait`.
fn wait_for_reply<R: ReplyReceiver>(
    receiver: &mut R,
    timeout: std::time::Duration,
) -> Result<Value, PeerError> {
    receiver.receive_reply(timeout)?.ok_or(PeerError::NotConnected)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cmd::Endpoint;

    struct MockReceiver {
        reply: Option<Result<Option<Value>, PeerError>>,
        timeout: Option<Duration>,
    }

    impl ReplyReceiver for MockReceiver {
        fn receive_reply(&mut self, timeout: Duration) -> Result<Option<Value>, PeerError> {
            self.timeout = Some(timeout);
            self.reply.take().unwrap_or(Ok(None))
        }
    }

    fn args(json: &str) -> SendArgs {
        SendArgs {
            endpoint: Endpoint {
                host: "127.0.0.1".to_string(),
                port: 1,
            },
            json: json.to_string(),
            wait: false,
            wait_timeout: "3s".to_string(),
            kinds: Vec::new(),
        }
    }

    #[test]
    fn wait_passes_timeout_and_returns_reply() {
        let mut receiver = MockReceiver {
            reply: Some(Ok(Some(Value::from("pong")))),
            timeout: None,
        };
        let reply = wait_for_reply(&mut receiver, Duration::from_millis(250)).unwrap();
        assert_eq!(reply, Value::from("pong"));
        assert_eq!(receiver.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn wait_treats_hangup_as_error() {
        let mut receiver = MockReceiver {
            reply: Some(Ok(None)),
            timeout: None,
        };
        assert!(matches!(
            wait_for_reply(&mut receiver, Duration::from_secs(1)),
            Err(PeerError::NotConnected)
        ));
    }

    #[test]
    fn wait_propagates_timeout() {
        let mut receiver = MockReceiver {
            reply: Some(Err(PeerError::ReceiveTimeout)),
            timeout: None,
        };
        assert!(matches!(
            wait_for_reply(&mut receiver, Duration::from_secs(1)),
            Err(PeerError::ReceiveTimeout)
        ));
    }

    #[test]
    fn payload_decodes_wrappers() {
        let value = resolve_payload(
            &args(r#"{"a":{"_decode_type":"bytes","_content":"ff00"}}"#),
            &ConnectorConfig::default(),
        )
        .unwrap();
        assert_eq!(value.get("a"), Some(&Value::bytes(vec![0xff, 0x00])));
    }

    #[test]
    fn invalid_payload_is_usage_error() {
        let err = resolve_payload(&args("{not json"), &ConnectorConfig::default()).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
