use std::time::Duration;

use tagwire_codec::Codec;
use tagwire_frame::FrameConfig;
use tagwire_transport::DEFAULT_BACKLOG;

use crate::error::Result;

/// Default idle timeout for a listener runtime session.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connect and read timeout for connectors.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Listener-side configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Pending connection backlog passed to `listen`.
    pub backlog: i32,
    /// How long a runtime session waits for the next message before it
    /// treats the peer as gone.
    pub idle_timeout: Duration,
    /// Framing limits and socket timeouts for accepted peers.
    pub frame: FrameConfig,
    /// Application kinds the codec accepts when decoding.
    pub custom_kinds: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            frame: FrameConfig::default(),
            custom_kinds: Vec::new(),
        }
    }
}

impl ListenerConfig {
    pub(crate) fn codec(&self) -> Result<Codec> {
        Ok(Codec::with_kinds(self.custom_kinds.iter().cloned())?)
    }
}

/// Initiator-side configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Connect timeout, also the default receive timeout.
    pub timeout: Duration,
    /// Framing limits and write timeout. `frame.read_timeout` is replaced by
    /// `timeout` when unset.
    pub frame: FrameConfig,
    /// Application kinds the codec accepts when decoding.
    pub custom_kinds: Vec<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
            frame: FrameConfig::default(),
            custom_kinds: Vec::new(),
        }
    }
}

impl ConnectorConfig {
    pub(crate) fn codec(&self) -> Result<Codec> {
        Ok(Codec::with_kinds(self.custom_kinds.iter().cloned())?)
    }

    pub(crate) fn read_timeout(&self) -> Duration {
        self.frame.read_timeout.unwrap_or(self.timeout)
    }
}
