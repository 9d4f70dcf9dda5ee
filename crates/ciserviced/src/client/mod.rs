//! Connection management for the call-information server.
//!
//! A single [`ClientLoop`] thread owns the [`ConnectionManager`] and consumes
//! [`ClientEvent`] values from a channel. Connect attempts and socket reads run
//! on helper threads that only post events, so every state transition happens
//! on the loop thread. The reconnect timer is the loop's receive deadline,
//! which keeps at most one timer alive.

mod cancel;
mod errors;
mod event_loop;
mod events;
mod manager;
mod timer;
mod transport;

use std::fmt;
use std::time::Duration;

use cinet::{Codec, DEFAULT_PENDING_LIMIT};
use ciservice_config::Config;

pub use cancel::CancellationToken;
pub use errors::{ClientError, ConnectionError};
pub use event_loop::{ClientHandle, ClientLoop};
pub use events::{ClientEvent, ConnectionId, LoopControl, LossReason};
pub use manager::ConnectionManager;
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};

pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Time allowed for a single TCP connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a blocked write may take before the bytes are queued for later.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No endpoint configured; terminal after shutdown.
    Uninitialized,
    /// Endpoint known, no socket and no attempt in flight.
    Initialized,
    /// An asynchronous connect attempt is outstanding.
    Connecting,
    /// A socket is live and being read.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        formatter.write_str(label)
    }
}

/// Tunables for the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Delay between reconnect attempts; `None` disables reconnecting.
    pub retry_interval: Option<Duration>,
    /// Codec used for both directions.
    pub codec: Codec,
    /// Socket write timeout applied after connecting.
    pub write_timeout: Duration,
    /// Cap on outbound bytes waiting for the socket.
    pub pending_limit: usize,
}

impl ClientSettings {
    /// Derives settings from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_interval: config.retry_interval(),
            codec: Codec::new(config.max_payload_len()),
            ..Self::default()
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry_interval: Some(Duration::from_secs(
                ciservice_config::DEFAULT_RETRY_INTERVAL_SECS,
            )),
            codec: Codec::default(),
            write_timeout: WRITE_TIMEOUT,
            pending_limit: DEFAULT_PENDING_LIMIT,
        }
    }
}
