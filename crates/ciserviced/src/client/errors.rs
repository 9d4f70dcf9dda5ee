use std::io;

use thiserror::Error;

use super::ConnectionState;

/// Failures while establishing a connection.
///
/// These never leave the event loop; they are logged and feed the reconnect
/// logic.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Host name resolution failed.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no addresses.
    #[error("no addresses found for {endpoint}")]
    NoAddress {
        /// Endpoint being resolved.
        endpoint: String,
    },
    /// Every resolved address refused or timed out.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint being contacted.
        endpoint: String,
        /// Error from the last address tried.
        #[source]
        source: io::Error,
    },
    /// Socket setup after connecting failed.
    #[error("failed to prepare connection to {endpoint}: {source}")]
    Setup {
        /// Endpoint of the connection.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}

/// Errors returned to callers of the connection manager.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested operation is not valid in the current state.
    #[error("cannot {operation} while the client is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State at the time of the call.
        state: ConnectionState,
    },
    /// The event loop thread could not be started.
    #[error("failed to start client thread: {source}")]
    Thread {
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
    /// The event loop thread panicked.
    #[error("client thread panicked")]
    ThreadPanic,
}
