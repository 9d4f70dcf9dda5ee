use std::fmt;

use cinet::{Message, ReadError};

use super::cancel::CancellationToken;
use super::errors::ConnectionError;
use super::transport::Transport;

/// Identifies one established connection.
///
/// Reader threads tag their events with it so frames from a closed socket
/// cannot reach a newer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Inputs consumed by the client event loop.
pub enum ClientEvent {
    /// A connect attempt finished.
    ConnectFinished {
        /// Token issued when the attempt started.
        token: CancellationToken,
        /// Connected transport or the failure.
        result: Result<Box<dyn Transport>, ConnectionError>,
    },
    /// The reader of a connection produced a frame or failed.
    Frame {
        /// Connection the reader belongs to.
        connection: ConnectionId,
        /// Decoded message or read failure.
        outcome: Result<Message, ReadError>,
    },
    /// The reconnect timer elapsed.
    TimerFired,
    /// Drop the connection and stop reconnecting.
    DisconnectRequested,
    /// Disconnect gracefully and end the loop.
    Shutdown,
}

impl fmt::Debug for ClientEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFinished { result, .. } => formatter
                .debug_struct("ConnectFinished")
                .field("connected", &result.is_ok())
                .finish_non_exhaustive(),
            Self::Frame {
                connection,
                outcome,
            } => formatter
                .debug_struct("Frame")
                .field("connection", connection)
                .field("outcome", outcome)
                .finish(),
            Self::TimerFired => formatter.write_str("TimerFired"),
            Self::DisconnectRequested => formatter.write_str("DisconnectRequested"),
            Self::Shutdown => formatter.write_str("Shutdown"),
        }
    }
}

/// Whether the event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Wait for the next event.
    Continue,
    /// The manager shut down.
    Exit,
}

/// Why a connection was considered lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LossReason {
    /// The connect attempt failed.
    ConnectFailed,
    /// The server sent `Leave`.
    ServerLeft,
    /// The peer closed the socket.
    Closed,
    /// Reading from the socket failed.
    ReadFailed(String),
    /// Writing to the socket failed.
    WriteFailed(String),
}

impl fmt::Display for LossReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => formatter.write_str("connect attempt failed"),
            Self::ServerLeft => formatter.write_str("server sent leave"),
            Self::Closed => formatter.write_str("connection closed by server"),
            Self::ReadFailed(message) => write!(formatter, "read failed: {message}"),
            Self::WriteFailed(message) => write!(formatter, "write failed: {message}"),
        }
    }
}
