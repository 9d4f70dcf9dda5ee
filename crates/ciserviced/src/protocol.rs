//! Protocol client: control frames out, decoded messages in.

use std::io::Write;

use cinet::{FrameWriter, Message, RingStage, Version, WriteError};
use tracing::debug;

const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// Receives messages routed by the [`ProtocolClient`].
pub trait MessageHandler: Send {
    /// Called for every ring event, including early stages.
    fn ring_event(&mut self, stage: &RingStage);
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// The message was consumed; keep the connection.
    Handled,
    /// The server announced it is leaving.
    ServerLeft,
}

/// Sends the handshake and leave frames and routes inbound messages.
pub struct ProtocolClient {
    version: Version,
    handler: Box<dyn MessageHandler>,
}

impl ProtocolClient {
    /// Builds a client announcing [`Version::CURRENT`].
    pub fn new(handler: impl MessageHandler + 'static) -> Self {
        Self::with_version(Version::CURRENT, handler)
    }

    /// Builds a client announcing `version`.
    pub fn with_version(version: Version, handler: impl MessageHandler + 'static) -> Self {
        Self {
            version,
            handler: Box::new(handler),
        }
    }

    /// Version sent during the handshake.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Sends the version handshake.
    ///
    /// # Errors
    ///
    /// Propagates [`WriteError`] from the frame writer.
    pub fn handshake<W: Write>(&self, writer: &mut FrameWriter<W>) -> Result<(), WriteError> {
        debug!(
            target: PROTOCOL_TARGET,
            major = self.version.major,
            minor = self.version.minor,
            patch = self.version.patch,
            "sending version"
        );
        writer.send(&Message::Version(self.version))
    }

    /// Sends the leave notice ahead of a graceful disconnect.
    ///
    /// # Errors
    ///
    /// Propagates [`WriteError`] from the frame writer.
    pub fn leave<W: Write>(writer: &mut FrameWriter<W>) -> Result<(), WriteError> {
        debug!(target: PROTOCOL_TARGET, "sending leave");
        writer.send(&Message::Leave)
    }

    /// Hands `message` to the handler.
    pub fn route(&mut self, message: &Message) -> Routing {
        match message {
            Message::RingEvent(stage) => {
                self.handler.ring_event(stage);
                Routing::Handled
            }
            Message::Leave => Routing::ServerLeft,
            Message::Version(version) => {
                debug!(
                    target: PROTOCOL_TARGET,
                    major = version.major,
                    minor = version.minor,
                    patch = version.patch,
                    "server announced version"
                );
                Routing::Handled
            }
            Message::Unknown { message_type, .. } => {
                debug!(
                    target: PROTOCOL_TARGET,
                    message_type = *message_type,
                    "ignoring unknown message"
                );
                Routing::Handled
            }
        }
    }
}
