use std::io;

use thiserror::Error;

use crate::header::MessageType;

/// Errors raised while decoding a frame.
///
/// A decode error affects only the offending message; the byte stream stays
/// aligned on frame boundaries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes were available than the structure requires.
    #[error("truncated input: needed {needed} bytes, found {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes supplied.
        available: usize,
    },
    /// Declared payload length exceeds the configured maximum.
    #[error("payload of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Declared payload length.
        length: u32,
        /// Configured maximum.
        limit: u32,
    },
    /// Payload buffer length disagrees with the header.
    #[error("header declares {declared} payload bytes but {actual} were supplied")]
    LengthMismatch {
        /// Length from the header.
        declared: u32,
        /// Length of the supplied payload.
        actual: usize,
    },
    /// Payload was too short for the message body.
    #[error("{message_type:?} payload ended early: needed {needed} bytes, found {available}")]
    ShortPayload {
        /// Message being decoded.
        message_type: MessageType,
        /// Bytes required.
        needed: usize,
        /// Bytes remaining.
        available: usize,
    },
    /// Payload carried bytes past the end of the message body.
    #[error("{message_type:?} payload has {extra} trailing bytes")]
    TrailingBytes {
        /// Message being decoded.
        message_type: MessageType,
        /// Number of unread bytes.
        extra: usize,
    },
    /// Ring event carried an unknown stage byte.
    #[error("unknown ring stage {0}")]
    UnknownStage(u8),
    /// A call information field was not valid UTF-8.
    #[error("call field '{field}' is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Errors raised while encoding a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// A call information field does not fit its 16-bit length prefix.
    #[error("call field '{field}' is {length} bytes, above the 65535 byte limit")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Field length in bytes.
        length: usize,
    },
    /// The encoded payload exceeds the configured maximum.
    #[error("payload of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Encoded payload length.
        length: usize,
        /// Configured maximum.
        limit: u32,
    },
}

/// Errors returned by [`crate::FrameReader`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// The frame was consumed but could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The peer closed the stream on a frame boundary.
    #[error("connection closed by peer")]
    Closed,
    /// The stream failed or ended inside a frame.
    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),
}

impl ReadError {
    /// Whether the stream can no longer be read.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

/// Errors returned by [`crate::FrameWriter`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// The message could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Unsent bytes would exceed the pending buffer limit.
    #[error("pending buffer overflow: {pending} bytes queued, limit {limit}")]
    Overflow {
        /// Bytes that would be queued.
        pending: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The stream rejected the write.
    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),
}
