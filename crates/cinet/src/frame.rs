use std::io::{self, ErrorKind, Read, Write};

use crate::codec::Codec;
use crate::error::{DecodeError, ReadError, WriteError};
use crate::header::HEADER_LEN;
use crate::message::Message;

/// Upper bound on unsent bytes held by [`FrameWriter`] by default.
pub const DEFAULT_PENDING_LIMIT: usize = 256 * 1024;

/// Reads whole frames from a blocking byte stream.
///
/// Each call consumes exactly one header and the payload it declares, so a
/// decode failure never desynchronises the stream. Payloads above the codec
/// limit are streamed into a sink instead of being buffered.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    codec: Codec,
}

impl<R: Read> FrameReader<R> {
    /// Wraps `inner`, decoding with `codec`.
    pub const fn new(inner: R, codec: Codec) -> Self {
        Self { inner, codec }
    }

    /// Borrows the underlying stream.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reads and decodes the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Decode`] when the frame was consumed but rejected,
    /// [`ReadError::Closed`] on a clean end of stream between frames, and
    /// [`ReadError::Transport`] for I/O failures or an end of stream inside a
    /// frame.
    pub fn read_message(&mut self) -> Result<Message, ReadError> {
        let mut header_bytes = [0_u8; HEADER_LEN];
        if !self.fill_header(&mut header_bytes)? {
            return Err(ReadError::Closed);
        }

        match self.codec.decode_header(&header_bytes) {
            Ok(header) => {
                let mut payload = vec![0_u8; header.payload_len()];
                self.inner
                    .read_exact(&mut payload)
                    .map_err(ReadError::Transport)?;
                Ok(self.codec.decode_payload(&header, &payload)?)
            }
            Err(error) => {
                if let DecodeError::PayloadTooLarge { length, .. } = error {
                    self.discard(u64::from(length))?;
                }
                Err(ReadError::Decode(error))
            }
        }
    }

    /// Fills the header buffer, returning `false` when the stream ended before
    /// the first byte.
    fn fill_header(&mut self, buffer: &mut [u8; HEADER_LEN]) -> Result<bool, ReadError> {
        let mut filled = 0;
        while filled < HEADER_LEN {
            let unread = buffer.get_mut(filled..).unwrap_or_default();
            match self.inner.read(unread) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(ReadError::Transport(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream ended inside a frame header",
                    )));
                }
                Ok(count) => filled += count,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(ReadError::Transport(error)),
            }
        }
        Ok(true)
    }

    fn discard(&mut self, length: u64) -> Result<(), ReadError> {
        let skipped = io::copy(&mut (&mut self.inner).take(length), &mut io::sink())
            .map_err(ReadError::Transport)?;
        if skipped < length {
            return Err(ReadError::Transport(io::Error::new(
                ErrorKind::UnexpectedEof,
                "stream ended inside an oversized payload",
            )));
        }
        Ok(())
    }
}

/// Writes frames to a byte stream, holding back bytes the stream could not
/// accept yet.
///
/// Unsent bytes stay queued when the stream reports `WouldBlock`, `TimedOut`
/// or `Interrupted`, and are flushed ahead of the next frame.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    codec: Codec,
    pending: Vec<u8>,
    pending_limit: usize,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps `inner`, encoding with `codec` and the default pending limit.
    pub const fn new(inner: W, codec: Codec) -> Self {
        Self::with_pending_limit(inner, codec, DEFAULT_PENDING_LIMIT)
    }

    /// Wraps `inner` with an explicit cap on queued bytes.
    pub const fn with_pending_limit(inner: W, codec: Codec, pending_limit: usize) -> Self {
        Self {
            inner,
            codec,
            pending: Vec::new(),
            pending_limit,
        }
    }

    /// Borrows the underlying stream.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrows the underlying stream.
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Number of bytes still waiting to be written.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queues `message` behind any pending bytes and writes as much as the
    /// stream accepts.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Encode`] when the message cannot be encoded,
    /// [`WriteError::Overflow`] when the queue would exceed its limit, and
    /// [`WriteError::Transport`] when the stream fails.
    pub fn send(&mut self, message: &Message) -> Result<(), WriteError> {
        let frame = self.codec.encode(message)?;
        let queued = self.pending.len() + frame.len();
        if queued > self.pending_limit {
            return Err(WriteError::Overflow {
                pending: queued,
                limit: self.pending_limit,
            });
        }
        self.pending.extend_from_slice(&frame);
        self.flush_pending()
    }

    /// Writes queued bytes until the stream stops accepting them.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Transport`] when the stream fails or accepts no
    /// bytes at all.
    pub fn flush_pending(&mut self) -> Result<(), WriteError> {
        while !self.pending.is_empty() {
            match self.inner.write(&self.pending) {
                Ok(0) => {
                    return Err(WriteError::Transport(io::Error::new(
                        ErrorKind::WriteZero,
                        "stream accepted no bytes",
                    )));
                }
                Ok(count) => {
                    self.pending.drain(..count);
                }
                Err(error) if is_retryable(&error) => return Ok(()),
                Err(error) => return Err(WriteError::Transport(error)),
            }
        }
        match self.inner.flush() {
            Err(error) if !is_retryable(&error) => Err(WriteError::Transport(error)),
            _ => Ok(()),
        }
    }
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}
