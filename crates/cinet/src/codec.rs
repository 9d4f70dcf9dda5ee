use crate::error::{DecodeError, EncodeError};
use crate::header::{HEADER_LEN, Header, MessageType};
use crate::message::{CALL_INFO_FIELDS, CallInfo, Message, RingStage, Version};

/// Payload limit applied by [`Codec::default`].
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 64 * 1024;

const VERSION_LEN: usize = 12;

/// Converts between frames and [`Message`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    max_payload_len: u32,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_LEN)
    }
}

impl Codec {
    /// Creates a codec rejecting payloads above `max_payload_len` bytes.
    #[must_use]
    pub const fn new(max_payload_len: u32) -> Self {
        Self { max_payload_len }
    }

    /// Largest accepted payload in bytes.
    #[must_use]
    pub const fn max_payload_len(&self) -> u32 {
        self.max_payload_len
    }

    /// Decodes a frame header.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when fewer than [`HEADER_LEN`] bytes
    /// are supplied and [`DecodeError::PayloadTooLarge`] when the declared
    /// payload exceeds the configured maximum.
    pub fn decode_header(&self, bytes: &[u8]) -> Result<Header, DecodeError> {
        let header = Header::parse(bytes)?;
        if header.length > self.max_payload_len {
            return Err(DecodeError::PayloadTooLarge {
                length: header.length,
                limit: self.max_payload_len,
            });
        }
        Ok(header)
    }

    /// Decodes the payload that follows `header`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::LengthMismatch`] when `payload` is not exactly
    /// `header.length` bytes, or a body error when the payload is malformed.
    pub fn decode_payload(&self, header: &Header, payload: &[u8]) -> Result<Message, DecodeError> {
        if payload.len() != header.payload_len() {
            return Err(DecodeError::LengthMismatch {
                declared: header.length,
                actual: payload.len(),
            });
        }
        let mut cursor = PayloadCursor::new(header.message_type, payload);
        let message = match header.message_type {
            MessageType::Version => Message::Version(Version::new(
                cursor.read_u32()?,
                cursor.read_u32()?,
                cursor.read_u32()?,
            )),
            MessageType::Leave => Message::Leave,
            MessageType::RingEvent => Message::RingEvent(decode_ring(&mut cursor)?),
            MessageType::Other(code) => {
                return Ok(Message::Unknown {
                    message_type: code,
                    payload: payload.to_vec(),
                });
            }
        };
        cursor.finish()?;
        Ok(message)
    }

    /// Decodes one complete frame held in `bytes`.
    ///
    /// # Errors
    ///
    /// Fails like [`Codec::decode_header`] and [`Codec::decode_payload`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, DecodeError> {
        let header = self.decode_header(bytes)?;
        let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
        self.decode_payload(&header, payload)
    }

    /// Encodes `message` as header plus payload.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::FieldTooLong`] when a call field exceeds its
    /// length prefix and [`EncodeError::PayloadTooLarge`] when the payload is
    /// above the configured maximum.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, EncodeError> {
        let payload = encode_payload(message)?;
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|length| *length <= self.max_payload_len)
            .ok_or(EncodeError::PayloadTooLarge {
                length: payload.len(),
                limit: self.max_payload_len,
            })?;
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&Header::new(message.message_type(), length).to_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

fn encode_payload(message: &Message) -> Result<Vec<u8>, EncodeError> {
    match message {
        Message::Version(version) => {
            let mut payload = Vec::with_capacity(VERSION_LEN);
            for word in [version.major, version.minor, version.patch] {
                payload.extend_from_slice(&word.to_be_bytes());
            }
            Ok(payload)
        }
        Message::Leave => Ok(Vec::new()),
        Message::RingEvent(stage) => {
            let mut payload = vec![stage.code()];
            if let RingStage::Complete(info) = stage {
                for (field, value) in CALL_INFO_FIELDS.into_iter().zip(info.fields()) {
                    let length = u16::try_from(value.len()).map_err(|_| {
                        EncodeError::FieldTooLong {
                            field,
                            length: value.len(),
                        }
                    })?;
                    payload.extend_from_slice(&length.to_be_bytes());
                    payload.extend_from_slice(value.as_bytes());
                }
            }
            Ok(payload)
        }
        Message::Unknown { payload, .. } => Ok(payload.clone()),
    }
}

fn decode_ring(cursor: &mut PayloadCursor<'_>) -> Result<RingStage, DecodeError> {
    match cursor.read_u8()? {
        0 => Ok(RingStage::New),
        1 => Ok(RingStage::Part),
        2 => {
            let mut values: [String; 9] = Default::default();
            for (slot, field) in values.iter_mut().zip(CALL_INFO_FIELDS) {
                *slot = cursor.read_text(field)?;
            }
            Ok(RingStage::Complete(CallInfo::from_fields(values)))
        }
        other => Err(DecodeError::UnknownStage(other)),
    }
}

struct PayloadCursor<'a> {
    message_type: MessageType,
    remaining: &'a [u8],
}

impl<'a> PayloadCursor<'a> {
    const fn new(message_type: MessageType, payload: &'a [u8]) -> Self {
        Self {
            message_type,
            remaining: payload,
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining.len() < count {
            return Err(DecodeError::ShortPayload {
                message_type: self.message_type,
                needed: count,
                available: self.remaining.len(),
            });
        }
        let (head, tail) = self.remaining.split_at(count);
        self.remaining = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.take(1)?;
        Ok(byte.first().copied().unwrap_or_default())
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let mut word = [0_u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(word))
    }

    fn read_text(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let mut prefix = [0_u8; 2];
        prefix.copy_from_slice(self.take(2)?);
        let bytes = self.take(usize::from(u16::from_be_bytes(prefix)))?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    fn finish(self) -> Result<(), DecodeError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                message_type: self.message_type,
                extra: self.remaining.len(),
            })
        }
    }
}
