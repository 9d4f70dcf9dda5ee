use crate::error::DecodeError;

/// Size of an encoded frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Message discriminants carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Protocol version handshake.
    Version,
    /// Orderly disconnect notice.
    Leave,
    /// Incoming call notification.
    RingEvent,
    /// Any discriminant this codec does not interpret.
    Other(u32),
}

impl MessageType {
    /// Numeric discriminant written on the wire.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Version => 0x0001,
            Self::Leave => 0x0002,
            Self::RingEvent => 0x0010,
            Self::Other(code) => code,
        }
    }
}

impl From<u32> for MessageType {
    fn from(code: u32) -> Self {
        match code {
            0x0001 => Self::Version,
            0x0002 => Self::Leave,
            0x0010 => Self::RingEvent,
            other => Self::Other(other),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Kind of message carried by the payload.
    pub message_type: MessageType,
    /// Number of payload bytes following the header.
    pub length: u32,
}

impl Header {
    /// Creates a header for `length` payload bytes.
    #[must_use]
    pub const fn new(message_type: MessageType, length: u32) -> Self {
        Self {
            message_type,
            length,
        }
    }

    /// Payload length as a `usize`.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.length as usize
    }

    /// Serialises the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [a, b, c, d] = self.message_type.code().to_be_bytes();
        let [e, f, g, h] = self.length.to_be_bytes();
        [a, b, c, d, e, f, g, h]
    }

    /// Parses the first [`HEADER_LEN`] bytes of `bytes` without applying any
    /// payload limit.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let Some(raw) = bytes.get(..HEADER_LEN) else {
            return Err(DecodeError::Truncated {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        };
        let (kind, length) = raw.split_at(4);
        Ok(Self::new(
            MessageType::from(read_u32(kind)),
            read_u32(length),
        ))
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0_u8; 4];
    word.copy_from_slice(bytes);
    u32::from_be_bytes(word)
}
