//! Wire codec for the caller-information protocol.
//!
//! Every frame starts with an eight byte header carrying a big-endian
//! message type followed by a big-endian payload length. The payload layout
//! depends on the message type:
//!
//! | Type | Discriminant | Payload |
//! |---|---|---|
//! | `Version` | `0x0001` | `major:u32 \| minor:u32 \| patch:u32` |
//! | `Leave` | `0x0002` | empty |
//! | `RingEvent` | `0x0010` | `stage:u8`, then nine `len:u16 \| utf8` fields when complete |
//!
//! [`Codec`] converts between bytes and [`Message`] values. [`FrameReader`]
//! and [`FrameWriter`] apply the codec to blocking byte streams.

mod codec;
mod error;
mod frame;
mod header;
mod message;

pub use codec::{Codec, DEFAULT_MAX_PAYLOAD_LEN};
pub use error::{DecodeError, EncodeError, ReadError, WriteError};
pub use frame::{DEFAULT_PENDING_LIMIT, FrameReader, FrameWriter};
pub use header::{HEADER_LEN, Header, MessageType};
pub use message::{CALL_INFO_FIELDS, CallInfo, Message, RingStage, Version};
