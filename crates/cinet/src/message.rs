use crate::header::MessageType;

/// Names of the call information fields in wire order.
pub const CALL_INFO_FIELDS: [&str; 9] = [
    "number",
    "areacode",
    "area",
    "name",
    "date",
    "time",
    "msn",
    "alias",
    "completenumber",
];

/// Protocol version announced during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch level.
    pub patch: u32,
}

impl Version {
    /// Version spoken by this implementation.
    pub const CURRENT: Self = Self::new(3, 0, 0);

    /// Creates a version triple.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Details of a completed incoming call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallInfo {
    /// Caller number without area code.
    pub number: String,
    /// Area code of the caller.
    pub areacode: String,
    /// Area name derived from the area code.
    pub area: String,
    /// Caller display name, empty when unknown.
    pub name: String,
    /// Call date as reported by the server.
    pub date: String,
    /// Call time as reported by the server.
    pub time: String,
    /// Local number that was called.
    pub msn: String,
    /// Alias configured for the called number.
    pub alias: String,
    /// Caller number including area code.
    pub completenumber: String,
}

impl CallInfo {
    /// Field values in wire order.
    #[must_use]
    pub fn fields(&self) -> [&str; 9] {
        [
            &self.number,
            &self.areacode,
            &self.area,
            &self.name,
            &self.date,
            &self.time,
            &self.msn,
            &self.alias,
            &self.completenumber,
        ]
    }

    /// Builds call information from values in wire order.
    #[must_use]
    pub fn from_fields(fields: [String; 9]) -> Self {
        let [
            number,
            areacode,
            area,
            name,
            date,
            time,
            msn,
            alias,
            completenumber,
        ] = fields;
        Self {
            number,
            areacode,
            area,
            name,
            date,
            time,
            msn,
            alias,
            completenumber,
        }
    }
}

/// Progress of an incoming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingStage {
    /// A call started ringing.
    New,
    /// Partial information arrived.
    Part,
    /// All information is known.
    Complete(CallInfo),
}

impl RingStage {
    /// Stage byte written on the wire.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Part => 1,
            Self::Complete(_) => 2,
        }
    }
}

/// Messages exchanged with the call-information server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Version handshake, sent by the client right after connecting.
    Version(Version),
    /// Orderly disconnect, sent by either side.
    Leave,
    /// Incoming call notification.
    RingEvent(RingStage),
    /// Message with a discriminant this codec does not interpret.
    Unknown {
        /// Raw discriminant from the header.
        message_type: u32,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

impl Message {
    /// Header discriminant for this message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Version(_) => MessageType::Version,
            Self::Leave => MessageType::Leave,
            Self::RingEvent(_) => MessageType::RingEvent,
            Self::Unknown { message_type, .. } => MessageType::Other(*message_type),
        }
    }

    /// Call information when this is a completed ring event.
    #[must_use]
    pub const fn completed_call(&self) -> Option<&CallInfo> {
        match self {
            Self::RingEvent(RingStage::Complete(info)) => Some(info),
            _ => None,
        }
    }
}
