use crate::utils::Utils;

use thiserror::Error;

/// Every frame opens with this 16-bit prefix.
pub const FRAME_PREFIX: u16 = 0x55aa;

/// prefix + from + to + command + payload length byte.
pub const HEADER_LEN: usize = 9;

/// Shortest possible frame: empty payload plus the trailing checksum word.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 2;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),

    #[error("bad frame prefix 0x{0:04x}")]
    BadPrefix(u16),

    #[error("declared payload length {declared} but {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum 0x{found:04x} received, 0x{computed:04x} computed")]
    Checksum { found: u16, computed: u16 },
}

/// One protocol frame. Multi-byte fields are big-endian on the wire; the
/// command word packs an 8-bit command in the high byte and an 8-bit
/// sub-command in the low byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    pub from: u16,
    pub to: u16,
    pub command: u16,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(from: u16, to: u16, cmd: u8, subcmd: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= u8::MAX as usize);
        Self {
            from,
            to,
            command: ((cmd as u16) << 8) | subcmd as u16,
            payload,
        }
    }

    pub fn cmd(&self) -> u8 {
        (self.command >> 8) as u8
    }

    pub fn subcmd(&self) -> u8 {
        self.command as u8
    }

    /// Several request templates share their routing fields but carry a
    /// session-specific payload (the login message appends the discovered
    /// device id). This clones the template with the payload swapped.
    pub fn with_payload(&self, payload: Vec<u8>) -> Self {
        Self {
            payload,
            ..self.clone()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_FRAME_LEN + self.payload.len());
        out.extend_from_slice(&FRAME_PREFIX.to_be_bytes());
        out.extend_from_slice(&self.from.to_be_bytes());
        out.extend_from_slice(&self.to.to_be_bytes());
        out.extend_from_slice(&self.command.to_be_bytes());
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        let checksum = byte_sum(&out);
        out.extend_from_slice(&checksum.to_be_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(DecodeError::TooShort(data.len()));
        }
        let prefix = Utils::word_at(data, 0);
        if prefix != FRAME_PREFIX {
            return Err(DecodeError::BadPrefix(prefix));
        }
        let declared = data[8] as usize;
        let actual = data.len() - MIN_FRAME_LEN;
        if declared != actual {
            return Err(DecodeError::LengthMismatch { declared, actual });
        }
        let computed = byte_sum(&data[..data.len() - 2]);
        let found = Utils::word_at(data, data.len() - 2);
        // Some firmware revisions emit a checksum exactly 0x100 high.
        if found != computed && found != computed.wrapping_add(0x100) {
            return Err(DecodeError::Checksum { found, computed });
        }
        Ok(Self {
            from: Utils::word_at(data, 2),
            to: Utils::word_at(data, 4),
            command: Utils::word_at(data, 6),
            payload: data[HEADER_LEN..HEADER_LEN + declared].to_vec(),
        })
    }

    /// Structural equality: routing fields only. Payload content is the data
    /// being validated elsewhere, not part of the message shape.
    pub fn check_structure(&self, expected: &Message) -> bool {
        self.from == expected.from && self.to == expected.to && self.command == expected.command
    }

    /// Byte-exact payload comparison. Only ever used as a soft warning
    /// signal, never as a hard failure.
    pub fn check_payload(&self, expected: &Message) -> bool {
        self.payload == expected.payload
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message {{ from: {}, to: {}, cmd: {:02x}/{:02x}, payload: {} }}",
            self.from,
            self.to,
            self.cmd(),
            self.subcmd(),
            Utils::hex_string(&self.payload)
        )
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Utils::hex_string(&self.to_bytes()))
    }
}

fn byte_sum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |sum, b| sum.wrapping_add(*b as u16))
}

pub mod templates {
    //! The fixed request/response descriptors of the protocol, computed once
    //! at process start and never mutated.

    use super::Message;
    use once_cell::sync::Lazy;

    /// Logical address allocated to the inverter at login.
    pub const ALLOCATED_ADDRESS: u16 = 1;

    /// Payload of the first capability-exchange response. The meaning of the
    /// bytes is undocumented; they are only soft-checked.
    const UNKNOWN_RESPONSE_1_DATA: [u8; 25] = [
        0x00, 0x01, 0x04, 0x09, 0x0a, 0x0c, 0x11, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e,
        0x1f, 0x20, 0x21, 0x22, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
    ];

    pub static BROADCAST_REQUEST: Lazy<Message> = Lazy::new(|| Message::new(0, 0, 0, 0x00, vec![]));
    pub static BROADCAST_RESPONSE: Lazy<Message> =
        Lazy::new(|| Message::new(0, 0, 0, 0x80, vec![]));

    pub static LOGIN_MESSAGE: Lazy<Message> = Lazy::new(|| Message::new(0, 0, 0, 0x01, vec![]));
    pub static LOGIN_RESPONSE: Lazy<Message> =
        Lazy::new(|| Message::new(ALLOCATED_ADDRESS, 0, 0, 0x81, vec![0x06]));

    pub static LOGOUT_MESSAGE: Lazy<Message> = Lazy::new(|| Message::new(0, 0, 0, 0x04, vec![]));

    pub static UNKNOWN_MESSAGE_1: Lazy<Message> =
        Lazy::new(|| Message::new(0, ALLOCATED_ADDRESS, 1, 0x00, vec![]));
    pub static UNKNOWN_RESPONSE_1: Lazy<Message> = Lazy::new(|| {
        Message::new(ALLOCATED_ADDRESS, 0, 1, 0x80, UNKNOWN_RESPONSE_1_DATA.to_vec())
    });

    pub static UNKNOWN_MESSAGE_2: Lazy<Message> =
        Lazy::new(|| Message::new(0, ALLOCATED_ADDRESS, 1, 0x01, vec![]));
    pub static UNKNOWN_RESPONSE_2: Lazy<Message> =
        Lazy::new(|| Message::new(ALLOCATED_ADDRESS, 0, 1, 0x81, vec![]));

    pub static GET_PV_DATA_MESSAGE: Lazy<Message> =
        Lazy::new(|| Message::new(0, ALLOCATED_ADDRESS, 1, 0x02, vec![]));
    pub static GET_PV_DATA_RESPONSE: Lazy<Message> =
        Lazy::new(|| Message::new(ALLOCATED_ADDRESS, 0, 1, 0x82, vec![]));

    pub static GET_FW_VERSION_MESSAGE: Lazy<Message> =
        Lazy::new(|| Message::new(0, ALLOCATED_ADDRESS, 1, 0x03, vec![]));
    pub static GET_FW_VERSION_RESPONSE: Lazy<Message> =
        Lazy::new(|| Message::new(ALLOCATED_ADDRESS, 0, 1, 0x83, vec![]));

    pub static GET_CONF_INFO_MESSAGE: Lazy<Message> =
        Lazy::new(|| Message::new(0, ALLOCATED_ADDRESS, 1, 0x04, vec![]));
    pub static GET_CONF_INFO_RESPONSE: Lazy<Message> =
        Lazy::new(|| Message::new(ALLOCATED_ADDRESS, 0, 1, 0x84, vec![]));
}
