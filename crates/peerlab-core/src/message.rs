//! Wire header and message types.
//!
//! The header layout is bit-exact and host-native: `magic:u16, type:u16,
//! payload_len:u16, logical_time:i16`, followed by `payload_len` payload
//! bytes. Encoding is hand-rolled (`to_ne_bytes`/`from_ne_bytes`) rather than
//! routed through a general serialization crate, the same way the reference
//! stack keeps its own hot-path frame descriptor outside of its generic
//! payload codec.

use crate::error::FramingError;

/// Sentinel that must open every header. A mismatch is a fatal framing
/// error, verified on every receive before anything else in the header
/// is trusted.
pub const MESSAGE_MAGIC: u16 = 0xCAFE;

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024;

/// Size in bytes of [`MessageHeader`] on the wire.
pub const HEADER_LEN: usize = 8;

/// The coordinator's local id.
pub const PARENT_ID: i8 = 0;

/// Protocol message types, encoded as `u16` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Started = 0,
    Done = 1,
    Transfer = 2,
    Ack = 3,
    Stop = 4,
    BalanceHistory = 5,
    CsRequest = 6,
    CsReply = 7,
    CsRelease = 8,
}

impl MessageType {
    fn from_u16(raw: u16) -> Result<Self, FramingError> {
        Ok(match raw {
            0 => MessageType::Started,
            1 => MessageType::Done,
            2 => MessageType::Transfer,
            3 => MessageType::Ack,
            4 => MessageType::Stop,
            5 => MessageType::BalanceHistory,
            6 => MessageType::CsRequest,
            7 => MessageType::CsReply,
            8 => MessageType::CsRelease,
            other => return Err(FramingError::UnknownType(other)),
        })
    }
}

/// Fixed-size message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u16,
    pub msg_type: MessageType,
    pub payload_len: u16,
    pub logical_time: i16,
}

impl MessageHeader {
    pub fn new(msg_type: MessageType, logical_time: i16, payload_len: u16) -> Self {
        Self {
            magic: MESSAGE_MAGIC,
            msg_type,
            payload_len,
            logical_time,
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.magic.to_ne_bytes());
        buf[2..4].copy_from_slice(&(self.msg_type as u16).to_ne_bytes());
        buf[4..6].copy_from_slice(&self.payload_len.to_ne_bytes());
        buf[6..8].copy_from_slice(&self.logical_time.to_ne_bytes());
        buf
    }

    /// Decode a header, validating `magic` before the rest of the header
    /// (in particular `payload_len`) is trusted.
    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> Result<Self, FramingError> {
        let magic = u16::from_ne_bytes(buf[0..2].try_into().unwrap());
        if magic != MESSAGE_MAGIC {
            return Err(FramingError::BadMagic(magic));
        }
        let raw_type = u16::from_ne_bytes(buf[2..4].try_into().unwrap());
        let payload_len = u16::from_ne_bytes(buf[4..6].try_into().unwrap());
        if payload_len as usize > MAX_PAYLOAD_LEN {
            return Err(FramingError::PayloadTooLarge(payload_len));
        }
        let logical_time = i16::from_ne_bytes(buf[6..8].try_into().unwrap());
        Ok(Self {
            magic,
            msg_type: MessageType::from_u16(raw_type)?,
            payload_len,
            logical_time,
        })
    }
}

/// A complete message: header plus opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: MessageType, logical_time: i16, payload: Vec<u8>) -> Self {
        let header = MessageHeader::new(msg_type, logical_time, payload.len() as u16);
        Self { header, payload }
    }

    pub fn empty(msg_type: MessageType, logical_time: i16) -> Self {
        Self::new(msg_type, logical_time, Vec::new())
    }

    pub fn text(msg_type: MessageType, logical_time: i16, line: &str) -> Self {
        Self::new(msg_type, logical_time, line.as_bytes().to_vec())
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    pub fn logical_time(&self) -> i16 {
        self.header.logical_time
    }

    /// Interpret the payload as a UTF-8 log line (STARTED/DONE payloads).
    pub fn as_text(&self) -> Result<&str, FramingError> {
        std::str::from_utf8(&self.payload).map_err(|_| FramingError::BadPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = MessageHeader::new(MessageType::CsRequest, 42, 7);
        let bytes = header.to_bytes();
        let decoded = MessageHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn bad_magic_is_rejected_before_payload_len_is_trusted() {
        let mut bytes = MessageHeader::new(MessageType::Done, 1, 0).to_bytes();
        bytes[0] = 0;
        bytes[1] = 0;
        let err = MessageHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, FramingError::BadMagic(0)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = MessageHeader::new(MessageType::Done, 1, 0).to_bytes();
        bytes[2..4].copy_from_slice(&99u16.to_ne_bytes());
        let err = MessageHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, FramingError::UnknownType(99)));
    }

    #[test]
    fn oversized_payload_len_is_rejected() {
        let mut bytes = MessageHeader::new(MessageType::Done, 1, 0).to_bytes();
        bytes[4..6].copy_from_slice(&(MAX_PAYLOAD_LEN as u16 + 1).to_ne_bytes());
        let err = MessageHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, FramingError::PayloadTooLarge(_)));
    }
}
