//! Hand-rolled error types for the peerlab protocol stack.
//!
//! One enum per failure domain (framing, protocol, channel, usage), unified
//! by [`CoreError`]. No derive-macro error crate is used; each type
//! implements [`std::error::Error`] and [`std::fmt::Display`] directly,
//! matching the error style used throughout the reference workspace this
//! crate is grounded on (hand-rolled `TransportError`/`RpcError` enums with
//! inline `Display` impls, no `thiserror`).

use std::fmt;

/// A malformed or unexpected wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    BadMagic(u16),
    UnknownType(u16),
    PayloadTooLarge(u16),
    BadPayload,
    ShortRead,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::BadMagic(got) => write!(f, "bad magic: expected a valid sentinel, got {got:#06x}"),
            FramingError::UnknownType(raw) => write!(f, "unknown message type {raw}"),
            FramingError::PayloadTooLarge(len) => write!(f, "payload_len {len} exceeds maximum"),
            FramingError::BadPayload => write!(f, "payload is not valid UTF-8"),
            FramingError::ShortRead => write!(f, "stream ended mid-message"),
        }
    }
}

impl std::error::Error for FramingError {}

/// A message arrived that was not legal in the caller's current protocol
/// state (e.g. STARTED expected, DONE received).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub expected: &'static str,
    pub got: &'static str,
}

impl ProtocolError {
    pub fn new(expected: &'static str, got: &'static str) -> Self {
        Self { expected, got }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol violation: expected {}, got {}", self.expected, self.got)
    }
}

impl std::error::Error for ProtocolError {}

/// A channel-level I/O failure: write error, or EOF before the protocol
/// finished with that peer.
#[derive(Debug)]
pub enum ChannelError {
    Io(std::io::Error),
    ClosedMidMessage { peer: i8 },
    AllChannelsClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Io(e) => write!(f, "channel I/O error: {e}"),
            ChannelError::ClosedMidMessage { peer } => {
                write!(f, "channel to peer {peer} closed before a full message was read")
            }
            ChannelError::AllChannelsClosed => write!(f, "all channels reported closed"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        ChannelError::Io(e)
    }
}

/// Invalid call-site arguments: self-send, out-of-range destination, bad
/// CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    SelfSend { id: i8 },
    DestinationOutOfRange { dst: i8, n: i8 },
    InvalidArgument(String),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::SelfSend { id } => write!(f, "peer {id} attempted to send to itself"),
            UsageError::DestinationOutOfRange { dst, n } => {
                write!(f, "destination {dst} is out of range for n={n}")
            }
            UsageError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for UsageError {}

/// Top-level error unifying every failure domain in the stack.
///
/// The driver's `main` maps any `CoreError` to a non-zero exit code (spec
/// §6/§7: all errors are fatal, no retries).
#[derive(Debug)]
pub enum CoreError {
    Framing(FramingError),
    Protocol(ProtocolError),
    Channel(ChannelError),
    Usage(UsageError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Framing(e) => write!(f, "{e}"),
            CoreError::Protocol(e) => write!(f, "{e}"),
            CoreError::Channel(e) => write!(f, "{e}"),
            CoreError::Usage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Framing(e) => Some(e),
            CoreError::Protocol(e) => Some(e),
            CoreError::Channel(e) => Some(e),
            CoreError::Usage(e) => Some(e),
        }
    }
}

impl From<FramingError> for CoreError {
    fn from(e: FramingError) -> Self {
        CoreError::Framing(e)
    }
}

impl From<ProtocolError> for CoreError {
    fn from(e: ProtocolError) -> Self {
        CoreError::Protocol(e)
    }
}

impl From<ChannelError> for CoreError {
    fn from(e: ChannelError) -> Self {
        CoreError::Channel(e)
    }
}

impl From<UsageError> for CoreError {
    fn from(e: UsageError) -> Self {
        CoreError::Usage(e)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Channel(ChannelError::Io(e))
    }
}
