//! Wire types, Lamport clock, configuration and error types shared by every
//! other crate in the stack. This crate has no I/O of its own; it is the
//! vocabulary the transport and protocol crates are built from.

pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod payload;

pub use clock::LamportClock;
pub use config::{MutexVariant, PeerConfig, Role, COORDINATOR_ID};
pub use error::{ChannelError, CoreError, FramingError, ProtocolError, UsageError};
pub use message::{Message, MessageHeader, MessageType, HEADER_LEN, MAX_PAYLOAD_LEN, MESSAGE_MAGIC, PARENT_ID};
pub use payload::{BalanceHistory, HistoryEntry, Transfer};
