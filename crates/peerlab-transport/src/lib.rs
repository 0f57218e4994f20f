//! Framed channels, pipe mesh construction, and the `Ipc` capability trait.
//!
//! Layering: [`channel`] is the raw framed byte-pipe primitive; [`mesh`]
//! turns N of them into a fully connected graph and hands each peer its
//! row; [`endpoint`] is the state a peer carries (channels + clock);
//! [`ipc`] is the trait protocol routines above this crate are written
//! against.

pub mod channel;
pub mod endpoint;
pub mod ipc;
pub mod mesh;

pub use channel::{NonBlockingRead, ReadChannel, WriteChannel};
pub use endpoint::ProcessEndpoint;
pub use ipc::Ipc;
pub use mesh::{NullPipeLog, PipeLog, PipeMatrix, ProcessChannels};
