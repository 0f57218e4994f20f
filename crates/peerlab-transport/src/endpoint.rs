//! Per-peer process endpoint: id, role, channel table, clock.
//!
//! This is the concrete state a real peer carries. Protocol routines never
//! touch it directly — they are generic over the [`crate::ipc::Ipc`]
//! capability trait, which [`ProcessEndpoint`] implements — but something
//! has to own the channels and the clock, and this is it.

use std::collections::HashMap;

use peerlab_core::clock::LamportClock;
use peerlab_core::config::Role;

use crate::channel::{ReadChannel, WriteChannel};
use crate::mesh::ProcessChannels;

/// A peer's channel table plus its local Lamport clock.
pub struct ProcessEndpoint {
    pub(crate) id: i8,
    pub(crate) n: i8,
    pub(crate) role: Role,
    pub(crate) read: HashMap<i8, ReadChannel>,
    pub(crate) write: HashMap<i8, WriteChannel>,
    pub(crate) clock: LamportClock,
}

impl ProcessEndpoint {
    pub fn new(channels: ProcessChannels, n: i8, role: Role) -> Self {
        Self {
            id: channels.id,
            n,
            role,
            read: channels.read.into_iter().collect(),
            write: channels.write.into_iter().collect(),
            clock: LamportClock::new(),
        }
    }

    pub fn id(&self) -> i8 {
        self.id
    }

    pub fn n(&self) -> i8 {
        self.n
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Switches every read channel to non-blocking mode, required before
    /// `receive_any` can be used (bank and mutex variants).
    pub fn enable_polling(&self) -> std::io::Result<()> {
        for channel in self.read.values() {
            channel.set_nonblocking(true)?;
        }
        Ok(())
    }

    /// Logs one line per channel this peer is about to close, matching
    /// [`crate::mesh::ProcessChannels::log_close`]'s pipe-accounting trail.
    /// Intended to be called once, immediately before the endpoint is
    /// dropped at peer exit (the driver's responsibility).
    pub fn log_close(&self, log: &mut impl crate::mesh::PipeLog) {
        let mut read_peers: Vec<i8> = self.read.keys().copied().collect();
        read_peers.sort_unstable();
        for peer in read_peers {
            log.log(&format!("Closed rfd [{}: {}]", self.id, peer));
        }
        let mut write_peers: Vec<i8> = self.write.keys().copied().collect();
        write_peers.sort_unstable();
        for peer in write_peers {
            log.log(&format!("Closed wfd [{}: {}]", self.id, peer));
        }
    }
}
