//! The IPC capability trait.
//!
//! Protocol routines (barrier, bank, mutex — in `peerlab-protocol`) are
//! generic over `Ipc` rather than calling `ProcessEndpoint` directly. This
//! is the crate's answer to the reference lab's void-pointer `self`: one
//! trait object boundary instead of an untyped cast, which is also what
//! lets the protocol layer be exercised against
//! `peerlab_testkit`'s in-process mock transport.

use peerlab_core::error::{ChannelError, CoreError, FramingError, UsageError};
use peerlab_core::message::{Message, MessageType};

use crate::channel::NonBlockingRead;
use crate::endpoint::ProcessEndpoint;

/// Everything a protocol routine needs from the transport layer.
pub trait Ipc {
    fn id(&self) -> i8;
    fn n(&self) -> i8;

    /// Current Lamport time, without advancing it.
    fn time(&self) -> i16;

    /// Bump the clock for an internal event that isn't a send (rule L1's
    /// "or event" clause) — e.g. a log line with no accompanying message.
    fn tick(&mut self) -> i16;

    fn send(&mut self, dst: i8, msg_type: MessageType, payload: Vec<u8>) -> Result<(), CoreError>;

    fn send_multicast(&mut self, msg_type: MessageType, payload: Vec<u8>) -> Result<(), CoreError>;

    fn receive(&mut self, from: i8) -> Result<Message, CoreError>;

    /// Round-robins non-blocking reads over every channel; yields the
    /// scheduler and retries when a full pass finds everything empty.
    /// Returns the source id alongside the message.
    fn receive_any(&mut self) -> Result<(i8, Message), CoreError>;
}

impl Ipc for ProcessEndpoint {
    fn id(&self) -> i8 {
        self.id
    }

    fn n(&self) -> i8 {
        self.n
    }

    fn time(&self) -> i16 {
        self.clock.get()
    }

    fn tick(&mut self) -> i16 {
        self.clock.tick()
    }

    fn send(&mut self, dst: i8, msg_type: MessageType, payload: Vec<u8>) -> Result<(), CoreError> {
        if dst == self.id {
            return Err(UsageError::SelfSend { id: self.id }.into());
        }
        if dst < 0 || dst >= self.n {
            return Err(UsageError::DestinationOutOfRange { dst, n: self.n }.into());
        }
        let channel = self
            .write
            .get(&dst)
            .ok_or(ChannelError::ClosedMidMessage { peer: dst })?;
        let stamp = self.clock.tick();
        let msg = Message::new(msg_type, stamp, payload);
        channel.write(&msg)?;
        Ok(())
    }

    fn send_multicast(&mut self, msg_type: MessageType, payload: Vec<u8>) -> Result<(), CoreError> {
        let stamp = self.clock.tick();
        let msg = Message::new(msg_type, stamp, payload);
        for dst in 0..self.n {
            if dst == self.id {
                continue;
            }
            let channel = self
                .write
                .get(&dst)
                .ok_or(ChannelError::ClosedMidMessage { peer: dst })?;
            channel.write(&msg)?;
        }
        Ok(())
    }

    fn receive(&mut self, from: i8) -> Result<Message, CoreError> {
        if from == self.id || from < 0 || from >= self.n {
            return Err(UsageError::DestinationOutOfRange { dst: from, n: self.n }.into());
        }
        let channel = self
            .read
            .get(&from)
            .ok_or(ChannelError::ClosedMidMessage { peer: from })?;
        let msg = channel.read_blocking()?;
        self.clock.observe(msg.logical_time());
        Ok(msg)
    }

    fn receive_any(&mut self) -> Result<(i8, Message), CoreError> {
        loop {
            let mut saw_empty = false;
            let mut peers: Vec<i8> = self.read.keys().copied().collect();
            peers.sort_unstable();
            for peer in peers.drain(..) {
                let channel = self.read.get(&peer).expect("peer present");
                match channel.read_nonblocking()? {
                    NonBlockingRead::Ok(msg) => {
                        self.clock.observe(msg.logical_time());
                        return Ok((peer, msg));
                    }
                    NonBlockingRead::Empty => saw_empty = true,
                    NonBlockingRead::Closed => {
                        self.read.remove(&peer);
                    }
                }
            }
            if self.read.is_empty() {
                return Err(ChannelError::AllChannelsClosed.into());
            }
            if saw_empty {
                std::thread::yield_now();
            }
        }
    }
}

/// Interprets a just-received message's payload as UTF-8, mapping the
/// conversion failure into the same framing-error family as everything
/// else in the wire layer.
pub fn as_text(msg: &Message) -> Result<&str, FramingError> {
    msg.as_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ReadChannel, WriteChannel};
    use peerlab_core::config::Role;
    use std::collections::HashMap;

    fn raw_pipe() -> (std::os::unix::io::RawFd, std::os::unix::io::RawFd) {
        let mut fds: [libc::c_int; 2] = [0, 0];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    /// Two two-peer endpoints wired directly to each other via real pipes,
    /// bypassing the full N-way mesh machinery (which assumes one process
    /// per peer). Good enough to exercise `Ipc` itself in-process.
    fn two_peer_mesh() -> (ProcessEndpoint, ProcessEndpoint) {
        let (r01, w01) = raw_pipe(); // 0 -> 1
        let (r10, w10) = raw_pipe(); // 1 -> 0

        let mut read0 = HashMap::new();
        read0.insert(1, ReadChannel::new(r10, 1));
        let mut write0 = HashMap::new();
        write0.insert(1, WriteChannel::new(w01));

        let mut read1 = HashMap::new();
        read1.insert(0, ReadChannel::new(r01, 0));
        let mut write1 = HashMap::new();
        write1.insert(0, WriteChannel::new(w10));

        let p0 = ProcessEndpoint {
            id: 0,
            n: 2,
            role: Role::Coordinator,
            read: read0,
            write: write0,
            clock: peerlab_core::clock::LamportClock::new(),
        };
        let p1 = ProcessEndpoint {
            id: 1,
            n: 2,
            role: Role::Child,
            read: read1,
            write: write1,
            clock: peerlab_core::clock::LamportClock::new(),
        };
        (p0, p1)
    }

    #[test]
    fn send_stamps_the_current_clock_and_advances_it() {
        let (mut p0, mut p1) = two_peer_mesh();
        assert_eq!(p0.time(), 0);
        p0.send(1, MessageType::Started, b"hi".to_vec()).unwrap();
        assert_eq!(p0.time(), 1);
        let msg = p1.receive(0).unwrap();
        assert_eq!(msg.logical_time(), 1);
        assert_eq!(p1.time(), 2, "receive folds in the sender's stamp then advances past it");
    }

    #[test]
    fn self_send_is_rejected_without_advancing_the_clock() {
        let (mut p0, _p1) = two_peer_mesh();
        let err = p0.send(0, MessageType::Started, vec![]);
        assert!(err.is_err(), "self-send must be rejected");
        assert_eq!(p0.time(), 0, "rejected send must not advance the clock");
    }

    #[test]
    fn out_of_range_destination_is_rejected() {
        let (mut p0, _p1) = two_peer_mesh();
        let err = p0.send(5, MessageType::Started, vec![]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Usage(UsageError::DestinationOutOfRange { dst: 5, n: 2 })
        ));
    }

    #[test]
    fn receive_any_finds_the_only_message_present() {
        let (mut p0, mut p1) = two_peer_mesh();
        p0.enable_polling().unwrap();
        p1.send(0, MessageType::Ack, vec![]).unwrap();
        let (src, msg) = p0.receive_any().unwrap();
        assert_eq!(src, 1);
        assert_eq!(msg.msg_type(), MessageType::Ack);
    }
}
