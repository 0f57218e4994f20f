//! In-process mock transport for exercising the protocol layer without
//! `fork()`.
//!
//! One OS thread stands in for each virtual peer, wired together with
//! `std::sync::mpsc` channels instead of pipes. This mirrors the real
//! transport's shape closely enough (one inbox per counterpart, FIFO per
//! channel, a non-blocking drain for `receive_any`) that barrier, bank and
//! mutex routines run unmodified against it.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use peerlab_core::clock::LamportClock;
use peerlab_core::error::{ChannelError, CoreError, UsageError};
use peerlab_core::message::{Message, MessageType};
use peerlab_transport::Ipc;

/// A mock peer endpoint: same clock discipline as the real transport, but
/// backed by channels instead of pipes.
pub struct MockIpc {
    id: i8,
    n: i8,
    clock: LamportClock,
    tx: HashMap<i8, Sender<Message>>,
    rx: HashMap<i8, Receiver<Message>>,
}

impl Ipc for MockIpc {
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
        let stamp = self.clock.tick();
        let msg = Message::new(msg_type, stamp, payload);
        self.tx
            .get(&dst)
            .ok_or(ChannelError::ClosedMidMessage { peer: dst })?
            .send(msg)
            .map_err(|_| ChannelError::ClosedMidMessage { peer: dst })?;
        Ok(())
    }

    fn send_multicast(&mut self, msg_type: MessageType, payload: Vec<u8>) -> Result<(), CoreError> {
        let stamp = self.clock.tick();
        let msg = Message::new(msg_type, stamp, payload);
        for dst in 0..self.n {
            if dst == self.id {
                continue;
            }
            self.tx
                .get(&dst)
                .ok_or(ChannelError::ClosedMidMessage { peer: dst })?
                .send(msg.clone())
                .map_err(|_| ChannelError::ClosedMidMessage { peer: dst })?;
        }
        Ok(())
    }

    fn receive(&mut self, from: i8) -> Result<Message, CoreError> {
        if from == self.id || from < 0 || from >= self.n {
            return Err(UsageError::DestinationOutOfRange { dst: from, n: self.n }.into());
        }
        let msg = self
            .rx
            .get(&from)
            .ok_or(ChannelError::ClosedMidMessage { peer: from })?
            .recv()
            .map_err(|_| ChannelError::ClosedMidMessage { peer: from })?;
        self.clock.observe(msg.logical_time());
        Ok(msg)
    }

    fn receive_any(&mut self) -> Result<(i8, Message), CoreError> {
        loop {
            let mut peers: Vec<i8> = self.rx.keys().copied().collect();
            peers.sort_unstable();
            for peer in peers {
                match self.rx.get(&peer).expect("peer present").try_recv() {
                    Ok(msg) => {
                        self.clock.observe(msg.logical_time());
                        return Ok((peer, msg));
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        self.rx.remove(&peer);
                    }
                }
            }
            if self.rx.is_empty() {
                return Err(ChannelError::AllChannelsClosed.into());
            }
            std::thread::yield_now();
        }
    }
}

/// Spawns `n` threads, one per virtual peer id `0..n`, each running `body`
/// with a fully wired [`MockIpc`]. Blocks until every thread returns.
/// Panics propagate: a panicking peer fails the whole test, same as a real
/// peer exiting non-zero would fail an integration test.
pub struct VirtualMesh {
    n: i8,
}

impl VirtualMesh {
    pub fn new(n: i8) -> Self {
        Self { n }
    }

    pub fn run<F>(&self, body: F)
    where
        F: Fn(MockIpc) + Send + Sync + Clone + 'static,
    {
        let n = self.n;
        let mut tx_table: HashMap<(i8, i8), Sender<Message>> = HashMap::new();
        let mut rx_table: HashMap<(i8, i8), Receiver<Message>> = HashMap::new();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (tx, rx) = std::sync::mpsc::channel();
                // (i, j): i writes, j reads.
                tx_table.insert((i, j), tx);
                rx_table.insert((i, j), rx);
            }
        }

        let mut handles = Vec::new();
        for id in 0..n {
            let mut tx = HashMap::new();
            let mut rx = HashMap::new();
            for peer in 0..n {
                if peer == id {
                    continue;
                }
                tx.insert(peer, tx_table.remove(&(id, peer)).expect("sender present"));
                rx.insert(peer, rx_table.remove(&(peer, id)).expect("receiver present"));
            }
            let ipc = MockIpc {
                id,
                n,
                clock: LamportClock::new(),
                tx,
                rx,
            };
            let body = body.clone();
            handles.push(std::thread::spawn(move || body(ipc)));
        }

        for handle in handles {
            handle.join().expect("virtual peer thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn every_peer_sees_a_multicast_from_every_other_peer() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mesh = VirtualMesh::new(3);
        let received_clone = received.clone();
        mesh.run(move |mut ipc| {
            ipc.send_multicast(MessageType::Started, vec![]).unwrap();
            let mut seen = 0;
            for _ in 0..(ipc.n() - 2) {
                let (_src, msg) = ipc.receive_any().unwrap();
                assert_eq!(msg.msg_type(), MessageType::Started);
                seen += 1;
            }
            received_clone.lock().unwrap().push((ipc.id(), seen));
        });
        let got = received.lock().unwrap();
        assert_eq!(got.len(), 3);
        for (_id, seen) in got.iter() {
            assert_eq!(*seen, 1);
        }
    }
}
