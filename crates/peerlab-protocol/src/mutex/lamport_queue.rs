//! Variant A: Lamport's queue-and-release mutual exclusion (pa4).
//!
//! Every process keeps the same priority queue of outstanding requests;
//! entry is granted once this process's own request sorts first and every
//! other live peer has replied.

use peerlab_core::clock::order_key;
use peerlab_core::error::CoreError;
use peerlab_core::message::MessageType;
use peerlab_transport::Ipc;

use super::MutexProtocol;

/// `(timestamp, id)` ordering used both for the priority queue and for
/// tie-breaking between simultaneous requests.
type QueueKey = (i16, i8);

pub struct LamportQueueMutex {
    id: i8,
    n: i8,
    queue: Vec<QueueKey>,
    reply_count: i8,
    done_count: i8,
}

impl LamportQueueMutex {
    pub fn new(id: i8, n: i8) -> Self {
        Self {
            id,
            n,
            queue: Vec::new(),
            reply_count: 0,
            done_count: 0,
        }
    }

    fn insert(&mut self, key: QueueKey) {
        let pos = self.queue.partition_point(|&existing| existing < key);
        self.queue.insert(pos, key);
    }

    fn remove_peer(&mut self, peer: i8) {
        self.queue.retain(|&(_, who)| who != peer);
    }

    fn is_front(&self) -> bool {
        matches!(self.queue.first(), Some(&(_, who)) if who == self.id)
    }
}

impl MutexProtocol for LamportQueueMutex {
    fn begin_request(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        self.reply_count = 0;
        ipc.send_multicast(MessageType::CsRequest, Vec::new())?;
        self.insert(order_key(ipc.time(), self.id));
        Ok(())
    }

    fn ready_to_enter(&self) -> bool {
        self.is_front() && self.reply_count == (self.n - 2).max(0)
    }

    fn release(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        self.remove_peer(self.id);
        ipc.send_multicast(MessageType::CsRelease, Vec::new())
    }

    fn on_request(&mut self, ipc: &mut impl Ipc, from: i8, at: i16) -> Result<(), CoreError> {
        self.insert(order_key(at, from));
        ipc.send(from, MessageType::CsReply, Vec::new())
    }

    fn on_reply(&mut self, _from: i8) {
        self.reply_count += 1;
    }

    fn on_release(&mut self, from: i8) {
        self.remove_peer(from);
    }

    fn on_done(&mut self, from: i8) {
        self.done_count += 1;
        self.remove_peer(from);
    }

    fn done_count(&self) -> i8 {
        self.done_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_timestamp_sorts_first_regardless_of_insertion_order() {
        let mut mutex = LamportQueueMutex::new(2, 4);
        mutex.insert((5, 3));
        mutex.insert((2, 1));
        mutex.insert((5, 2));
        assert_eq!(mutex.queue, vec![(2, 1), (5, 2), (5, 3)]);
    }

    #[test]
    fn ready_requires_both_front_of_queue_and_full_reply_count() {
        let mut mutex = LamportQueueMutex::new(1, 4);
        mutex.insert((3, 1));
        mutex.insert((1, 2));
        assert!(!mutex.ready_to_enter(), "id 2's earlier request must sort first");
        mutex.remove_peer(2);
        mutex.on_reply(2);
        mutex.on_reply(3);
        assert!(mutex.ready_to_enter());
    }

    #[test]
    fn done_from_a_peer_drops_its_queue_entry_and_counts_towards_done_count() {
        let mut mutex = LamportQueueMutex::new(1, 4);
        mutex.insert((3, 1));
        mutex.insert((1, 2));
        mutex.on_done(2);
        assert_eq!(mutex.done_count(), 1);
        assert!(mutex.queue.iter().all(|&(_, who)| who != 2));
    }
}
