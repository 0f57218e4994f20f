//! Variant B: Ricart-Agrawala with deferred replies (pa5).
//!
//! No RELEASE message: a request held back because a newer competing
//! request lost the `(timestamp, id)` comparison is simply answered once
//! this process leaves its own critical section.

use peerlab_core::clock::order_key;
use peerlab_core::error::CoreError;
use peerlab_core::message::MessageType;
use peerlab_transport::Ipc;

use super::MutexProtocol;

pub struct RicartAgrawalaMutex {
    id: i8,
    n: i8,
    /// This process's own outstanding request time, or `None` (the
    /// sentinel from the spec's `request_time`) when not requesting.
    request_time: Option<i16>,
    /// Reply owed to peer `p` once this process releases.
    deferred: Vec<bool>,
    /// Peer `p` has already been credited towards the current request,
    /// either by an explicit CS_REPLY or because it has gone DONE.
    satisfied: Vec<bool>,
    /// Peer `p` has announced DONE; it will never reply again, so any
    /// future request credits it immediately.
    retired: Vec<bool>,
    done_count: i8,
}

impl RicartAgrawalaMutex {
    pub fn new(id: i8, n: i8) -> Self {
        let n_usize = n.max(0) as usize;
        Self {
            id,
            n,
            request_time: None,
            deferred: vec![false; n_usize],
            satisfied: vec![false; n_usize],
            retired: vec![false; n_usize],
            done_count: 0,
        }
    }

    fn credit_count(&self) -> i8 {
        self.satisfied
            .iter()
            .enumerate()
            .filter(|&(p, &sat)| sat && p as i8 != self.id)
            .count() as i8
    }
}

impl MutexProtocol for RicartAgrawalaMutex {
    fn begin_request(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        ipc.send_multicast(MessageType::CsRequest, Vec::new())?;
        self.request_time = Some(ipc.time());
        for peer in 0..self.satisfied.len() {
            self.satisfied[peer] = self.retired[peer];
        }
        Ok(())
    }

    fn ready_to_enter(&self) -> bool {
        self.request_time.is_some() && self.credit_count() >= (self.n - 2).max(0)
    }

    fn release(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        self.request_time = None;
        for peer in 0..self.deferred.len() {
            if self.deferred[peer] {
                self.deferred[peer] = false;
                ipc.send(peer as i8, MessageType::CsReply, Vec::new())?;
            }
        }
        Ok(())
    }

    fn on_request(&mut self, ipc: &mut impl Ipc, from: i8, at: i16) -> Result<(), CoreError> {
        let should_defer = match self.request_time {
            Some(own) => order_key(own, self.id) < order_key(at, from),
            None => false,
        };
        if should_defer {
            self.deferred[from as usize] = true;
            Ok(())
        } else {
            ipc.send(from, MessageType::CsReply, Vec::new())
        }
    }

    fn on_reply(&mut self, from: i8) {
        self.satisfied[from as usize] = true;
    }

    fn on_release(&mut self, _from: i8) {
        // Variant B never sends CS_RELEASE.
    }

    fn on_done(&mut self, from: i8) {
        self.done_count += 1;
        self.retired[from as usize] = true;
        self.satisfied[from as usize] = true;
    }

    fn done_count(&self) -> i8 {
        self.done_count
    }
}
