//! Mutual exclusion over the critical section each child's work loop
//! executes `5 * id` times. Two interchangeable algorithms implement
//! [`MutexProtocol`]; the work loop and message dispatch are shared.

mod lamport_queue;
mod ricart_agrawala;

pub use lamport_queue::LamportQueueMutex;
pub use ricart_agrawala::RicartAgrawalaMutex;

use peerlab_core::config::MutexVariant;
use peerlab_core::error::{CoreError, ProtocolError};
use peerlab_core::message::MessageType;
use peerlab_transport::Ipc;

use peerlab_eventlog::EventLog;

fn type_name(t: MessageType) -> &'static str {
    match t {
        MessageType::Started => "STARTED",
        MessageType::Done => "DONE",
        MessageType::Transfer => "TRANSFER",
        MessageType::Ack => "ACK",
        MessageType::Stop => "STOP",
        MessageType::BalanceHistory => "BALANCE_HISTORY",
        MessageType::CsRequest => "CS_REQUEST",
        MessageType::CsReply => "CS_REPLY",
        MessageType::CsRelease => "CS_RELEASE",
    }
}

/// The request/reply/release state machine a mutex variant must provide.
/// `request_cs`/`release_cs` below drive it; incoming CS_* and DONE
/// traffic is folded in through the same four reaction methods regardless
/// of which variant is active.
pub trait MutexProtocol {
    fn begin_request(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError>;
    fn ready_to_enter(&self) -> bool;
    fn release(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError>;
    fn on_request(&mut self, ipc: &mut impl Ipc, from: i8, at: i16) -> Result<(), CoreError>;
    fn on_reply(&mut self, from: i8);
    fn on_release(&mut self, from: i8);
    fn on_done(&mut self, from: i8);
    fn done_count(&self) -> i8;
}

/// Either algorithm, selected once at startup from [`MutexVariant`].
pub enum MutexState {
    Lamport(LamportQueueMutex),
    RicartAgrawala(RicartAgrawalaMutex),
}

impl MutexState {
    pub fn new(variant: MutexVariant, id: i8, n: i8) -> Self {
        match variant {
            MutexVariant::None => panic!("MutexState::new called with MutexVariant::None"),
            MutexVariant::LamportQueue => Self::Lamport(LamportQueueMutex::new(id, n)),
            MutexVariant::RicartAgrawala => Self::RicartAgrawala(RicartAgrawalaMutex::new(id, n)),
        }
    }
}

impl MutexProtocol for MutexState {
    fn begin_request(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        match self {
            Self::Lamport(m) => m.begin_request(ipc),
            Self::RicartAgrawala(m) => m.begin_request(ipc),
        }
    }

    fn ready_to_enter(&self) -> bool {
        match self {
            Self::Lamport(m) => m.ready_to_enter(),
            Self::RicartAgrawala(m) => m.ready_to_enter(),
        }
    }

    fn release(&mut self, ipc: &mut impl Ipc) -> Result<(), CoreError> {
        match self {
            Self::Lamport(m) => m.release(ipc),
            Self::RicartAgrawala(m) => m.release(ipc),
        }
    }

    fn on_request(&mut self, ipc: &mut impl Ipc, from: i8, at: i16) -> Result<(), CoreError> {
        match self {
            Self::Lamport(m) => m.on_request(ipc, from, at),
            Self::RicartAgrawala(m) => m.on_request(ipc, from, at),
        }
    }

    fn on_reply(&mut self, from: i8) {
        match self {
            Self::Lamport(m) => m.on_reply(from),
            Self::RicartAgrawala(m) => m.on_reply(from),
        }
    }

    fn on_release(&mut self, from: i8) {
        match self {
            Self::Lamport(m) => m.on_release(from),
            Self::RicartAgrawala(m) => m.on_release(from),
        }
    }

    fn on_done(&mut self, from: i8) {
        match self {
            Self::Lamport(m) => m.on_done(from),
            Self::RicartAgrawala(m) => m.on_done(from),
        }
    }

    fn done_count(&self) -> i8 {
        match self {
            Self::Lamport(m) => m.done_count(),
            Self::RicartAgrawala(m) => m.done_count(),
        }
    }
}

fn dispatch_one(ipc: &mut impl Ipc, mutex: &mut impl MutexProtocol) -> Result<(), CoreError> {
    let (from, msg) = ipc.receive_any()?;
    match msg.msg_type() {
        MessageType::CsReply => mutex.on_reply(from),
        MessageType::CsRequest => mutex.on_request(ipc, from, msg.logical_time())?,
        MessageType::CsRelease => mutex.on_release(from),
        MessageType::Done => mutex.on_done(from),
        other => {
            return Err(ProtocolError::new("CS_REQUEST, CS_REPLY, CS_RELEASE or DONE", type_name(other)).into())
        }
    }
    Ok(())
}

/// Requests the critical section, servicing incoming protocol traffic
/// while waiting for `ready_to_enter` to become true.
pub fn request_cs(ipc: &mut impl Ipc, mutex: &mut impl MutexProtocol) -> Result<(), CoreError> {
    tracing::trace!(id = ipc.id(), "requesting critical section");
    mutex.begin_request(ipc)?;
    while !mutex.ready_to_enter() {
        dispatch_one(ipc, mutex)?;
    }
    tracing::trace!(id = ipc.id(), "entering critical section");
    Ok(())
}

/// Releases the critical section.
pub fn release_cs(ipc: &mut impl Ipc, mutex: &mut impl MutexProtocol) -> Result<(), CoreError> {
    tracing::trace!(id = ipc.id(), "releasing critical section");
    mutex.release(ipc)
}

/// Coordinator side of the mutex variant's termination barrier. The
/// coordinator never runs the mutex algorithm itself, but CS_REQUEST/
/// CS_REPLY/CS_RELEASE are still multicast to every peer including it (the
/// mesh has no narrower multicast), so it must drain and discard that
/// traffic while counting DONE from each of its `n - 1` children — a plain
/// `wait_all` would mistake a CS_* message for a protocol violation.
pub fn coordinator_wait_mutex_done(ipc: &mut impl Ipc) -> Result<(), CoreError> {
    let target = (ipc.n() - 1).max(0);
    let mut seen = 0;
    while seen < target {
        let (_from, msg) = ipc.receive_any()?;
        match msg.msg_type() {
            MessageType::Done => seen += 1,
            MessageType::CsRequest | MessageType::CsReply | MessageType::CsRelease => {}
            other => return Err(ProtocolError::new("DONE, CS_REQUEST, CS_REPLY or CS_RELEASE", type_name(other)).into()),
        }
    }
    Ok(())
}

/// A child's full mutex-variant run: `5 * id` critical-section operations,
/// each bracketed by `request_cs`/`release_cs` and logged as a single
/// `loop_operation` event, followed by DONE and a drain of remaining
/// protocol traffic until every other child has announced DONE too.
pub fn child_mutex_loop(ipc: &mut impl Ipc, log: &mut EventLog, mutex: &mut impl MutexProtocol) -> Result<(), CoreError> {
    let quota = 5i32 * ipc.id() as i32;
    for op in 1..=quota {
        request_cs(ipc, mutex)?;
        let t = ipc.tick();
        log.loop_operation(ipc.id(), op as u32, t);
        release_cs(ipc, mutex)?;
    }

    log.done(ipc.id(), "mutex quota complete");
    ipc.send_multicast(MessageType::Done, Vec::new())?;

    let target = (ipc.n() - 2).max(0);
    while mutex.done_count() < target {
        dispatch_one(ipc, mutex)?;
    }
    log.received_all_done(ipc.id());
    Ok(())
}
