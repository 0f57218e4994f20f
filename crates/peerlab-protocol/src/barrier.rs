//! Lifecycle barrier: synchronised start and synchronised termination.
//!
//! Only children multicast STARTED/DONE; the coordinator (id 0) only ever
//! waits. This module covers the plain and bank variants, where no other
//! traffic can interleave with the wait. The mutex variant's DONE wait is
//! folded into its own work loop instead (see `crate::mutex`), since
//! CS_* traffic can arrive concurrently there.

use peerlab_core::error::{CoreError, ProtocolError};
use peerlab_core::message::MessageType;
use peerlab_transport::Ipc;

use peerlab_eventlog::EventLog;

/// Blocks until a STARTED (or DONE) message has arrived from every other
/// peer in `1..n`, in ascending id order, exactly as the reference lab's
/// `parent_handle`/`child_handle` do.
fn wait_all(ipc: &mut impl Ipc, expected: MessageType) -> Result<(), CoreError> {
    tracing::debug!(id = ipc.id(), expected = type_name(expected), "entering barrier wait");
    for peer in 1..ipc.n() {
        if peer == ipc.id() {
            continue;
        }
        let msg = ipc.receive(peer)?;
        if msg.msg_type() != expected {
            return Err(ProtocolError::new(type_name(expected), type_name(msg.msg_type())).into());
        }
    }
    tracing::debug!(id = ipc.id(), expected = type_name(expected), "barrier satisfied");
    Ok(())
}

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

/// Child side: announce we're alive, then wait for everyone else.
pub fn child_started(ipc: &mut impl Ipc, log: &mut EventLog, pid: u32, parent_pid: u32) -> Result<(), CoreError> {
    log.started(ipc.id(), pid, parent_pid);
    let line = format!("{}: process started, pid {}, parent {}\n", ipc.id(), pid, parent_pid);
    ipc.send_multicast(MessageType::Started, line.into_bytes())?;
    wait_all(ipc, MessageType::Started)?;
    log.received_all_started(ipc.id());
    Ok(())
}

/// Child side: announce we're finished, then wait for everyone else.
/// Only valid for variants with no CS traffic to interleave.
pub fn child_done(ipc: &mut impl Ipc, log: &mut EventLog, message: &str) -> Result<(), CoreError> {
    log.done(ipc.id(), message);
    let line = format!("{}: done. {}\n", ipc.id(), message);
    ipc.send_multicast(MessageType::Done, line.into_bytes())?;
    wait_all(ipc, MessageType::Done)?;
    log.received_all_done(ipc.id());
    Ok(())
}

/// Coordinator side: only ever waits, never multicasts.
pub fn coordinator_wait_started(ipc: &mut impl Ipc) -> Result<(), CoreError> {
    wait_all(ipc, MessageType::Started)
}

pub fn coordinator_wait_done(ipc: &mut impl Ipc) -> Result<(), CoreError> {
    wait_all(ipc, MessageType::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlab_testkit::VirtualMesh;

    #[test]
    fn all_peers_observe_started_and_done_in_order() {
        let mesh = VirtualMesh::new(3);
        mesh.run(|mut ipc| {
            let dir = std::env::temp_dir().join(format!("peerlab-barrier-test-{}-{}", std::process::id(), ipc.id()));
            std::fs::create_dir_all(&dir).unwrap();
            let mut log = EventLog::open(&dir).unwrap();
            if ipc.id() == 0 {
                coordinator_wait_started(&mut ipc).unwrap();
                coordinator_wait_done(&mut ipc).unwrap();
            } else {
                child_started(&mut ipc, &mut log, 0, 0).unwrap();
                child_done(&mut ipc, &mut log, "ok").unwrap();
            }
        });
    }
}
