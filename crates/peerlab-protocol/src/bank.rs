//! Bank protocol: coordinator-driven transfers between children, with
//! causally-ordered per-child balance histories reconciled at the end.

use std::collections::HashSet;

use peerlab_core::error::{CoreError, ProtocolError};
use peerlab_core::message::MessageType;
use peerlab_core::payload::{BalanceHistory, HistoryEntry, Transfer};
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

/// A sentinel marking a history slot that was never written. Reconciliation
/// replaces these by carrying the previous entry's balance forward.
const UNTOUCHED: i16 = -1;

/// One child's running balance and time-indexed history.
struct ChildLedger {
    balance: i16,
    history: Vec<HistoryEntry>,
}

impl ChildLedger {
    fn new(initial_balance: i16) -> Self {
        let mut ledger = Self {
            balance: initial_balance,
            history: Vec::new(),
        };
        ledger.record(0, initial_balance);
        ledger
    }

    /// (Over)writes the entry at `time`, extending the vector with
    /// untouched-sentinel entries for any gap below it.
    fn record(&mut self, time: i16, balance: i16) {
        let idx = time.max(0) as usize;
        if self.history.len() <= idx {
            self.history.resize(
                idx + 1,
                HistoryEntry {
                    balance: 0,
                    time: UNTOUCHED,
                    pending_in: 0,
                },
            );
        }
        self.history[idx] = HistoryEntry {
            balance,
            time,
            pending_in: 0,
        };
    }

    fn into_history(self, owner: i8) -> BalanceHistory {
        BalanceHistory {
            owner,
            entries: self.history,
        }
    }
}

/// Child side of the bank protocol: runs after the start barrier, before
/// the done barrier. Returns the snapshot sent to the coordinator.
///
/// `n` is the total peer count; every id other than `self` and the
/// coordinator is a fellow child whose DONE this peer must observe before
/// it may report its history and exit.
pub fn child_bank_loop(ipc: &mut impl Ipc, log: &mut EventLog, initial_balance: i16) -> Result<BalanceHistory, CoreError> {
    let mut ledger = ChildLedger::new(initial_balance);

    loop {
        let (_from, msg) = ipc.receive_any()?;
        match msg.msg_type() {
            MessageType::Transfer => apply_transfer(ipc, log, &mut ledger, &msg.payload)?,
            MessageType::Stop => break,
            other => return Err(ProtocolError::new("TRANSFER or STOP", type_name(other)).into()),
        }
    }

    let done_line = format!("{}: done\n", ipc.id());
    log.done(ipc.id(), "bank complete");
    ipc.send_multicast(MessageType::Done, done_line.into_bytes())?;

    // Straggler transfers that crossed STOP: keep absorbing them until
    // every other child (not the coordinator, which never sends DONE) has
    // announced DONE.
    let target = (ipc.n() - 2).max(0) as usize;
    let mut done_from: HashSet<i8> = HashSet::new();
    while done_from.len() < target {
        let (from, msg) = ipc.receive_any()?;
        match msg.msg_type() {
            MessageType::Transfer => apply_transfer(ipc, log, &mut ledger, &msg.payload)?,
            MessageType::Done => {
                done_from.insert(from);
            }
            other => return Err(ProtocolError::new("TRANSFER or DONE", type_name(other)).into()),
        }
    }
    log.received_all_done(ipc.id());

    let history = ledger.into_history(ipc.id());
    ipc.send(peerlab_core::message::PARENT_ID, MessageType::BalanceHistory, history.to_bytes())?;
    Ok(history)
}

fn apply_transfer(ipc: &mut impl Ipc, log: &mut EventLog, ledger: &mut ChildLedger, payload: &[u8]) -> Result<(), CoreError> {
    let transfer = Transfer::from_bytes(payload)?;
    if transfer.src == ipc.id() {
        ledger.balance -= transfer.amount;
        ledger.record(ipc.time(), ledger.balance);
        log.transfer_out(ipc.id(), transfer.dst, transfer.amount);
        ipc.send(transfer.dst, MessageType::Transfer, transfer.to_bytes().to_vec())?;
    } else if transfer.dst == ipc.id() {
        ledger.balance += transfer.amount;
        ledger.record(ipc.time(), ledger.balance);
        log.transfer_in(ipc.id(), transfer.src, transfer.amount);
        ipc.send(peerlab_core::message::PARENT_ID, MessageType::Ack, vec![])?;
    } else {
        return Err(ProtocolError::new("TRANSFER addressed to this peer", "src/dst mismatch").into());
    }
    Ok(())
}

/// Coordinator side: `transfer` dispatches the order to `src` and waits for
/// `dst`'s ACK — the ACK originates at `dst` so the coordinator learns the
/// money actually arrived, not just that `src` accepted the order.
pub fn transfer(ipc: &mut impl Ipc, src: i8, dst: i8, amount: i16) -> Result<(), CoreError> {
    tracing::debug!(src, dst, amount, "dispatching transfer order");
    let order = Transfer { src, dst, amount };
    ipc.send(src, MessageType::Transfer, order.to_bytes().to_vec())?;
    let msg = ipc.receive(dst)?;
    if msg.msg_type() != MessageType::Ack {
        return Err(ProtocolError::new("ACK", type_name(msg.msg_type())).into());
    }
    Ok(())
}

/// Runs a fixed sequence of transfer orders. The sequence itself is an
/// application concern (the driver supplies it); this just repeats
/// `transfer` for each one, matching the reference lab's
/// `bank_robbery(process, n - 1)` contract.
pub fn bank_robbery(ipc: &mut impl Ipc, orders: &[(i8, i8, i16)]) -> Result<(), CoreError> {
    for &(src, dst, amount) in orders {
        transfer(ipc, src, dst, amount)?;
    }
    Ok(())
}

/// Coordinator's full bank run: wait STARTED, drive transfers, multicast
/// STOP, wait DONE, collect one history per child, reconcile.
pub fn coordinator_bank_run(ipc: &mut impl Ipc, orders: &[(i8, i8, i16)]) -> Result<Vec<BalanceHistory>, CoreError> {
    crate::barrier::coordinator_wait_started(ipc)?;
    bank_robbery(ipc, orders)?;
    ipc.send_multicast(MessageType::Stop, vec![])?;
    crate::barrier::coordinator_wait_done(ipc)?;

    let mut histories = Vec::new();
    for child in 1..ipc.n() {
        let msg = ipc.receive(child)?;
        if msg.msg_type() != MessageType::BalanceHistory {
            return Err(ProtocolError::new("BALANCE_HISTORY", type_name(msg.msg_type())).into());
        }
        histories.push(BalanceHistory::from_bytes(&msg.payload)?);
    }
    Ok(reconcile(histories))
}

/// Extends every child's history to a uniform length `T` = the longest
/// history in the set, filling sentinel or missing slots by copying the
/// previous balance forward with `pending_in = 0`.
pub fn reconcile(histories: Vec<BalanceHistory>) -> Vec<BalanceHistory> {
    let t_max = histories.iter().map(|h| h.entries.len()).max().unwrap_or(0);
    histories
        .into_iter()
        .map(|history| {
            let mut entries = Vec::with_capacity(t_max);
            let mut carry = 0i16;
            for t in 0..t_max {
                let entry = history.entries.get(t).copied();
                let filled = match entry {
                    Some(e) if e.time != UNTOUCHED => e,
                    _ => HistoryEntry {
                        balance: carry,
                        time: t as i16,
                        pending_in: 0,
                    },
                };
                carry = filled.balance;
                entries.push(filled);
            }
            BalanceHistory {
                owner: history.owner,
                entries,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlab_testkit::VirtualMesh;
    use std::sync::{Arc, Mutex};

    #[test]
    fn single_transfer_conserves_total_balance_and_reconciles_every_time_index() {
        // N=3 (coordinator + 2 children), initial balances [10, 20],
        // single transfer 1 -> 2 amount 5, per scenario S2.
        let results: Arc<Mutex<Option<Vec<BalanceHistory>>>> = Arc::new(Mutex::new(None));
        let results_clone = results.clone();
        let mesh = VirtualMesh::new(3);
        mesh.run(move |mut ipc| {
            let dir = std::env::temp_dir().join(format!(
                "peerlab-bank-test-{}-{}",
                std::process::id(),
                ipc.id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            let mut log = EventLog::open(&dir).unwrap();
            if ipc.id() == 0 {
                crate::barrier::coordinator_wait_started(&mut ipc).unwrap();
                let histories = coordinator_bank_run_body(&mut ipc).unwrap();
                results_clone.lock().unwrap().replace(histories);
            } else {
                let balance = if ipc.id() == 1 { 10 } else { 20 };
                crate::barrier::child_started(&mut ipc, &mut log, 0, 0).unwrap();
                child_bank_loop(&mut ipc, &mut log, balance).unwrap();
            }
        });

        let histories = results.lock().unwrap().take().unwrap();
        assert_eq!(histories.len(), 2);
        let total: i32 = histories
            .iter()
            .map(|h| h.entries.last().unwrap().balance as i32)
            .sum();
        assert_eq!(total, 30);
        let t_max = histories[0].entries.len();
        assert_eq!(t_max, histories[1].entries.len());
        for history in &histories {
            for (i, entry) in history.entries.iter().enumerate() {
                assert_eq!(entry.time as usize, i);
            }
        }
    }

    // coordinator_bank_run already waits STARTED internally; the test above
    // waits separately to line up with the child side's explicit call, so
    // this helper skips that first wait and does the rest.
    fn coordinator_bank_run_body(ipc: &mut peerlab_testkit::MockIpc) -> Result<Vec<BalanceHistory>, CoreError> {
        bank_robbery(ipc, &[(1, 2, 5)])?;
        ipc.send_multicast(MessageType::Stop, vec![])?;
        crate::barrier::coordinator_wait_done(ipc)?;
        let mut histories = Vec::new();
        for child in 1..ipc.n() {
            let msg = ipc.receive(child)?;
            histories.push(BalanceHistory::from_bytes(&msg.payload)?);
        }
        Ok(reconcile(histories))
    }
}
