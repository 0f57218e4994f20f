//! Dispatches an already-constructed peer endpoint into the barrier, bank,
//! or mutex protocol routines, based on the CLI-selected [`Variant`].
//!
//! This module is the thin seam named in the spec's §1: "the driver's only
//! obligation toward the core is to invoke it with `(role, local_id, n,
//! peers)`". Everything it calls lives in `peerlab-protocol`.

use peerlab_core::{CoreError, MutexVariant, PeerConfig};
use peerlab_eventlog::EventLog;
use peerlab_protocol::{bank, barrier, child_mutex_loop, coordinator_wait_mutex_done, MutexState};
use peerlab_transport::Ipc;

use crate::cli::Variant;

/// Transfer orders for the bank variant: half of each child's initial
/// balance moves to the next child in id order. Deterministic and
/// conservation-preserving, matching scenario S2 (`n=2`, balances `[10,
/// 20]` yields the single order `(1, 2, 5)`).
fn bank_orders(config: &PeerConfig) -> Vec<(i8, i8, i16)> {
    let mut orders = Vec::new();
    for src in 1..config.n {
        let dst = src + 1;
        let amount = config.initial_balance(src) / 2;
        if amount > 0 {
            orders.push((src, dst, amount));
        }
    }
    orders
}

pub fn run_coordinator(ipc: &mut impl Ipc, variant: Variant, config: &PeerConfig) -> Result<(), CoreError> {
    match variant {
        Variant::Lifecycle => {
            barrier::coordinator_wait_started(ipc)?;
            barrier::coordinator_wait_done(ipc)
        }
        Variant::Bank => {
            let orders = bank_orders(config);
            let histories = bank::coordinator_bank_run(ipc, &orders)?;
            for history in &histories {
                tracing::info!(
                    owner = history.owner,
                    final_balance = history.entries.last().map(|e| e.balance),
                    entries = history.entries.len(),
                    "reconciled balance history"
                );
            }
            Ok(())
        }
        Variant::Mutex => {
            barrier::coordinator_wait_started(ipc)?;
            coordinator_wait_mutex_done(ipc)
        }
    }
}

pub fn run_child(
    ipc: &mut impl Ipc,
    log: &mut EventLog,
    variant: Variant,
    config: &PeerConfig,
    pid: u32,
    parent_pid: u32,
) -> Result<(), CoreError> {
    barrier::child_started(ipc, log, pid, parent_pid)?;
    match variant {
        Variant::Lifecycle => barrier::child_done(ipc, log, "lifecycle complete"),
        Variant::Bank => {
            let balance = config.initial_balance(ipc.id());
            bank::child_bank_loop(ipc, log, balance)?;
            Ok(())
        }
        Variant::Mutex => match config.mutex_variant {
            MutexVariant::None => {
                run_uncoordinated_work_loop(ipc, log);
                barrier::child_done(ipc, log, "work loop complete (uncoordinated)")
            }
            mutex_variant => {
                let mut mutex = MutexState::new(mutex_variant, ipc.id(), ipc.n());
                child_mutex_loop(ipc, log, &mut mutex)
            }
        },
    }
}

/// The `5 * id`-operation work loop with no mutual exclusion: each
/// iteration is a single log line, with no request/release bracketing and
/// no CS_* traffic sent or expected.
fn run_uncoordinated_work_loop(ipc: &mut impl Ipc, log: &mut EventLog) {
    let quota = 5i32 * ipc.id() as i32;
    for op in 1..=quota {
        let t = ipc.tick();
        log.loop_operation(ipc.id(), op as u32, t);
    }
}
