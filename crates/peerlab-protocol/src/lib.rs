//! Protocol routines: lifecycle barrier, bank transfer, mutual exclusion.
//!
//! Everything here is generic over [`peerlab_transport::Ipc`] so it runs
//! unmodified against either the real pipe-backed transport or
//! `peerlab_testkit`'s in-process mock.

pub mod bank;
pub mod barrier;
pub mod mutex;

pub use bank::{bank_robbery, child_bank_loop, coordinator_bank_run, reconcile, transfer};
pub use barrier::{child_done, child_started, coordinator_wait_done, coordinator_wait_started};
pub use mutex::{
    child_mutex_loop, coordinator_wait_mutex_done, release_cs, request_cs, LamportQueueMutex, MutexProtocol,
    MutexState, RicartAgrawalaMutex,
};
