//! Peer configuration: the single value threaded into every core entry
//! point. The driver builds it from parsed CLI arguments and the mesh it
//! constructed; library code only ever consumes it.

/// A peer's place in the mesh: the coordinator (id 0) or a numbered child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Child,
}

/// Which mutual-exclusion protocol a run uses, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexVariant {
    /// No critical-section synchronization; children run their work loops
    /// uncoordinated.
    None,
    /// Lamport's queue-and-release algorithm.
    LamportQueue,
    /// Ricart-Agrawala with deferred replies.
    RicartAgrawala,
}

/// Id of the coordinator process. Fixed by convention, not configurable.
pub const COORDINATOR_ID: i8 = 0;

/// `(role, local_id, n, peers)` plus the run's bank/mutex parameters.
///
/// `n` is the number of children; local ids run `0..=n` with 0 reserved for
/// the coordinator. `peers` is intentionally not part of this type — it is
/// supplied separately by the transport layer once the mesh for this
/// process has been extracted, since `PeerConfig` is meaningful before any
/// channel exists (e.g. while still deciding how many pipes to create).
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub role: Role,
    pub local_id: i8,
    pub n: i8,
    pub mutex_variant: MutexVariant,
    /// Initial balances for children 1..=n, indexed by child id. Empty when
    /// the run doesn't use the banking protocol.
    pub initial_balances: Vec<i16>,
}

impl PeerConfig {
    pub fn is_coordinator(&self) -> bool {
        matches!(self.role, Role::Coordinator)
    }

    /// Initial balance for a given child id, or 0 if out of range or unset.
    pub fn initial_balance(&self, child_id: i8) -> i16 {
        if child_id <= 0 {
            return 0;
        }
        self.initial_balances
            .get((child_id - 1) as usize)
            .copied()
            .unwrap_or(0)
    }
}
