//! In-process state the engine owns directly: the consensus results it
//! has published and which works it has already closed. Everything
//! else (commitments, the score matrix, deadlines) lives in
//! `chaoschain_ledger`; everything monetary lives behind the `Escrow`
//! trait the host supplies.

use std::collections::{BTreeMap, BTreeSet};

use chaoschain_runtime::{AccountId, WorkId};

/// The per-(work, worker) result of the scoring kernel, published once
/// a work closes and read back via `get_consensus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusResult {
    /// Per-dimension consensus score, `[0, 100]`.
    pub consensus: Vec<u8>,
    pub validator_count: usize,
    pub total_stake: u128,
    pub timestamp: u64,
    pub finalized: bool,
}

/// Engine-owned state: closed works, their consensus results, and
/// residual dust left in escrow after flooring.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub(crate) consensus: BTreeMap<(WorkId, AccountId), ConsensusResult>,
    pub(crate) closed_works: BTreeSet<WorkId>,
    pub(crate) residual: BTreeMap<WorkId, u128>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self, work_id: WorkId) -> bool {
        self.closed_works.contains(&work_id)
    }

    pub fn consensus_of(&self, work_id: WorkId, worker: AccountId) -> Option<&ConsensusResult> {
        self.consensus.get(&(work_id, worker))
    }

    pub fn residual_of(&self, work_id: WorkId) -> u128 {
        self.residual.get(&work_id).copied().unwrap_or(0)
    }
}
