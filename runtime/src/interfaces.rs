//! External interfaces the engine consumes and exposes, expressed as
//! plain Rust traits (§6). A host process supplies the concrete
//! implementation — chain client, database, HTTP gateway — all out of
//! scope here. This mirrors the teacher's `Runtime` trait living in
//! `fil_actors_runtime` and consumed by every actor crate above it.

use serde::{Deserialize, Serialize};

use crate::{AccountId, EngineError, Hash32, RoleBits, WorkId};

/// A registered work as the host's durable store knows it. Deadlines
/// are read back here purely for convenience; the commit-reveal ledger
/// remains the authority that enforces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRecord {
    pub studio_id: AccountId,
    pub epoch: u64,
    pub participants: Vec<AccountId>,
    /// Contribution weight in basis points, parallel to `participants`;
    /// must sum to `10_000`.
    pub weights_bps: Vec<u32>,
    pub budget: u128,
    pub evidence_pointer: String,
    pub commit_deadline: Option<u64>,
    pub reveal_deadline: Option<u64>,
    pub closed: bool,
}

/// Where a work sits in its lifecycle at a given instant (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    Registered,
    Committing,
    Revealing,
    Closable,
    Closed,
}

impl WorkRecord {
    pub fn status(&self, now: u64) -> WorkStatus {
        if self.closed {
            return WorkStatus::Closed;
        }
        match (self.commit_deadline, self.reveal_deadline) {
            (Some(commit), Some(reveal)) => {
                if now <= commit {
                    WorkStatus::Committing
                } else if now <= reveal {
                    WorkStatus::Revealing
                } else {
                    WorkStatus::Closable
                }
            }
            _ => WorkStatus::Registered,
        }
    }
}

/// Read-only accessor for registered works, keyed by studio and epoch.
pub trait WorkStore {
    fn get_work(&self, work_id: WorkId) -> Result<WorkRecord, EngineError>;
    fn list_works(&self, studio_id: AccountId, epoch: u64) -> Result<Vec<WorkId>, EngineError>;
}

/// Per-studio scoring configuration: custom dimension weights and the
/// universal/custom split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioConfig {
    pub custom_dimension_names: Vec<String>,
    /// `ρ_d`, `S`-scaled, summing to `S`.
    pub custom_weights: Vec<u64>,
    /// `w_u`, `S`-scaled. Default `0.7·S`.
    pub w_u: u64,
    /// `w_c`, `S`-scaled. Default `0.3·S`. `w_u + w_c == S`.
    pub w_c: u64,
}

pub const UNIVERSAL_DIMENSIONS: usize = 5;

impl StudioConfig {
    pub fn defaults() -> Self {
        Self { custom_dimension_names: Vec::new(), custom_weights: Vec::new(), w_u: 700_000, w_c: 300_000 }
    }
}

pub trait StudioConfigStore {
    fn get_config(&self, studio_id: AccountId) -> Result<StudioConfig, EngineError>;
}

/// `{worker, verifier, client}` role lookups, scoped per studio.
pub trait RoleRegistry {
    fn get_role(&self, studio_id: AccountId, account: AccountId) -> Result<RoleBits, EngineError>;
}

/// Resolves an agent's payout alias. Failure is never fatal: the
/// implementation falls back to the agent's own address rather than
/// propagating an error, per §6.
pub trait IdentityRegistry {
    fn resolve_payout(&self, agent: AccountId) -> AccountId;
}

/// Publishes one reputation event per call. Failures are swallowed by
/// the caller (the reputation publisher, C5), never surfaced as a
/// closure-aborting error.
pub trait ReputationInterface {
    fn give_feedback(
        &mut self,
        target_agent_id: AccountId,
        score: u8,
        tag1: &str,
        tag2: &str,
        endpoint: &str,
        uri: &str,
        content_hash: Hash32,
    ) -> Result<(), EngineError>;
}

/// Publishes a single validation-summary event per work.
pub trait ValidationInterface {
    fn validation_response(
        &mut self,
        request_hash: Hash32,
        score: u8,
        uri: &str,
        hash: Hash32,
        tag: &str,
    ) -> Result<(), EngineError>;
}

/// Pull-based settlement: `release` credits a withdrawable balance,
/// never performs a synchronous transfer.
pub trait Escrow {
    fn release(&mut self, work_id: WorkId, recipient: AccountId, amount: u128) -> Result<(), EngineError>;
}
