//! The host-facing facade (§6 "Exposed operations"): one entry point
//! composing the commit-reveal ledger, the consensus & reward engine,
//! and the reputation publisher behind the seven calls a host process
//! needs — register a work, set its deadlines, commit and reveal
//! scores, close an epoch, and read back consensus. Everything this
//! crate does not own itself (roles, studio config, payout aliases,
//! reputation/validation gateways, escrow) is a trait object the host
//! supplies, the same shape as the teacher's `Runtime` trait sitting
//! underneath every actor entry point.

mod registry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

use chaoschain_engine::{CloseEpochContext, ConsensusParameters, Engine};
use chaoschain_fixed::U256;
use chaoschain_ledger::{Deadlines, Ledger};
use chaoschain_reputation::Publisher;
use chaoschain_runtime::interfaces::{
    Escrow, IdentityRegistry, ReputationInterface, RoleRegistry, StudioConfigStore, ValidationInterface, WorkRecord,
    WorkStore,
};
use chaoschain_runtime::{AccountId, EngineError, Hash32, WorkId};

pub use chaoschain_engine::{CloseEpochSummary, ConsensusResult};
pub use chaoschain_runtime::RoleBits;

/// Re-exports the external interface traits under the path the
/// external-facing documentation names (`chaoschain_core::interfaces`),
/// even though the concrete definitions live in `chaoschain_runtime`
/// to keep every other workspace crate from depending on this one —
/// see DESIGN.md.
pub mod interfaces {
    pub use chaoschain_runtime::interfaces::*;
}

pub use registry::WorkRegistry;

/// Everything needed to register a new work, bundled so the call site
/// doesn't carry seven positional parameters (§6 names `register_work`
/// with `work_id, studio_id, epoch, participants, weights,
/// evidence_pointer`; `budget` is added here since a `WorkRecord` must
/// carry an immutable budget from the moment it exists and §6 names no
/// separate funding call — see DESIGN.md).
#[derive(Debug, Clone)]
pub struct RegisterWorkRequest {
    pub work_id: WorkId,
    pub studio_id: AccountId,
    pub epoch: u64,
    pub participants: Vec<AccountId>,
    pub weights_bps: Vec<u32>,
    pub budget: u128,
    pub evidence_pointer: String,
}

/// The facade itself: owns the ledger, the engine, the work registry,
/// and the reputation publisher's dedup state; borrows the host's role
/// registry, studio config store, and identity registry for the
/// lifetime of every call.
pub struct ChaosChainEngine {
    ledger: Ledger,
    engine: Engine,
    registry: WorkRegistry,
    publisher: Publisher,
    role_registry: Box<dyn RoleRegistry>,
    studio_config_store: Box<dyn StudioConfigStore>,
    identity: Box<dyn IdentityRegistry>,
}

impl ChaosChainEngine {
    pub fn new(
        role_registry: Box<dyn RoleRegistry>,
        studio_config_store: Box<dyn StudioConfigStore>,
        identity: Box<dyn IdentityRegistry>,
    ) -> Self {
        Self {
            ledger: Ledger::new(),
            engine: Engine::new(),
            registry: WorkRegistry::new(),
            publisher: Publisher::new(),
            role_registry,
            studio_config_store,
            identity,
        }
    }

    /// Registers a new work. Rejected before any state changes if the
    /// participant/weight lists disagree in length or the weights do
    /// not sum to `10_000` (invariant 2) or a work with this id already
    /// exists.
    pub fn register_work(&mut self, req: RegisterWorkRequest) -> Result<(), EngineError> {
        if req.participants.len() != req.weights_bps.len() {
            return Err(EngineError::guard(format!(
                "{}: participants/weights length mismatch",
                req.work_id
            )));
        }
        let weight_sum: u64 = req.weights_bps.iter().map(|w| *w as u64).sum();
        if weight_sum != 10_000 {
            return Err(EngineError::guard(format!(
                "{}: contribution weights sum to {weight_sum}, expected 10000",
                req.work_id
            )));
        }
        if self.registry.contains(req.work_id) {
            return Err(EngineError::guard(format!("{} is already registered", req.work_id)));
        }

        self.registry.insert(
            req.work_id,
            WorkRecord {
                studio_id: req.studio_id,
                epoch: req.epoch,
                participants: req.participants,
                weights_bps: req.weights_bps,
                budget: req.budget,
                evidence_pointer: req.evidence_pointer,
                commit_deadline: None,
                reveal_deadline: None,
                closed: false,
            },
        );
        self.ledger.register_work(req.work_id);
        Ok(())
    }

    /// `set_deadlines(work_id, commit_window_s, reveal_window_s)`.
    /// Mirrors the resulting deadlines back onto the registry's
    /// `WorkRecord` for hosts that inspect it directly; the ledger
    /// remains the sole authority that enforces them.
    pub fn set_deadlines(
        &mut self,
        work_id: WorkId,
        now: u64,
        commit_window_s: u64,
        reveal_window_s: u64,
    ) -> Result<Deadlines, EngineError> {
        let deadlines = self.ledger.set_deadlines(work_id, now, commit_window_s, reveal_window_s)?;
        let record = self
            .registry
            .get_mut(work_id)
            .ok_or_else(|| EngineError::missing(format!("work {work_id} is not registered")))?;
        record.commit_deadline = Some(deadlines.commit_deadline);
        record.reveal_deadline = Some(deadlines.reveal_deadline);
        Ok(deadlines)
    }

    /// `commit_score(work_id, validator, commitment)`. Resolves the
    /// validator's role from the host's role registry before handing
    /// off to the ledger's guard checks.
    pub fn commit_score(
        &mut self,
        work_id: WorkId,
        validator: AccountId,
        commitment: Hash32,
        now: u64,
    ) -> Result<(), EngineError> {
        let record = WorkStore::get_work(&self.registry, work_id)?;
        let role = self.role_registry.get_role(record.studio_id, validator)?;
        self.ledger.commit(work_id, validator, role, commitment, now)
    }

    /// `reveal_score(work_id, validator, worker?, score_vector, salt)`.
    /// `stake_weight` is the validator's current stake, supplied by the
    /// host's staking module at call time (see DESIGN.md); the expected
    /// dimension count is derived from the studio's scoring
    /// configuration so the strict decoder rejects any mismatch.
    #[allow(clippy::too_many_arguments)]
    pub fn reveal_score(
        &mut self,
        work_id: WorkId,
        validator: AccountId,
        worker: Option<AccountId>,
        score_vector: Vec<u8>,
        salt: [u8; 32],
        stake_weight: u128,
        now: u64,
    ) -> Result<(), EngineError> {
        let record = WorkStore::get_work(&self.registry, work_id)?;
        let role = self.role_registry.get_role(record.studio_id, validator)?;
        let config = self.studio_config_store.get_config(record.studio_id)?;
        let expected_dimensions = interfaces::UNIVERSAL_DIMENSIONS + config.custom_weights.len();
        self.ledger.reveal(work_id, validator, worker, score_vector, salt, role, expected_dimensions, stake_weight, now)
    }

    /// `close_epoch(studio_id, epoch)`. `escrow`, `reputation`, and
    /// `validation` are request-scoped collaborators passed per call
    /// rather than stored on the facade, mirroring how
    /// `CloseEpochContext` already structures them in the engine crate.
    pub fn close_epoch(
        &mut self,
        studio_id: AccountId,
        epoch: u64,
        now: u64,
        escrow: &mut dyn Escrow,
        reputation: &mut dyn ReputationInterface,
        validation: &mut dyn ValidationInterface,
    ) -> Result<CloseEpochSummary, EngineError> {
        let summary = {
            let mut ctx = CloseEpochContext {
                work_store: &self.registry,
                studio_config_store: self.studio_config_store.as_ref(),
                identity: self.identity.as_ref(),
                escrow,
                reputation,
                validation,
                publisher: &mut self.publisher,
            };
            self.engine.close_epoch(&mut self.ledger, &mut ctx, studio_id, epoch, now)?
        };

        for work_id in WorkStore::list_works(&self.registry, studio_id, epoch)? {
            if self.engine.state().is_closed(work_id) {
                if let Some(record) = self.registry.get_mut(work_id) {
                    record.closed = true;
                }
            }
        }
        Ok(summary)
    }

    /// `get_consensus(work_id, worker)`.
    pub fn get_consensus(&self, work_id: WorkId, worker: AccountId) -> Result<ConsensusResult, EngineError> {
        self.engine.get_consensus(work_id, worker)
    }

    /// `set_consensus_parameters(alpha, beta, kappa, tau)`, all
    /// `S`-scaled.
    pub fn set_consensus_parameters(
        &mut self,
        alpha: U256,
        beta: U256,
        kappa: U256,
        tau: U256,
    ) -> Result<(), EngineError> {
        self.engine.set_consensus_parameters(ConsensusParameters { alpha, beta, kappa, tau })
    }
}
