//! The commit-reveal ledger (component C3): per-(work, validator)
//! commitment cells, deadlines, and the sparse per-work score matrix
//! that the scoring kernel reads from at closure time.

use std::collections::{BTreeMap, BTreeSet};

use chaoschain_runtime::{commitment_hash, AccountId, EngineError, Hash32, RoleBits, WorkId};
use log::{debug, warn};

/// `commit_deadline = now + commit_window`, `reveal_deadline =
/// commit_deadline + reveal_window`, both absolute timestamps in the
/// caller's time unit (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub commit_deadline: u64,
    pub reveal_deadline: u64,
}

#[derive(Debug, Clone, Default)]
struct CommitCell {
    commitment: Option<Hash32>,
    nonce: u64,
}

/// A revealed score vector together with the stake the validator
/// carried at reveal time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub scores: Vec<u8>,
    pub stake_weight: u128,
}

#[derive(Debug, Clone, Default)]
struct WorkLedger {
    deadlines: Option<Deadlines>,
    commitments: BTreeMap<AccountId, CommitCell>,
    submissions: BTreeMap<(AccountId, Option<AccountId>), Submission>,
    validators_seen: BTreeSet<AccountId>,
    validators: Vec<AccountId>,
}

/// The ledger holds one [`WorkLedger`] per registered work id. It has no
/// notion of studio, participants, or budget — that belongs to the Work
/// Store the core consults; this crate only owns the commit-reveal
/// protocol and the score matrix it produces.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    works: BTreeMap<WorkId, WorkLedger>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a work id with empty ledger state. Idempotent: calling
    /// it again for an already-registered work id is a no-op rather
    /// than an error, since the Work Store upstream is the source of
    /// truth for "does this work exist".
    pub fn register_work(&mut self, work_id: WorkId) {
        self.works.entry(work_id).or_default();
    }

    fn work_mut(&mut self, work_id: WorkId) -> Result<&mut WorkLedger, EngineError> {
        self.works
            .get_mut(&work_id)
            .ok_or_else(|| EngineError::guard(format!("work {work_id} is not registered")))
    }

    fn work(&self, work_id: WorkId) -> Result<&WorkLedger, EngineError> {
        self.works
            .get(&work_id)
            .ok_or_else(|| EngineError::guard(format!("work {work_id} is not registered")))
    }

    /// `set_deadlines(work_id, commit_window, reveal_window)` — rejects
    /// if the work is not registered or the window arithmetic
    /// overflows.
    pub fn set_deadlines(
        &mut self,
        work_id: WorkId,
        now: u64,
        commit_window_s: u64,
        reveal_window_s: u64,
    ) -> Result<Deadlines, EngineError> {
        let commit_deadline = now
            .checked_add(commit_window_s)
            .ok_or_else(|| EngineError::arithmetic("commit deadline overflow"))?;
        let reveal_deadline = commit_deadline
            .checked_add(reveal_window_s)
            .ok_or_else(|| EngineError::arithmetic("reveal deadline overflow"))?;
        let deadlines = Deadlines { commit_deadline, reveal_deadline };
        let work = self.work_mut(work_id)?;
        work.deadlines = Some(deadlines);
        debug!("work {work_id}: deadlines set to {deadlines:?}");
        Ok(deadlines)
    }

    pub fn deadlines(&self, work_id: WorkId) -> Result<Deadlines, EngineError> {
        self.work(work_id)?
            .deadlines
            .ok_or_else(|| EngineError::missing(format!("work {work_id} has no deadlines set")))
    }

    /// `commit(work_id, validator, commitment)` — accepted iff the work
    /// is registered, the validator holds the verifier role, no prior
    /// commitment exists for this (work, validator), `now` is within
    /// the commit window, and the commitment is non-zero.
    pub fn commit(
        &mut self,
        work_id: WorkId,
        validator: AccountId,
        role: RoleBits,
        commitment: Hash32,
        now: u64,
    ) -> Result<(), EngineError> {
        if !role.has_verifier() {
            return Err(EngineError::guard(format!("{validator} does not hold the verifier role")));
        }
        if commitment.is_zero() {
            return Err(EngineError::guard("commitment must be non-zero"));
        }
        let work = self.work_mut(work_id)?;
        let deadlines = work
            .deadlines
            .ok_or_else(|| EngineError::guard(format!("work {work_id} has no deadlines set")))?;
        if now > deadlines.commit_deadline {
            return Err(EngineError::guard(format!("commit window for {work_id} has closed")));
        }
        let cell = work.commitments.entry(validator).or_default();
        if cell.commitment.is_some() {
            return Err(EngineError::guard(format!(
                "{validator} already has a commitment for {work_id}"
            )));
        }
        cell.commitment = Some(commitment);
        cell.nonce += 1;
        Ok(())
    }

    /// `reveal(work_id, validator, worker_opt, score_vector, salt)` —
    /// accepted iff a prior commitment exists, the reveal window is
    /// open, the hash binds, and the role permits scoring. `expected_dimensions`
    /// enforces the strict decoder (SPEC_FULL §9): any length mismatch
    /// is an `AmbiguousDecode`, never silently padded. `stake_weight` is
    /// the validator's current stake as supplied by the host's staking
    /// module at reveal time (the spec's Submission entity carries a
    /// stake weight but names no external stake interface to fetch it
    /// from; threading it through the reveal call is the narrowest
    /// resolution — see DESIGN.md).
    #[allow(clippy::too_many_arguments)]
    pub fn reveal(
        &mut self,
        work_id: WorkId,
        validator: AccountId,
        worker: Option<AccountId>,
        score_vector: Vec<u8>,
        salt: [u8; 32],
        role: RoleBits,
        expected_dimensions: usize,
        stake_weight: u128,
        now: u64,
    ) -> Result<(), EngineError> {
        if !role.has_verifier() {
            return Err(EngineError::guard(format!("{validator} does not hold the verifier role")));
        }
        if score_vector.len() != expected_dimensions {
            return Err(EngineError::ambiguous_decode(format!(
                "score vector has {} dimensions, expected {expected_dimensions}",
                score_vector.len()
            )));
        }
        if score_vector.iter().any(|s| *s > 100) {
            return Err(EngineError::guard("score dimension out of range [0, 100]"));
        }

        let work = self.work_mut(work_id)?;
        let deadlines = work
            .deadlines
            .ok_or_else(|| EngineError::guard(format!("work {work_id} has no deadlines set")))?;
        if now <= deadlines.commit_deadline || now > deadlines.reveal_deadline {
            return Err(EngineError::guard(format!("{work_id} is not in its reveal window")));
        }

        let cell = work
            .commitments
            .get_mut(&validator)
            .ok_or_else(|| EngineError::guard(format!("{validator} has no commitment for {work_id}")))?;
        let stored = cell
            .commitment
            .ok_or_else(|| EngineError::guard(format!("{validator} has no commitment for {work_id}")))?;

        let computed = commitment_hash(&score_vector, &salt, &work_id);
        if computed != stored {
            return Err(EngineError::guard("reveal does not match the stored commitment"));
        }

        cell.commitment = None;
        work.submissions.insert((validator, worker), Submission { scores: score_vector, stake_weight });
        if work.validators_seen.insert(validator) {
            work.validators.push(validator);
        }
        Ok(())
    }

    /// Ordered, deduplicated validator list in first-sighting order.
    pub fn validators(&self, work_id: WorkId) -> Result<&[AccountId], EngineError> {
        Ok(&self.work(work_id)?.validators)
    }

    /// Assembles the sparse score matrix for one worker: every
    /// validator's per-worker submission if present, falling back to
    /// their shared (worker-agnostic) submission otherwise, in
    /// first-sighting validator order.
    pub fn submissions_for_worker(
        &self,
        work_id: WorkId,
        worker: AccountId,
    ) -> Result<Vec<(AccountId, Submission)>, EngineError> {
        let work = self.work(work_id)?;
        let mut out = Vec::new();
        for validator in &work.validators {
            if let Some(submission) = work.submissions.get(&(*validator, Some(worker))) {
                out.push((*validator, submission.clone()));
            } else if let Some(submission) = work.submissions.get(&(*validator, None)) {
                out.push((*validator, submission.clone()));
            }
        }
        if out.is_empty() {
            warn!("work {work_id}: no validator scored worker {worker}");
        }
        Ok(out)
    }

    pub fn nonce(&self, work_id: WorkId, validator: AccountId) -> Result<u64, EngineError> {
        Ok(self
            .work(work_id)?
            .commitments
            .get(&validator)
            .map(|c| c.nonce)
            .unwrap_or(0))
    }

    pub fn has_commitment(&self, work_id: WorkId, validator: AccountId) -> Result<bool, EngineError> {
        Ok(self
            .work(work_id)?
            .commitments
            .get(&validator)
            .map(|c| c.commitment.is_some())
            .unwrap_or(false))
    }
}
