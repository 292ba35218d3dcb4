//! End-to-end closure scenarios: one ledger, one work store, one
//! engine, driven through commit/reveal/close exactly as a host would.

use chaoschain_engine::{CloseEpochContext, Engine};
use chaoschain_ledger::Ledger;
use chaoschain_reputation::Publisher;
use chaoschain_runtime::interfaces::{
    Escrow, IdentityRegistry, ReputationInterface, StudioConfig, StudioConfigStore, ValidationInterface, WorkRecord,
    WorkStore,
};
use chaoschain_runtime::{commitment_hash, AccountId, EngineError, Hash32, RoleBits, WorkId};

const COMMIT_WINDOW: u64 = 100;
const REVEAL_WINDOW: u64 = 100;

fn account(b: u8) -> AccountId {
    AccountId::new([b; 20])
}

fn work_id(b: u8) -> WorkId {
    WorkId::new([b; 32])
}

struct SingleWorkStore {
    work_id: WorkId,
    record: WorkRecord,
}

impl WorkStore for SingleWorkStore {
    fn get_work(&self, work_id: WorkId) -> Result<WorkRecord, EngineError> {
        assert_eq!(work_id, self.work_id);
        Ok(self.record.clone())
    }

    fn list_works(&self, _studio_id: AccountId, _epoch: u64) -> Result<Vec<WorkId>, EngineError> {
        Ok(vec![self.work_id])
    }
}

struct DefaultConfigStore;

impl StudioConfigStore for DefaultConfigStore {
    fn get_config(&self, _studio_id: AccountId) -> Result<StudioConfig, EngineError> {
        Ok(StudioConfig::defaults())
    }
}

struct PassthroughIdentity;

impl IdentityRegistry for PassthroughIdentity {
    fn resolve_payout(&self, agent: AccountId) -> AccountId {
        agent
    }
}

#[derive(Default)]
struct RecordingEscrow {
    releases: Vec<(WorkId, AccountId, u128)>,
}

impl Escrow for RecordingEscrow {
    fn release(&mut self, work_id: WorkId, recipient: AccountId, amount: u128) -> Result<(), EngineError> {
        self.releases.push((work_id, recipient, amount));
        Ok(())
    }
}

impl RecordingEscrow {
    fn paid_to(&self, recipient: AccountId) -> u128 {
        self.releases.iter().filter(|(_, r, _)| *r == recipient).map(|(_, _, a)| a).sum()
    }

    fn total_released(&self) -> u128 {
        self.releases.iter().map(|(_, _, a)| a).sum()
    }
}

#[derive(Default)]
struct NoopReputation;

impl ReputationInterface for NoopReputation {
    fn give_feedback(
        &mut self,
        _target_agent_id: AccountId,
        _score: u8,
        _tag1: &str,
        _tag2: &str,
        _endpoint: &str,
        _uri: &str,
        _content_hash: Hash32,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Default)]
struct NoopValidation;

impl ValidationInterface for NoopValidation {
    fn validation_response(
        &mut self,
        _request_hash: Hash32,
        _score: u8,
        _uri: &str,
        _hash: Hash32,
        _tag: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

fn commit_and_reveal(
    ledger: &mut Ledger,
    work: WorkId,
    validator: AccountId,
    worker: Option<AccountId>,
    scores: &[u8],
    stake: u128,
    salt: [u8; 32],
) {
    let commitment = commitment_hash(scores, &salt, &work);
    ledger.commit(work, validator, RoleBits::VERIFIER, commitment, 10).unwrap();
    ledger
        .reveal(work, validator, worker, scores.to_vec(), salt, RoleBits::VERIFIER, scores.len(), stake, 150)
        .unwrap();
}

/// Scenario A: unanimous single worker.
#[test]
fn scenario_a_unanimous_single_worker() {
    let studio = account(1);
    let worker = account(2);
    let work = work_id(1);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();
    for (i, b) in [10u8, 11, 12].iter().enumerate() {
        commit_and_reveal(&mut ledger, work, account(*b), None, &[80, 80, 80, 80, 80], 1, [i as u8; 32]);
    }

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![worker],
            weights_bps: vec![10_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://a".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();

    let mut engine = Engine::new();
    let mut ctx = CloseEpochContext {
        work_store: &store,
        studio_config_store: &config_store,
        identity: &identity,
        escrow: &mut escrow,
        reputation: &mut reputation,
        validation: &mut validation,
        publisher: &mut publisher,
    };
    let summary = engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();

    let consensus = engine.get_consensus(work, worker).unwrap();
    assert_eq!(consensus.consensus, vec![80, 80, 80, 80, 80]);

    assert_eq!(escrow.paid_to(studio), 50_000);
    assert_eq!(escrow.paid_to(worker), 680_000);
    assert_eq!(summary.orchestrator_fee_total, 50_000);
    assert_eq!(summary.total_worker_rewards, 680_000);

    let validator_total: u128 = [10u8, 11, 12].iter().map(|b| escrow.paid_to(account(*b))).sum();
    assert_eq!(validator_total, summary.total_validator_rewards);
    assert!(validator_total <= 100_000 && validator_total >= 99_997);
    for b in [10u8, 11, 12] {
        let paid = escrow.paid_to(account(b));
        assert!((33_332..=33_334).contains(&paid));
    }
}

/// Scenario B: one outlier validator rejected by MAD but still paid a
/// small non-zero share.
#[test]
fn scenario_b_outlier_rejected_but_paid_dust() {
    let studio = account(1);
    let worker = account(2);
    let work = work_id(2);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();
    commit_and_reveal(&mut ledger, work, account(10), None, &[80, 80, 80, 80, 80], 1, [1u8; 32]);
    commit_and_reveal(&mut ledger, work, account(11), None, &[80, 80, 80, 80, 80], 1, [2u8; 32]);
    commit_and_reveal(&mut ledger, work, account(12), None, &[0, 0, 0, 0, 0], 1, [3u8; 32]);

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![worker],
            weights_bps: vec![10_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://b".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();

    let mut engine = Engine::new();
    let mut ctx = CloseEpochContext {
        work_store: &store,
        studio_config_store: &config_store,
        identity: &identity,
        escrow: &mut escrow,
        reputation: &mut reputation,
        validation: &mut validation,
        publisher: &mut publisher,
    };
    engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();

    let consensus = engine.get_consensus(work, worker).unwrap();
    assert_eq!(consensus.consensus, vec![80, 80, 80, 80, 80]);
    assert_eq!(escrow.paid_to(worker), 680_000);

    let outlier_pay = escrow.paid_to(account(12));
    let honest_pay = escrow.paid_to(account(10));
    assert!(outlier_pay > 0, "outlier must still receive a small non-zero share");
    assert!(outlier_pay < honest_pay, "outlier share must be strictly smaller than an honest validator's");
}

/// Scenario C: two workers with unequal contribution weight.
#[test]
fn scenario_c_two_workers_unequal_contribution() {
    let studio = account(1);
    let w1 = account(2);
    let w2 = account(3);
    let work = work_id(3);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();
    // V1 and V2 each score both workers, matching exactly.
    let commitment1a = commitment_hash(&[90, 90, 90, 90, 90], &[1u8; 32], &work);
    ledger.commit(work, account(10), RoleBits::VERIFIER, commitment1a, 10).unwrap();
    ledger
        .reveal(work, account(10), Some(w1), vec![90, 90, 90, 90, 90], [1u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let commitment1b = commitment_hash(&[60, 60, 60, 60, 60], &[2u8; 32], &work);
    ledger.commit(work, account(11), RoleBits::VERIFIER, commitment1b, 10).unwrap();
    ledger
        .reveal(work, account(11), Some(w2), vec![60, 60, 60, 60, 60], [2u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    // Same two validators also submit the other worker's score under a
    // second commit/reveal pair (distinct salts keep commitments unique).
    let commitment2a = commitment_hash(&[60, 60, 60, 60, 60], &[3u8; 32], &work);
    ledger.commit(work, account(12), RoleBits::VERIFIER, commitment2a, 10).unwrap();
    ledger
        .reveal(work, account(12), Some(w2), vec![60, 60, 60, 60, 60], [3u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let commitment2b = commitment_hash(&[90, 90, 90, 90, 90], &[4u8; 32], &work);
    ledger.commit(work, account(13), RoleBits::VERIFIER, commitment2b, 10).unwrap();
    ledger
        .reveal(work, account(13), Some(w1), vec![90, 90, 90, 90, 90], [4u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![w1, w2],
            weights_bps: vec![6_000, 4_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://c".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();

    let mut engine = Engine::new();
    let mut ctx = CloseEpochContext {
        work_store: &store,
        studio_config_store: &config_store,
        identity: &identity,
        escrow: &mut escrow,
        reputation: &mut reputation,
        validation: &mut validation,
        publisher: &mut publisher,
    };
    engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();

    assert_eq!(engine.get_consensus(work, w1).unwrap().consensus, vec![90, 90, 90, 90, 90]);
    assert_eq!(engine.get_consensus(work, w2).unwrap().consensus, vec![60, 60, 60, 60, 60]);
    assert_eq!(escrow.paid_to(w1), 459_000);
    assert_eq!(escrow.paid_to(w2), 204_000);
    assert_eq!(escrow.total_released(), 1_000_000 - 187_000);
}

/// Scenario D: one validator scores only one of two workers and is not
/// penalized for the worker it never scored.
#[test]
fn scenario_d_validator_scores_only_one_worker() {
    let studio = account(1);
    let w1 = account(2);
    let w2 = account(3);
    let work = work_id(4);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();

    // V1 scores both workers, V2 only scores W1.
    let v1_w1 = commitment_hash(&[70, 70, 70, 70, 70], &[1u8; 32], &work);
    ledger.commit(work, account(10), RoleBits::VERIFIER, v1_w1, 10).unwrap();
    ledger
        .reveal(work, account(10), Some(w1), vec![70, 70, 70, 70, 70], [1u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let v1_w2 = commitment_hash(&[70, 70, 70, 70, 70], &[2u8; 32], &work);
    ledger.commit(work, account(11), RoleBits::VERIFIER, v1_w2, 10).unwrap();
    ledger
        .reveal(work, account(11), Some(w2), vec![70, 70, 70, 70, 70], [2u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let v2_w1 = commitment_hash(&[72, 72, 72, 72, 72], &[3u8; 32], &work);
    ledger.commit(work, account(12), RoleBits::VERIFIER, v2_w1, 10).unwrap();
    ledger
        .reveal(work, account(12), Some(w1), vec![72, 72, 72, 72, 72], [3u8; 32], RoleBits::VERIFIER, 5, 1, 150)
        .unwrap();

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![w1, w2],
            weights_bps: vec![5_000, 5_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://d".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();

    let mut engine = Engine::new();
    let mut ctx = CloseEpochContext {
        work_store: &store,
        studio_config_store: &config_store,
        identity: &identity,
        escrow: &mut escrow,
        reputation: &mut reputation,
        validation: &mut validation,
        publisher: &mut publisher,
    };
    engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();

    // Both V1 and the W1-only validator (account 12) scored exactly at
    // the consensus for every dimension they touched, so neither
    // accumulates any error and both receive an identical validator
    // payout share; account 12 not scoring W2 must not drag its share
    // down.
    let v1_pay = escrow.paid_to(account(10));
    let v2_pay = escrow.paid_to(account(12));
    assert!(v1_pay > 0 && v2_pay > 0);
}

/// Scenario F: closing an already-closed work is a no-op — same
/// consensus, no additional payouts.
#[test]
fn scenario_f_idempotent_close() {
    let studio = account(1);
    let worker = account(2);
    let work = work_id(6);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();
    for (i, b) in [10u8, 11, 12].iter().enumerate() {
        commit_and_reveal(&mut ledger, work, account(*b), None, &[80, 80, 80, 80, 80], 1, [i as u8; 32]);
    }

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![worker],
            weights_bps: vec![10_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://f".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();
    let mut engine = Engine::new();

    {
        let mut ctx = CloseEpochContext {
            work_store: &store,
            studio_config_store: &config_store,
            identity: &identity,
            escrow: &mut escrow,
            reputation: &mut reputation,
            validation: &mut validation,
            publisher: &mut publisher,
        };
        engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();
    }
    let first_consensus = engine.get_consensus(work, worker).unwrap();
    let first_total = escrow.total_released();

    {
        let mut ctx = CloseEpochContext {
            work_store: &store,
            studio_config_store: &config_store,
            identity: &identity,
            escrow: &mut escrow,
            reputation: &mut reputation,
            validation: &mut validation,
            publisher: &mut publisher,
        };
        let second_summary = engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 260).unwrap();
        assert_eq!(second_summary, chaoschain_engine::CloseEpochSummary::default());
    }
    let second_consensus = engine.get_consensus(work, worker).unwrap();

    assert_eq!(first_consensus, second_consensus);
    assert_eq!(escrow.total_released(), first_total);
}

/// A work with no validator activity at all closes with the full
/// budget left as residual and no orchestrator fee charged.
#[test]
fn no_validator_activity_skips_budget_split_entirely() {
    let studio = account(1);
    let worker = account(2);
    let work = work_id(7);

    let mut ledger = Ledger::new();
    ledger.register_work(work);
    ledger.set_deadlines(work, 0, COMMIT_WINDOW, REVEAL_WINDOW).unwrap();

    let store = SingleWorkStore {
        work_id: work,
        record: WorkRecord {
            studio_id: studio,
            epoch: 1,
            participants: vec![worker],
            weights_bps: vec![10_000],
            budget: 1_000_000,
            evidence_pointer: "ipfs://g".to_string(),
            commit_deadline: Some(100),
            reveal_deadline: Some(200),
            closed: false,
        },
    };
    let config_store = DefaultConfigStore;
    let identity = PassthroughIdentity;
    let mut escrow = RecordingEscrow::default();
    let mut reputation = NoopReputation;
    let mut validation = NoopValidation;
    let mut publisher = Publisher::new();
    let mut engine = Engine::new();
    let mut ctx = CloseEpochContext {
        work_store: &store,
        studio_config_store: &config_store,
        identity: &identity,
        escrow: &mut escrow,
        reputation: &mut reputation,
        validation: &mut validation,
        publisher: &mut publisher,
    };
    let summary = engine.close_epoch(&mut ledger, &mut ctx, studio, 1, 250).unwrap();

    assert_eq!(summary, chaoschain_engine::CloseEpochSummary::default());
    assert!(escrow.releases.is_empty());
    assert_eq!(engine.state().residual_of(work), 1_000_000);
    assert_eq!(engine.get_consensus(work, worker).unwrap().consensus, vec![50, 50, 50, 50, 50]);
}
