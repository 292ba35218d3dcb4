//! The consensus & reward engine (component C4), the heart of the
//! system: per-work budget split, per-worker consensus via the scoring
//! kernel, quality-scalar computation, worker payout, and validator
//! accuracy weighting. Epoch closure is idempotent and atomic per
//! work.

pub mod state;

use std::collections::BTreeMap;

use chaoschain_fixed::{checked_add, checked_sub, from_u128, mul_div, scale, to_u128, U256};
use chaoschain_ledger::Ledger;
use chaoschain_reputation::{
    ConsensusSummaryEvent, Publisher, ValidatorAccuracyEvent, WorkerDimensionEvent, UNIVERSAL_DIMENSION_TAGS,
};
use chaoschain_runtime::interfaces::{
    Escrow, IdentityRegistry, ReputationInterface, StudioConfigStore, ValidationInterface, WorkStatus, WorkStore,
    UNIVERSAL_DIMENSIONS,
};
use chaoschain_runtime::{AccountId, EngineError, WorkId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub use state::{ConsensusResult, EngineState};

/// `α, β, κ, τ`, all `S`-scaled. Only `α` drives this engine's
/// behavior; `β, κ, τ` are reserved for future reward-sharpness,
/// slashing-severity, and tolerance policies and are range-checked but
/// otherwise unused (SPEC_FULL §9 open question).
#[derive(Debug, Clone, Copy)]
pub struct ConsensusParameters {
    pub alpha: U256,
    pub beta: U256,
    pub kappa: U256,
    pub tau: U256,
}

/// `U256` carries no `serde` support of its own in this workspace, so
/// the config-serialization promise is met by hand, round-tripping
/// through the same `u128` bridge the rest of this crate already uses
/// to cross the `U256`/host boundary.
#[derive(Serialize, Deserialize)]
struct ConsensusParametersWire {
    alpha: u128,
    beta: u128,
    kappa: u128,
    tau: u128,
}

impl Serialize for ConsensusParameters {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ConsensusParametersWire {
            alpha: to_u128(self.alpha).map_err(serde::ser::Error::custom)?,
            beta: to_u128(self.beta).map_err(serde::ser::Error::custom)?,
            kappa: to_u128(self.kappa).map_err(serde::ser::Error::custom)?,
            tau: to_u128(self.tau).map_err(serde::ser::Error::custom)?,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConsensusParameters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ConsensusParametersWire::deserialize(deserializer)?;
        Ok(ConsensusParameters {
            alpha: from_u128(wire.alpha),
            beta: from_u128(wire.beta),
            kappa: from_u128(wire.kappa),
            tau: from_u128(wire.tau),
        })
    }
}

impl Default for ConsensusParameters {
    fn default() -> Self {
        let s = scale();
        Self { alpha: U256::from(3u64) * s, beta: s, kappa: s, tau: s }
    }
}

impl ConsensusParameters {
    pub fn validate(&self) -> Result<(), EngineError> {
        let s = scale();
        let ten_s = U256::from(10u64) * s;
        let hundred_s = U256::from(100u64) * s;
        if self.alpha.is_zero() || self.alpha > ten_s {
            return Err(EngineError::guard("alpha must be in (0, 10*S]"));
        }
        if self.beta.is_zero() || self.beta > ten_s {
            return Err(EngineError::guard("beta must be in (0, 10*S]"));
        }
        if self.kappa.is_zero() || self.kappa > ten_s {
            return Err(EngineError::guard("kappa must be in (0, 10*S]"));
        }
        if self.tau.is_zero() || self.tau > hundred_s {
            return Err(EngineError::guard("tau must be in (0, 100*S]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseEpochSummary {
    pub total_worker_rewards: u128,
    pub total_validator_rewards: u128,
    pub orchestrator_fee_total: u128,
}

/// Everything `close_epoch` needs to talk to the outside world, bundled
/// so the call site doesn't carry six separate parameters.
pub struct CloseEpochContext<'a> {
    pub work_store: &'a dyn WorkStore,
    pub studio_config_store: &'a dyn StudioConfigStore,
    pub identity: &'a dyn IdentityRegistry,
    pub escrow: &'a mut dyn Escrow,
    pub reputation: &'a mut dyn ReputationInterface,
    pub validation: &'a mut dyn ValidationInterface,
    pub publisher: &'a mut Publisher,
}

/// Per-worker bookkeeping accumulated while closing a single work,
/// before the budget split and payouts are known.
struct WorkerOutcome {
    consensus: Vec<u8>,
    validator_count: usize,
    total_stake: u128,
    quality: u8,
    u_avg: u32,
    had_data: bool,
}

pub struct Engine {
    state: EngineState,
    params: ConsensusParameters,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self { state: EngineState::new(), params: ConsensusParameters::default() }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn set_consensus_parameters(&mut self, params: ConsensusParameters) -> Result<(), EngineError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn get_consensus(&self, work_id: WorkId, worker: AccountId) -> Result<ConsensusResult, EngineError> {
        self.state
            .consensus_of(work_id, worker)
            .cloned()
            .ok_or_else(|| EngineError::missing(format!("no consensus recorded for {work_id}/{worker}")))
    }

    fn work_status(&self, ledger: &Ledger, work_id: WorkId, now: u64) -> WorkStatus {
        if self.state.is_closed(work_id) {
            return WorkStatus::Closed;
        }
        match ledger.deadlines(work_id) {
            Ok(d) if now <= d.commit_deadline => WorkStatus::Committing,
            Ok(d) if now <= d.reveal_deadline => WorkStatus::Revealing,
            Ok(_) => WorkStatus::Closable,
            Err(_) => WorkStatus::Registered,
        }
    }

    /// Closes every registered work for `(studio_id, epoch)` that is
    /// currently *Closable*. Works already *Closed* are silently
    /// skipped (idempotency, §4.4(5)); works still in their commit or
    /// reveal window are skipped until a later call.
    pub fn close_epoch(
        &mut self,
        ledger: &mut Ledger,
        ctx: &mut CloseEpochContext,
        studio_id: AccountId,
        epoch: u64,
        now: u64,
    ) -> Result<CloseEpochSummary, EngineError> {
        let mut summary = CloseEpochSummary::default();
        for work_id in ctx.work_store.list_works(studio_id, epoch)? {
            match self.work_status(ledger, work_id, now) {
                WorkStatus::Closed => {
                    debug!("work {work_id} already closed, skipping");
                    continue;
                }
                WorkStatus::Closable => {}
                _ => {
                    debug!("work {work_id} is not yet closable, skipping");
                    continue;
                }
            }
            let effects = self.close_work(ledger, ctx, work_id, now)?;
            summary.total_worker_rewards = summary
                .total_worker_rewards
                .checked_add(effects.worker_rewards)
                .ok_or_else(|| EngineError::arithmetic("total worker rewards overflow"))?;
            summary.total_validator_rewards = summary
                .total_validator_rewards
                .checked_add(effects.validator_rewards)
                .ok_or_else(|| EngineError::arithmetic("total validator rewards overflow"))?;
            summary.orchestrator_fee_total = summary
                .orchestrator_fee_total
                .checked_add(effects.orchestrator_fee)
                .ok_or_else(|| EngineError::arithmetic("total orchestrator fee overflow"))?;
        }
        Ok(summary)
    }

    fn close_work(
        &mut self,
        ledger: &mut Ledger,
        ctx: &mut CloseEpochContext,
        work_id: WorkId,
        now: u64,
    ) -> Result<WorkCloseEffects, EngineError> {
        let work = ctx.work_store.get_work(work_id)?;
        if work.participants.len() != work.weights_bps.len() {
            return Err(EngineError::guard(format!("{work_id}: participants/weights length mismatch")));
        }
        let weight_sum: u64 = work.weights_bps.iter().map(|w| *w as u64).sum();
        if weight_sum != 10_000 {
            return Err(EngineError::guard(format!(
                "{work_id}: contribution weights sum to {weight_sum}, expected 10000"
            )));
        }

        let config = ctx.studio_config_store.get_config(work.studio_id)?;
        let dimension_count = UNIVERSAL_DIMENSIONS + config.custom_weights.len();

        // Step 3: per-worker consensus, in declared-participant order.
        let mut outcomes: BTreeMap<AccountId, WorkerOutcome> = BTreeMap::new();
        let mut deviation_by_validator: BTreeMap<AccountId, u128> = BTreeMap::new();
        let mut any_worker_had_data = false;

        for worker in &work.participants {
            let rows = ledger.submissions_for_worker(work_id, *worker)?;
            let had_data = !rows.is_empty();

            let (consensus, total_stake, validator_count) = if had_data {
                any_worker_had_data = true;
                let ids: Vec<AccountId> = rows.iter().map(|(v, _)| *v).collect();
                let kernel_rows: Vec<chaoschain_scoring::ValidatorRow> = rows
                    .iter()
                    .map(|(_, submission)| chaoschain_scoring::ValidatorRow {
                        stake: submission.stake_weight,
                        dimensions: submission.scores.iter().map(|s| Some(*s)).collect(),
                    })
                    .collect();
                let out = chaoschain_scoring::aggregate(&kernel_rows, self.params.alpha)?;
                for (i, id) in ids.iter().enumerate() {
                    let dev = out.validator_squared_deviation.get(i).copied().unwrap_or(0);
                    let entry = deviation_by_validator.entry(*id).or_insert(0);
                    *entry = entry
                        .checked_add(dev)
                        .ok_or_else(|| EngineError::arithmetic("validator deviation overflow"))?;
                }
                (out.consensus, out.total_stake, out.validator_count)
            } else {
                warn!("work {work_id}: no validator scored worker {worker}, defaulting consensus to neutral");
                (vec![50u8; dimension_count], 0u128, 0usize)
            };

            let u_avg: u32 = if consensus.len() >= UNIVERSAL_DIMENSIONS {
                (consensus[..UNIVERSAL_DIMENSIONS].iter().map(|x| *x as u32).sum::<u32>())
                    / (UNIVERSAL_DIMENSIONS as u32)
            } else {
                50
            };

            // A studio with no custom dimensions has nothing for w_c to
            // weight against; blending in a synthetic c_weighted would
            // arbitrarily drag quality toward 50, so q collapses to
            // u_avg directly in that case (w_u effectively 1, w_c 0).
            let custom_count = config.custom_weights.len();
            let quality = if custom_count == 0 {
                chaoschain_fixed::clamp_score(u_avg as i64)
            } else if consensus.len() >= UNIVERSAL_DIMENSIONS + custom_count {
                let weighted_sum: u64 = config
                    .custom_weights
                    .iter()
                    .enumerate()
                    .map(|(k, rho)| *rho * consensus[UNIVERSAL_DIMENSIONS + k] as u64)
                    .sum();
                let c_weighted = weighted_sum / chaoschain_fixed::SCALE;
                let weighted = config.w_u * u_avg as u64 + config.w_c * c_weighted;
                chaoschain_fixed::clamp_score((weighted / chaoschain_fixed::SCALE) as i64)
            } else {
                let weighted = config.w_u * u_avg as u64 + config.w_c * 50;
                chaoschain_fixed::clamp_score((weighted / chaoschain_fixed::SCALE) as i64)
            };

            outcomes.insert(
                *worker,
                WorkerOutcome { consensus, validator_count, total_stake, quality, u_avg, had_data },
            );
        }

        // Step 2: budget split, step 4: validator payouts. Skipped
        // entirely if nobody scored anything anywhere in this work
        // (§4.4 failure semantics): the full budget stays residual and
        // no orchestrator fee is charged.
        let mut orchestrator_fee_u128: u128 = 0;
        let mut worker_rewards_total: u128 = 0;
        let mut validator_rewards_total: u128 = 0;
        let mut residual = work.budget;

        if any_worker_had_data {
            let budget = from_u128(work.budget);
            let orchestrator_fee = mul_div(budget, U256::from(5u64), U256::from(100u64))?;
            let validator_pool = mul_div(budget, U256::from(10u64), U256::from(100u64))?;
            let worker_pool = checked_sub(budget, checked_add(orchestrator_fee, validator_pool)?)?;

            orchestrator_fee_u128 = to_u128(orchestrator_fee)?;
            if let Err(err) = ctx.escrow.release(work_id, work.studio_id, orchestrator_fee_u128) {
                warn!("work {work_id}: orchestrator fee release failed: {err}");
            }

            let mut worker_pool_spent = U256::zero();
            for (idx, worker) in work.participants.iter().enumerate() {
                let outcome = outcomes.get(worker).expect("every participant has an outcome");
                let weight_bps = work.weights_bps[idx] as u64;
                let numerator = U256::from(weight_bps * outcome.quality as u64);
                let payout = mul_div(worker_pool, numerator, U256::from(1_000_000u64))?;
                worker_pool_spent = checked_add(worker_pool_spent, payout)?;
                let payout_u128 = to_u128(payout)?;
                if payout_u128 > 0 {
                    let alias = ctx.identity.resolve_payout(*worker);
                    if let Err(err) = ctx.escrow.release(work_id, alias, payout_u128) {
                        warn!("work {work_id}: worker {worker} payout release failed: {err}");
                    } else {
                        worker_rewards_total = worker_rewards_total
                            .checked_add(payout_u128)
                            .ok_or_else(|| EngineError::arithmetic("worker rewards overflow"))?;
                    }
                }

                if outcome.had_data {
                    for (d, score) in outcome.consensus.iter().enumerate() {
                        ctx.publisher.publish_worker_dimension(
                            ctx.reputation,
                            &WorkerDimensionEvent {
                                work_id,
                                worker: *worker,
                                studio_id: work.studio_id,
                                dimension_tag: dimension_tag(d, &config.custom_dimension_names),
                                score: *score,
                                evidence_pointer: work.evidence_pointer.clone(),
                            },
                        );
                    }
                }
            }

            // Validator accuracy weight `ω_v = S^2 / (S + E_v)`, derived
            // from the boundary condition ω_v = S at E_v = 0.
            let s = scale();
            let mut weights: Vec<(AccountId, U256)> = Vec::new();
            let mut omega_sum = U256::zero();
            for validator in ledger.validators(work_id)? {
                let Some(e_v) = deviation_by_validator.get(validator) else { continue };
                let denom = checked_add(s, from_u128(*e_v))?;
                let omega_v = mul_div(s, s, denom)?;
                omega_sum = checked_add(omega_sum, omega_v)?;
                weights.push((*validator, omega_v));
            }
            if !omega_sum.is_zero() {
                for (validator, omega_v) in &weights {
                    let pay = mul_div(validator_pool, *omega_v, omega_sum)?;
                    let pay_u128 = to_u128(pay)?;
                    if pay_u128 > 0 {
                        let alias = ctx.identity.resolve_payout(*validator);
                        if let Err(err) = ctx.escrow.release(work_id, alias, pay_u128) {
                            warn!("work {work_id}: validator {validator} payout release failed: {err}");
                        } else {
                            validator_rewards_total = validator_rewards_total
                                .checked_add(pay_u128)
                                .ok_or_else(|| EngineError::arithmetic("validator rewards overflow"))?;
                        }
                    }
                    let perf_raw = mul_div(*omega_v, U256::from(100u64), s)?;
                    let perf = chaoschain_fixed::clamp_score(perf_raw.low_u32() as i64);
                    ctx.publisher.publish_validator_accuracy(
                        ctx.reputation,
                        &ValidatorAccuracyEvent { work_id, validator: *validator, perf },
                    );
                }
            }

            let spent = checked_add(worker_pool_spent, orchestrator_fee)?;
            let total_spent = checked_add(spent, from_u128(validator_rewards_total))?;
            residual = to_u128(checked_sub(budget, total_spent)?)?;

            let u_avgs: Vec<u32> = outcomes.values().map(|o| o.u_avg).collect();
            let mean_universal = if u_avgs.is_empty() {
                50
            } else {
                (u_avgs.iter().sum::<u32>() / u_avgs.len() as u32) as u8
            };
            ctx.publisher.publish_consensus_summary(
                ctx.validation,
                &ConsensusSummaryEvent { work_id, mean_universal_score: mean_universal },
            );
        }

        // Commit per-worker consensus results. Reached only once every
        // fallible step above has returned `Ok`, so a work never ends
        // up half-closed.
        for worker in &work.participants {
            let outcome = outcomes.remove(worker).expect("every participant has an outcome");
            self.state.consensus.insert(
                (work_id, *worker),
                ConsensusResult {
                    consensus: outcome.consensus,
                    validator_count: outcome.validator_count,
                    total_stake: outcome.total_stake,
                    timestamp: now,
                    finalized: true,
                },
            );
        }
        self.state.closed_works.insert(work_id);
        self.state.residual.insert(work_id, residual);

        Ok(WorkCloseEffects {
            worker_rewards: worker_rewards_total,
            validator_rewards: validator_rewards_total,
            orchestrator_fee: orchestrator_fee_u128,
        })
    }
}

fn dimension_tag(index: usize, custom_names: &[String]) -> String {
    if index < UNIVERSAL_DIMENSIONS {
        UNIVERSAL_DIMENSION_TAGS[index].to_string()
    } else {
        custom_names
            .get(index - UNIVERSAL_DIMENSIONS)
            .cloned()
            .unwrap_or_else(|| "CUSTOM".to_string())
    }
}

struct WorkCloseEffects {
    worker_rewards: u128,
    validator_rewards: u128,
    orchestrator_fee: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        ConsensusParameters::default().validate().unwrap();
    }

    #[test]
    fn alpha_zero_is_rejected() {
        let mut params = ConsensusParameters::default();
        params.alpha = U256::zero();
        assert!(params.validate().is_err());
    }

    #[test]
    fn alpha_above_ten_s_is_rejected() {
        let mut params = ConsensusParameters::default();
        params.alpha = U256::from(11u64) * scale();
        assert!(params.validate().is_err());
    }

    #[test]
    fn tau_accepts_up_to_hundred_s() {
        let mut params = ConsensusParameters::default();
        params.tau = U256::from(100u64) * scale();
        params.validate().unwrap();
        params.tau = U256::from(101u64) * scale();
        assert!(params.validate().is_err());
    }

    #[test]
    fn dimension_tag_uses_universal_names_then_custom() {
        let custom = vec!["CREATIVITY".to_string()];
        assert_eq!(dimension_tag(0, &custom), "INITIATIVE");
        assert_eq!(dimension_tag(4, &custom), "EFFICIENCY");
        assert_eq!(dimension_tag(5, &custom), "CREATIVITY");
        assert_eq!(dimension_tag(6, &[]), "CUSTOM");
    }

    #[test]
    fn budget_split_matches_fixed_percentages() {
        let budget = from_u128(1_000_000);
        let fee = mul_div(budget, U256::from(5u64), U256::from(100u64)).unwrap();
        let pool = mul_div(budget, U256::from(10u64), U256::from(100u64)).unwrap();
        assert_eq!(to_u128(fee).unwrap(), 50_000);
        assert_eq!(to_u128(pool).unwrap(), 100_000);
    }
}
