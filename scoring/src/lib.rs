//! The scoring kernel (component C2): per-dimension robust aggregation
//! over a stake-weighted, sparse score matrix for a single worker on a
//! single work. Median + MAD outlier rejection followed by a
//! stake-weighted mean of the survivors, exactly as described in
//! SPEC_FULL §4.2.

use chaoschain_fixed::{mul_div_round_nearest, U256};
use chaoschain_runtime::EngineError;
use log::{debug, trace};

/// A single validator's row in the sparse score matrix for one
/// worker: a stake weight and one score per dimension, `None` where
/// that validator did not score the dimension.
#[derive(Debug, Clone)]
pub struct ValidatorRow {
    pub stake: u128,
    pub dimensions: Vec<Option<u8>>,
}

/// The kernel's output for one (work, worker) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOutput {
    /// Consensus score per dimension, in `[0, 100]`.
    pub consensus: Vec<u8>,
    /// Number of validators that scored at least one dimension.
    pub validator_count: usize,
    /// Total stake across validators that scored at least one
    /// dimension.
    pub total_stake: u128,
    /// Parallel to the `rows` slice passed to [`aggregate`]: the sum,
    /// over dimensions that validator scored, of the squared deviation
    /// from the *final* consensus value. Used by the reward engine
    /// (C4) to compute validator accuracy weights.
    pub validator_squared_deviation: Vec<u128>,
}

/// Aggregates a sparse score matrix for one worker into a consensus
/// vector. `alpha_scaled` is `α` in `S`-scaled fixed point (default
/// `3·S`, see [`chaoschain_fixed::SCALE`]).
///
/// If no validator scored any dimension, every dimension defaults to
/// `50` (neutral), `validator_count` and `total_stake` are `0`, and
/// `validator_squared_deviation` is all zeros.
pub fn aggregate(rows: &[ValidatorRow], alpha_scaled: U256) -> Result<KernelOutput, EngineError> {
    let dimensions = rows.iter().map(|r| r.dimensions.len()).max().unwrap_or(0);
    let mut consensus = vec![50u8; dimensions];
    let mut validator_squared_deviation = vec![0u128; rows.len()];

    let mut contributing_stake = 0u128;
    let mut contributing: Vec<bool> = vec![false; rows.len()];

    for dim in 0..dimensions {
        let present: Vec<(usize, u8, u128)> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.dimensions.get(dim).copied().flatten().map(|v| (i, v, row.stake)))
            .collect();

        if present.is_empty() {
            trace!("dimension {dim}: no validator scored it, emitting neutral 50");
            continue;
        }

        let median = weighted_median_u8(&present)?;
        let deviations: Vec<(usize, u64, u128)> = present
            .iter()
            .map(|(i, v, s)| (*i, (*v as i64 - median as i64).unsigned_abs(), *s))
            .collect();
        let mad = weighted_median_u64(&deviations)?;

        let mad_scaled = chaoschain_fixed::from_u128(mad as u128);
        let mut inlier_sum_value: u128 = 0;
        let mut inlier_sum_stake: u128 = 0;
        for (i, value, stake) in &present {
            let dev = (*value as i64 - median as i64).unsigned_abs();
            let is_inlier = is_inlier(dev, alpha_scaled, mad_scaled)?;
            if is_inlier {
                inlier_sum_value = checked_add_u128(inlier_sum_value, (*value as u128) * stake)?;
                inlier_sum_stake = checked_add_u128(inlier_sum_stake, *stake)?;
            }
            contributing[*i] = true;
        }

        let consensus_d = if inlier_sum_stake == 0 {
            debug!("dimension {dim}: all inliers carried zero stake, falling back to the median");
            median
        } else {
            let mean = mul_div_round_nearest(
                chaoschain_fixed::from_u128(inlier_sum_value),
                U256::from(1u64),
                chaoschain_fixed::from_u128(inlier_sum_stake),
            )?;
            chaoschain_fixed::clamp_score(mean.low_u32() as i64)
        };
        consensus[dim] = consensus_d;

        for (i, value, _stake) in &present {
            let dev = (*value as i64 - consensus_d as i64).unsigned_abs() as u128;
            let sq = checked_mul_u128(dev, dev)?;
            validator_squared_deviation[*i] = checked_add_u128(validator_squared_deviation[*i], sq)?;
        }
    }

    for (i, row) in rows.iter().enumerate() {
        if contributing[i] {
            contributing_stake = checked_add_u128(contributing_stake, row.stake)?;
        }
    }

    Ok(KernelOutput {
        consensus,
        validator_count: contributing.iter().filter(|c| **c).count(),
        total_stake: contributing_stake,
        validator_squared_deviation,
    })
}

/// `|x_i − m_d| · S ≤ α · MAD_d` compared as exact integers: this is
/// `dev ≤ α/S · MAD_d` without ever dividing. When `MAD_d = 0` this
/// reduces to `dev · S ≤ 0`, i.e. only an exact match at the median
/// survives — the median itself always satisfies `dev = 0`.
fn is_inlier(dev: u64, alpha_scaled: U256, mad: U256) -> Result<bool, EngineError> {
    let lhs = chaoschain_fixed::checked_mul(chaoschain_fixed::from_u128(dev as u128), chaoschain_fixed::scale())?;
    let rhs = chaoschain_fixed::checked_mul(alpha_scaled, mad)?;
    Ok(lhs <= rhs)
}

/// Stake-weighted median of `(row, value, stake)` triples, sorted by
/// `value`. Ties in cumulative stake position resolve to the lower
/// value because we scan ascending and return on first threshold hit.
fn weighted_median_u8(present: &[(usize, u8, u128)]) -> Result<u8, EngineError> {
    let mut sorted = present.to_vec();
    sorted.sort_by_key(|(_, v, _)| *v);
    let total = checked_sum_stake(sorted.iter().map(|(_, _, s)| *s))?;
    if total == 0 {
        return Ok(sorted.first().map(|(_, v, _)| *v).unwrap_or(50));
    }
    let mut cumulative = 0u128;
    for (_, value, stake) in &sorted {
        cumulative = checked_add_u128(cumulative, *stake)?;
        let doubled = checked_mul_u128(cumulative, 2)?;
        if doubled >= total {
            return Ok(*value);
        }
    }
    Ok(sorted.last().map(|(_, v, _)| *v).unwrap_or(50))
}

/// Same algorithm as [`weighted_median_u8`] but over `u64` deviation
/// magnitudes, used to compute the MAD.
fn weighted_median_u64(present: &[(usize, u64, u128)]) -> Result<u64, EngineError> {
    let mut sorted = present.to_vec();
    sorted.sort_by_key(|(_, v, _)| *v);
    let total = checked_sum_stake(sorted.iter().map(|(_, _, s)| *s))?;
    if total == 0 {
        return Ok(sorted.first().map(|(_, v, _)| *v).unwrap_or(0));
    }
    let mut cumulative = 0u128;
    for (_, value, stake) in &sorted {
        cumulative = checked_add_u128(cumulative, *stake)?;
        let doubled = checked_mul_u128(cumulative, 2)?;
        if doubled >= total {
            return Ok(*value);
        }
    }
    Ok(sorted.last().map(|(_, v, _)| *v).unwrap_or(0))
}

fn checked_sum_stake(it: impl Iterator<Item = u128>) -> Result<u128, EngineError> {
    it.try_fold(0u128, checked_add_u128)
}

fn checked_add_u128(a: u128, b: u128) -> Result<u128, EngineError> {
    a.checked_add(b)
        .ok_or_else(|| EngineError::arithmetic(format!("stake overflow adding {a} + {b}")))
}

fn checked_mul_u128(a: u128, b: u128) -> Result<u128, EngineError> {
    a.checked_mul(b)
        .ok_or_else(|| EngineError::arithmetic(format!("overflow multiplying {a} * {b}")))
}
