//! Fixed-point integer arithmetic (component C1).
//!
//! Everything here works over unsigned 256-bit integers with a fixed
//! scale `SCALE = S = 1_000_000` (six decimals). There is no floating
//! point anywhere in this crate: every division is either an explicit
//! checked truncating division (round toward zero, per spec invariant
//! 6) or an explicit round-to-nearest helper used only where the spec
//! calls for it (the scoring kernel's weighted mean). Overflow is
//! never silent; it is a fatal `ArithmeticError`.
#![allow(clippy::ptr_offset_with_cast, clippy::assign_op_pattern)]

use chaoschain_runtime::EngineError;
use uint::construct_uint;

construct_uint! {
    /// A 256-bit unsigned integer, the engine's only numeric currency
    /// for anything that must be bit-exact across implementations.
    pub struct U256(4);
}

construct_uint! {
    /// Double-width intermediate used so `mul_div` never overflows for
    /// `a, b, c < 2^128`, mirroring the teacher's `U512` used for EVM's
    /// `addmod`/`mulmod`.
    pub struct U512(8);
}

/// `S`: six decimal places of fixed-point precision.
pub const SCALE: u64 = 1_000_000;

pub fn scale() -> U256 {
    U256::from(SCALE)
}

fn to_u512(x: U256) -> U512 {
    let U256(words) = x;
    U512([words[0], words[1], words[2], words[3], 0, 0, 0, 0])
}

fn from_u512_checked(x: U512) -> Result<U256, EngineError> {
    let U512(words) = x;
    if words[4] != 0 || words[5] != 0 || words[6] != 0 || words[7] != 0 {
        return Err(EngineError::arithmetic(format!(
            "U512 value {x} does not fit in U256"
        )));
    }
    Ok(U256([words[0], words[1], words[2], words[3]]))
}

/// Checked addition; fatal `ArithmeticError` on overflow.
pub fn checked_add(a: U256, b: U256) -> Result<U256, EngineError> {
    a.checked_add(b)
        .ok_or_else(|| EngineError::arithmetic(format!("overflow adding {a} + {b}")))
}

/// Checked subtraction; fatal `ArithmeticError` on underflow.
pub fn checked_sub(a: U256, b: U256) -> Result<U256, EngineError> {
    a.checked_sub(b)
        .ok_or_else(|| EngineError::arithmetic(format!("underflow subtracting {a} - {b}")))
}

/// Checked multiplication; fatal `ArithmeticError` on overflow.
pub fn checked_mul(a: U256, b: U256) -> Result<U256, EngineError> {
    a.checked_mul(b)
        .ok_or_else(|| EngineError::arithmetic(format!("overflow multiplying {a} * {b}")))
}

/// Checked truncating division (round toward zero, per invariant 6).
/// Division by zero is an `ArithmeticError`, not a panic.
pub fn checked_div(a: U256, b: U256) -> Result<U256, EngineError> {
    if b.is_zero() {
        return Err(EngineError::arithmetic(format!("division by zero: {a} / 0")));
    }
    Ok(a / b)
}

/// `a·b/c`, truncating toward zero, computed without intermediate
/// overflow for `a, b, c < 2^128` (the spec's stated bound). Anything
/// that does not fit back into 256 bits after the division is a fatal
/// `ArithmeticError`, not silent wraparound.
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, EngineError> {
    if c.is_zero() {
        return Err(EngineError::arithmetic(format!("mul_div by zero: {a} * {b} / 0")));
    }
    let product = to_u512(a)
        .checked_mul(to_u512(b))
        .ok_or_else(|| EngineError::arithmetic(format!("overflow computing {a} * {b}")))?;
    from_u512_checked(product / to_u512(c))
}

/// `a·b/c`, rounded to the *nearest* integer (ties round up), used only
/// where the spec explicitly calls for nearest-integer rounding (the
/// scoring kernel's stake-weighted mean, §4.2 step 5) rather than the
/// truncating division of invariant 6.
pub fn mul_div_round_nearest(a: U256, b: U256, c: U256) -> Result<U256, EngineError> {
    if c.is_zero() {
        return Err(EngineError::arithmetic(format!(
            "mul_div_round_nearest by zero: {a} * {b} / 0"
        )));
    }
    let product = to_u512(a)
        .checked_mul(to_u512(b))
        .ok_or_else(|| EngineError::arithmetic(format!("overflow computing {a} * {b}")))?;
    let half_c = to_u512(c) / U512::from(2u8);
    let rounded = product
        .checked_add(half_c)
        .ok_or_else(|| EngineError::arithmetic("overflow rounding mul_div".to_string()))?;
    from_u512_checked(rounded / to_u512(c))
}

/// Clamps an `S`-scaled value representing a percentage in
/// `[0·S, 100·S]` down to a `u8` in `[0, 100]`. Values outside that
/// range are saturated rather than erroring — this is the one place
/// the spec asks for defensive clamping instead of a fatal error,
/// since it sits at the boundary where consensus/quality scalars are
/// published.
pub fn saturating_to_u8_percent(x: U256) -> u8 {
    let units = x / scale();
    if units > U256::from(100u64) {
        100
    } else {
        units.low_u32() as u8
    }
}

/// Clamps a plain (non-scaled) integer score to `[0, 100]`.
pub fn clamp_score(x: i64) -> u8 {
    x.clamp(0, 100) as u8
}

/// Widens a `u128` (a monetary amount or stake total) into a `U256`
/// without relying on a version-specific `From<u128>` impl from the
/// `uint` crate.
pub fn from_u128(x: u128) -> U256 {
    let low = (x & u64::MAX as u128) as u64;
    let high = (x >> 64) as u64;
    U256::from(low) + (U256::from(high) << 64)
}

/// Narrows a `U256` back into a `u128`; fatal `ArithmeticError` if it
/// does not fit.
pub fn to_u128(x: U256) -> Result<u128, EngineError> {
    let U256(words) = x;
    if words[2] != 0 || words[3] != 0 {
        return Err(EngineError::arithmetic(format!("{x} does not fit in u128")));
    }
    Ok((words[0] as u128) | ((words[1] as u128) << 64))
}
