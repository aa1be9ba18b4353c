//! WAD fixed-point arithmetic.
//!
//! Values are `u128` scaled by [`WAD`] (10^18). Products go through a 256-bit
//! intermediate so that `a * b / c` is exact whenever the final result fits,
//! and cumulative indices are kept as [`U256`] outright.

use primitive_types::U256;

use crate::constants::WAD;
use crate::error::MathError;

/// Narrow a 256-bit value back to `u128`.
pub fn to_u128(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.as_u128())
}

/// `a * b / denominator`, rounded down, with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    // u128 * u128 always fits in 256 bits.
    let product = U256::from(a) * U256::from(b);
    to_u128(product / U256::from(denominator))
}

/// `a * b` for two WAD values.
pub fn wad_mul(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD)
}

/// `a / b` for two WAD values.
pub fn wad_div(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b)
}

/// Fixed-point exponentiation: `(base / WAD) ^ exp` in WAD.
///
/// Binary exponentiation, O(log exp) multiplications.
pub fn wad_pow(base: u128, exp: u64) -> Result<u128, MathError> {
    if exp == 0 {
        return Ok(WAD);
    }

    let mut result = WAD;
    let mut b = base;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = wad_mul(result, b)?;
        }
        e >>= 1;
        if e > 0 {
            b = wad_mul(b, b)?;
        }
    }

    Ok(result)
}

/// `(base / WAD) ^ (exponent / WAD)` for a fractional WAD exponent.
///
/// Whole powers are exact (see [`wad_pow`]); between two whole powers the
/// curve is linearly interpolated. The result is continuous and monotonic
/// in the exponent for any `base >= WAD`.
pub fn wad_pow_frac(base: u128, exponent: u128) -> Result<u128, MathError> {
    let whole = u64::try_from(exponent / WAD).map_err(|_| MathError::Overflow)?;
    let frac = exponent % WAD;

    let lo = wad_pow(base, whole)?;
    if frac == 0 {
        return Ok(lo);
    }
    let hi = wad_pow(base, whole + 1)?;

    if hi >= lo {
        lo.checked_add(mul_div(hi - lo, frac, WAD)?)
            .ok_or(MathError::Overflow)
    } else {
        Ok(lo - mul_div(lo - hi, frac, WAD)?)
    }
}

/// Growth of a cumulative index when `amount` is spread over `total` units:
/// `amount * WAD / total`.
pub fn index_delta(amount: u128, total: u128) -> Result<U256, MathError> {
    if total == 0 {
        return Err(MathError::DivisionByZero);
    }
    Ok(U256::from(amount) * U256::from(WAD) / U256::from(total))
}

/// Amount owed to `position` units for an index movement of `delta`:
/// `delta * position / WAD`.
pub fn apply_index(delta: U256, position: u128) -> Result<u128, MathError> {
    let product = delta
        .checked_mul(U256::from(position))
        .ok_or(MathError::Overflow)?;
    to_u128(product / U256::from(WAD))
}
