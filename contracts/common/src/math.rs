//! Mathematical Utilities for the DM Protocol
//!
//! Checked 18-decimal fixed-point arithmetic. Products are formed in 256-bit
//! integers so `amount * price` never loses precision; any overflow,
//! underflow or division by zero is reported as [`DmError::ArithmeticFault`].

use primitive_types::U256;

use crate::constants::precision::{BPS, PERCENT, WAD};
use crate::errors::{DmError, DmResult};
use crate::types::{Amount, Price};

/// Safe addition
pub fn checked_add(a: u128, b: u128) -> DmResult<u128> {
    a.checked_add(b).ok_or(DmError::ArithmeticFault)
}

/// Safe subtraction
pub fn checked_sub(a: u128, b: u128) -> DmResult<u128> {
    a.checked_sub(b).ok_or(DmError::ArithmeticFault)
}

/// Safe multiplication
pub fn checked_mul(a: u128, b: u128) -> DmResult<u128> {
    a.checked_mul(b).ok_or(DmError::ArithmeticFault)
}

fn wide_mul(a: U256, b: U256) -> DmResult<U256> {
    a.checked_mul(b).ok_or(DmError::ArithmeticFault)
}

fn narrow(value: U256) -> DmResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(DmError::ArithmeticFault);
    }
    Ok(value.as_u128())
}

/// `a * b / denominator`, rounded down
pub fn mul_div(a: u128, b: u128, denominator: u128) -> DmResult<u128> {
    if denominator == 0 {
        return Err(DmError::ArithmeticFault);
    }
    let product = wide_mul(U256::from(a), U256::from(b))?;
    narrow(product / U256::from(denominator))
}

/// `a * b * c / denominator`, rounded down
pub fn mul_mul_div(a: u128, b: u128, c: u128, denominator: u128) -> DmResult<u128> {
    if denominator == 0 {
        return Err(DmError::ArithmeticFault);
    }
    let product = wide_mul(wide_mul(U256::from(a), U256::from(b))?, U256::from(c))?;
    narrow(product / U256::from(denominator))
}

/// Quote value of `amount` collateral at `price`
///
/// value = amount * price / 1e18
pub fn collateral_value(amount: Amount, price: Price) -> DmResult<Amount> {
    mul_div(amount, price, WAD)
}

/// Collateral value needed to back `total_debt` at `liquidation_ratio` percent
///
/// required = total_debt * ratio / 100
pub fn required_collateral_value(total_debt: Amount, liquidation_ratio: u128) -> DmResult<Amount> {
    mul_div(total_debt, liquidation_ratio, PERCENT)
}

/// `amount * bps / 10_000`, rounded down
pub fn apply_bps(amount: Amount, bps: u128) -> DmResult<Amount> {
    mul_div(amount, bps, BPS)
}

/// Solvency predicate
///
/// collateral * price >= total_debt * ratio / 100, compared exactly by
/// cross-multiplying so neither side is rounded. Zero debt is always safe.
pub fn is_position_safe(
    collateral: Amount,
    price: Price,
    total_debt: Amount,
    liquidation_ratio: u128,
) -> DmResult<bool> {
    if total_debt == 0 {
        return Ok(true);
    }

    // collateral * price * 100 >= total_debt * ratio * 1e18
    let lhs = wide_mul(
        wide_mul(U256::from(collateral), U256::from(price))?,
        U256::from(PERCENT),
    )?;
    let rhs = wide_mul(
        wide_mul(U256::from(total_debt), U256::from(liquidation_ratio))?,
        U256::from(WAD),
    )?;

    Ok(lhs >= rhs)
}

/// Collateralization ratio in percent, `None` for zero debt
pub fn collateral_ratio_percent(
    collateral: Amount,
    price: Price,
    total_debt: Amount,
) -> DmResult<Option<u128>> {
    if total_debt == 0 {
        return Ok(None);
    }
    let value = collateral_value(collateral, price)?;
    mul_div(value, PERCENT, total_debt).map(Some)
}
