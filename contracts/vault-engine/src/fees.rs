//! Fee Accrual Engine
//!
//! Stability fees are simple interest on principal:
//!
//! ```text
//! accrued = debt * rate_bps * elapsed / (SECONDS_PER_YEAR * 10_000)
//! ```
//!
//! Accrued fee is tracked separately and never itself bears interest.

use dm_common::{
    constants::{precision::BPS, time::SECONDS_PER_YEAR},
    errors::{DmError, DmResult},
    math::{checked_add, mul_mul_div},
    types::{Amount, Timestamp, Vault},
};

/// Fee owed on `debt` after `elapsed` seconds at `rate_bps` per year, rounded down
pub fn fee_for_period(debt: Amount, rate_bps: u128, elapsed: Timestamp) -> DmResult<Amount> {
    if debt == 0 || rate_bps == 0 || elapsed == 0 {
        return Ok(0);
    }
    let denominator = (SECONDS_PER_YEAR as u128)
        .checked_mul(BPS)
        .ok_or(DmError::ArithmeticFault)?;
    mul_mul_div(debt, rate_bps, elapsed as u128, denominator)
}

/// Fee state after bringing a position up to `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Total unpaid fee
    pub fee_accrued: Amount,
    /// New snapshot time
    pub last_update: Timestamp,
    /// Fee added by this accrual
    pub added: Amount,
}

/// Bring `(debt, fee_accrued, last_update)` forward to `now`
///
/// A `now` at or before `last_update` adds nothing and keeps the snapshot.
pub fn accrue(
    debt: Amount,
    fee_accrued: Amount,
    last_update: Timestamp,
    rate_bps: u128,
    now: Timestamp,
) -> DmResult<Accrual> {
    if now <= last_update {
        return Ok(Accrual {
            fee_accrued,
            last_update,
            added: 0,
        });
    }

    let added = fee_for_period(debt, rate_bps, now - last_update)?;
    Ok(Accrual {
        fee_accrued: checked_add(fee_accrued, added)?,
        last_update: now,
        added,
    })
}

/// Apply accrual to a vault in place, returning the fee added
pub fn accrue_vault(vault: &mut Vault, rate_bps: u128, now: Timestamp) -> DmResult<Amount> {
    let accrual = accrue(
        vault.debt_amount,
        vault.stability_fee_accrued,
        vault.last_fee_update,
        rate_bps,
        now,
    )?;
    vault.stability_fee_accrued = accrual.fee_accrued;
    vault.last_fee_update = accrual.last_update;
    Ok(accrual.added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_common::constants::token::ONE;

    const YEAR: u64 = SECONDS_PER_YEAR;

    #[test]
    fn test_full_year_at_five_percent() {
        assert_eq!(fee_for_period(1_000 * ONE, 500, YEAR).unwrap(), 50 * ONE);
    }

    #[test]
    fn test_small_rate() {
        // 5 bps = 0.05% per year on 500 DM
        assert_eq!(fee_for_period(500 * ONE, 5, YEAR).unwrap(), ONE / 4);
    }

    #[test]
    fn test_half_year() {
        assert_eq!(fee_for_period(1_000 * ONE, 1_000, YEAR / 2).unwrap(), 50 * ONE);
    }

    #[test]
    fn test_rounds_down() {
        // 1 wei for 1 second at 1 bps is far below one unit
        assert_eq!(fee_for_period(1, 1, 1).unwrap(), 0);
    }

    #[test]
    fn test_accrue_is_idempotent_at_same_instant() {
        let first = accrue(500 * ONE, 0, 0, 500, 1_000).unwrap();
        let second = accrue(500 * ONE, first.fee_accrued, first.last_update, 500, 1_000).unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.fee_accrued, first.fee_accrued);
        assert_eq!(second.last_update, 1_000);
    }

    #[test]
    fn test_fee_does_not_compound() {
        // Two half-year steps add the same as one full year
        let half = accrue(1_000 * ONE, 0, 0, 1_000, YEAR / 2).unwrap();
        let full = accrue(1_000 * ONE, half.fee_accrued, half.last_update, 1_000, YEAR).unwrap();
        assert_eq!(full.fee_accrued, 100 * ONE);
    }

    #[test]
    fn test_clock_going_backwards() {
        let accrual = accrue(500 * ONE, 7, 1_000, 500, 10).unwrap();
        assert_eq!(accrual, Accrual { fee_accrued: 7, last_update: 1_000, added: 0 });
    }

    #[test]
    fn test_accrue_vault() {
        let mut vault = Vault::new(0, [1u8; 32], [2u8; 32], 0);
        vault.debt_amount = 1_000 * ONE;

        let added = accrue_vault(&mut vault, 500, YEAR).unwrap();
        assert_eq!(added, 50 * ONE);
        assert_eq!(vault.stability_fee_accrued, 50 * ONE);
        assert_eq!(vault.last_fee_update, YEAR);
        assert_eq!(vault.debt_amount, 1_000 * ONE);
    }

    #[test]
    fn test_overflow_is_a_fault() {
        let result = accrue(u128::MAX, u128::MAX, 0, 10_000, YEAR);
        assert_eq!(result, Err(DmError::ArithmeticFault));
    }
}
