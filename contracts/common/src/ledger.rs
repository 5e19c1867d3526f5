//! Value Ledger Interface
//!
//! The collateral assets, the DM synthetic asset, PSM stablecoins and the
//! vesting token all behave identically as balance ledgers. Modules depend on
//! this one trait and receive independent instances of it.
//!
//! ## Contract
//!
//! - Every mutating call either fully applies or returns an error with no
//!   balance change
//! - `transfer_from` and `burn_from` consume the spender's allowance
//! - `mint` is restricted to the ledger's authorized minters

use crate::errors::{DmError, DmResult};
use crate::types::{Address, Amount};

/// Mintable, burnable, transferable balance ledger
pub trait ValueLedger {
    /// Identifier of the asset this ledger tracks
    fn token_id(&self) -> Address;

    /// Balance held by `account`
    fn balance_of(&self, account: &Address) -> Amount;

    /// Sum of all balances
    fn total_supply(&self) -> Amount;

    /// Amount `spender` may still move on behalf of `owner`
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Set the allowance of `spender` over `owner`'s balance
    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> DmResult<()>;

    /// Move `amount` from `from` to `to`
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> DmResult<()>;

    /// Move `amount` from `from` to `to` using `spender`'s allowance
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> DmResult<()>;

    /// Create `amount` new units for `to`; `minter` must be authorized
    fn mint(&mut self, minter: &Address, to: &Address, amount: Amount) -> DmResult<()>;

    /// Destroy `amount` of `from`'s own balance
    fn burn(&mut self, from: &Address, amount: Amount) -> DmResult<()>;

    /// Destroy `amount` of `from`'s balance using `spender`'s allowance
    fn burn_from(&mut self, spender: &Address, from: &Address, amount: Amount) -> DmResult<()>;
}

/// Check that `owner` holds `amount`
pub fn ensure_balance<L: ValueLedger + ?Sized>(
    ledger: &L,
    owner: &Address,
    amount: Amount,
) -> DmResult<()> {
    let available = ledger.balance_of(owner);
    if available < amount {
        return Err(DmError::InsufficientBalance {
            available,
            requested: amount,
        });
    }
    Ok(())
}

/// Check that `spender` can pull `amount` from `owner`
///
/// Used by multi-step operations to validate every ledger call up front.
pub fn ensure_spendable<L: ValueLedger + ?Sized>(
    ledger: &L,
    spender: &Address,
    owner: &Address,
    amount: Amount,
) -> DmResult<()> {
    ensure_balance(ledger, owner, amount)?;
    let allowed = ledger.allowance(owner, spender);
    if allowed < amount {
        return Err(DmError::InsufficientAllowance {
            available: allowed,
            requested: amount,
        });
    }
    Ok(())
}
