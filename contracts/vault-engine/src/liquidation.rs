//! Liquidation Engine
//!
//! Anyone may liquidate an unsafe vault. The engine pays no keeper reward:
//! it hands the whole collateral balance to the auction collaborator, records
//! the debt obligation the auction must recover and zeroes the vault.
//!
//! ```text
//! penalty         = (debt + fee) * penalty_bps / 10_000
//! debt_obligation = debt + fee + penalty
//! ```
//!
//! No DM is minted or burned here.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    errors::{DmError, DmResult},
    events::DmEvent,
    ledger::ValueLedger,
    math::{apply_bps, checked_add, is_position_safe},
    oracle::PriceOracle,
    types::{Address, Amount, CallContext, CollateralType, Timestamp, VaultId},
};

use crate::fees::accrue_vault;
use crate::registry::VaultEngine;

/// Outcome of a liquidation, handed to the auction collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LiquidationRecord {
    pub vault_id: VaultId,
    pub collateral_type: CollateralType,
    /// Always zero; keeper incentives belong to the auction
    pub caller_reward: Amount,
    /// Entire collateral balance moved to the auction
    pub collateral_seized: Amount,
    /// Principal at liquidation
    pub debt: Amount,
    /// Accrued fee at liquidation
    pub fee: Amount,
    pub penalty: Amount,
    /// debt + fee + penalty
    pub debt_obligation: Amount,
    /// Who triggered it
    pub keeper: Address,
    /// Where the collateral went
    pub auction: Address,
    pub auction_duration: u64,
    pub timestamp: Timestamp,
}

/// Penalty and total obligation for a position owing `debt` principal and `fee`
pub fn debt_obligation(debt: Amount, fee: Amount, penalty_bps: u128) -> DmResult<(Amount, Amount)> {
    let owed = checked_add(debt, fee)?;
    let penalty = apply_bps(owed, penalty_bps)?;
    Ok((penalty, checked_add(owed, penalty)?))
}

impl<L: ValueLedger, O: PriceOracle> VaultEngine<L, O> {
    /// Seize an unsafe vault's collateral for auction
    ///
    /// A halted vault can still be liquidated once its insolvency is proven;
    /// the reset vault comes back out of the halt.
    pub fn liquidate_vault(&mut self, ctx: &CallContext, vault_id: VaultId) -> DmResult<LiquidationRecord> {
        let result = self.try_liquidate_vault(ctx, vault_id);
        if result.is_ok() && self.halted.remove(&vault_id) {
            tracing::warn!(vault_id, "halted vault liquidated, halt lifted");
        }
        self.guarded(vault_id, result)
    }

    fn try_liquidate_vault(&mut self, ctx: &CallContext, vault_id: VaultId) -> DmResult<LiquidationRecord> {
        // 1. Get vault and bring the fee up to date
        let mut vault = self.load_any(vault_id)?;
        let params = *self.params.require(&vault.collateral_type)?;
        accrue_vault(&mut vault, params.stability_fee_rate_bps, ctx.now)?;

        // 2. Vault must be unsafe (zero debt never is)
        let total_debt = vault.total_debt()?;
        let price = self.oracle.price(&vault.collateral_type)?;
        if is_position_safe(vault.collateral_amount, price, total_debt, params.liquidation_ratio)? {
            return Err(DmError::VaultSafe { vault_id });
        }

        // 3. Calculate the obligation the auction has to recover
        let (penalty, obligation) =
            debt_obligation(vault.debt_amount, vault.stability_fee_accrued, params.liquidation_penalty_bps)?;

        // 4. Move all collateral to the auction
        let auction = self.params.auction_contract();
        let seized = vault.collateral_amount;
        if seized > 0 {
            let custody = self.custody;
            self.collateral_ledger_mut(&vault.collateral_type)?
                .transfer(&custody, &auction, seized)?;
        }

        // 5. Reset vault, commit and emit event
        let record = LiquidationRecord {
            vault_id,
            collateral_type: vault.collateral_type,
            caller_reward: 0,
            collateral_seized: seized,
            debt: vault.debt_amount,
            fee: vault.stability_fee_accrued,
            penalty,
            debt_obligation: obligation,
            keeper: ctx.caller,
            auction,
            auction_duration: params.auction_duration,
            timestamp: ctx.now,
        };
        vault.reset();
        self.commit(vault);

        self.events.emit(DmEvent::VaultLiquidated {
            vault_id,
            caller_reward: 0,
            collateral_seized: seized,
            debt_obligation: obligation,
            keeper: ctx.caller,
            auction,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, seized, obligation, "vault liquidated");
        Ok(record)
    }
}
