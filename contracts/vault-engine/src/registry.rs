//! Vault Registry
//!
//! Owns every vault and drives the user-facing operations. Each operation
//! runs in the same order:
//!
//! 1. Validate the caller and inputs
//! 2. Bring the vault's stability fee up to `now`
//! 3. Compute the complete post-state and run every check against it
//! 4. Make the single ledger call the operation needs
//! 5. Commit the vault and emit events
//!
//! A failure at any step leaves the registry untouched. An arithmetic fault
//! additionally halts the vault until governance clears it.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    ledger::{ensure_spendable, ValueLedger},
    math::{checked_add, checked_sub, collateral_ratio_percent, collateral_value, is_position_safe, required_collateral_value},
    oracle::PriceOracle,
    types::{is_zero_address, Address, Amount, CallContext, CollateralType, Timestamp, Vault, VaultId},
};

use crate::fees::{accrue, accrue_vault};
use crate::params::ParameterStore;

/// How a repayment was split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Repayment {
    /// Applied to accrued stability fee
    pub fee_paid: Amount,
    /// Applied to principal
    pub principal_paid: Amount,
}

// ============ Vault Engine ============

/// Collateralized debt engine over one synthetic ledger and many collateral ledgers
pub struct VaultEngine<L: ValueLedger, O: PriceOracle> {
    /// DM ledger; the custody account must be a minter on it
    pub(crate) synthetic: L,
    /// Collateral ledgers keyed by their token id
    pub(crate) collateral: BTreeMap<CollateralType, L>,
    pub(crate) oracle: O,
    pub(crate) params: ParameterStore,
    pub(crate) vaults: BTreeMap<VaultId, Vault>,
    pub(crate) next_id: VaultId,
    /// Vaults stopped by an arithmetic fault
    pub(crate) halted: BTreeSet<VaultId>,
    /// Engine account: holds collateral, spends allowances, mints DM
    pub(crate) custody: Address,
    pub(crate) events: EventLog,
}

impl<L: ValueLedger, O: PriceOracle> VaultEngine<L, O> {
    /// Creates an engine with no collateral types registered.
    ///
    /// # Errors
    /// Returns `DmError::InvalidAddress` if `custody` is the zero address.
    pub fn new(synthetic: L, oracle: O, params: ParameterStore, custody: Address) -> DmResult<Self> {
        if is_zero_address(&custody) {
            return Err(DmError::InvalidAddress {
                reason: "custody account cannot be zero address",
            });
        }

        Ok(Self {
            synthetic,
            collateral: BTreeMap::new(),
            oracle,
            params,
            vaults: BTreeMap::new(),
            next_id: 0,
            halted: BTreeSet::new(),
            custody,
            events: EventLog::new(),
        })
    }

    // ============ Vault Operations ============

    /// Open an empty vault for the caller
    pub fn create_vault(&mut self, ctx: &CallContext, collateral_type: CollateralType) -> DmResult<VaultId> {
        self.params.require_allowed(&collateral_type)?;

        let vault_id = self.next_id;
        let next = vault_id.checked_add(1).ok_or(DmError::ArithmeticFault)?;

        self.vaults
            .insert(vault_id, Vault::new(vault_id, ctx.caller, collateral_type, ctx.now));
        self.next_id = next;

        self.events.emit(DmEvent::VaultCreated {
            vault_id,
            owner: ctx.caller,
            collateral_type,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, "vault created");
        Ok(vault_id)
    }

    /// Deposit collateral; the owner must have approved the custody account
    pub fn add_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        let result = self.try_add_collateral(ctx, vault_id, amount);
        self.guarded(vault_id, result)
    }

    fn try_add_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 2. Only owner can add collateral
        let mut vault = self.load(vault_id)?;
        vault.ensure_owner(&ctx.caller)?;

        // 3. Collateral type must still accept deposits
        let rate = self.params.require_allowed(&vault.collateral_type)?.stability_fee_rate_bps;

        // 4. Owner must hold and have approved the deposit; custody plus the
        //    owner's balance fits the ledger, so the new total cannot overflow
        let custody = self.custody;
        ensure_spendable(self.collateral_ledger_mut(&vault.collateral_type)?, &custody, &ctx.caller, amount)?;

        // 5. Accrue fee before the balance changes
        accrue_vault(&mut vault, rate, ctx.now)?;

        // 6. Calculate new collateral
        vault.collateral_amount = checked_add(vault.collateral_amount, amount)?;

        // 7. Pull collateral into custody
        self.collateral_ledger_mut(&vault.collateral_type)?
            .transfer_from(&custody, &ctx.caller, &custody, amount)?;

        // 8. Commit and emit event
        let new_collateral = vault.collateral_amount;
        self.commit(vault);
        self.events.emit(DmEvent::CollateralAdded {
            vault_id,
            amount,
            new_collateral,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, amount, new_collateral, "collateral added");
        Ok(())
    }

    /// Return collateral to the owner, keeping the vault safe
    pub fn withdraw_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        let result = self.try_withdraw_collateral(ctx, vault_id, amount);
        self.guarded(vault_id, result)
    }

    fn try_withdraw_collateral(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 2. Only owner can withdraw
        let mut vault = self.load(vault_id)?;
        vault.ensure_owner(&ctx.caller)?;

        // 3. Accrue fee (withdrawals stay open for disallowed types)
        let params = *self.params.require(&vault.collateral_type)?;
        accrue_vault(&mut vault, params.stability_fee_rate_bps, ctx.now)?;

        // 4. Cannot withdraw more than available
        if amount > vault.collateral_amount {
            return Err(DmError::InsufficientCollateral {
                available: vault.collateral_amount,
                required: amount,
            });
        }
        vault.collateral_amount -= amount;

        // 5. Remaining position must stay safe
        let total_debt = vault.total_debt()?;
        if total_debt > 0 {
            let price = self.oracle.price(&vault.collateral_type)?;
            if !is_position_safe(vault.collateral_amount, price, total_debt, params.liquidation_ratio)? {
                return Err(DmError::Unsafe { vault_id });
            }
        }

        // 6. Release collateral from custody
        let custody = self.custody;
        self.collateral_ledger_mut(&vault.collateral_type)?
            .transfer(&custody, &ctx.caller, amount)?;

        // 7. Commit and emit event
        let new_collateral = vault.collateral_amount;
        self.commit(vault);
        self.events.emit(DmEvent::CollateralWithdrawn {
            vault_id,
            amount,
            new_collateral,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, amount, new_collateral, "collateral withdrawn");
        Ok(())
    }

    /// Mint DM against the vault's collateral
    pub fn generate_dm(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        let result = self.try_generate_dm(ctx, vault_id, amount);
        self.guarded(vault_id, result)
    }

    fn try_generate_dm(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 2. Only owner can mint
        let mut vault = self.load(vault_id)?;
        vault.ensure_owner(&ctx.caller)?;

        // 3. No new debt against disallowed collateral
        let params = *self.params.require_allowed(&vault.collateral_type)?;

        // 4. Accrue fee so the check sees the full obligation
        accrue_vault(&mut vault, params.stability_fee_rate_bps, ctx.now)?;

        // 5. The mint must fit the DM supply
        if self.synthetic.total_supply().checked_add(amount).is_none() {
            return Err(DmError::AmountOutOfRange { amount });
        }

        // 6. Calculate new debt; a total whose required backing exceeds the
        //    amount range can never be covered
        let price = self.oracle.price(&vault.collateral_type)?;
        let ratio = params.liquidation_ratio;
        let total_debt = vault.total_debt()?.checked_add(amount);
        let required = total_debt.and_then(|total| required_collateral_value(total, ratio).ok());
        let (Some(total_debt), Some(_)) = (total_debt, required) else {
            return Err(DmError::InsufficientCollateral {
                available: collateral_value(vault.collateral_amount, price).unwrap_or(Amount::MAX),
                required: Amount::MAX,
            });
        };
        vault.debt_amount = checked_add(vault.debt_amount, amount)?;

        // 7. Collateral must cover (debt + fee + amount) * ratio / 100
        if !is_position_safe(vault.collateral_amount, price, total_debt, ratio)? {
            return Err(DmError::InsufficientCollateral {
                available: collateral_value(vault.collateral_amount, price)?,
                required: required_collateral_value(total_debt, ratio)?,
            });
        }

        // 8. Mint DM to the owner
        let custody = self.custody;
        self.synthetic.mint(&custody, &ctx.caller, amount)?;

        // 9. Commit and emit event
        let new_debt = vault.debt_amount;
        self.commit(vault);
        self.events.emit(DmEvent::DebtGenerated {
            vault_id,
            amount,
            new_debt,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, amount, new_debt, "debt generated");
        Ok(())
    }

    /// Burn DM from the caller against the vault's debt, fee first
    ///
    /// Anyone may repay any vault. A zero amount only snapshots the fee.
    pub fn repay_debt(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<Repayment> {
        let result = self.try_repay_debt(ctx, vault_id, amount);
        self.guarded(vault_id, result)
    }

    fn try_repay_debt(&mut self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<Repayment> {
        // 1. Load vault and accrue fee
        let mut vault = self.load(vault_id)?;
        let rate = self.params.require(&vault.collateral_type)?.stability_fee_rate_bps;
        accrue_vault(&mut vault, rate, ctx.now)?;

        if amount == 0 {
            self.commit(vault);
            tracing::debug!(vault_id, "fee snapshot");
            return Ok(Repayment::default());
        }

        // 2. Cannot repay more than owed
        let owed = vault.total_debt()?;
        if amount > owed {
            return Err(DmError::ExcessRepayment { owed, offered: amount });
        }

        // 3. Fee first, remainder to principal
        let fee_paid = amount.min(vault.stability_fee_accrued);
        let principal_paid = amount - fee_paid;
        vault.stability_fee_accrued -= fee_paid;
        vault.debt_amount = checked_sub(vault.debt_amount, principal_paid)?;

        // 4. Burn DM from the payer
        let custody = self.custody;
        self.synthetic.burn_from(&custody, &ctx.caller, amount)?;

        // 5. Commit and emit event
        let (new_debt, new_fee_accrued) = (vault.debt_amount, vault.stability_fee_accrued);
        self.commit(vault);
        self.events.emit(DmEvent::DebtRepaid {
            vault_id,
            payer: ctx.caller,
            fee_paid,
            principal_paid,
            new_debt,
            new_fee_accrued,
            timestamp: ctx.now,
        });
        tracing::debug!(vault_id, fee_paid, principal_paid, new_debt, "debt repaid");
        Ok(Repayment {
            fee_paid,
            principal_paid,
        })
    }

    // ============ Governance ============

    /// Register a collateral ledger and allow its token as collateral
    pub fn add_collateral_type(&mut self, ctx: &CallContext, ledger: L) -> DmResult<CollateralType> {
        let collateral_type = ledger.token_id();
        let event = self.params.register(&ctx.caller, collateral_type, ctx.now)?;
        self.collateral.insert(collateral_type, ledger);
        self.events.emit(event);
        tracing::info!(collateral_type = ?collateral_type, "collateral type registered");
        Ok(collateral_type)
    }

    pub fn set_allowed_collateral_token(
        &mut self,
        ctx: &CallContext,
        collateral_type: CollateralType,
        allowed: bool,
    ) -> DmResult<()> {
        let event = self
            .params
            .set_allowed_collateral_token(&ctx.caller, collateral_type, allowed, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn set_liquidation_ratio(&mut self, ctx: &CallContext, collateral_type: CollateralType, ratio: u128) -> DmResult<()> {
        let event = self
            .params
            .set_liquidation_ratio(&ctx.caller, collateral_type, ratio, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn set_stability_fee_rate(&mut self, ctx: &CallContext, collateral_type: CollateralType, rate_bps: u128) -> DmResult<()> {
        let event = self
            .params
            .set_stability_fee_rate(&ctx.caller, collateral_type, rate_bps, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn set_liquidation_penalty(&mut self, ctx: &CallContext, collateral_type: CollateralType, penalty_bps: u128) -> DmResult<()> {
        let event = self
            .params
            .set_liquidation_penalty(&ctx.caller, collateral_type, penalty_bps, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn set_auction_duration(&mut self, ctx: &CallContext, collateral_type: CollateralType, duration: u64) -> DmResult<()> {
        let event = self
            .params
            .set_auction_duration(&ctx.caller, collateral_type, duration, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn set_auction_contract(&mut self, ctx: &CallContext, auction: Address) -> DmResult<()> {
        let event = self.params.set_auction_contract(&ctx.caller, auction, ctx.now)?;
        self.events.emit(event);
        Ok(())
    }

    /// Lift the halt placed on a vault by an arithmetic fault
    pub fn clear_vault_fault(&mut self, ctx: &CallContext, vault_id: VaultId) -> DmResult<()> {
        self.params.ensure_governance(&ctx.caller)?;
        if !self.vaults.contains_key(&vault_id) {
            return Err(DmError::VaultNotFound { vault_id });
        }
        if self.halted.remove(&vault_id) {
            self.events.emit(DmEvent::ParameterChanged {
                parameter: ParameterKind::VaultFaultCleared,
                subject: None,
                old_value: vault_id as u128,
                new_value: vault_id as u128,
                timestamp: ctx.now,
            });
            tracing::info!(vault_id, "vault fault cleared");
        }
        Ok(())
    }

    // ============ Queries ============

    pub fn vault(&self, vault_id: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault_id)
    }

    pub fn vaults_of(&self, owner: &Address) -> Vec<&Vault> {
        self.vaults.values().filter(|v| v.owner == *owner).collect()
    }

    /// Number of vaults ever created
    pub fn vault_count(&self) -> u64 {
        self.next_id
    }

    pub fn is_halted(&self, vault_id: VaultId) -> bool {
        self.halted.contains(&vault_id)
    }

    /// Debt plus fee as it would stand at `now`
    pub fn outstanding_debt(&self, vault_id: VaultId, now: Timestamp) -> DmResult<Amount> {
        let vault = self.vaults.get(&vault_id).ok_or(DmError::VaultNotFound { vault_id })?;
        let rate = self.params.require(&vault.collateral_type)?.stability_fee_rate_bps;
        let accrual = accrue(
            vault.debt_amount,
            vault.stability_fee_accrued,
            vault.last_fee_update,
            rate,
            now,
        )?;
        checked_add(vault.debt_amount, accrual.fee_accrued)
    }

    /// Solvency at the current price with fees projected to `now`
    pub fn is_safe(&self, vault_id: VaultId, now: Timestamp) -> DmResult<bool> {
        let vault = self.vaults.get(&vault_id).ok_or(DmError::VaultNotFound { vault_id })?;
        let total_debt = self.outstanding_debt(vault_id, now)?;
        if total_debt == 0 {
            return Ok(true);
        }
        let ratio = self.params.require(&vault.collateral_type)?.liquidation_ratio;
        let price = self.oracle.price(&vault.collateral_type)?;
        is_position_safe(vault.collateral_amount, price, total_debt, ratio)
    }

    /// Collateral value over recorded debt in percent, `None` without debt
    pub fn collateral_ratio(&self, vault_id: VaultId) -> DmResult<Option<u128>> {
        let vault = self.vaults.get(&vault_id).ok_or(DmError::VaultNotFound { vault_id })?;
        let price = self.oracle.price(&vault.collateral_type)?;
        collateral_ratio_percent(vault.collateral_amount, price, vault.total_debt()?)
    }

    pub fn custody_account(&self) -> Address {
        self.custody
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn synthetic_ledger(&self) -> &L {
        &self.synthetic
    }

    pub fn collateral_ledger(&self, collateral_type: &CollateralType) -> Option<&L> {
        self.collateral.get(collateral_type)
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    // ============ Internals ============

    /// Copy of a live vault
    pub(crate) fn load(&self, vault_id: VaultId) -> DmResult<Vault> {
        if self.halted.contains(&vault_id) && self.vaults.contains_key(&vault_id) {
            return Err(DmError::VaultHalted { vault_id });
        }
        self.load_any(vault_id)
    }

    /// Copy of a vault, halted or not
    pub(crate) fn load_any(&self, vault_id: VaultId) -> DmResult<Vault> {
        self.vaults
            .get(&vault_id)
            .cloned()
            .ok_or(DmError::VaultNotFound { vault_id })
    }

    pub(crate) fn commit(&mut self, vault: Vault) {
        self.vaults.insert(vault.id, vault);
    }

    pub(crate) fn collateral_ledger_mut(&mut self, collateral_type: &CollateralType) -> DmResult<&mut L> {
        self.collateral
            .get_mut(collateral_type)
            .ok_or(DmError::UnsupportedCollateral {
                collateral_type: *collateral_type,
            })
    }

    /// Halt the vault if `result` is a fatal fault
    pub(crate) fn guarded<T>(&mut self, vault_id: VaultId, result: DmResult<T>) -> DmResult<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.vaults.contains_key(&vault_id) {
                tracing::error!(vault_id, code = err.code(), "arithmetic fault, halting vault");
                self.halted.insert(vault_id);
            }
        }
        result
    }
}

impl<L: ValueLedger, O: PriceOracle> std::fmt::Debug for VaultEngine<L, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEngine")
            .field("vaults", &self.vaults.len())
            .field("collateral_types", &self.collateral.len())
            .field("halted", &self.halted)
            .field("custody", &self.custody)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use dm_common::EventType;

    #[test]
    fn test_create_vault_assigns_sequential_ids() {
        let mut h = Harness::new();
        let first = h.engine.create_vault(&user_at(0), ETH).unwrap();
        let second = h.engine.create_vault(&user_at(0), ETH).unwrap();

        assert_eq!((first, second), (0, 1));
        assert_eq!(h.engine.vault_count(), 2);
        let vault = h.engine.vault(first).unwrap();
        assert!(vault.is_empty());
        assert_eq!(vault.owner, USER);
        assert_eq!(vault.last_fee_update, 0);
    }

    #[test]
    fn test_create_vault_unsupported_collateral() {
        let mut h = Harness::new();
        let unknown = [77u8; 32];
        assert_eq!(
            h.engine.create_vault(&user_at(0), unknown),
            Err(DmError::UnsupportedCollateral { collateral_type: unknown })
        );
        assert_eq!(h.engine.vault_count(), 0);
    }

    #[test]
    fn test_add_collateral_moves_funds_into_custody() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);

        assert_eq!(h.engine.vault(id).unwrap().collateral_amount, 1_000 * ONE);
        assert_eq!(h.collateral.balance_of(&CUSTODY), 1_000 * ONE);
        assert_eq!(h.collateral.balance_of(&USER), USER_COLLATERAL - 1_000 * ONE);
    }

    #[test]
    fn test_add_collateral_not_owner() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        assert_eq!(
            h.engine.add_collateral(&CallContext::new(OTHER, 0), id, ONE),
            Err(DmError::NotOwner { vault_id: id, caller: OTHER })
        );
    }

    #[test]
    fn test_add_collateral_without_allowance_changes_nothing() {
        let mut h = Harness::new();
        let id = h.engine.create_vault(&user_at(0), ETH).unwrap();
        h.collateral.approve(&USER, &CUSTODY, 0).unwrap();

        let result = h.engine.add_collateral(&user_at(0), id, ONE);
        assert!(matches!(result, Err(DmError::InsufficientAllowance { .. })));
        assert_eq!(h.engine.vault(id).unwrap().collateral_amount, 0);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        assert_eq!(h.engine.add_collateral(&user_at(0), id, 0), Err(DmError::ZeroAmount));
        assert_eq!(h.engine.withdraw_collateral(&user_at(0), id, 0), Err(DmError::ZeroAmount));
        assert_eq!(h.engine.generate_dm(&user_at(0), id, 0), Err(DmError::ZeroAmount));
    }

    #[test]
    fn test_unknown_vault() {
        let mut h = Harness::new();
        assert_eq!(
            h.engine.add_collateral(&user_at(0), 9, ONE),
            Err(DmError::VaultNotFound { vault_id: 9 })
        );
    }

    #[test]
    fn test_generate_dm_mints_to_owner() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        assert_eq!(h.engine.vault(id).unwrap().debt_amount, 500 * ONE);
        assert_eq!(h.dm.balance_of(&USER), 500 * ONE);
        assert_eq!(h.dm.total_supply(), 500 * ONE);
    }

    #[test]
    fn test_generate_dm_reports_values() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        assert_eq!(
            h.engine.generate_dm(&user_at(0), id, 2_000 * ONE),
            Err(DmError::InsufficientCollateral { available: 1_000 * ONE, required: 3_000 * ONE })
        );
        assert_eq!(h.dm.total_supply(), 0);
    }

    #[test]
    fn test_generate_dm_without_price() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.feed.set_active(&ADMIN, false).unwrap();
        assert!(matches!(
            h.engine.generate_dm(&user_at(0), id, ONE),
            Err(DmError::PriceUnavailable { .. })
        ));
    }

    #[test]
    fn test_withdraw_collateral() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.withdraw_collateral(&user_at(0), id, 500 * ONE).unwrap();

        assert_eq!(h.engine.vault(id).unwrap().collateral_amount, 500 * ONE);
        assert_eq!(h.collateral.balance_of(&CUSTODY), 500 * ONE);
    }

    #[test]
    fn test_withdraw_more_than_deposited() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        assert_eq!(
            h.engine.withdraw_collateral(&user_at(0), id, 1_001 * ONE),
            Err(DmError::InsufficientCollateral { available: 1_000 * ONE, required: 1_001 * ONE })
        );
    }

    #[test]
    fn test_withdraw_that_breaks_ratio_is_unsafe() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        // 750 is exactly enough for 500 at 150%
        h.engine.withdraw_collateral(&user_at(0), id, 250 * ONE).unwrap();
        assert_eq!(
            h.engine.withdraw_collateral(&user_at(0), id, 1),
            Err(DmError::Unsafe { vault_id: id })
        );
    }

    #[test]
    fn test_repay_fee_first() {
        let mut h = Harness::new();
        h.engine.set_stability_fee_rate(&gov_at(0), ETH, 1_000).unwrap();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        // One year at 10% on 500 = 50 fee
        let year = dm_common::constants::time::SECONDS_PER_YEAR;
        let repaid = h.engine.repay_debt(&user_at(year), id, 30 * ONE).unwrap();

        assert_eq!(repaid, Repayment { fee_paid: 30 * ONE, principal_paid: 0 });
        let vault = h.engine.vault(id).unwrap();
        assert_eq!(vault.debt_amount, 500 * ONE);
        assert_eq!(vault.stability_fee_accrued, 20 * ONE);
        assert_eq!(h.dm.balance_of(&USER), 470 * ONE);
    }

    #[test]
    fn test_repay_zero_snapshots_fee() {
        let mut h = Harness::new();
        h.engine.set_stability_fee_rate(&gov_at(0), ETH, 5).unwrap();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
        let events_before = h.engine.events().len();

        let year = dm_common::constants::time::SECONDS_PER_YEAR;
        h.engine.repay_debt(&user_at(year), id, 0).unwrap();

        let vault = h.engine.vault(id).unwrap();
        assert_eq!(vault.stability_fee_accrued, ONE / 4);
        assert_eq!(vault.last_fee_update, year);
        assert_eq!(h.engine.events().len(), events_before);
    }

    #[test]
    fn test_excess_repayment_rejected() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
        h.mint_dm(&USER, 100 * ONE);

        assert_eq!(
            h.engine.repay_debt(&user_at(0), id, 600 * ONE),
            Err(DmError::ExcessRepayment { owed: 500 * ONE, offered: 600 * ONE })
        );
        assert_eq!(h.dm.balance_of(&USER), 600 * ONE);
    }

    #[test]
    fn test_third_party_can_repay() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
        h.mint_dm(&OTHER, 100 * ONE);
        h.dm.approve(&OTHER, &CUSTODY, Amount::MAX).unwrap();

        h.engine.repay_debt(&CallContext::new(OTHER, 0), id, 100 * ONE).unwrap();
        assert_eq!(h.engine.vault(id).unwrap().debt_amount, 400 * ONE);
        assert_eq!(h.dm.balance_of(&OTHER), 0);
    }

    #[test]
    fn test_disallowed_collateral_blocks_growth_only() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 100 * ONE).unwrap();
        h.engine.set_allowed_collateral_token(&gov_at(0), ETH, false).unwrap();

        let blocked = Err(DmError::UnsupportedCollateral { collateral_type: ETH });
        assert!(matches!(
            h.engine.create_vault(&user_at(0), ETH),
            Err(DmError::UnsupportedCollateral { .. })
        ));
        assert_eq!(h.engine.add_collateral(&user_at(0), id, ONE), blocked);
        assert_eq!(h.engine.generate_dm(&user_at(0), id, ONE), blocked);

        h.engine.repay_debt(&user_at(0), id, 100 * ONE).unwrap();
        h.engine.withdraw_collateral(&user_at(0), id, 1_000 * ONE).unwrap();
        assert!(h.engine.vault(id).unwrap().is_empty());
    }

    #[test]
    fn test_governance_setters_emit_events() {
        let mut h = Harness::new();
        h.engine.set_liquidation_ratio(&gov_at(0), ETH, 175).unwrap();
        h.engine.set_liquidation_penalty(&gov_at(0), ETH, 2_000).unwrap();
        h.engine.set_auction_duration(&gov_at(0), ETH, 2 * 86_400).unwrap();
        h.engine.set_auction_contract(&gov_at(0), [88u8; 32]).unwrap();

        // Registration plus four setters
        assert_eq!(h.engine.events().filter_by_type(EventType::ParameterChanged).len(), 5);
        assert_eq!(h.engine.params().auction_contract(), [88u8; 32]);
        assert_eq!(h.engine.params().params(&ETH).unwrap().auction_duration, 2 * 86_400);
    }

    #[test]
    fn test_arithmetic_fault_halts_vault() {
        let mut h = Harness::new();
        let huge = u128::MAX / 2;
        h.mint_collateral(&USER, huge);
        let id = h.open_vault(huge);
        h.feed.update_price(&OPERATOR, ETH, u128::MAX, 0).unwrap();

        assert_eq!(h.engine.generate_dm(&user_at(0), id, ONE), Err(DmError::ArithmeticFault));
        assert!(h.engine.is_halted(id));
        assert_eq!(
            h.engine.withdraw_collateral(&user_at(0), id, ONE),
            Err(DmError::VaultHalted { vault_id: id })
        );

        assert!(h.engine.clear_vault_fault(&user_at(0), id).is_err());
        h.engine.clear_vault_fault(&gov_at(0), id).unwrap();
        h.feed.update_price(&OPERATOR, ETH, ONE, 0).unwrap();
        h.engine.generate_dm(&user_at(0), id, ONE).unwrap();
    }

    #[test]
    fn test_outstanding_debt_projects_fee() {
        let mut h = Harness::new();
        h.engine.set_stability_fee_rate(&gov_at(0), ETH, 1_000).unwrap();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        let year = dm_common::constants::time::SECONDS_PER_YEAR;
        assert_eq!(h.engine.outstanding_debt(id, year).unwrap(), 550 * ONE);
        // Queries never write
        assert_eq!(h.engine.vault(id).unwrap().stability_fee_accrued, 0);
        assert_eq!(h.engine.collateral_ratio(id).unwrap(), Some(200));
    }

    #[test]
    fn test_vaults_of() {
        let mut h = Harness::new();
        h.engine.create_vault(&user_at(0), ETH).unwrap();
        h.engine.create_vault(&CallContext::new(OTHER, 0), ETH).unwrap();
        h.engine.create_vault(&user_at(0), ETH).unwrap();

        let ids: Vec<_> = h.engine.vaults_of(&USER).iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
