//! Serialized access to one engine from many threads
//!
//! A single mutex around the whole engine gives every operation a total
//! order: each call runs to completion before the next starts and callers
//! never see a lock error.

use std::sync::Arc;

use parking_lot::Mutex;

use dm_common::{
    errors::DmResult,
    ledger::ValueLedger,
    oracle::PriceOracle,
    types::{Amount, CallContext, CollateralType, Timestamp, Vault, VaultId},
};

use crate::liquidation::LiquidationRecord;
use crate::registry::{Repayment, VaultEngine};

/// Cloneable handle to a [`VaultEngine`]
pub struct SharedVaultEngine<L: ValueLedger, O: PriceOracle> {
    inner: Arc<Mutex<VaultEngine<L, O>>>,
}

impl<L: ValueLedger, O: PriceOracle> Clone for SharedVaultEngine<L, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ValueLedger, O: PriceOracle> SharedVaultEngine<L, O> {
    pub fn new(engine: VaultEngine<L, O>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run several calls as one uninterrupted unit
    pub fn with<R>(&self, f: impl FnOnce(&mut VaultEngine<L, O>) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn create_vault(&self, ctx: &CallContext, collateral_type: CollateralType) -> DmResult<VaultId> {
        self.inner.lock().create_vault(ctx, collateral_type)
    }

    pub fn add_collateral(&self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        self.inner.lock().add_collateral(ctx, vault_id, amount)
    }

    pub fn withdraw_collateral(&self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        self.inner.lock().withdraw_collateral(ctx, vault_id, amount)
    }

    pub fn generate_dm(&self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<()> {
        self.inner.lock().generate_dm(ctx, vault_id, amount)
    }

    pub fn repay_debt(&self, ctx: &CallContext, vault_id: VaultId, amount: Amount) -> DmResult<Repayment> {
        self.inner.lock().repay_debt(ctx, vault_id, amount)
    }

    pub fn liquidate_vault(&self, ctx: &CallContext, vault_id: VaultId) -> DmResult<LiquidationRecord> {
        self.inner.lock().liquidate_vault(ctx, vault_id)
    }

    /// Snapshot of a vault
    pub fn vault(&self, vault_id: VaultId) -> Option<Vault> {
        self.inner.lock().vault(vault_id).cloned()
    }

    pub fn is_safe(&self, vault_id: VaultId, now: Timestamp) -> DmResult<bool> {
        self.inner.lock().is_safe(vault_id, now)
    }
}
