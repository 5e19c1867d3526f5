//! Shareable ledger handle
//!
//! The vault engine, the PSM and the savings module all move DM. A
//! [`SharedLedger`] lets them hold the same ledger while each still sees a
//! plain [`ValueLedger`].

use std::sync::Arc;

use parking_lot::Mutex;

use dm_common::{
    errors::DmResult,
    ledger::ValueLedger,
    types::{Address, Amount},
};

/// Cloneable, thread-safe handle to one ledger instance
#[derive(Debug)]
pub struct SharedLedger<L> {
    inner: Arc<Mutex<L>>,
}

impl<L> Clone for SharedLedger<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ValueLedger> SharedLedger<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Run `f` with exclusive access to the underlying ledger
    pub fn with<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

impl<L: ValueLedger> ValueLedger for SharedLedger<L> {
    fn token_id(&self) -> Address {
        self.inner.lock().token_id()
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.inner.lock().balance_of(account)
    }

    fn total_supply(&self) -> Amount {
        self.inner.lock().total_supply()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.inner.lock().allowance(owner, spender)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> DmResult<()> {
        self.inner.lock().approve(owner, spender, amount)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        self.inner.lock().transfer(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> DmResult<()> {
        self.inner.lock().transfer_from(spender, from, to, amount)
    }

    fn mint(&mut self, minter: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        self.inner.lock().mint(minter, to, amount)
    }

    fn burn(&mut self, from: &Address, amount: Amount) -> DmResult<()> {
        self.inner.lock().burn(from, amount)
    }

    fn burn_from(&mut self, spender: &Address, from: &Address, amount: Amount) -> DmResult<()> {
        self.inner.lock().burn_from(spender, from, amount)
    }
}
