//! DM Savings Rate
//!
//! Holders park DM in savings and earn simple interest at a yearly rate set
//! by the owner. Deposited DM sits in the module's custody account; interest
//! is minted into custody on every touch so custody always covers the sum of
//! savings balances.
//!
//! ## Key Features
//!
//! - **Simple interest**: `balance * rate * elapsed / (YEAR * 1e18)`
//! - **Lazy accrual**: interest is credited whenever an account is touched
//! - **Permissionless updates**: anyone may bring an account up to date

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    constants::{precision::WAD, time::SECONDS_PER_YEAR},
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    ledger::{ensure_balance, ValueLedger},
    math::{checked_add, mul_mul_div},
    types::{is_zero_address, Address, Amount, CallContext, Timestamp},
};

/// Savings position of one holder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SavingsAccount {
    /// DM held in savings including credited interest
    pub balance: Amount,
    /// Last time interest was credited
    pub last_update: Timestamp,
}

/// Interest earned by `balance` over `elapsed` seconds at a WAD yearly rate
pub fn savings_interest(balance: Amount, rate: u128, elapsed: Timestamp) -> DmResult<Amount> {
    if balance == 0 || rate == 0 || elapsed == 0 {
        return Ok(0);
    }
    let year_wad = (SECONDS_PER_YEAR as u128)
        .checked_mul(WAD)
        .ok_or(DmError::ArithmeticFault)?;
    mul_mul_div(balance, rate, elapsed as u128, year_wad)
}

/// Savings rate module over a DM ledger
#[derive(Debug)]
pub struct SavingsModule<L: ValueLedger> {
    /// May change the rate
    owner: Address,
    /// Holds deposited DM; must be a minter on `dm`
    custody: Address,
    /// Yearly rate as a WAD (0.05e18 = 5%)
    rate: u128,
    accounts: BTreeMap<Address, SavingsAccount>,
    dm: L,
    events: EventLog,
}

impl<L: ValueLedger> SavingsModule<L> {
    pub fn new(owner: Address, custody: Address, dm: L) -> DmResult<Self> {
        if is_zero_address(&owner) || is_zero_address(&custody) {
            return Err(DmError::InvalidAddress {
                reason: "savings owner and custody must be set",
            });
        }
        Ok(Self {
            owner,
            custody,
            rate: 0,
            accounts: BTreeMap::new(),
            dm,
            events: EventLog::new(),
        })
    }

    pub fn savings_rate(&self) -> u128 {
        self.rate
    }

    pub fn custody_account(&self) -> Address {
        self.custody
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn ledger(&self) -> &L {
        &self.dm
    }

    /// Credited balance of `account` (excludes interest not yet applied)
    pub fn savings_balance(&self, account: &Address) -> Amount {
        self.accounts.get(account).map(|a| a.balance).unwrap_or(0)
    }

    /// Sum of all savings balances
    pub fn total_savings(&self) -> Amount {
        self.accounts.values().map(|a| a.balance).sum()
    }

    /// Set the yearly rate (owner only, at most 100%)
    ///
    /// Every position is credited up to `ctx.now` under the old rate first,
    /// so the new rate only applies from this moment on.
    pub fn set_savings_rate(&mut self, ctx: &CallContext, rate: u128) -> DmResult<()> {
        if ctx.caller != self.owner {
            return Err(DmError::NotAuthorized { caller: ctx.caller });
        }
        if rate > WAD {
            return Err(DmError::InvalidParameter {
                param: "savings_rate",
                reason: "above 100% per year",
            });
        }

        let holders: Vec<Address> = self.accounts.keys().copied().collect();
        for holder in &holders {
            self.update_savings(holder, ctx.now)?;
        }

        let old = self.rate;
        self.rate = rate;
        self.events.emit(DmEvent::ParameterChanged {
            parameter: ParameterKind::SavingsRate,
            subject: None,
            old_value: old,
            new_value: rate,
            timestamp: ctx.now,
        });
        tracing::debug!(old, new = rate, "savings rate changed");
        Ok(())
    }

    /// Credit outstanding interest to `account`, returning the amount credited
    pub fn update_savings(&mut self, account: &Address, now: Timestamp) -> DmResult<Amount> {
        let current = self.accounts.get(account).copied().unwrap_or_default();
        let (updated, interest) = self.accrue(current, now)?;

        if interest > 0 {
            self.dm.mint(&self.custody, &self.custody, interest)?;
            self.events.emit(DmEvent::SavingsInterestAccrued {
                account: *account,
                interest,
                new_balance: updated.balance,
                timestamp: now,
            });
        }
        if updated != current {
            self.accounts.insert(*account, updated);
        }
        Ok(interest)
    }

    /// Move `amount` DM from the caller's wallet into savings
    pub fn deposit(&mut self, ctx: &CallContext, amount: Amount) -> DmResult<()> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 2. Caller must hold the DM
        ensure_balance(&self.dm, &ctx.caller, amount)?;

        // 3. Bring the position up to date, then add the deposit
        let current = self.accounts.get(&ctx.caller).copied().unwrap_or_default();
        let (mut updated, interest) = self.accrue(current, ctx.now)?;
        updated.balance = checked_add(updated.balance, amount)?;

        // 4. Interest first, deposit second; undo the interest if the deposit fails
        if interest > 0 {
            self.dm.mint(&self.custody, &self.custody, interest)?;
        }
        if let Err(err) = self.dm.transfer(&ctx.caller, &self.custody, amount) {
            if interest > 0 {
                self.dm.burn(&self.custody, interest)?;
            }
            return Err(err);
        }

        self.accounts.insert(ctx.caller, updated);
        if interest > 0 {
            self.events.emit(DmEvent::SavingsInterestAccrued {
                account: ctx.caller,
                interest,
                new_balance: updated.balance - amount,
                timestamp: ctx.now,
            });
        }
        self.events.emit(DmEvent::SavingsDeposited {
            account: ctx.caller,
            amount,
            new_balance: updated.balance,
            timestamp: ctx.now,
        });
        tracing::debug!(amount, balance = updated.balance, "savings deposit");
        Ok(())
    }

    /// Move `amount` DM from savings back to the caller's wallet
    pub fn withdraw(&mut self, ctx: &CallContext, amount: Amount) -> DmResult<()> {
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        let current = self.accounts.get(&ctx.caller).copied().unwrap_or_default();
        let (mut updated, interest) = self.accrue(current, ctx.now)?;
        if amount > updated.balance {
            return Err(DmError::InsufficientBalance {
                available: updated.balance,
                requested: amount,
            });
        }
        updated.balance -= amount;

        if interest > 0 {
            self.dm.mint(&self.custody, &self.custody, interest)?;
        }
        if let Err(err) = self.dm.transfer(&self.custody, &ctx.caller, amount) {
            if interest > 0 {
                self.dm.burn(&self.custody, interest)?;
            }
            return Err(err);
        }

        self.accounts.insert(ctx.caller, updated);
        if interest > 0 {
            self.events.emit(DmEvent::SavingsInterestAccrued {
                account: ctx.caller,
                interest,
                new_balance: updated.balance + amount,
                timestamp: ctx.now,
            });
        }
        self.events.emit(DmEvent::SavingsWithdrawn {
            account: ctx.caller,
            amount,
            new_balance: updated.balance,
            timestamp: ctx.now,
        });
        tracing::debug!(amount, balance = updated.balance, "savings withdrawal");
        Ok(())
    }

    fn accrue(&self, account: SavingsAccount, now: Timestamp) -> DmResult<(SavingsAccount, Amount)> {
        // Clock going backwards credits nothing and keeps the snapshot
        if now <= account.last_update {
            return Ok((account, 0));
        }
        let interest = savings_interest(account.balance, self.rate, now - account.last_update)?;
        Ok((
            SavingsAccount {
                balance: checked_add(account.balance, interest)?,
                last_update: now,
            },
            interest,
        ))
    }
}
