//! DM Token Ledger
//!
//! Reference implementation of the [`ValueLedger`] interface. The same type
//! backs the DM synthetic asset, every collateral asset, PSM stablecoins and
//! the vesting token; each is an independent instance.
//!
//! ## Rules
//!
//! - Only the owner and authorized minters can mint
//! - Holders burn their own balance; spenders burn through an allowance;
//!   authorized burners burn from any holder
//! - Total supply always equals the sum of balances

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    constants::token,
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    ledger::ValueLedger,
    math::{checked_add, checked_sub},
    types::{is_zero_address, Address, Amount, CallContext},
};

pub mod governance;
pub mod savings;
pub mod shared;

pub use governance::{Allocation, DdAllocations};
pub use savings::{SavingsAccount, SavingsModule};
pub use shared::SharedLedger;

// ============ Token Metadata ============

/// Static description of a ledger's asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    /// Metadata of the DM synthetic asset
    pub fn dm() -> Self {
        Self {
            name: token::NAME.to_string(),
            symbol: token::SYMBOL.to_string(),
            decimals: token::DECIMALS,
        }
    }
}

// ============ Token Ledger ============

/// In-memory balance ledger for one asset
#[derive(Debug, Clone)]
pub struct TokenLedger {
    /// Asset identifier
    token_id: Address,
    /// Asset metadata
    metadata: TokenMetadata,
    /// Ledger owner (manages minters and burners)
    owner: Address,
    /// Whether the owner itself may mint
    owner_mints: bool,
    /// Accounts allowed to mint in addition to the owner
    minters: BTreeSet<Address>,
    /// Accounts allowed to burn from any holder
    burners: BTreeSet<Address>,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    total_supply: Amount,
    events: EventLog,
}

impl TokenLedger {
    /// Create an empty ledger
    pub fn new(token_id: Address, metadata: TokenMetadata, owner: Address) -> Self {
        Self {
            token_id,
            metadata,
            owner,
            owner_mints: true,
            minters: BTreeSet::new(),
            burners: BTreeSet::new(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            total_supply: 0,
            events: EventLog::new(),
        }
    }

    /// Create the DM synthetic asset ledger
    pub fn dm(token_id: Address, owner: Address) -> Self {
        Self::new(token_id, TokenMetadata::dm(), owner)
    }

    /// Create an 18-decimal ledger with the given symbol
    pub fn with_symbol(token_id: Address, symbol: &str, owner: Address) -> Self {
        Self::new(
            token_id,
            TokenMetadata {
                name: symbol.to_string(),
                symbol: symbol.to_string(),
                decimals: token::DECIMALS,
            },
            owner,
        )
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// True if `account` may mint
    pub fn is_minter(&self, account: &Address) -> bool {
        (self.owner_mints && *account == self.owner) || self.minters.contains(account)
    }

    /// True if `account` may burn from any holder
    pub fn is_burner(&self, account: &Address) -> bool {
        self.burners.contains(account)
    }

    /// Grant or revoke mint rights (owner only)
    pub fn set_minter(&mut self, ctx: &CallContext, minter: &Address, enabled: bool) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if is_zero_address(minter) {
            return Err(DmError::InvalidAddress {
                reason: "minter cannot be zero address",
            });
        }

        let was_enabled = toggle(&mut self.minters, minter, enabled);
        self.emit_role_change(ParameterKind::Minter, minter, was_enabled, enabled, ctx);
        Ok(())
    }

    /// Grant or revoke the right to burn without an allowance (owner only)
    pub fn set_burner(&mut self, ctx: &CallContext, burner: &Address, enabled: bool) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if is_zero_address(burner) {
            return Err(DmError::InvalidAddress {
                reason: "burner cannot be zero address",
            });
        }

        let was_enabled = toggle(&mut self.burners, burner, enabled);
        self.emit_role_change(ParameterKind::Burner, burner, was_enabled, enabled, ctx);
        Ok(())
    }

    /// Destroy `amount` of `from`'s balance on a burner's authority
    pub fn authority_burn(&mut self, burner: &Address, from: &Address, amount: Amount) -> DmResult<()> {
        if !self.is_burner(burner) {
            return Err(DmError::NotAuthorized { caller: *burner });
        }
        self.check_burn(from, amount)?;
        self.destroy(from, amount)
    }

    fn ensure_owner(&self, caller: &Address) -> DmResult<()> {
        if *caller != self.owner {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        Ok(())
    }

    fn emit_role_change(&mut self, parameter: ParameterKind, account: &Address, was: bool, enabled: bool, ctx: &CallContext) {
        self.events.emit(DmEvent::ParameterChanged {
            parameter,
            subject: Some(*account),
            old_value: was as u128,
            new_value: enabled as u128,
            timestamp: ctx.now,
        });
    }

    /// Create `amount` for `to` without an authority check
    fn issue(&mut self, to: &Address, amount: Amount) -> DmResult<()> {
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }
        if is_zero_address(to) {
            return Err(DmError::InvalidAddress {
                reason: "cannot mint to zero address",
            });
        }

        // Supply and balance must not overflow
        let new_supply = checked_add(self.total_supply, amount)?;
        self.credit(to, amount)?;
        self.total_supply = new_supply;

        self.events.emit(DmEvent::Mint {
            token: self.token_id,
            to: *to,
            amount,
            new_total_supply: new_supply,
        });
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) -> DmResult<()> {
        let available = self.allowance(owner, spender);
        if available < amount {
            return Err(DmError::InsufficientAllowance {
                available,
                requested: amount,
            });
        }
        self.allowances.insert((*owner, *spender), available - amount);
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> DmResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(DmError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> DmResult<()> {
        let updated = checked_add(self.balance_of(account), amount)?;
        self.balances.insert(*account, updated);
        Ok(())
    }

    fn check_transfer(&self, from: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }
        if is_zero_address(to) {
            return Err(DmError::InvalidAddress {
                reason: "cannot transfer to zero address",
            });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(DmError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        // Recipient overflow must be caught before the debit
        if from != to {
            checked_add(self.balance_of(to), amount)?;
        }
        Ok(())
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        self.events.emit(DmEvent::Transfer {
            token: self.token_id,
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }

    fn destroy(&mut self, from: &Address, amount: Amount) -> DmResult<()> {
        let new_supply = checked_sub(self.total_supply, amount)?;
        self.debit(from, amount)?;
        self.total_supply = new_supply;
        self.events.emit(DmEvent::Burn {
            token: self.token_id,
            from: *from,
            amount,
            new_total_supply: new_supply,
        });
        Ok(())
    }

    fn check_burn(&self, from: &Address, amount: Amount) -> DmResult<()> {
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(DmError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        Ok(())
    }
}

impl ValueLedger for TokenLedger {
    fn token_id(&self) -> Address {
        self.token_id
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> DmResult<()> {
        if is_zero_address(spender) {
            return Err(DmError::InvalidAddress {
                reason: "cannot approve zero address",
            });
        }
        self.allowances.insert((*owner, *spender), amount);
        self.events.emit(DmEvent::Approval {
            token: self.token_id,
            owner: *owner,
            spender: *spender,
            amount,
        });
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        self.check_transfer(from, to, amount)?;
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> DmResult<()> {
        self.check_transfer(from, to, amount)?;
        self.spend_allowance(from, spender, amount)?;
        self.move_balance(from, to, amount)
    }

    fn mint(&mut self, minter: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        if !self.is_minter(minter) {
            return Err(DmError::MintUnauthorized { caller: *minter });
        }
        self.issue(to, amount)
    }

    fn burn(&mut self, from: &Address, amount: Amount) -> DmResult<()> {
        self.check_burn(from, amount)?;
        self.destroy(from, amount)
    }

    fn burn_from(&mut self, spender: &Address, from: &Address, amount: Amount) -> DmResult<()> {
        self.check_burn(from, amount)?;
        self.spend_allowance(from, spender, amount)?;
        self.destroy(from, amount)
    }
}

/// Add or remove `account`, returning whether it was present
fn toggle(set: &mut BTreeSet<Address>, account: &Address, enabled: bool) -> bool {
    if enabled {
        !set.insert(*account)
    } else {
        set.remove(account)
    }
}

// ============ Tests ============
