//! Core Types for the DM Protocol
//!
//! Fundamental data structures shared by the vault engine and its
//! collaborators.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{DmError, DmResult};
use crate::math::checked_add;

/// Type alias for principal identities and token identifiers (32-byte hash)
pub type Address = [u8; 32];

/// Collateral types are identified by their ledger address
pub type CollateralType = Address;

/// Monotonically assigned vault identifier
pub type VaultId = u64;

/// 18-decimal fixed-point quantity
pub type Amount = u128;

/// Quote asset per unit of collateral, 18-decimal fixed point
pub type Price = u128;

/// Seconds since an arbitrary epoch chosen by the host
pub type Timestamp = u64;

/// The zero address, never a valid principal
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Returns true if the address is the zero address
pub fn is_zero_address(address: &Address) -> bool {
    *address == ZERO_ADDRESS
}

// ============ Call Context ============

/// Who is calling and when.
///
/// Passed explicitly into every state transition so that replaying the same
/// sequence of calls yields identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Calling principal
    pub caller: Address,
    /// Current time in seconds
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

// ============ Vault Types ============

/// One collateral-backed debt position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Vault {
    /// Unique identifier, never reused
    pub id: VaultId,
    /// Owner, immutable after creation
    pub owner: Address,
    /// Collateral type, immutable after creation
    pub collateral_type: CollateralType,
    /// Collateral held in custody
    pub collateral_amount: Amount,
    /// DM principal owed (excludes accrued fee)
    pub debt_amount: Amount,
    /// Unpaid stability fee
    pub stability_fee_accrued: Amount,
    /// Last time fee accrual was applied
    pub last_fee_update: Timestamp,
    /// Creation time
    pub created_at: Timestamp,
}

impl Vault {
    /// Creates an empty vault
    pub fn new(id: VaultId, owner: Address, collateral_type: CollateralType, now: Timestamp) -> Self {
        Self {
            id,
            owner,
            collateral_type,
            collateral_amount: 0,
            debt_amount: 0,
            stability_fee_accrued: 0,
            last_fee_update: now,
            created_at: now,
        }
    }

    /// Principal plus accrued fee
    pub fn total_debt(&self) -> DmResult<Amount> {
        checked_add(self.debt_amount, self.stability_fee_accrued)
    }

    /// True once collateral, debt and fee are all zero
    pub fn is_empty(&self) -> bool {
        self.collateral_amount == 0 && self.debt_amount == 0 && self.stability_fee_accrued == 0
    }

    /// True if the vault owes anything
    pub fn has_debt(&self) -> bool {
        self.debt_amount > 0 || self.stability_fee_accrued > 0
    }

    /// Zero all balances, keeping identity and timestamps
    pub fn reset(&mut self) {
        self.collateral_amount = 0;
        self.debt_amount = 0;
        self.stability_fee_accrued = 0;
    }

    /// Ensure `caller` owns this vault
    pub fn ensure_owner(&self, caller: &Address) -> DmResult<()> {
        if self.owner != *caller {
            return Err(DmError::NotOwner {
                vault_id: self.id,
                caller: *caller,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vault_is_empty() {
        let vault = Vault::new(7, [2u8; 32], [9u8; 32], 1_000);
        assert!(vault.is_empty());
        assert!(!vault.has_debt());
        assert_eq!(vault.last_fee_update, 1_000);
        assert_eq!(vault.created_at, 1_000);
    }

    #[test]
    fn test_reset_keeps_identity() {
        let mut vault = Vault::new(3, [2u8; 32], [9u8; 32], 10);
        vault.collateral_amount = 5;
        vault.debt_amount = 4;
        vault.stability_fee_accrued = 1;
        assert_eq!(vault.total_debt().unwrap(), 5);

        vault.reset();
        assert!(vault.is_empty());
        assert_eq!(vault.id, 3);
        assert_eq!(vault.owner, [2u8; 32]);
    }

    #[test]
    fn test_total_debt_overflow_is_fault() {
        let mut vault = Vault::new(0, [2u8; 32], [9u8; 32], 0);
        vault.debt_amount = Amount::MAX;
        vault.stability_fee_accrued = 1;
        assert_eq!(vault.total_debt(), Err(DmError::ArithmeticFault));
    }

    #[test]
    fn test_ensure_owner() {
        let vault = Vault::new(1, [2u8; 32], [9u8; 32], 0);
        assert!(vault.ensure_owner(&[2u8; 32]).is_ok());
        assert_eq!(
            vault.ensure_owner(&[3u8; 32]),
            Err(DmError::NotOwner { vault_id: 1, caller: [3u8; 32] })
        );
    }
}
