//! DD Governance Token
//!
//! Two ledgers built on [`TokenLedger`]:
//!
//! - **DD**: fixed supply, minted once at construction and split by percent
//!   across named allocations. Nobody can mint afterwards.
//! - **xDD**: voting share with no initial supply. Only the voting contract
//!   the owner appoints may mint, and it burns from any holder without an
//!   allowance.

use dm_common::{
    constants::governance_token::{
        AIRDROP_PERCENT, BUSINESSES_PERCENT, COMMUNITY_PERCENT, DD_TOTAL_SUPPLY, DEVELOPMENT_PERCENT, VESTING_PERCENT,
    },
    constants::precision::PERCENT,
    constants::token,
    errors::{DmError, DmResult},
    events::{DmEvent, ParameterKind},
    math::{checked_sub, mul_div},
    types::{is_zero_address, Address, Amount, CallContext},
};

use crate::{TokenLedger, TokenMetadata};

/// One recipient's share of a fixed supply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub account: Address,
    pub percent: u8,
}

/// Recipients of the DD supply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdAllocations {
    pub development: Address,
    pub businesses: Address,
    pub community: Address,
    /// Vesting schedule account
    pub vesting: Address,
    pub airdrop: Address,
}

impl DdAllocations {
    pub fn split(&self) -> [Allocation; 5] {
        [
            Allocation { account: self.development, percent: DEVELOPMENT_PERCENT },
            Allocation { account: self.businesses, percent: BUSINESSES_PERCENT },
            Allocation { account: self.community, percent: COMMUNITY_PERCENT },
            Allocation { account: self.vesting, percent: VESTING_PERCENT },
            Allocation { account: self.airdrop, percent: AIRDROP_PERCENT },
        ]
    }
}

impl TokenLedger {
    /// Create a fixed-supply ledger split across `allocations`.
    ///
    /// Rounding dust goes to the last allocation so the balances sum to
    /// exactly `total_supply`.
    ///
    /// # Errors
    /// - `InvalidParameter` if the percentages do not sum to 100
    /// - `InvalidAddress` for a zero recipient
    /// - `ZeroAmount` if a share rounds to nothing
    pub fn with_allocations(
        token_id: Address,
        metadata: TokenMetadata,
        owner: Address,
        total_supply: Amount,
        allocations: &[Allocation],
    ) -> DmResult<Self> {
        // 1. Percentages must cover the whole supply
        let total_percent: u128 = allocations.iter().map(|a| a.percent as u128).sum();
        if total_percent != PERCENT {
            return Err(DmError::InvalidParameter {
                param: "allocations",
                reason: "percentages must sum to 100",
            });
        }

        // 2. Mint each share; the last one absorbs rounding
        let mut ledger = Self::new(token_id, metadata, owner);
        ledger.owner_mints = false;
        let mut remaining = total_supply;
        for (i, allocation) in allocations.iter().enumerate() {
            let share = if i + 1 == allocations.len() {
                remaining
            } else {
                mul_div(total_supply, allocation.percent as u128, PERCENT)?
            };
            ledger.issue(&allocation.account, share)?;
            remaining = checked_sub(remaining, share)?;
        }

        tracing::info!(total_supply, recipients = allocations.len(), "fixed supply allocated");
        Ok(ledger)
    }

    /// Create the DD governance token with its 1B supply distributed
    pub fn dd(token_id: Address, owner: Address, recipients: &DdAllocations) -> DmResult<Self> {
        let metadata = TokenMetadata {
            name: "DiscountDao".to_string(),
            symbol: "DD".to_string(),
            decimals: token::DECIMALS,
        };
        Self::with_allocations(token_id, metadata, owner, DD_TOTAL_SUPPLY, &recipients.split())
    }

    /// Create the xDD voting share; nothing can be minted until a voting
    /// contract is appointed
    pub fn xdd(token_id: Address, owner: Address) -> Self {
        let metadata = TokenMetadata {
            name: "xDiscountDao".to_string(),
            symbol: "xDD".to_string(),
            decimals: token::DECIMALS,
        };
        let mut ledger = Self::new(token_id, metadata, owner);
        ledger.owner_mints = false;
        ledger
    }

    /// Make `voting` the sole minter and burner, replacing the previous one
    pub fn set_voting_contract(&mut self, ctx: &CallContext, voting: Address) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if is_zero_address(&voting) {
            return Err(DmError::InvalidAddress {
                reason: "invalid voting contract address",
            });
        }

        self.minters.clear();
        self.burners.clear();
        self.minters.insert(voting);
        self.burners.insert(voting);

        self.events.emit(DmEvent::ParameterChanged {
            parameter: ParameterKind::VotingContract,
            subject: Some(voting),
            old_value: 0,
            new_value: 0,
            timestamp: ctx.now,
        });
        Ok(())
    }
}
