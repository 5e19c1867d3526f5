//! DD Community Vesting
//!
//! Releases the 200M DD community allocation in 60 equal monthly tranches.
//! The allocation sits in the schedule's vesting account; an approved
//! community member claims a tranche once its month has elapsed and the
//! tranche moves straight to the claimant.
//!
//! ## Key Features
//!
//! - Owner-managed community membership
//! - Token ledger attached after construction
//! - Each month is paid out exactly once, to the first member who claims it

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    constants::vesting::{MONTH, TOTAL_ALLOCATION, VESTING_MONTHS},
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    ledger::ValueLedger,
    types::{is_zero_address, Address, Amount, CallContext, Timestamp},
};

/// Amount released per month
pub const PER_MONTH_RELEASE: Amount = TOTAL_ALLOCATION / VESTING_MONTHS as u128;

/// Serializable view of a schedule's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VestingStatus {
    pub start: Timestamp,
    pub claimed_months: Vec<u64>,
    pub released: Amount,
}

/// Monthly release schedule over one token ledger
pub struct VestingSchedule<L: ValueLedger> {
    owner: Address,
    /// Holds the unreleased allocation
    vesting_account: Address,
    start: Timestamp,
    token: Option<L>,
    community_members: BTreeSet<Address>,
    claimed: BTreeSet<u64>,
    events: EventLog,
}

impl<L: ValueLedger> VestingSchedule<L> {
    pub fn new(owner: Address, vesting_account: Address, start: Timestamp) -> DmResult<Self> {
        if is_zero_address(&owner) || is_zero_address(&vesting_account) {
            return Err(DmError::InvalidAddress {
                reason: "owner and vesting account must be set",
            });
        }
        Ok(Self {
            owner,
            vesting_account,
            start,
            token: None,
            community_members: BTreeSet::new(),
            claimed: BTreeSet::new(),
            events: EventLog::new(),
        })
    }

    // ============ Queries ============

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn vesting_account(&self) -> Address {
        self.vesting_account
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn token(&self) -> Option<&L> {
        self.token.as_ref()
    }

    pub fn is_community_member(&self, account: &Address) -> bool {
        self.community_members.contains(account)
    }

    pub fn is_claimed(&self, month: u64) -> bool {
        self.claimed.contains(&month)
    }

    /// First second at which `month` may be claimed
    pub fn unlocks_at(&self, month: u64) -> DmResult<Timestamp> {
        month
            .checked_mul(MONTH)
            .and_then(|offset| self.start.checked_add(offset))
            .ok_or(DmError::ArithmeticFault)
    }

    pub fn status(&self) -> VestingStatus {
        VestingStatus {
            start: self.start,
            claimed_months: self.claimed.iter().copied().collect(),
            released: PER_MONTH_RELEASE * self.claimed.len() as u128,
        }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Administration ============

    pub fn set_community_member(&mut self, ctx: &CallContext, member: Address, enabled: bool) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        let was = if enabled {
            !self.community_members.insert(member)
        } else {
            self.community_members.remove(&member)
        };
        self.events.emit(DmEvent::ParameterChanged {
            parameter: ParameterKind::CommunityMember,
            subject: Some(member),
            old_value: was as u128,
            new_value: enabled as u128,
            timestamp: ctx.now,
        });
        Ok(())
    }

    /// Attach the ledger tranches are paid from, replacing any earlier one
    pub fn set_token(&mut self, ctx: &CallContext, ledger: L) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        let token_id = ledger.token_id();
        if is_zero_address(&token_id) {
            return Err(DmError::InvalidAddress {
                reason: "invalid token address",
            });
        }
        self.token = Some(ledger);
        self.events.emit(DmEvent::ParameterChanged {
            parameter: ParameterKind::VestingToken,
            subject: Some(token_id),
            old_value: 0,
            new_value: 0,
            timestamp: ctx.now,
        });
        Ok(())
    }

    // ============ Claims ============

    /// Pay tranche `month` (1-based) to the caller
    pub fn claim_token(&mut self, ctx: &CallContext, month: u64) -> DmResult<Amount> {
        // 1. Caller must be an approved member
        if !self.community_members.contains(&ctx.caller) {
            return Err(DmError::NotCommunityMember { caller: ctx.caller });
        }

        // 2. Month must fall inside the schedule and have elapsed
        if month == 0 || month > VESTING_MONTHS {
            return Err(DmError::VestingPeriodExceeded {
                month,
                max: VESTING_MONTHS,
            });
        }
        let unlocks_at = self.unlocks_at(month)?;
        if ctx.now < unlocks_at {
            return Err(DmError::MonthNotReached { month, unlocks_at });
        }

        // 3. One payout per month
        if self.claimed.contains(&month) {
            return Err(DmError::MonthAlreadyClaimed { month });
        }

        // 4. Transfer, then record
        let from = self.vesting_account;
        let token = self.token.as_mut().ok_or(DmError::TokenNotSet)?;
        token.transfer(&from, &ctx.caller, PER_MONTH_RELEASE)?;
        self.claimed.insert(month);

        self.events.emit(DmEvent::TokensClaimed {
            claimant: ctx.caller,
            month,
            amount: PER_MONTH_RELEASE,
            timestamp: ctx.now,
        });
        tracing::info!(month, "vesting tranche claimed");
        Ok(PER_MONTH_RELEASE)
    }

    fn ensure_owner(&self, caller: &Address) -> DmResult<()> {
        if *caller != self.owner {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        Ok(())
    }
}

// ============ Tests ============
