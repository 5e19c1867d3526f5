//! Protocol Events for DM
//!
//! Every committed state transition emits a typed event. Events are collected
//! in an [`EventLog`] that also keeps a running SHA-256 digest over their
//! borsh encoding, so two replays of the same call sequence can be compared
//! bit-for-bit.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Address, Amount, CollateralType, Price, Timestamp, VaultId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    VaultCreated = 0x01,
    CollateralAdded = 0x02,
    CollateralWithdrawn = 0x03,
    DebtGenerated = 0x04,
    DebtRepaid = 0x05,
    VaultLiquidated = 0x06,

    // Governance Events (0x20 - 0x3F)
    ParameterChanged = 0x20,

    // Ledger Events (0x40 - 0x5F)
    Transfer = 0x40,
    Mint = 0x41,
    Burn = 0x42,
    Approval = 0x43,

    // Oracle Events (0x60 - 0x7F)
    PriceUpdated = 0x60,

    // Peg Stability Events (0x80 - 0x9F)
    StablecoinDeposited = 0x80,
    StablecoinWithdrawn = 0x81,

    // Vesting Events (0xA0 - 0xBF)
    TokensClaimed = 0xA0,

    // Savings Events (0xC0 - 0xDF)
    SavingsDeposited = 0xC0,
    SavingsWithdrawn = 0xC1,
    SavingsInterestAccrued = 0xC2,
}

/// Parameter touched by a governance or owner setter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum ParameterKind {
    LiquidationRatio,
    StabilityFeeRate,
    LiquidationPenalty,
    AuctionDuration,
    AuctionContract,
    AllowedCollateral,
    VaultFaultCleared,
    PriceOperator,
    SwapFee,
    Treasury,
    AcceptedStablecoin,
    CommunityMember,
    VestingToken,
    SavingsRate,
    Minter,
    Burner,
    VotingContract,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum DmEvent {
    // ============ Vault Events ============

    /// Emitted when a new vault is created
    VaultCreated {
        vault_id: VaultId,
        owner: Address,
        collateral_type: CollateralType,
        timestamp: Timestamp,
    },

    /// Emitted when collateral is added to a vault
    CollateralAdded {
        vault_id: VaultId,
        amount: Amount,
        new_collateral: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when collateral is withdrawn from a vault
    CollateralWithdrawn {
        vault_id: VaultId,
        amount: Amount,
        new_collateral: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when DM is minted against a vault
    DebtGenerated {
        vault_id: VaultId,
        amount: Amount,
        new_debt: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when debt is repaid (fee first, then principal)
    DebtRepaid {
        vault_id: VaultId,
        payer: Address,
        fee_paid: Amount,
        principal_paid: Amount,
        new_debt: Amount,
        new_fee_accrued: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when a vault is liquidated
    VaultLiquidated {
        vault_id: VaultId,
        caller_reward: Amount,
        collateral_seized: Amount,
        debt_obligation: Amount,
        keeper: Address,
        auction: Address,
        timestamp: Timestamp,
    },

    // ============ Governance Events ============

    /// Emitted by every governance/owner setter
    ParameterChanged {
        parameter: ParameterKind,
        subject: Option<Address>,
        old_value: u128,
        new_value: u128,
        timestamp: Timestamp,
    },

    // ============ Ledger Events ============

    /// Emitted on token transfer
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },

    /// Emitted when tokens are minted
    Mint {
        token: Address,
        to: Address,
        amount: Amount,
        new_total_supply: Amount,
    },

    /// Emitted when tokens are burned
    Burn {
        token: Address,
        from: Address,
        amount: Amount,
        new_total_supply: Amount,
    },

    /// Emitted when an allowance is set
    Approval {
        token: Address,
        owner: Address,
        spender: Address,
        amount: Amount,
    },

    // ============ Oracle Events ============

    /// Emitted when a collateral price is updated
    PriceUpdated {
        collateral_type: CollateralType,
        old_price: Option<Price>,
        new_price: Price,
        timestamp: Timestamp,
    },

    // ============ Peg Stability Events ============

    /// Emitted when a stablecoin is swapped into DM
    StablecoinDeposited {
        user: Address,
        coin: Address,
        amount: Amount,
        dm_minted: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when DM is swapped back into a stablecoin
    StablecoinWithdrawn {
        user: Address,
        coin: Address,
        dm_burned: Amount,
        amount_out: Amount,
        fee: Amount,
        timestamp: Timestamp,
    },

    // ============ Vesting Events ============

    /// Emitted when a monthly tranche is claimed
    TokensClaimed {
        claimant: Address,
        month: u64,
        amount: Amount,
        timestamp: Timestamp,
    },

    // ============ Savings Events ============

    /// Emitted when DM moves into savings
    SavingsDeposited {
        account: Address,
        amount: Amount,
        new_balance: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when DM moves out of savings
    SavingsWithdrawn {
        account: Address,
        amount: Amount,
        new_balance: Amount,
        timestamp: Timestamp,
    },

    /// Emitted when savings interest is credited
    SavingsInterestAccrued {
        account: Address,
        interest: Amount,
        new_balance: Amount,
        timestamp: Timestamp,
    },
}

impl DmEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::VaultCreated { .. } => EventType::VaultCreated,
            Self::CollateralAdded { .. } => EventType::CollateralAdded,
            Self::CollateralWithdrawn { .. } => EventType::CollateralWithdrawn,
            Self::DebtGenerated { .. } => EventType::DebtGenerated,
            Self::DebtRepaid { .. } => EventType::DebtRepaid,
            Self::VaultLiquidated { .. } => EventType::VaultLiquidated,
            Self::ParameterChanged { .. } => EventType::ParameterChanged,
            Self::Transfer { .. } => EventType::Transfer,
            Self::Mint { .. } => EventType::Mint,
            Self::Burn { .. } => EventType::Burn,
            Self::Approval { .. } => EventType::Approval,
            Self::PriceUpdated { .. } => EventType::PriceUpdated,
            Self::StablecoinDeposited { .. } => EventType::StablecoinDeposited,
            Self::StablecoinWithdrawn { .. } => EventType::StablecoinWithdrawn,
            Self::TokensClaimed { .. } => EventType::TokensClaimed,
            Self::SavingsDeposited { .. } => EventType::SavingsDeposited,
            Self::SavingsWithdrawn { .. } => EventType::SavingsWithdrawn,
            Self::SavingsInterestAccrued { .. } => EventType::SavingsInterestAccrued,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Append-only event log with a running digest
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<DmEvent>,
    digest: [u8; 32],
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event (add to log and fold it into the digest)
    pub fn emit(&mut self, event: DmEvent) {
        let mut hasher = Sha256::new();
        hasher.update(self.digest);
        hasher.update(event.to_bytes());
        self.digest.copy_from_slice(&hasher.finalize());
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[DmEvent] {
        &self.events
    }

    /// Most recent event
    pub fn last(&self) -> Option<&DmEvent> {
        self.events.last()
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<DmEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&DmEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Chained SHA-256 over every event emitted so far
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events were emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(vault_id: VaultId) -> DmEvent {
        DmEvent::VaultCreated {
            vault_id,
            owner: [2u8; 32],
            collateral_type: [9u8; 32],
            timestamp: 100,
        }
    }

    #[test]
    fn test_event_type() {
        assert_eq!(created(0).event_type(), EventType::VaultCreated);
    }

    #[test]
    fn test_event_serialization() {
        let event = DmEvent::VaultLiquidated {
            vault_id: 4,
            caller_reward: 0,
            collateral_seized: 1_000,
            debt_obligation: 550,
            keeper: [3u8; 32],
            auction: [4u8; 32],
            timestamp: 200,
        };

        let restored = DmEvent::from_bytes(&event.to_bytes()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_cbor_encoding() {
        let event = created(1);
        let mut buf = Vec::new();
        ciborium::into_writer(&event, &mut buf).unwrap();
        let decoded: DmEvent = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_event_log_digest_is_order_sensitive() {
        let mut a = EventLog::new();
        a.emit(created(0));
        a.emit(created(1));

        let mut b = EventLog::new();
        b.emit(created(0));
        b.emit(created(1));

        let mut c = EventLog::new();
        c.emit(created(1));
        c.emit(created(0));

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.len(), 2);
        assert_eq!(a.filter_by_type(EventType::VaultCreated).len(), 2);
    }

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.digest(), [0u8; 32]);
        assert!(log.last().is_none());
    }
}
