//! Error Types for the DM Protocol
//!
//! A single typed error enum shared by every crate. Each variant carries
//! enough context for debugging and maps to a stable error code.

use thiserror::Error;

use crate::types::{Address, Amount, CollateralType, VaultId};

/// Result type alias for DM protocol operations
pub type DmResult<T> = Result<T, DmError>;

/// Main error enum for all DM protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DmError {
    // ============ Authorization Errors ============
    /// Caller is not the governance principal (or module owner)
    #[error("not authorized: caller {caller:?}")]
    NotAuthorized { caller: Address },

    /// Caller does not own the vault
    #[error("vault {vault_id} is not owned by {caller:?}")]
    NotOwner { vault_id: VaultId, caller: Address },

    /// Caller may not mint on this ledger
    #[error("mint not authorized for {caller:?}")]
    MintUnauthorized { caller: Address },

    // ============ Vault Errors ============
    /// Vault id was never assigned
    #[error("vault {vault_id} not found")]
    VaultNotFound { vault_id: VaultId },

    /// Collateral type is not in the allowed set
    #[error("collateral type {collateral_type:?} is not supported")]
    UnsupportedCollateral { collateral_type: CollateralType },

    /// Not enough collateral for the requested withdrawal or debt
    #[error("insufficient collateral: have {available}, need {required}")]
    InsufficientCollateral { available: Amount, required: Amount },

    /// Operation would breach the liquidation ratio
    #[error("vault {vault_id} would become unsafe")]
    Unsafe { vault_id: VaultId },

    /// Liquidation attempted on a solvent vault
    #[error("vault {vault_id} is safe")]
    VaultSafe { vault_id: VaultId },

    /// Repayment exceeds principal plus accrued fee
    #[error("repayment of {offered} exceeds outstanding {owed}")]
    ExcessRepayment { owed: Amount, offered: Amount },

    /// Vault halted after an arithmetic fault, pending governance review
    #[error("vault {vault_id} is halted")]
    VaultHalted { vault_id: VaultId },

    // ============ Amount Errors ============
    /// Zero amount not allowed
    #[error("amount must be greater than 0")]
    ZeroAmount,

    /// Ledger balance too low
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    /// Spender allowance too low
    #[error("insufficient allowance: available {available}, requested {requested}")]
    InsufficientAllowance { available: Amount, requested: Amount },

    /// Requested amount does not fit the ledger's range
    #[error("amount {amount} is out of range")]
    AmountOutOfRange { amount: Amount },

    // ============ Math Errors ============
    /// Overflow, underflow or division by zero. Always fatal.
    #[error("arithmetic fault")]
    ArithmeticFault,

    // ============ Configuration Errors ============
    /// Parameter outside its permitted range
    #[error("invalid parameter {param}: {reason}")]
    InvalidParameter { param: &'static str, reason: &'static str },

    /// Address is invalid (e.g. the zero address)
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    // ============ Oracle Errors ============
    /// No usable price for the collateral type
    #[error("no price available for {collateral_type:?}")]
    PriceUnavailable { collateral_type: CollateralType },

    // ============ Peg Stability Errors ============
    /// Stablecoin not accepted by the PSM
    #[error("stablecoin {coin:?} not accepted")]
    StablecoinNotAccepted { coin: Address },

    /// Swap fee above the configured ceiling
    #[error("fee too high: {fee_bps} bps exceeds {max_bps} bps")]
    FeeTooHigh { fee_bps: Amount, max_bps: Amount },

    // ============ Vesting Errors ============
    /// Caller is not an approved vesting recipient
    #[error("{caller:?} is not a community member")]
    NotCommunityMember { caller: Address },

    /// Month index past the end of the schedule
    #[error("month {month} is beyond the {max}-month vesting period")]
    VestingPeriodExceeded { month: u64, max: u64 },

    /// Month has not elapsed yet
    #[error("month {month} unlocks at {unlocks_at}")]
    MonthNotReached { month: u64, unlocks_at: u64 },

    /// Tranche already claimed
    #[error("month {month} already claimed")]
    MonthAlreadyClaimed { month: u64 },

    /// Token ledger has not been configured
    #[error("token not set")]
    TokenNotSet,
}

impl DmError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. } => "E001_NOT_AUTHORIZED",
            Self::NotOwner { .. } => "E002_NOT_OWNER",
            Self::MintUnauthorized { .. } => "E003_MINT_UNAUTH",
            Self::VaultNotFound { .. } => "E010_VAULT_NOT_FOUND",
            Self::UnsupportedCollateral { .. } => "E011_UNSUPPORTED_COLLATERAL",
            Self::InsufficientCollateral { .. } => "E012_INSUFFICIENT_COLLATERAL",
            Self::Unsafe { .. } => "E013_UNSAFE",
            Self::VaultSafe { .. } => "E014_VAULT_SAFE",
            Self::ExcessRepayment { .. } => "E015_EXCESS_REPAYMENT",
            Self::VaultHalted { .. } => "E016_VAULT_HALTED",
            Self::ZeroAmount => "E020_ZERO_AMOUNT",
            Self::InsufficientBalance { .. } => "E021_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "E022_INSUFFICIENT_ALLOWANCE",
            Self::AmountOutOfRange { .. } => "E023_AMOUNT_OUT_OF_RANGE",
            Self::ArithmeticFault => "E030_ARITHMETIC_FAULT",
            Self::InvalidParameter { .. } => "E040_INVALID_PARAM",
            Self::InvalidAddress { .. } => "E041_INVALID_ADDRESS",
            Self::PriceUnavailable { .. } => "E050_PRICE_UNAVAILABLE",
            Self::StablecoinNotAccepted { .. } => "E060_STABLECOIN_NOT_ACCEPTED",
            Self::FeeTooHigh { .. } => "E061_FEE_TOO_HIGH",
            Self::NotCommunityMember { .. } => "E070_NOT_COMMUNITY_MEMBER",
            Self::VestingPeriodExceeded { .. } => "E071_VESTING_PERIOD_EXCEEDED",
            Self::MonthNotReached { .. } => "E072_MONTH_NOT_REACHED",
            Self::MonthAlreadyClaimed { .. } => "E073_MONTH_CLAIMED",
            Self::TokenNotSet => "E074_TOKEN_NOT_SET",
        }
    }

    /// Returns true for faults that indicate a defect rather than a bad request.
    ///
    /// Fatal errors must halt further processing of the affected vault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ArithmeticFault)
    }

    /// Returns true if the caller can fix the condition and resubmit
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCollateral { .. }
                | Self::InsufficientBalance { .. }
                | Self::InsufficientAllowance { .. }
                | Self::MonthNotReached { .. }
        )
    }
}
