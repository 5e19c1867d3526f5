//! Protocol Constants
//!
//! Fixed-point scales, token metadata and the default risk parameters new
//! collateral types start from. Runtime overrides live in
//! [`crate::config::ProtocolConfig`].

/// Synthetic asset (DM) metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "DM Stablecoin";
    /// Token symbol
    pub const SYMBOL: &str = "DM";
    /// Decimal places (matches the reference ledger precision)
    pub const DECIMALS: u8 = 18;
    /// One whole token in base units (1 DM = 1e18)
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Fixed-point precision
pub mod precision {
    /// 18-decimal fixed point unit used for amounts, prices and rates
    pub const WAD: u128 = 1_000_000_000_000_000_000;

    /// Percentage precision (100 = 100%)
    pub const PERCENT: u128 = 100;

    /// Basis points denominator (10_000 = 100%)
    pub const BPS: u128 = 10_000;
}

/// Time-related constants (seconds)
pub mod time {
    /// One day
    pub const DAY: u64 = 86_400;

    /// Accrual year used by the stability fee and savings rate
    pub const SECONDS_PER_YEAR: u64 = 365 * DAY;
}

/// Default per-collateral risk parameters
pub mod risk {
    use super::time::DAY;

    /// Liquidation ratio in percent (150 = 150%)
    pub const DEFAULT_LIQUIDATION_RATIO: u128 = 150;

    /// Lowest liquidation ratio governance may configure (100%)
    pub const MIN_LIQUIDATION_RATIO: u128 = 100;

    /// Stability fee in basis points per year
    pub const DEFAULT_STABILITY_FEE_BPS: u128 = 0;

    /// Highest stability fee governance may configure (100% APR)
    pub const MAX_STABILITY_FEE_BPS: u128 = 10_000;

    /// Liquidation penalty in basis points of the outstanding debt (10%)
    pub const DEFAULT_LIQUIDATION_PENALTY_BPS: u128 = 1_000;

    /// Highest liquidation penalty governance may configure (100%)
    pub const MAX_LIQUIDATION_PENALTY_BPS: u128 = 10_000;

    /// Auction duration handed to the auction collaborator
    pub const DEFAULT_AUCTION_DURATION: u64 = DAY;
}

/// Peg Stability Module defaults
pub mod psm {
    /// Fee charged when swapping DM back to a stablecoin (0.1%)
    pub const DEFAULT_SWAP_FEE_BPS: u128 = 10;

    /// Cap on the swap fee ceiling itself (100%)
    pub const MAX_SWAP_FEE_CEILING_BPS: u128 = 10_000;
}

/// DD governance token and its xDD voting share
pub mod governance_token {
    use super::token::ONE;

    /// Fixed DD supply, minted once at construction (1B DD)
    pub const DD_TOTAL_SUPPLY: u128 = 1_000_000_000 * ONE;

    /// Percent of the DD supply per allocation
    pub const DEVELOPMENT_PERCENT: u8 = 30;
    pub const BUSINESSES_PERCENT: u8 = 20;
    pub const COMMUNITY_PERCENT: u8 = 25;
    pub const VESTING_PERCENT: u8 = 20;
    pub const AIRDROP_PERCENT: u8 = 5;
}

/// Vesting schedule
pub mod vesting {
    use super::time::DAY;
    use super::token::ONE;

    /// Tokens locked in the vesting schedule (20% of the 1B DD supply)
    pub const TOTAL_ALLOCATION: u128 = 200_000_000 * ONE;

    /// Number of monthly tranches (5 years)
    pub const VESTING_MONTHS: u64 = 60;

    /// Length of one vesting month
    pub const MONTH: u64 = 30 * DAY;
}
