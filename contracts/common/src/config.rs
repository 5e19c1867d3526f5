//! Protocol Configuration
//!
//! Runtime defaults applied when governance allows a new collateral type.
//! Loaded from JSON by the host or taken from [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{psm, risk};
use crate::errors::{DmError, DmResult};

/// Defaults injected into the parameter store at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Liquidation ratio in percent for newly allowed collateral
    pub liquidation_ratio: u128,
    /// Stability fee in basis points per year for newly allowed collateral
    pub stability_fee_bps: u128,
    /// Liquidation penalty in basis points for newly allowed collateral
    pub liquidation_penalty_bps: u128,
    /// Auction duration in seconds for newly allowed collateral
    pub auction_duration: u64,
    /// Initial PSM swap fee in basis points
    pub psm_swap_fee_bps: u128,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            liquidation_ratio: risk::DEFAULT_LIQUIDATION_RATIO,
            stability_fee_bps: risk::DEFAULT_STABILITY_FEE_BPS,
            liquidation_penalty_bps: risk::DEFAULT_LIQUIDATION_PENALTY_BPS,
            auction_duration: risk::DEFAULT_AUCTION_DURATION,
            psm_swap_fee_bps: psm::DEFAULT_SWAP_FEE_BPS,
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> DmResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|err| {
            tracing::warn!(%err, "rejecting malformed protocol config");
            DmError::InvalidParameter {
                param: "config",
                reason: "malformed JSON",
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against the bounds governance setters enforce
    pub fn validate(&self) -> DmResult<()> {
        validate_liquidation_ratio(self.liquidation_ratio)?;
        validate_stability_fee(self.stability_fee_bps)?;
        validate_liquidation_penalty(self.liquidation_penalty_bps)?;
        validate_auction_duration(self.auction_duration)?;
        if self.psm_swap_fee_bps > psm::MAX_SWAP_FEE_CEILING_BPS {
            return Err(DmError::InvalidParameter {
                param: "psm_swap_fee_bps",
                reason: "above 100%",
            });
        }
        Ok(())
    }
}

/// Liquidation ratio must be at least 100%
pub fn validate_liquidation_ratio(ratio: u128) -> DmResult<()> {
    if ratio < risk::MIN_LIQUIDATION_RATIO {
        return Err(DmError::InvalidParameter {
            param: "liquidation_ratio",
            reason: "below 100%",
        });
    }
    Ok(())
}

/// Stability fee must not exceed 100% per year
pub fn validate_stability_fee(rate_bps: u128) -> DmResult<()> {
    if rate_bps > risk::MAX_STABILITY_FEE_BPS {
        return Err(DmError::InvalidParameter {
            param: "stability_fee_rate",
            reason: "above 100% per year",
        });
    }
    Ok(())
}

/// Liquidation penalty must not exceed 100%
pub fn validate_liquidation_penalty(penalty_bps: u128) -> DmResult<()> {
    if penalty_bps > risk::MAX_LIQUIDATION_PENALTY_BPS {
        return Err(DmError::InvalidParameter {
            param: "liquidation_penalty",
            reason: "above 100%",
        });
    }
    Ok(())
}

/// Auctions need a non-empty window
pub fn validate_auction_duration(duration: u64) -> DmResult<()> {
    if duration == 0 {
        return Err(DmError::InvalidParameter {
            param: "auction_duration",
            reason: "must be positive",
        });
    }
    Ok(())
}
