//! Price Oracle Interface
//!
//! The vault engine only needs a current price per collateral type.
//! Freshness is the feed's responsibility.

use crate::errors::DmResult;
use crate::types::{CollateralType, Price};

/// Source of collateral prices
pub trait PriceOracle {
    /// Current quote-asset price of one unit of `collateral_type` (18 decimals)
    fn price(&self, collateral_type: &CollateralType) -> DmResult<Price>;
}
