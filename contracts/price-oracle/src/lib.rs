//! Price Oracle
//!
//! Collateral price feed for the DM protocol. Uses a trusted operator model:
//! one operator pushes prices, one admin manages the operator and can pause
//! the feed.
//!
//! ## Key Features
//!
//! - **Per-collateral prices**: one 18-decimal quote per collateral type
//! - **Operator updates**: only the operator writes prices
//! - **Kill switch**: an inactive feed answers `PriceUnavailable` for everything

use std::collections::BTreeMap;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use dm_common::{
    constants::precision::BPS,
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    oracle::PriceOracle,
    types::{is_zero_address, Address, CollateralType, Price, Timestamp},
};

/// Moves larger than this are logged as suspicious
pub const LARGE_MOVE_BPS: u128 = 5_000;

// ============ Price Data ============

/// Latest quote for one collateral type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceData {
    /// Quote per unit of collateral (18 decimals)
    pub price: Price,
    /// When the operator pushed it
    pub updated_at: Timestamp,
}

// ============ Price Feed ============

/// Operator-fed price feed
#[derive(Debug, Clone)]
pub struct PriceFeed {
    /// Can change the operator and pause the feed
    admin: Address,
    /// Can push prices
    operator: Address,
    prices: BTreeMap<CollateralType, PriceData>,
    is_active: bool,
    events: EventLog,
}

impl PriceFeed {
    pub fn new(admin: Address, operator: Address) -> Self {
        Self {
            admin,
            operator,
            prices: BTreeMap::new(),
            is_active: true,
            events: EventLog::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Latest quote regardless of feed status, for display
    pub fn price_data(&self, collateral_type: &CollateralType) -> Option<PriceData> {
        self.prices.get(collateral_type).copied()
    }

    /// Push a new price
    pub fn update_price(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        new_price: Price,
        now: Timestamp,
    ) -> DmResult<()> {
        // 1. Only operator can update price
        if *caller != self.operator {
            return Err(DmError::NotAuthorized { caller: *caller });
        }

        // 2. Price must be positive
        if new_price == 0 {
            return Err(DmError::InvalidParameter {
                param: "price",
                reason: "must be positive",
            });
        }

        let old_price = self.prices.get(&collateral_type).map(|p| p.price);
        if let Some(old) = old_price {
            let deviation = price_deviation_bps(old, new_price);
            if deviation > LARGE_MOVE_BPS {
                tracing::warn!(old, new = new_price, deviation, "large price move");
            }
        }

        self.prices.insert(
            collateral_type,
            PriceData {
                price: new_price,
                updated_at: now,
            },
        );
        self.events.emit(DmEvent::PriceUpdated {
            collateral_type,
            old_price,
            new_price,
            timestamp: now,
        });
        Ok(())
    }

    /// Hand price updates to a new operator (admin only)
    pub fn set_operator(&mut self, caller: &Address, new_operator: Address, now: Timestamp) -> DmResult<()> {
        if *caller != self.admin {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        if is_zero_address(&new_operator) {
            return Err(DmError::InvalidAddress {
                reason: "operator cannot be zero address",
            });
        }

        let old = self.operator;
        self.operator = new_operator;
        self.events.emit(DmEvent::ParameterChanged {
            parameter: ParameterKind::PriceOperator,
            subject: Some(old),
            old_value: 0,
            new_value: 0,
            timestamp: now,
        });
        Ok(())
    }

    /// Pause or resume the feed (admin only)
    pub fn set_active(&mut self, caller: &Address, active: bool) -> DmResult<()> {
        if *caller != self.admin {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        if self.is_active != active {
            tracing::info!(active, "price feed status changed");
        }
        self.is_active = active;
        Ok(())
    }
}

impl PriceOracle for PriceFeed {
    fn price(&self, collateral_type: &CollateralType) -> DmResult<Price> {
        if !self.is_active {
            return Err(DmError::PriceUnavailable {
                collateral_type: *collateral_type,
            });
        }
        self.prices
            .get(collateral_type)
            .map(|p| p.price)
            .ok_or(DmError::PriceUnavailable {
                collateral_type: *collateral_type,
            })
    }
}

// ============ Shared Feed ============

/// Cloneable handle so the operator can keep pushing prices while the
/// engine reads them
#[derive(Debug, Clone)]
pub struct SharedPriceFeed {
    inner: Arc<RwLock<PriceFeed>>,
}

impl SharedPriceFeed {
    pub fn new(feed: PriceFeed) -> Self {
        Self {
            inner: Arc::new(RwLock::new(feed)),
        }
    }

    pub fn update_price(
        &self,
        caller: &Address,
        collateral_type: CollateralType,
        new_price: Price,
        now: Timestamp,
    ) -> DmResult<()> {
        self.inner.write().update_price(caller, collateral_type, new_price, now)
    }

    pub fn set_active(&self, caller: &Address, active: bool) -> DmResult<()> {
        self.inner.write().set_active(caller, active)
    }

    pub fn price_data(&self, collateral_type: &CollateralType) -> Option<PriceData> {
        self.inner.read().price_data(collateral_type)
    }
}

impl PriceOracle for SharedPriceFeed {
    fn price(&self, collateral_type: &CollateralType) -> DmResult<Price> {
        self.inner.read().price(collateral_type)
    }
}

// ============ Helper Functions ============

/// Relative move between two prices in basis points
fn price_deviation_bps(old_price: Price, new_price: Price) -> u128 {
    if old_price == 0 {
        return BPS;
    }
    let diff = old_price.abs_diff(new_price);
    // diff <= max(old, new); saturate instead of overflowing on absurd prices
    diff.saturating_mul(BPS) / old_price
}

// ============ Tests ============
