//! Governance Parameter Store
//!
//! Per-collateral risk parameters plus the auction address, owned by the
//! vault engine and mutated only by the single governance principal.
//!
//! Every setter validates its input, records the change and hands back the
//! `ParameterChanged` event for the engine's log.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use dm_common::{
    config::{
        validate_auction_duration, validate_liquidation_penalty, validate_liquidation_ratio,
        validate_stability_fee,
    },
    errors::{DmError, DmResult},
    events::{DmEvent, ParameterKind},
    types::{is_zero_address, Address, CollateralType, Timestamp},
    ProtocolConfig,
};

/// Risk parameters of one collateral type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollateralParams {
    /// New vaults, deposits and debt are accepted only while allowed
    pub allowed: bool,
    /// Minimum collateral value over debt, in percent (150 = 150%)
    pub liquidation_ratio: u128,
    /// Yearly simple-interest fee on principal, in basis points
    pub stability_fee_rate_bps: u128,
    /// Extra obligation charged on liquidation, in basis points
    pub liquidation_penalty_bps: u128,
    /// Auction window handed to the auction collaborator, in seconds
    pub auction_duration: u64,
}

impl CollateralParams {
    fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            allowed: true,
            liquidation_ratio: config.liquidation_ratio,
            stability_fee_rate_bps: config.stability_fee_bps,
            liquidation_penalty_bps: config.liquidation_penalty_bps,
            auction_duration: config.auction_duration,
        }
    }
}

/// Governance-controlled configuration injected into the vault engine
#[derive(Debug, Clone)]
pub struct ParameterStore {
    governance: Address,
    auction_contract: Address,
    defaults: ProtocolConfig,
    collateral: BTreeMap<CollateralType, CollateralParams>,
}

impl ParameterStore {
    pub fn new(governance: Address, auction_contract: Address, defaults: ProtocolConfig) -> DmResult<Self> {
        if is_zero_address(&governance) {
            return Err(DmError::InvalidAddress {
                reason: "governance cannot be zero address",
            });
        }
        if is_zero_address(&auction_contract) {
            return Err(DmError::InvalidAddress {
                reason: "auction contract cannot be zero address",
            });
        }
        defaults.validate()?;

        Ok(Self {
            governance,
            auction_contract,
            defaults,
            collateral: BTreeMap::new(),
        })
    }

    // ============ Queries ============

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn auction_contract(&self) -> Address {
        self.auction_contract
    }

    pub fn defaults(&self) -> &ProtocolConfig {
        &self.defaults
    }

    pub fn params(&self, collateral_type: &CollateralType) -> Option<&CollateralParams> {
        self.collateral.get(collateral_type)
    }

    /// Parameters of a registered type, allowed or not
    pub fn require(&self, collateral_type: &CollateralType) -> DmResult<&CollateralParams> {
        self.collateral
            .get(collateral_type)
            .ok_or(DmError::UnsupportedCollateral {
                collateral_type: *collateral_type,
            })
    }

    /// Parameters of a type that currently accepts new positions
    pub fn require_allowed(&self, collateral_type: &CollateralType) -> DmResult<&CollateralParams> {
        let params = self.require(collateral_type)?;
        if !params.allowed {
            return Err(DmError::UnsupportedCollateral {
                collateral_type: *collateral_type,
            });
        }
        Ok(params)
    }

    pub fn is_allowed(&self, collateral_type: &CollateralType) -> bool {
        self.collateral
            .get(collateral_type)
            .map(|p| p.allowed)
            .unwrap_or(false)
    }

    pub fn collateral_types(&self) -> impl Iterator<Item = &CollateralType> {
        self.collateral.keys()
    }

    // ============ Setters ============

    pub(crate) fn ensure_governance(&self, caller: &Address) -> DmResult<()> {
        if *caller != self.governance {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        Ok(())
    }

    /// Register a new collateral type with the protocol defaults, allowed
    pub(crate) fn register(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        if self.collateral.contains_key(&collateral_type) {
            return Err(DmError::InvalidParameter {
                param: "collateral_type",
                reason: "already registered",
            });
        }
        self.collateral
            .insert(collateral_type, CollateralParams::from_config(&self.defaults));
        Ok(changed(ParameterKind::AllowedCollateral, Some(collateral_type), 0, 1, now))
    }

    pub fn set_allowed_collateral_token(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        allowed: bool,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        let params = self.entry(&collateral_type)?;
        let old = params.allowed;
        params.allowed = allowed;
        Ok(changed(
            ParameterKind::AllowedCollateral,
            Some(collateral_type),
            old as u128,
            allowed as u128,
            now,
        ))
    }

    pub fn set_liquidation_ratio(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        ratio: u128,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        validate_liquidation_ratio(ratio)?;
        let params = self.entry(&collateral_type)?;
        let old = std::mem::replace(&mut params.liquidation_ratio, ratio);
        Ok(changed(ParameterKind::LiquidationRatio, Some(collateral_type), old, ratio, now))
    }

    /// Takes effect from the next accrual; elapsed time already snapshotted
    /// keeps the old rate
    pub fn set_stability_fee_rate(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        rate_bps: u128,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        validate_stability_fee(rate_bps)?;
        let params = self.entry(&collateral_type)?;
        let old = std::mem::replace(&mut params.stability_fee_rate_bps, rate_bps);
        Ok(changed(ParameterKind::StabilityFeeRate, Some(collateral_type), old, rate_bps, now))
    }

    pub fn set_liquidation_penalty(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        penalty_bps: u128,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        validate_liquidation_penalty(penalty_bps)?;
        let params = self.entry(&collateral_type)?;
        let old = std::mem::replace(&mut params.liquidation_penalty_bps, penalty_bps);
        Ok(changed(ParameterKind::LiquidationPenalty, Some(collateral_type), old, penalty_bps, now))
    }

    pub fn set_auction_duration(
        &mut self,
        caller: &Address,
        collateral_type: CollateralType,
        duration: u64,
        now: Timestamp,
    ) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        validate_auction_duration(duration)?;
        let params = self.entry(&collateral_type)?;
        let old = std::mem::replace(&mut params.auction_duration, duration);
        Ok(changed(
            ParameterKind::AuctionDuration,
            Some(collateral_type),
            old as u128,
            duration as u128,
            now,
        ))
    }

    /// The event's subject is the new auction address
    pub fn set_auction_contract(&mut self, caller: &Address, auction: Address, now: Timestamp) -> DmResult<DmEvent> {
        self.ensure_governance(caller)?;
        if is_zero_address(&auction) {
            return Err(DmError::InvalidAddress {
                reason: "auction contract cannot be zero address",
            });
        }
        self.auction_contract = auction;
        Ok(changed(ParameterKind::AuctionContract, Some(auction), 0, 0, now))
    }

    fn entry(&mut self, collateral_type: &CollateralType) -> DmResult<&mut CollateralParams> {
        self.collateral
            .get_mut(collateral_type)
            .ok_or(DmError::UnsupportedCollateral {
                collateral_type: *collateral_type,
            })
    }
}

fn changed(
    parameter: ParameterKind,
    subject: Option<Address>,
    old_value: u128,
    new_value: u128,
    timestamp: Timestamp,
) -> DmEvent {
    DmEvent::ParameterChanged {
        parameter,
        subject,
        old_value,
        new_value,
        timestamp,
    }
}
