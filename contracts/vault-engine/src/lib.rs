//! DM Vault Engine
//!
//! The collateralized debt core of the DM protocol: users lock collateral,
//! mint DM against it, pay a stability fee and are liquidated when the
//! oracle price says their position no longer covers its debt.
//!
//! ## Modules
//!
//! - **registry**: vault storage and the owner-facing operations
//! - **fees**: principal-only simple-interest stability fee
//! - **liquidation**: solvency check and collateral handoff to the auction
//! - **params**: governance-controlled risk parameters
//! - **shared**: thread-safe handle serializing every call

pub mod fees;
pub mod liquidation;
pub mod params;
pub mod registry;
pub mod shared;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_utils;

pub use liquidation::LiquidationRecord;
pub use params::{CollateralParams, ParameterStore};
pub use registry::{Repayment, VaultEngine};
pub use shared::SharedVaultEngine;
