//! DM Common Library
//!
//! Shared types, constants, and utilities for every DM protocol crate.
//!
//! ## Contents
//!
//! - **Types**: addresses, vault ids, 18-decimal amounts, the `Vault` record
//! - **Math**: checked fixed-point arithmetic with 256-bit intermediates
//! - **Errors**: the protocol-wide `DmError` taxonomy
//! - **Events**: typed events and a digest-chained event log
//! - **Ledger / Oracle**: the collaborator traits the vault engine consumes
//! - **Config**: runtime defaults for governance parameters

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod types;

// Re-exports for convenience
pub use config::ProtocolConfig;
pub use errors::{DmError, DmResult};
pub use events::{DmEvent, EventLog, EventType, ParameterKind};
pub use ledger::ValueLedger;
pub use oracle::PriceOracle;
pub use types::*;
