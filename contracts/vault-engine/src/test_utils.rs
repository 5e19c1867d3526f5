//! Shared fixture for engine tests: one DM ledger, one collateral type at
//! price 1.0 and a user holding collateral with both allowances granted.

use dm_common::{
    constants::token,
    ledger::ValueLedger,
    types::{Address, Amount, CallContext, CollateralType, VaultId},
    ProtocolConfig,
};
use dm_price_oracle::{PriceFeed, SharedPriceFeed};
use dm_token::{SharedLedger, TokenLedger};

use crate::params::ParameterStore;
use crate::registry::VaultEngine;

pub const ONE: Amount = token::ONE;

pub const ADMIN: Address = [1u8; 32];
pub const GOV: Address = [2u8; 32];
pub const OPERATOR: Address = [3u8; 32];
pub const AUCTION: Address = [4u8; 32];
pub const CUSTODY: Address = [5u8; 32];
pub const USER: Address = [6u8; 32];
pub const OTHER: Address = [7u8; 32];

pub const DM_TOKEN: Address = [20u8; 32];
pub const ETH: CollateralType = [21u8; 32];

pub const USER_COLLATERAL: Amount = 10_000 * ONE;

pub type Ledger = SharedLedger<TokenLedger>;
pub type Engine = VaultEngine<Ledger, SharedPriceFeed>;

pub fn user_at(now: u64) -> CallContext {
    CallContext::new(USER, now)
}

pub fn gov_at(now: u64) -> CallContext {
    CallContext::new(GOV, now)
}

pub struct Harness {
    pub engine: Engine,
    pub dm: Ledger,
    pub collateral: Ledger,
    pub feed: SharedPriceFeed,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        let mut dm = SharedLedger::new(TokenLedger::dm(DM_TOKEN, ADMIN));
        dm.with(|l| l.set_minter(&CallContext::new(ADMIN, 0), &CUSTODY, true)).unwrap();
        dm.approve(&USER, &CUSTODY, Amount::MAX).unwrap();

        let mut collateral = SharedLedger::new(TokenLedger::with_symbol(ETH, "ETH", ADMIN));
        collateral.mint(&ADMIN, &USER, USER_COLLATERAL).unwrap();
        collateral.approve(&USER, &CUSTODY, Amount::MAX).unwrap();

        let feed = SharedPriceFeed::new(PriceFeed::new(ADMIN, OPERATOR));
        feed.update_price(&OPERATOR, ETH, ONE, 0).unwrap();

        let params = ParameterStore::new(GOV, AUCTION, config).unwrap();
        let mut engine = VaultEngine::new(dm.clone(), feed.clone(), params, CUSTODY).unwrap();
        engine.add_collateral_type(&gov_at(0), collateral.clone()).unwrap();

        Self {
            engine,
            dm,
            collateral,
            feed,
        }
    }

    /// Create a vault for USER at t=0 and deposit `collateral`
    pub fn open_vault(&mut self, collateral: Amount) -> VaultId {
        let id = self.engine.create_vault(&user_at(0), ETH).unwrap();
        self.engine.add_collateral(&user_at(0), id, collateral).unwrap();
        id
    }

    pub fn mint_dm(&mut self, to: &Address, amount: Amount) {
        self.dm.mint(&ADMIN, to, amount).unwrap();
    }

    pub fn mint_collateral(&mut self, to: &Address, amount: Amount) {
        self.collateral.mint(&ADMIN, to, amount).unwrap();
    }
}
