//! Peg Stability Module
//!
//! Swaps accepted stablecoins for DM at par. Deposits are free; withdrawals
//! pay a basis-point fee to the treasury. Stablecoins taken in stay in the
//! module's reserve account and back the DM minted against them.
//!
//! ## Swap Rules
//!
//! - Deposit `amount` stablecoin, receive `amount` DM
//! - Return `amount` DM, receive `amount - fee` stablecoin; `fee` goes to treasury
//! - Stablecoins are assumed to share DM's 18-decimal precision
//!
//! The reserve account must be a DM minter and is the spender for both the
//! stablecoin pull on deposit and the DM burn on withdrawal.

use std::collections::{BTreeMap, BTreeSet};

use dm_common::{
    config::ProtocolConfig,
    constants::psm::MAX_SWAP_FEE_CEILING_BPS,
    errors::{DmError, DmResult},
    events::{DmEvent, EventLog, ParameterKind},
    ledger::{ensure_balance, ensure_spendable, ValueLedger},
    math::{apply_bps, checked_add},
    types::{is_zero_address, Address, Amount, CallContext},
};

/// Stablecoin to DM swap facility
pub struct PegStabilityModule<L: ValueLedger> {
    owner: Address,
    /// Holds stablecoin reserves; minter and spender on the DM ledger
    reserve: Address,
    treasury: Address,
    /// Current withdrawal fee
    swap_fee_bps: u128,
    /// Ceiling fixed at construction
    max_swap_fee_bps: u128,
    dm: L,
    /// Every stablecoin ledger ever added, accepted or not
    stablecoins: BTreeMap<Address, L>,
    accepted: BTreeSet<Address>,
    events: EventLog,
}

impl<L: ValueLedger> PegStabilityModule<L> {
    /// Creates a module with the default swap fee.
    ///
    /// # Errors
    /// - `InvalidAddress` for a zero owner, reserve, treasury or DM token
    /// - `InvalidParameter` if `max_swap_fee_bps` exceeds 100%
    /// - `FeeTooHigh` if the default fee is above `max_swap_fee_bps`
    pub fn new(owner: Address, reserve: Address, treasury: Address, dm: L, max_swap_fee_bps: u128) -> DmResult<Self> {
        Self::with_config(owner, reserve, treasury, dm, max_swap_fee_bps, &ProtocolConfig::default())
    }

    /// Creates a module whose initial fee comes from `config`
    pub fn with_config(
        owner: Address,
        reserve: Address,
        treasury: Address,
        dm: L,
        max_swap_fee_bps: u128,
        config: &ProtocolConfig,
    ) -> DmResult<Self> {
        if is_zero_address(&dm.token_id()) {
            return Err(DmError::InvalidAddress {
                reason: "invalid DM token address",
            });
        }
        if is_zero_address(&treasury) {
            return Err(DmError::InvalidAddress {
                reason: "invalid treasury address",
            });
        }
        if is_zero_address(&owner) || is_zero_address(&reserve) {
            return Err(DmError::InvalidAddress {
                reason: "owner and reserve must be set",
            });
        }
        if max_swap_fee_bps > MAX_SWAP_FEE_CEILING_BPS {
            return Err(DmError::InvalidParameter {
                param: "max_swap_fee",
                reason: "above 100%",
            });
        }
        if config.psm_swap_fee_bps > max_swap_fee_bps {
            return Err(DmError::FeeTooHigh {
                fee_bps: config.psm_swap_fee_bps,
                max_bps: max_swap_fee_bps,
            });
        }

        Ok(Self {
            owner,
            reserve,
            treasury,
            swap_fee_bps: config.psm_swap_fee_bps,
            max_swap_fee_bps,
            dm,
            stablecoins: BTreeMap::new(),
            accepted: BTreeSet::new(),
            events: EventLog::new(),
        })
    }

    // ============ Queries ============

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn reserve_account(&self) -> Address {
        self.reserve
    }

    pub fn treasury(&self) -> Address {
        self.treasury
    }

    pub fn swap_fee(&self) -> u128 {
        self.swap_fee_bps
    }

    pub fn max_swap_fee(&self) -> u128 {
        self.max_swap_fee_bps
    }

    pub fn is_accepted(&self, coin: &Address) -> bool {
        self.accepted.contains(coin)
    }

    /// Reserve held in `coin`, zero for unknown coins
    pub fn reserves(&self, coin: &Address) -> Amount {
        self.stablecoins
            .get(coin)
            .map(|ledger| ledger.balance_of(&self.reserve))
            .unwrap_or(0)
    }

    pub fn dm_ledger(&self) -> &L {
        &self.dm
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Administration ============

    /// Accept a stablecoin. A coin added before keeps its original ledger.
    pub fn add_accepted_stablecoin(&mut self, ctx: &CallContext, ledger: L) -> DmResult<Address> {
        self.ensure_owner(&ctx.caller)?;
        let coin = ledger.token_id();
        if is_zero_address(&coin) {
            return Err(DmError::InvalidAddress {
                reason: "invalid stablecoin address",
            });
        }

        self.stablecoins.entry(coin).or_insert(ledger);
        let newly = self.accepted.insert(coin);
        if newly {
            self.emit_change(ParameterKind::AcceptedStablecoin, Some(coin), 0, 1, ctx);
        }
        Ok(coin)
    }

    /// Stop swaps in `coin`; its reserves stay put and remain rescuable
    pub fn remove_accepted_stablecoin(&mut self, ctx: &CallContext, coin: &Address) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if self.accepted.remove(coin) {
            self.emit_change(ParameterKind::AcceptedStablecoin, Some(*coin), 1, 0, ctx);
        }
        Ok(())
    }

    pub fn set_swap_fee(&mut self, ctx: &CallContext, fee_bps: u128) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if fee_bps > self.max_swap_fee_bps {
            return Err(DmError::FeeTooHigh {
                fee_bps,
                max_bps: self.max_swap_fee_bps,
            });
        }
        let old = std::mem::replace(&mut self.swap_fee_bps, fee_bps);
        self.emit_change(ParameterKind::SwapFee, None, old, fee_bps, ctx);
        Ok(())
    }

    pub fn set_treasury(&mut self, ctx: &CallContext, treasury: Address) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if is_zero_address(&treasury) {
            return Err(DmError::InvalidAddress {
                reason: "invalid treasury address",
            });
        }
        self.treasury = treasury;
        self.emit_change(ParameterKind::Treasury, Some(treasury), 0, 0, ctx);
        Ok(())
    }

    /// Send `amount` of a known coin from the reserve to `to`
    pub fn rescue_tokens(&mut self, ctx: &CallContext, coin: &Address, to: &Address, amount: Amount) -> DmResult<()> {
        self.ensure_owner(&ctx.caller)?;
        if is_zero_address(to) {
            return Err(DmError::InvalidAddress {
                reason: "invalid recipient",
            });
        }
        let reserve = self.reserve;
        self.ledger_mut(coin)?.transfer(&reserve, to, amount)?;
        tracing::info!(amount, "reserve tokens rescued");
        Ok(())
    }

    // ============ Swaps ============

    /// Swap `amount` of `coin` for the same amount of DM
    pub fn deposit_stablecoin(&mut self, ctx: &CallContext, coin: &Address, amount: Amount) -> DmResult<()> {
        // 1. Stablecoin must be accepted
        self.ensure_accepted(coin)?;

        // 2. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 3. Pull the stablecoin into the reserve
        let reserve = self.reserve;
        self.ledger_mut(coin)?
            .transfer_from(&reserve, &ctx.caller, &reserve, amount)?;

        // 4. Mint DM; hand the stablecoin back if that fails
        if let Err(err) = self.dm.mint(&reserve, &ctx.caller, amount) {
            self.ledger_mut(coin)?.transfer(&reserve, &ctx.caller, amount)?;
            return Err(err);
        }

        self.events.emit(DmEvent::StablecoinDeposited {
            user: ctx.caller,
            coin: *coin,
            amount,
            dm_minted: amount,
            timestamp: ctx.now,
        });
        tracing::debug!(amount, "stablecoin deposited");
        Ok(())
    }

    /// Swap `amount` DM back for `amount - fee` of `coin`
    pub fn withdraw_stablecoin(&mut self, ctx: &CallContext, coin: &Address, amount: Amount) -> DmResult<()> {
        // 1. Stablecoin must be accepted
        self.ensure_accepted(coin)?;

        // 2. Amount must be positive
        if amount == 0 {
            return Err(DmError::ZeroAmount);
        }

        // 3. Split off the fee
        let fee = apply_bps(amount, self.swap_fee_bps)?;
        let amount_out = amount - fee;

        // 4. Caller must hold and have approved the DM; reserve must cover the payout
        let reserve = self.reserve;
        let treasury = self.treasury;
        ensure_spendable(&self.dm, &reserve, &ctx.caller, amount)?;
        let ledger = self.ledger_mut(coin)?;
        ensure_balance(ledger, &reserve, amount)?;
        checked_add(ledger.balance_of(&ctx.caller), amount_out)?;
        checked_add(ledger.balance_of(&treasury), fee)?;

        // 5. Burn DM, then pay out; re-mint the DM if a payout fails
        self.dm.burn_from(&reserve, &ctx.caller, amount)?;
        if let Err(err) = self.pay_out(coin, &ctx.caller, amount_out, &treasury, fee) {
            tracing::error!(code = err.code(), "stablecoin payout failed, restoring DM");
            self.dm.mint(&reserve, &ctx.caller, amount)?;
            return Err(err);
        }

        self.events.emit(DmEvent::StablecoinWithdrawn {
            user: ctx.caller,
            coin: *coin,
            dm_burned: amount,
            amount_out,
            fee,
            timestamp: ctx.now,
        });
        tracing::debug!(amount, fee, "stablecoin withdrawn");
        Ok(())
    }

    // ============ Internals ============

    fn pay_out(&mut self, coin: &Address, user: &Address, amount_out: Amount, treasury: &Address, fee: Amount) -> DmResult<()> {
        let reserve = self.reserve;
        let ledger = self.ledger_mut(coin)?;
        if fee > 0 {
            ledger.transfer(&reserve, treasury, fee)?;
        }
        if amount_out > 0 {
            ledger.transfer(&reserve, user, amount_out)?;
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> DmResult<()> {
        if *caller != self.owner {
            return Err(DmError::NotAuthorized { caller: *caller });
        }
        Ok(())
    }

    fn ensure_accepted(&self, coin: &Address) -> DmResult<()> {
        if !self.accepted.contains(coin) {
            return Err(DmError::StablecoinNotAccepted { coin: *coin });
        }
        Ok(())
    }

    fn ledger_mut(&mut self, coin: &Address) -> DmResult<&mut L> {
        self.stablecoins
            .get_mut(coin)
            .ok_or(DmError::StablecoinNotAccepted { coin: *coin })
    }

    fn emit_change(&mut self, parameter: ParameterKind, subject: Option<Address>, old_value: u128, new_value: u128, ctx: &CallContext) {
        self.events.emit(DmEvent::ParameterChanged {
            parameter,
            subject,
            old_value,
            new_value,
            timestamp: ctx.now,
        });
    }
}

// ============ Tests ============
