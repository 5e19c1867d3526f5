//! Integration Tests
//!
//! End-to-end scenarios across the registry, fee engine, liquidation engine
//! and parameter store, plus property tests over random operation sequences.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use dm_common::{
        constants::time::SECONDS_PER_YEAR, ledger::ValueLedger, types::CallContext, DmError, EventType,
        ProtocolConfig,
    };

    use crate::test_utils::*;

    // ============================================================================
    // Scenarios
    // ============================================================================

    #[test]
    fn test_mint_up_to_ratio_then_reject() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);

        // 1000 >= 500 * 1.5
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        // 750 * 1.5 = 1125 > 1000
        let result = h.engine.generate_dm(&user_at(0), id, 250 * ONE);
        assert_eq!(
            result,
            Err(DmError::InsufficientCollateral { available: 1_000 * ONE, required: 1_125 * ONE })
        );
        assert_eq!(h.engine.vault(id).unwrap().debt_amount, 500 * ONE);
    }

    #[test]
    fn test_price_drop_liquidation_with_ten_percent_penalty() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        h.feed.update_price(&OPERATOR, ETH, ONE / 2, 10).unwrap();
        assert!(!h.engine.is_safe(id, 10).unwrap());

        let record = h.engine.liquidate_vault(&CallContext::new(OTHER, 10), id).unwrap();
        assert_eq!(record.penalty, 50 * ONE);
        assert_eq!(record.debt_obligation, 550 * ONE);

        let vault = h.engine.vault(id).unwrap();
        assert_eq!(
            (vault.collateral_amount, vault.debt_amount, vault.stability_fee_accrued),
            (0, 0, 0)
        );
        assert_eq!(h.collateral.balance_of(&AUCTION), 1_000 * ONE);
    }

    #[test]
    fn test_ratio_change_visible_to_next_check() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        assert_eq!(
            h.engine.set_liquidation_ratio(&user_at(0), ETH, 250),
            Err(DmError::NotAuthorized { caller: USER })
        );
        assert!(h.engine.is_safe(id, 0).unwrap());

        h.engine.set_liquidation_ratio(&gov_at(0), ETH, 250).unwrap();
        assert!(!h.engine.is_safe(id, 0).unwrap());
        assert!(h.engine.liquidate_vault(&CallContext::new(OTHER, 0), id).is_ok());
    }

    #[test]
    fn test_full_lifecycle_with_fees() {
        let mut h = Harness::new();
        h.engine.set_stability_fee_rate(&gov_at(0), ETH, 5).unwrap();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

        // 0.05% of 500 over a year = 0.25
        h.engine.repay_debt(&user_at(SECONDS_PER_YEAR), id, 0).unwrap();
        assert_eq!(h.engine.vault(id).unwrap().stability_fee_accrued, ONE / 4);

        // Fee is burned like principal, so the owner needs extra DM to close out
        h.mint_dm(&USER, ONE);
        let owed = h.engine.outstanding_debt(id, SECONDS_PER_YEAR).unwrap();
        h.engine.repay_debt(&user_at(SECONDS_PER_YEAR), id, owed).unwrap();
        h.engine
            .withdraw_collateral(&user_at(SECONDS_PER_YEAR), id, 1_000 * ONE)
            .unwrap();

        assert!(h.engine.vault(id).unwrap().is_empty());
        assert_eq!(h.collateral.balance_of(&USER), USER_COLLATERAL);
        assert_eq!(h.dm.balance_of(&USER), ONE - ONE / 4);
        assert_eq!(h.dm.total_supply(), ONE - ONE / 4);
    }

    #[test]
    fn test_rate_change_is_not_retroactive() {
        let mut h = Harness::new();
        h.engine.set_stability_fee_rate(&gov_at(0), ETH, 1_000).unwrap();
        let id = h.open_vault(2_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 1_000 * ONE).unwrap();

        // Deposit at half-year snapshots 10% * 0.5 = 50
        h.engine.add_collateral(&user_at(SECONDS_PER_YEAR / 2), id, ONE).unwrap();
        h.engine
            .set_stability_fee_rate(&gov_at(SECONDS_PER_YEAR / 2), ETH, 0)
            .unwrap();

        assert_eq!(h.engine.outstanding_debt(id, SECONDS_PER_YEAR).unwrap(), 1_050 * ONE);
    }

    #[test]
    fn test_configured_defaults_apply_to_new_collateral() {
        let config = ProtocolConfig::from_json(r#"{ "liquidation_ratio": 200 }"#).unwrap();
        let mut h = Harness::with_config(config);
        let id = h.open_vault(1_000 * ONE);

        assert!(h.engine.generate_dm(&user_at(0), id, 501 * ONE).is_err());
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
    }

    #[test]
    fn test_event_log_records_every_step() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
        h.engine.repay_debt(&user_at(0), id, 100 * ONE).unwrap();
        h.engine.withdraw_collateral(&user_at(0), id, 100 * ONE).unwrap();

        let log = h.engine.events();
        for kind in [
            EventType::VaultCreated,
            EventType::CollateralAdded,
            EventType::DebtGenerated,
            EventType::DebtRepaid,
            EventType::CollateralWithdrawn,
        ] {
            assert_eq!(log.filter_by_type(kind).len(), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_replays_are_bit_identical() {
        let run = || {
            let mut h = Harness::new();
            h.engine.set_stability_fee_rate(&gov_at(0), ETH, 250).unwrap();
            let id = h.open_vault(1_000 * ONE);
            h.engine.generate_dm(&user_at(10), id, 400 * ONE).unwrap();
            h.engine.repay_debt(&user_at(5_000_000), id, 30 * ONE).unwrap();
            h.feed.update_price(&OPERATOR, ETH, ONE / 2, 6_000_000).unwrap();
            h.engine.liquidate_vault(&CallContext::new(OTHER, 6_000_000), id).unwrap();
            h.engine.events().digest()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_failed_operations_leave_no_trace() {
        let mut h = Harness::new();
        let id = h.open_vault(1_000 * ONE);
        h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();
        let before = h.engine.vault(id).unwrap().clone();
        let digest = h.engine.events().digest();

        assert!(h.engine.generate_dm(&user_at(100), id, 1_000 * ONE).is_err());
        assert!(h.engine.withdraw_collateral(&user_at(100), id, 900 * ONE).is_err());
        assert!(h.engine.repay_debt(&user_at(100), id, 10_000 * ONE).is_err());
        assert!(h.engine.liquidate_vault(&CallContext::new(OTHER, 100), id).is_err());
        assert!(h.engine.generate_dm(&user_at(100), id, u128::MAX).is_err());
        assert!(h.engine.add_collateral(&user_at(100), id, u128::MAX).is_err());
        assert!(!h.engine.is_halted(id));

        assert_eq!(h.engine.vault(id).unwrap(), &before);
        assert_eq!(h.engine.events().digest(), digest);
    }

    // ============================================================================
    // Properties
    // ============================================================================

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Add(u128),
        Withdraw(u128),
        Generate(u128),
        Repay(u128),
        Price(u128),
        Liquidate,
        Wait(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u128..2_000).prop_map(|n| Op::Add(n * ONE)),
            (1u128..2_000).prop_map(|n| Op::Withdraw(n * ONE)),
            (1u128..1_000).prop_map(|n| Op::Generate(n * ONE)),
            (0u128..1_000).prop_map(|n| Op::Repay(n * ONE)),
            (1u128..300).prop_map(|pct| Op::Price(pct * ONE / 100)),
            Just(Op::Liquidate),
            (0u64..SECONDS_PER_YEAR).prop_map(Op::Wait),
        ]
    }

    proptest! {
        #[test]
        fn prop_successful_ops_keep_invariants(ops in proptest::collection::vec(op(), 1..40)) {
            let mut h = Harness::new();
            h.engine.set_stability_fee_rate(&gov_at(0), ETH, 500).unwrap();
            h.mint_dm(&USER, 1_000_000 * ONE);
            let id = h.engine.create_vault(&user_at(0), ETH).unwrap();
            let mut now = 0u64;
            let mut price = ONE;

            for op in ops {
                let ctx = user_at(now);
                let result = match op {
                    Op::Add(n) => h.engine.add_collateral(&ctx, id, n),
                    Op::Withdraw(n) => h.engine.withdraw_collateral(&ctx, id, n),
                    Op::Generate(n) => h.engine.generate_dm(&ctx, id, n),
                    Op::Repay(n) => h.engine.repay_debt(&ctx, id, n).map(|_| ()),
                    Op::Price(p) => {
                        price = p;
                        h.feed.update_price(&OPERATOR, ETH, p, now)
                    }
                    Op::Liquidate => h.engine.liquidate_vault(&CallContext::new(OTHER, now), id).map(|_| ()),
                    Op::Wait(dt) => {
                        now += dt;
                        Ok(())
                    }
                };

                let vault = h.engine.vault(id).unwrap().clone();
                prop_assert!(!h.engine.is_halted(id));
                // Custody holds exactly the vault's collateral
                prop_assert_eq!(h.collateral.balance_of(&CUSTODY), vault.collateral_amount);

                if result.is_ok() {
                    match op {
                        Op::Generate(_) | Op::Withdraw(_) => {
                            let total = vault.total_debt().unwrap();
                            prop_assert!(dm_common::math::is_position_safe(
                                vault.collateral_amount, price, total, 150
                            ).unwrap());
                        }
                        Op::Liquidate => prop_assert!(vault.is_empty()),
                        _ => {}
                    }
                }
            }
        }

        #[test]
        fn prop_accrual_idempotent(debt in 0u128..1_000_000_000, rate in 0u128..10_000, t in 0u64..10 * SECONDS_PER_YEAR) {
            let debt = debt * ONE;
            let first = crate::fees::accrue(debt, 0, 0, rate, t).unwrap();
            let second = crate::fees::accrue(debt, first.fee_accrued, first.last_update, rate, t).unwrap();
            prop_assert_eq!(second.added, 0);
            prop_assert_eq!(second.fee_accrued, first.fee_accrued);
        }

        #[test]
        fn prop_partial_fee_repayment_leaves_principal(amount_pct in 1u128..=100) {
            let mut h = Harness::new();
            h.engine.set_stability_fee_rate(&gov_at(0), ETH, 1_000).unwrap();
            let id = h.open_vault(1_000 * ONE);
            h.engine.generate_dm(&user_at(0), id, 500 * ONE).unwrap();

            // Fee after one year is 50
            let amount = 50 * ONE * amount_pct / 100;
            h.engine.repay_debt(&user_at(SECONDS_PER_YEAR), id, amount).unwrap();

            let vault = h.engine.vault(id).unwrap();
            prop_assert_eq!(vault.debt_amount, 500 * ONE);
            prop_assert_eq!(vault.stability_fee_accrued, 50 * ONE - amount);
        }
    }
}
