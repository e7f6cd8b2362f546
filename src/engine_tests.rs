//! End-to-end engine tests

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, ManualClock};
    use crate::config::EngineConfig;
    use crate::engine::TradeEngine;
    use crate::error::{EngineError, ErrorKind};
    use crate::ledger::{Ledger, MemoryLedger};
    use crate::pricing::PriceModel;
    use crate::risk::RiskBreach;
    use crate::types::{Market, MarketStatus, PositionStatus};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    fn engine_with(
        balances: &[(&str, Decimal)],
    ) -> (Arc<TradeEngine>, Arc<ManualClock>, Arc<MemoryLedger>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ledger = Arc::new(MemoryLedger::new());
        for (user, balance) in balances {
            ledger.deposit(user, *balance);
        }
        let engine = TradeEngine::new(
            EngineConfig::default(),
            clock.clone() as Arc<dyn Clock>,
            ledger.clone() as Arc<dyn Ledger>,
        );
        (Arc::new(engine), clock, ledger)
    }

    async fn binary_market(engine: &TradeEngine) -> Market {
        engine
            .create_market("test question", "test", &["Yes", "No"], None, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn trade_updates_market_model_and_ledger() {
        let (engine, _clock, ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        let receipt = engine
            .place_trade("alice", market.id, yes, dec!(100))
            .await
            .unwrap();

        // priced at the pre-trade 50% quote with the default 1% fee
        assert_eq!(receipt.position.odds_at_prediction, 50);
        assert_eq!(receipt.breakdown.win_profit, dec!(49.5));
        assert_eq!(receipt.breakdown.win_return, dec!(149.5));
        assert_eq!(receipt.breakdown.loss_refund, dec!(50));
        assert!(receipt.warnings.is_empty());

        let market = engine.market(market.id).await.unwrap();
        assert_eq!(market.total_volume, dec!(100));
        assert_eq!(market.outcomes[0].total_stake, dec!(100));
        // a $100 stake at b=100 moves the quote up, the complement down
        assert_eq!(market.outcomes[0].probability, 62);
        assert_eq!(market.outcomes[1].probability, 38);
        assert_eq!(
            market.outcomes.iter().map(|o| u32::from(o.probability)).sum::<u32>(),
            100
        );

        // display-only stake-ratio view: all volume sits on the backed outcome
        assert_eq!(market.stake_share(yes), Some(dec!(100)));

        assert_eq!(ledger.balance("alice").await.unwrap(), dec!(9900));
    }

    #[tokio::test]
    async fn validation_failures_mutate_nothing() {
        let (engine, _clock, ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        let err = engine
            .place_trade("alice", market.id, Uuid::new_v4(), dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OutcomeNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = engine
            .place_trade("alice", market.id, yes, dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStake(_)));

        let err = engine
            .place_trade("alice", Uuid::new_v4(), yes, dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MarketNotFound(_)));

        let fresh = engine.market(market.id).await.unwrap();
        assert_eq!(fresh.total_volume, Decimal::ZERO);
        assert_eq!(ledger.balance("alice").await.unwrap(), dec!(10000));
    }

    #[tokio::test]
    async fn closed_market_rejects_trades() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        engine.close_market(market.id).await.unwrap();
        let err = engine
            .place_trade("alice", market.id, yes, dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MarketInactive(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn closed_market_still_settles() {
        let (engine, _clock, ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        engine
            .place_trade("alice", market.id, yes, dec!(100))
            .await
            .unwrap();
        engine.close_market(market.id).await.unwrap();

        // closing stops new trades, not settlement of the open positions
        let report = engine.resolve_market(market.id, yes).await.unwrap();
        assert_eq!(report.positions_won, 1);

        let market = engine.market(market.id).await.unwrap();
        assert_eq!(market.status, MarketStatus::Resolved);
        assert_eq!(ledger.balance("alice").await.unwrap(), dec!(10049.5));
    }

    #[tokio::test]
    async fn concurrent_trades_lose_no_update() {
        let (engine, _clock, _ledger) =
            engine_with(&[("alice", dec!(10000)), ("bob", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        let (a, b) = tokio::join!(
            engine.place_trade("alice", market.id, yes, dec!(50)),
            engine.place_trade("bob", market.id, yes, dec!(50)),
        );
        a.unwrap();
        b.unwrap();

        let market = engine.market(market.id).await.unwrap();
        assert_eq!(market.outcomes[0].total_stake, dec!(100));
        assert_eq!(market.total_volume, dec!(100));

        // identical admitted trades end at the same accumulator value
        // regardless of commit order
        let mut reference = PriceModel::uniform(2, 100.0, 0.05, 0.95).unwrap();
        reference.apply_stake(0, 50.0);
        reference.apply_stake(0, 50.0);
        assert_eq!(market.outcomes[0].probability, reference.percentages()[0]);
    }

    #[tokio::test]
    async fn resolution_settles_every_position_and_conserves_returns() {
        let (engine, _clock, ledger) =
            engine_with(&[("alice", dec!(10000)), ("bob", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;
        let no = market.outcomes[1].id;

        engine
            .place_trade("alice", market.id, yes, dec!(100))
            .await
            .unwrap();
        // bob enters after the quote moved to 62/38
        engine
            .place_trade("bob", market.id, no, dec!(100))
            .await
            .unwrap();

        let before = engine.positions(market.id).await.unwrap();
        let expected_winner_total: Decimal = before
            .iter()
            .filter(|p| p.outcome_id == yes)
            .map(|p| p.potential_return)
            .sum();
        let expected_loser_total: Decimal = before
            .iter()
            .filter(|p| p.outcome_id == no)
            .map(|p| p.loss_refund)
            .sum();

        let report = engine.resolve_market(market.id, yes).await.unwrap();
        assert_eq!(report.positions_won, 1);
        assert_eq!(report.positions_lost, 1);
        assert_eq!(report.total_credited, expected_winner_total);
        assert_eq!(report.total_rebated, expected_loser_total);

        let market_after = engine.market(market.id).await.unwrap();
        assert_eq!(market_after.status, MarketStatus::Resolved);
        assert_eq!(market_after.winning_outcome_id, Some(yes));

        let after = engine.positions(market.id).await.unwrap();
        assert!(after.iter().all(|p| p.status != PositionStatus::Active));
        let settled_winner_total: Decimal = after
            .iter()
            .filter(|p| p.status == PositionStatus::Won)
            .map(|p| p.actual_return)
            .sum();
        let settled_loser_total: Decimal = after
            .iter()
            .filter(|p| p.status == PositionStatus::Lost)
            .map(|p| p.actual_return)
            .sum();
        assert_eq!(settled_winner_total, expected_winner_total);
        assert_eq!(settled_loser_total, expected_loser_total);

        // alice: -100 stake, +149.5 win; bob: -100 stake, +38 rebate
        assert_eq!(ledger.balance("alice").await.unwrap(), dec!(10049.5));
        assert_eq!(ledger.balance("bob").await.unwrap(), dec!(9938));
    }

    #[tokio::test]
    async fn second_resolution_fails_without_mutation() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;
        let no = market.outcomes[1].id;

        engine
            .place_trade("alice", market.id, yes, dec!(50))
            .await
            .unwrap();
        engine.resolve_market(market.id, yes).await.unwrap();

        let before = engine.positions(market.id).await.unwrap();
        let err = engine.resolve_market(market.id, no).await.unwrap_err();
        assert!(matches!(err, EngineError::MarketAlreadyResolved(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let after = engine.positions(market.id).await.unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.status, a.status);
            assert_eq!(b.actual_return, a.actual_return);
        }
    }

    #[tokio::test]
    async fn resolving_with_foreign_outcome_fails() {
        let (engine, _clock, _ledger) = engine_with(&[]);
        let market = binary_market(&engine).await;
        let err = engine
            .resolve_market(market.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWinningOutcome { .. }));
    }

    #[tokio::test]
    async fn daily_limit_blocks_the_overflowing_trade() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(100000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        engine
            .set_spend_limits("alice", Some(dec!(50)), None)
            .await;
        engine
            .place_trade("alice", market.id, yes, dec!(40))
            .await
            .unwrap();

        let err = engine
            .place_trade("alice", market.id, yes, dec!(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
        match err {
            EngineError::RiskBlocked { reasons } => {
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, RiskBreach::DailyLimitExceeded { .. })));
            }
            other => panic!("expected RiskBlocked, got {other:?}"),
        }

        engine
            .place_trade("alice", market.id, yes, dec!(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn capital_at_risk_ceiling_blocks_threshold_warns() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(100))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        // 11% of balance: always a hard block, never just a warning
        let err = engine
            .place_trade("alice", market.id, yes, dec!(11))
            .await
            .unwrap_err();
        match err {
            EngineError::RiskBlocked { reasons } => {
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, RiskBreach::CapitalAtRisk { .. })));
            }
            other => panic!("expected RiskBlocked, got {other:?}"),
        }

        // 7%: proceeds with a warning
        let receipt = engine
            .place_trade("alice", market.id, yes, dec!(7))
            .await
            .unwrap();
        assert!(!receipt.warnings.is_empty());
    }

    #[tokio::test]
    async fn losing_starts_a_cooldown_warning() {
        let (engine, clock, _ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;
        let no = market.outcomes[1].id;

        engine
            .place_trade("alice", market.id, yes, dec!(50))
            .await
            .unwrap();
        engine.resolve_market(market.id, no).await.unwrap();

        let second = binary_market(&engine).await;
        clock.advance(Duration::seconds(10));
        let receipt = engine
            .place_trade("alice", second.id, second.outcomes[0].id, dec!(50))
            .await
            .unwrap();
        assert!(receipt.warnings.iter().any(|w| w.contains("cooling down")));

        clock.advance(Duration::seconds(60));
        let receipt = engine
            .place_trade("alice", second.id, second.outcomes[0].id, dec!(50))
            .await
            .unwrap();
        assert!(!receipt.warnings.iter().any(|w| w.contains("cooling down")));
    }

    #[tokio::test]
    async fn resolution_feeds_accuracy_tracking() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        engine
            .place_trade("alice", market.id, yes, dec!(50))
            .await
            .unwrap();
        engine.resolve_market(market.id, yes).await.unwrap();

        let profile = engine.risk_profile("alice").await.unwrap();
        assert_eq!(profile.resolutions, 1);
        // correct call at the 50% quote: 1 - 0.25
        assert!((profile.accuracy_score - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn trend_report_is_bounded_and_never_empty() {
        let (engine, _clock, _ledger) = engine_with(&[("alice", dec!(10000))]);
        let market = binary_market(&engine).await;
        let yes = market.outcomes[0].id;

        engine
            .place_trade("alice", market.id, yes, dec!(100))
            .await
            .unwrap();

        let report = engine.trend_report(market.id, &[]).await.unwrap();
        assert!(report.score >= 0.0 && report.score <= 100.0);
        assert_eq!(
            report.sparkline.len(),
            engine.config().analytics.sparkline_points
        );
        assert!(report.informed_volume_24h > 0.0);
    }
}
