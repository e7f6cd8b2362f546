//! Trade engine
//!
//! Owns the keyed per-market state (price model, outcome stakes, positions,
//! probability history) and per-user risk state. Each market and each user
//! gets its own async mutex: requests touching different keys run fully in
//! parallel, requests on the same key serialize in admission order. Lock
//! order is always market before user.
//!
//! Trade placement is a single atomic unit under the market lock: model
//! update, outcome stake, position creation and market volume either all
//! happen or none do.

mod settlement;

use crate::analytics::{self, TrendReport};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ledger::Ledger;
use crate::pricing::{payout, PriceModel};
use crate::risk::{RiskProfile, RiskState};
use crate::types::{
    Market, MarketId, MarketStatus, Outcome, OutcomeId, Position, PositionStatus,
    ProbabilitySnapshot, SignalEvent, TradeReceipt, UserId,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Everything the engine tracks for one market, guarded by one mutex
struct MarketEntry {
    market: Market,
    model: PriceModel,
    positions: Vec<Position>,
    snapshots: Vec<ProbabilitySnapshot>,
}

pub struct TradeEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn Ledger>,
    markets: RwLock<HashMap<MarketId, Arc<Mutex<MarketEntry>>>>,
    users: RwLock<HashMap<UserId, Arc<Mutex<RiskState>>>>,
}

impl TradeEngine {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            config,
            clock,
            ledger,
            markets: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mint a new active market. `seed` gives a non-uniform starting
    /// probability per outcome; `liquidity` overrides the configured `b`.
    pub async fn create_market(
        &self,
        title: &str,
        category: &str,
        outcome_labels: &[&str],
        seed: Option<&[f64]>,
        liquidity: Option<f64>,
    ) -> Result<Market> {
        if outcome_labels.len() < 2 {
            return Err(EngineError::TooFewOutcomes(outcome_labels.len()));
        }
        let b = liquidity.unwrap_or(self.config.liquidity);
        let floor = self.config.probability_floor;
        let ceiling = self.config.probability_ceiling;
        let model = match seed {
            Some(probs) if probs.len() != outcome_labels.len() => {
                return Err(EngineError::Consistency(format!(
                    "seed has {} probabilities for {} outcomes",
                    probs.len(),
                    outcome_labels.len()
                )));
            }
            Some(probs) => PriceModel::seeded(probs, b, floor, ceiling)?,
            None => PriceModel::uniform(outcome_labels.len(), b, floor, ceiling)?,
        };

        let pcts = model.percentages();
        let now = self.clock.now();
        let market = Market {
            id: Uuid::new_v4(),
            title: title.to_string(),
            category: category.to_string(),
            status: MarketStatus::Active,
            outcomes: outcome_labels
                .iter()
                .zip(&pcts)
                .map(|(label, &pct)| Outcome {
                    id: Uuid::new_v4(),
                    label: (*label).to_string(),
                    probability: pct,
                    total_stake: Decimal::ZERO,
                })
                .collect(),
            total_volume: Decimal::ZERO,
            winning_outcome_id: None,
            created_at: now,
            resolution_date: None,
        };

        tracing::info!(market_id = %market.id, title, outcomes = outcome_labels.len(), "market created");

        let entry = MarketEntry {
            market: market.clone(),
            model,
            positions: Vec::new(),
            snapshots: vec![ProbabilitySnapshot {
                timestamp: now,
                probability: pcts[0],
            }],
        };
        self.markets
            .write()
            .await
            .insert(market.id, Arc::new(Mutex::new(entry)));
        Ok(market)
    }

    async fn entry(&self, market_id: MarketId) -> Result<Arc<Mutex<MarketEntry>>> {
        self.markets
            .read()
            .await
            .get(&market_id)
            .cloned()
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    async fn risk_entry(&self, user_id: &str) -> Arc<Mutex<RiskState>> {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RiskState::new(self.clock.now()))))
            .clone()
    }

    /// Place a trade: risk evaluation, pricing at the pre-trade quote,
    /// stake debit, then the atomic state transition.
    pub async fn place_trade(
        &self,
        user_id: &str,
        market_id: MarketId,
        outcome_id: OutcomeId,
        stake: Decimal,
    ) -> Result<TradeReceipt> {
        if stake <= Decimal::ZERO {
            return Err(EngineError::InvalidStake(stake));
        }
        let entry_arc = self.entry(market_id).await?;
        let mut entry = entry_arc.lock().await;
        let entry = &mut *entry;

        if entry.market.status != MarketStatus::Active {
            return Err(EngineError::MarketInactive(market_id));
        }
        let idx = entry
            .market
            .outcome_index(outcome_id)
            .ok_or(EngineError::OutcomeNotFound {
                market: market_id,
                outcome: outcome_id,
            })?;

        let risk_arc = self.risk_entry(user_id).await;
        let mut risk = risk_arc.lock().await;

        let balance = self.ledger.balance(user_id).await?;
        let now = self.clock.now();
        let verdict = risk.evaluate(stake, balance, &self.config.risk, now);
        if !verdict.permitted() {
            tracing::info!(user_id, %market_id, %stake, blocked = ?verdict.blocked, "trade rejected by risk policy");
            return Err(EngineError::RiskBlocked {
                reasons: verdict.blocked,
            });
        }
        for warning in &verdict.warnings {
            tracing::warn!(user_id, %market_id, %warning, "risk warning");
        }

        let entry_pct = entry.market.outcomes[idx].probability;
        let breakdown = payout::price_trade(
            stake,
            payout::probability_from_pct(entry_pct),
            self.config.fee,
        )?;

        // debit before any shared-state mutation; a failed debit leaves
        // the market untouched
        self.ledger.debit(user_id, stake).await?;

        let position = Position {
            id: Uuid::new_v4(),
            market_id,
            outcome_id,
            user_id: user_id.to_string(),
            stake_amount: stake,
            odds_at_prediction: entry_pct,
            potential_return: breakdown.win_return,
            loss_refund: breakdown.loss_refund,
            platform_fee: breakdown.platform_revenue,
            actual_return: Decimal::ZERO,
            status: PositionStatus::Active,
            created_at: now,
        };

        entry.model.apply_stake(idx, stake.to_f64().unwrap_or(0.0));
        let pcts = entry.model.percentages();
        for (outcome, &pct) in entry.market.outcomes.iter_mut().zip(&pcts) {
            outcome.probability = pct;
        }
        entry.market.outcomes[idx].total_stake += stake;
        entry.market.total_volume += stake;
        entry.positions.push(position.clone());
        entry.snapshots.push(ProbabilitySnapshot {
            timestamp: now,
            probability: pcts[0],
        });

        risk.record_trade(stake, &self.config.risk, now);

        tracing::info!(
            user_id,
            %market_id,
            %stake,
            entry_pct,
            new_pct = pcts[idx],
            "trade placed"
        );

        Ok(TradeReceipt {
            probabilities: entry
                .market
                .outcomes
                .iter()
                .map(|o| (o.id, o.probability))
                .collect(),
            position,
            breakdown,
            warnings: verdict.warnings.iter().map(|w| w.to_string()).collect(),
        })
    }

    /// Stop accepting trades without settling
    pub async fn close_market(&self, market_id: MarketId) -> Result<Market> {
        let entry_arc = self.entry(market_id).await?;
        let mut entry = entry_arc.lock().await;
        match entry.market.status {
            MarketStatus::Resolved => return Err(EngineError::MarketAlreadyResolved(market_id)),
            MarketStatus::Closed => return Err(EngineError::MarketInactive(market_id)),
            MarketStatus::Active => {}
        }
        entry.market.status = MarketStatus::Closed;
        tracing::info!(%market_id, "market closed");
        Ok(entry.market.clone())
    }

    pub async fn market(&self, market_id: MarketId) -> Result<Market> {
        let entry_arc = self.entry(market_id).await?;
        let entry = entry_arc.lock().await;
        Ok(entry.market.clone())
    }

    pub async fn positions(&self, market_id: MarketId) -> Result<Vec<Position>> {
        let entry_arc = self.entry(market_id).await?;
        let entry = entry_arc.lock().await;
        Ok(entry.positions.clone())
    }

    /// Cross-cutting view over all markets; not an owning relationship
    pub async fn user_positions(&self, user_id: &str) -> Vec<Position> {
        let entries: Vec<_> = self.markets.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for entry_arc in entries {
            let entry = entry_arc.lock().await;
            out.extend(
                entry
                    .positions
                    .iter()
                    .filter(|p| p.user_id == user_id)
                    .cloned(),
            );
        }
        out
    }

    /// Append a probability snapshot outside of trade flow, e.g. from a
    /// host's daily scheduler. Analytics uses these as its 24h baseline.
    pub async fn record_snapshot(&self, market_id: MarketId) -> Result<()> {
        let entry_arc = self.entry(market_id).await?;
        let mut entry = entry_arc.lock().await;
        let snapshot = ProbabilitySnapshot {
            timestamp: self.clock.now(),
            probability: entry.market.outcomes[0].probability,
        };
        entry.snapshots.push(snapshot);
        tracing::debug!(%market_id, probability = snapshot.probability, "snapshot recorded");
        Ok(())
    }

    pub async fn set_spend_limits(
        &self,
        user_id: &str,
        daily: Option<Decimal>,
        weekly: Option<Decimal>,
    ) {
        let risk_arc = self.risk_entry(user_id).await;
        let mut risk = risk_arc.lock().await;
        risk.daily_limit = daily;
        risk.weekly_limit = weekly;
    }

    pub async fn set_trading_paused(&self, user_id: &str, paused: bool) {
        let risk_arc = self.risk_entry(user_id).await;
        risk_arc.lock().await.trading_paused = paused;
    }

    pub async fn set_observe_only(&self, user_id: &str, observe_only: bool) {
        let risk_arc = self.risk_entry(user_id).await;
        risk_arc.lock().await.observe_only = observe_only;
    }

    pub async fn risk_profile(&self, user_id: &str) -> Option<RiskProfile> {
        let risk_arc = self.users.read().await.get(user_id).cloned()?;
        let risk = risk_arc.lock().await;
        Some(risk.profile())
    }

    /// Compute the derived trend report for a market. Read-only: consumes
    /// the market's history plus any external signal events mapped to it.
    pub async fn trend_report(
        &self,
        market_id: MarketId,
        signals: &[SignalEvent],
    ) -> Result<TrendReport> {
        let entry_arc = self.entry(market_id).await?;
        let entry = entry_arc.lock().await;

        let mut accuracy = HashMap::new();
        for user_id in entry
            .positions
            .iter()
            .map(|p| p.user_id.clone())
            .collect::<std::collections::HashSet<_>>()
        {
            if let Some(risk_arc) = self.users.read().await.get(&user_id).cloned() {
                let risk = risk_arc.lock().await;
                accuracy.insert(user_id, risk.accuracy_score());
            }
        }

        Ok(analytics::trend_report(
            &entry.market,
            &entry.positions,
            &entry.snapshots,
            signals,
            &accuracy,
            &self.config.analytics,
            self.clock.now(),
        ))
    }
}
