//! Core domain types shared across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MarketId = Uuid;
pub type OutcomeId = Uuid;
pub type PositionId = Uuid;
pub type UserId = String;

/// Market lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    /// Accepting trades
    Active,
    /// Terminal: a winning outcome has been declared and positions settled
    Resolved,
    /// No longer accepting trades, not yet resolved
    Closed,
}

/// Position lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

/// A tradeable outcome within a market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: OutcomeId,
    pub label: String,
    /// Implied probability as an integer percentage (0-100), derived from
    /// the price model. Never mutated directly by a trade.
    pub probability: u8,
    /// Sum of all stake ever placed on this outcome
    pub total_stake: Decimal,
}

/// A forecasting market with two or more outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub title: String,
    pub category: String,
    pub status: MarketStatus,
    pub outcomes: Vec<Outcome>,
    /// Sum of all stake ever placed across all outcomes
    pub total_volume: Decimal,
    /// Set iff `status == Resolved`
    pub winning_outcome_id: Option<OutcomeId>,
    pub created_at: DateTime<Utc>,
    pub resolution_date: Option<DateTime<Utc>>,
}

impl Market {
    pub fn outcome(&self, id: OutcomeId) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    pub fn outcome_index(&self, id: OutcomeId) -> Option<usize> {
        self.outcomes.iter().position(|o| o.id == id)
    }

    /// Share of total volume staked on an outcome, as a percentage.
    ///
    /// Display-only approximation: the authoritative probability comes from
    /// the price model's accumulators and can diverge from this ratio under
    /// the risk-weighted update rule.
    pub fn stake_share(&self, id: OutcomeId) -> Option<Decimal> {
        let outcome = self.outcome(id)?;
        if self.total_volume.is_zero() {
            return Some(Decimal::ZERO);
        }
        Some(outcome.total_stake / self.total_volume * Decimal::ONE_HUNDRED)
    }
}

/// A user's trade on a single outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub user_id: UserId,
    pub stake_amount: Decimal,
    /// Probability snapshot of the backed outcome at trade time (0-100)
    pub odds_at_prediction: u8,
    /// Total credited on a win (stake + profit), fixed at entry
    pub potential_return: Decimal,
    /// Rebate credited on a loss, fixed at entry
    pub loss_refund: Decimal,
    /// Platform fee realized if this position wins, fixed at entry
    pub platform_fee: Decimal,
    /// Zero until the market resolves
    pub actual_return: Decimal,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
}

/// Payout breakdown for a prospective trade under the rebated-risk model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    /// Profit on top of stake if the backed outcome occurs
    pub win_profit: Decimal,
    /// Total credited on a win: stake + win_profit
    pub win_return: Decimal,
    /// Amount forfeited on a loss: stake * (1 - p)
    pub loss_amount: Decimal,
    /// Rebate on a loss: stake - loss_amount
    pub loss_refund: Decimal,
    /// Platform fee, charged only on the win branch
    pub platform_revenue: Decimal,
}

/// One point of a market's implied-probability history (lead outcome)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilitySnapshot {
    pub timestamp: DateTime<Utc>,
    pub probability: u8,
}

/// Result of a successfully placed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub position: Position,
    pub breakdown: PayoutBreakdown,
    /// Risk-control warnings the caller should surface to the user
    pub warnings: Vec<String>,
    /// Post-trade implied probabilities, one entry per outcome
    pub probabilities: Vec<(OutcomeId, u8)>,
}

/// Result of settling a resolved market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub market_id: MarketId,
    pub winning_outcome_id: OutcomeId,
    pub positions_won: u32,
    pub positions_lost: u32,
    /// Total credited to winners
    pub total_credited: Decimal,
    /// Total rebated to losers
    pub total_rebated: Decimal,
    /// Fee revenue realized on the winning positions
    pub platform_revenue: Decimal,
    pub resolved_at: DateTime<Utc>,
}

/// Broad category of an external signal event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    News,
    Social,
    DataRelease,
    Official,
}

/// Which sentiment layer a signal's source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Expert,
    Institutional,
    Mass,
}

/// External signal event consumed read-only by the analytics engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: Uuid,
    pub kind: SignalKind,
    pub title: String,
    pub source: SignalSource,
    pub timestamp: DateTime<Utc>,
    /// Source confidence in [0, 1]
    pub confidence: f64,
    /// Markets this event has been mapped to
    pub market_ids: Vec<MarketId>,
    /// Estimated probability impact in percentage points, signed
    pub impact_estimate: f64,
}
