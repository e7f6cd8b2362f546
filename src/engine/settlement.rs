//! Market resolution settler
//!
//! Terminal, one-shot transition. The market mutex is held for the entire
//! settlement, so no concurrent trade can interleave and no reader can
//! observe a partially settled position set. Positions transition wholly
//! in memory before any ledger credit is issued; a failed credit surfaces
//! as an external error with the settlement state intact (retry policy
//! belongs to the host).

use super::TradeEngine;
use crate::error::{EngineError, Result};
use crate::types::{MarketId, MarketStatus, OutcomeId, PositionStatus, SettlementReport};
use rust_decimal::Decimal;

impl TradeEngine {
    /// Declare the winning outcome and settle every open position.
    ///
    /// Winners are credited their `potential_return`; losers are credited
    /// the `loss_refund` rebate fixed at entry. Both active and closed
    /// markets settle (closing only stops new trades; open positions still
    /// need their event decided). A second attempt on an already-resolved
    /// market fails without mutating any position.
    pub async fn resolve_market(
        &self,
        market_id: MarketId,
        winning_outcome_id: OutcomeId,
    ) -> Result<SettlementReport> {
        let entry_arc = self.entry(market_id).await?;
        let mut entry = entry_arc.lock().await;

        match entry.market.status {
            MarketStatus::Resolved => return Err(EngineError::MarketAlreadyResolved(market_id)),
            MarketStatus::Active | MarketStatus::Closed => {}
        }
        if entry.market.outcome(winning_outcome_id).is_none() {
            return Err(EngineError::InvalidWinningOutcome {
                market: market_id,
                outcome: winning_outcome_id,
            });
        }

        let now = self.clock.now();
        let mut report = SettlementReport {
            market_id,
            winning_outcome_id,
            positions_won: 0,
            positions_lost: 0,
            total_credited: Decimal::ZERO,
            total_rebated: Decimal::ZERO,
            platform_revenue: Decimal::ZERO,
            resolved_at: now,
        };
        let mut credits: Vec<(String, Decimal)> = Vec::new();
        let mut resolutions: Vec<(String, u8, bool)> = Vec::new();

        for position in entry
            .positions
            .iter_mut()
            .filter(|p| p.status == PositionStatus::Active)
        {
            let won = position.outcome_id == winning_outcome_id;
            if won {
                position.status = PositionStatus::Won;
                position.actual_return = position.potential_return;
                report.positions_won += 1;
                report.total_credited += position.actual_return;
                report.platform_revenue += position.platform_fee;
            } else {
                position.status = PositionStatus::Lost;
                position.actual_return = position.loss_refund;
                report.positions_lost += 1;
                report.total_rebated += position.actual_return;
            }
            if position.actual_return > Decimal::ZERO {
                credits.push((position.user_id.clone(), position.actual_return));
            }
            resolutions.push((position.user_id.clone(), position.odds_at_prediction, won));
        }

        entry.market.status = MarketStatus::Resolved;
        entry.market.winning_outcome_id = Some(winning_outcome_id);
        entry.market.resolution_date = Some(now);

        // calibration history and post-loss cooldowns, per affected user
        for (user_id, odds, won) in resolutions {
            let risk_arc = self.risk_entry(&user_id).await;
            let mut risk = risk_arc.lock().await;
            risk.record_resolution(odds, won);
            if !won {
                risk.record_loss(now);
            }
        }

        for (user_id, amount) in credits {
            self.ledger.credit(&user_id, amount).await?;
        }

        tracing::info!(
            %market_id,
            %winning_outcome_id,
            won = report.positions_won,
            lost = report.positions_lost,
            total_credited = %report.total_credited,
            "market resolved"
        );

        Ok(report)
    }
}
