//! Rebated-risk trade pricing
//!
//! Reward is proportional to the risk taken: a contrarian stake on a
//! low-probability outcome pays more on success and forfeits less on
//! failure. The platform only monetizes realized risk transfer on wins.
//!
//! - win:  profit = `stake * (1-p) * (1-fee)`, return = stake + profit,
//!   revenue = `stake * (1-p) * fee`
//! - loss: the trader keeps a rebate of `stake * p`; revenue is zero
//!
//! All arithmetic is `Decimal` so the identities
//! `loss_refund = stake - loss_amount` and `win_return = stake + win_profit`
//! hold exactly.

use crate::error::{EngineError, Result};
use crate::types::PayoutBreakdown;
use rust_decimal::Decimal;

/// Price a prospective trade at the pre-trade probability.
pub fn price_trade(stake: Decimal, probability: Decimal, fee: Decimal) -> Result<PayoutBreakdown> {
    if stake <= Decimal::ZERO {
        return Err(EngineError::InvalidStake(stake));
    }
    if probability <= Decimal::ZERO || probability >= Decimal::ONE {
        return Err(EngineError::InvalidProbability(probability));
    }
    if fee < Decimal::ZERO || fee >= Decimal::ONE {
        return Err(EngineError::InvalidFee(fee));
    }

    let risk = stake * (Decimal::ONE - probability);
    let win_profit = risk * (Decimal::ONE - fee);
    let platform_revenue = risk * fee;

    Ok(PayoutBreakdown {
        win_profit,
        win_return: stake + win_profit,
        loss_amount: risk,
        loss_refund: stake - risk,
        platform_revenue,
    })
}

/// Convert an integer percentage quote (0-100) to a normalized probability.
pub fn probability_from_pct(pct: u8) -> Decimal {
    Decimal::from(pct) / Decimal::ONE_HUNDRED
}
