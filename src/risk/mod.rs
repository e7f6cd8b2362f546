//! Per-user risk control
//!
//! Stateful guard evaluated before every trade. The output is a
//! classification, not a boolean: `blocked` reasons reject the trade,
//! `warnings` let it proceed but should be surfaced to the user. Also
//! tracks long-run forecasting accuracy and calibration per user.

use crate::config::RiskConfig;
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

const CALIBRATION_BUCKETS: usize = 10;
/// Minimum samples before a decile bucket contributes to calibration
const MIN_BUCKET_SAMPLES: u32 = 5;

/// A single violated or near-violated risk policy
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskBreach {
    #[error("capital at risk {pct}% exceeds the {limit}% ceiling")]
    CapitalAtRisk { pct: Decimal, limit: Decimal },

    #[error("capital at risk {pct}% above the {threshold}% comfort threshold")]
    ElevatedCapitalAtRisk { pct: Decimal, threshold: Decimal },

    #[error("trading is paused for this account")]
    TradingPaused,

    #[error("account is in observe-only mode")]
    ObserveOnly,

    #[error("cooling down after a loss, {remaining_secs}s remaining")]
    LossCooldown { remaining_secs: i64 },

    #[error("daily limit exceeded: {spent} spent + {stake} stake > {limit}")]
    DailyLimitExceeded {
        spent: Decimal,
        stake: Decimal,
        limit: Decimal,
    },

    #[error("weekly limit exceeded: {spent} spent + {stake} stake > {limit}")]
    WeeklyLimitExceeded {
        spent: Decimal,
        stake: Decimal,
        limit: Decimal,
    },

    #[error("{count} trades in the last {window_secs}s, slow down")]
    RapidTrading { count: usize, window_secs: i64 },
}

/// Disjoint classification of a prospective trade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Trade must be rejected while this is non-empty
    pub blocked: Vec<RiskBreach>,
    /// Trade proceeds; caller should surface these
    pub warnings: Vec<RiskBreach>,
}

impl RiskVerdict {
    pub fn permitted(&self) -> bool {
        self.blocked.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct CalibrationBucket {
    samples: u32,
    wins: u32,
}

/// Per-user risk-control state, lazily created on first trade attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    daily_spent: Decimal,
    weekly_spent: Decimal,
    pub daily_limit: Option<Decimal>,
    pub weekly_limit: Option<Decimal>,
    day_started: DateTime<Utc>,
    week_started: DateTime<Utc>,
    pub observe_only: bool,
    pub trading_paused: bool,
    recent_trades: VecDeque<DateTime<Utc>>,
    last_loss_at: Option<DateTime<Utc>>,
    resolutions: u64,
    brier_complement_sum: f64,
    buckets: Vec<CalibrationBucket>,
}

impl RiskState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_spent: Decimal::ZERO,
            weekly_spent: Decimal::ZERO,
            daily_limit: None,
            weekly_limit: None,
            day_started: now,
            week_started: now,
            observe_only: false,
            trading_paused: false,
            recent_trades: VecDeque::new(),
            last_loss_at: None,
            resolutions: 0,
            brier_complement_sum: 0.0,
            buckets: vec![CalibrationBucket::default(); CALIBRATION_BUCKETS],
        }
    }

    /// Reset spend counters when the wall clock has crossed a day or
    /// ISO-week boundary since the last watermark.
    fn roll_windows(&mut self, now: DateTime<Utc>) {
        if now.date_naive() != self.day_started.date_naive() {
            self.daily_spent = Decimal::ZERO;
            self.day_started = now;
        }
        if now.iso_week() != self.week_started.iso_week() {
            self.weekly_spent = Decimal::ZERO;
            self.week_started = now;
        }
    }

    /// Classify a prospective trade. Counters are rolled first, so a stale
    /// state evaluated after midnight sees fresh windows.
    pub fn evaluate(
        &mut self,
        stake: Decimal,
        balance: Decimal,
        cfg: &RiskConfig,
        now: DateTime<Utc>,
    ) -> RiskVerdict {
        self.roll_windows(now);
        let mut verdict = RiskVerdict::default();

        // compare the exact ratio; rounding is for the message only
        let capital_at_risk = if balance > Decimal::ZERO {
            stake / balance * Decimal::ONE_HUNDRED
        } else {
            Decimal::ONE_HUNDRED
        };
        if capital_at_risk > cfg.max_capital_risk_pct {
            verdict.blocked.push(RiskBreach::CapitalAtRisk {
                pct: capital_at_risk.round_dp(2),
                limit: cfg.max_capital_risk_pct,
            });
        } else if capital_at_risk > cfg.warn_capital_risk_pct {
            verdict.warnings.push(RiskBreach::ElevatedCapitalAtRisk {
                pct: capital_at_risk.round_dp(2),
                threshold: cfg.warn_capital_risk_pct,
            });
        }

        if self.trading_paused {
            verdict.blocked.push(RiskBreach::TradingPaused);
        }
        if self.observe_only {
            verdict.blocked.push(RiskBreach::ObserveOnly);
        }

        if let Some(lost_at) = self.last_loss_at {
            let elapsed = (now - lost_at).num_seconds();
            if elapsed < cfg.loss_cooldown_secs {
                verdict.warnings.push(RiskBreach::LossCooldown {
                    remaining_secs: cfg.loss_cooldown_secs - elapsed,
                });
            }
        }

        if let Some(limit) = self.daily_limit {
            if self.daily_spent + stake > limit {
                verdict.blocked.push(RiskBreach::DailyLimitExceeded {
                    spent: self.daily_spent,
                    stake,
                    limit,
                });
            }
        }
        if let Some(limit) = self.weekly_limit {
            if self.weekly_spent + stake > limit {
                verdict.blocked.push(RiskBreach::WeeklyLimitExceeded {
                    spent: self.weekly_spent,
                    stake,
                    limit,
                });
            }
        }

        let window_start = now - Duration::seconds(cfg.rapid_window_secs);
        let recent = self
            .recent_trades
            .iter()
            .filter(|&&t| t > window_start)
            .count();
        if recent >= cfg.rapid_trade_threshold {
            verdict.warnings.push(RiskBreach::RapidTrading {
                count: recent,
                window_secs: cfg.rapid_window_secs,
            });
        }

        verdict
    }

    /// Bookkeeping after a trade is admitted and executed
    pub fn record_trade(&mut self, stake: Decimal, cfg: &RiskConfig, now: DateTime<Utc>) {
        self.roll_windows(now);
        self.daily_spent += stake;
        self.weekly_spent += stake;
        self.recent_trades.push_back(now);
        // keep twice the detection window so evaluation never under-counts
        let horizon = now - Duration::seconds(cfg.rapid_window_secs * 2);
        while matches!(self.recent_trades.front(), Some(&t) if t < horizon) {
            self.recent_trades.pop_front();
        }
    }

    /// Start the post-loss cooldown
    pub fn record_loss(&mut self, now: DateTime<Utc>) {
        self.last_loss_at = Some(now);
    }

    /// Fold a resolved prediction into the accuracy/calibration history.
    /// `probability_pct` is the entry quote of the backed outcome.
    pub fn record_resolution(&mut self, probability_pct: u8, won: bool) {
        let p = f64::from(probability_pct) / 100.0;
        let outcome = if won { 1.0 } else { 0.0 };
        self.brier_complement_sum += 1.0 - (p - outcome).powi(2);
        self.resolutions += 1;

        let bucket = usize::from(probability_pct / 10).min(CALIBRATION_BUCKETS - 1);
        self.buckets[bucket].samples += 1;
        if won {
            self.buckets[bucket].wins += 1;
        }
    }

    /// Brier-score complement averaged over all resolved predictions, [0, 1]
    pub fn accuracy_score(&self) -> f64 {
        if self.resolutions == 0 {
            return 0.0;
        }
        self.brier_complement_sum / self.resolutions as f64
    }

    /// `100 - avg |bucket center - realized win rate|` in percent, over
    /// decile buckets with enough samples. `None` until any bucket fills.
    pub fn calibration_score(&self) -> Option<f64> {
        let mut deviations = Vec::new();
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.samples < MIN_BUCKET_SAMPLES {
                continue;
            }
            let center = (i as f64 * 10.0 + 5.0) / 100.0;
            let realized = f64::from(bucket.wins) / f64::from(bucket.samples);
            deviations.push((center - realized).abs());
        }
        if deviations.is_empty() {
            return None;
        }
        let avg = deviations.iter().sum::<f64>() / deviations.len() as f64;
        Some(100.0 - avg * 100.0)
    }

    pub fn daily_spent(&self) -> Decimal {
        self.daily_spent
    }

    pub fn weekly_spent(&self) -> Decimal {
        self.weekly_spent
    }

    pub fn resolutions(&self) -> u64 {
        self.resolutions
    }

    pub fn profile(&self) -> RiskProfile {
        RiskProfile {
            daily_spent: self.daily_spent,
            weekly_spent: self.weekly_spent,
            daily_limit: self.daily_limit,
            weekly_limit: self.weekly_limit,
            observe_only: self.observe_only,
            trading_paused: self.trading_paused,
            resolutions: self.resolutions,
            accuracy_score: self.accuracy_score(),
            calibration_score: self.calibration_score(),
        }
    }
}

/// Read-only snapshot of a user's risk standing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    pub daily_spent: Decimal,
    pub weekly_spent: Decimal,
    pub daily_limit: Option<Decimal>,
    pub weekly_limit: Option<Decimal>,
    pub observe_only: bool,
    pub trading_paused: bool,
    pub resolutions: u64,
    pub accuracy_score: f64,
    pub calibration_score: Option<f64>,
}
