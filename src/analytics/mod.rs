//! Derived trend analytics
//!
//! Pure functions over a market's history plus external signal events.
//! Nothing here is authoritative or persisted: every report is recomputable
//! from market + position history + the signal feed, and none of it feeds
//! back into pricing. Consumed by ranking/display surfaces.

use crate::config::AnalyticsConfig;
use crate::types::{Market, MarketId, Position, ProbabilitySnapshot, SignalEvent, SignalSource};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How actionable the current signal picture looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionGrade {
    /// Mean signal confidence > 0.6
    Signal,
    /// Mean signal confidence < 0.3
    Noise,
    /// In between: real events, unclear read
    Overreaction,
}

/// What kind of doubt the sentiment consensus carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Uncertainty {
    /// Consensus < 0.4: the layers disagree
    HighDisagreement,
    /// Consensus > 0.8: everyone leaning the same way, late-cycle risk
    LateStageOptimism,
    /// Middle ground
    FragileConsensus,
}

/// Normalized component breakdown of the trend score, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendComponents {
    pub delta24h_norm: f64,
    pub informed_volume24h_norm: f64,
    pub info_event_impact_norm: f64,
    pub sentiment_consensus_norm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparkPoint {
    pub timestamp: DateTime<Utc>,
    pub probability: u8,
}

/// Bounded trend score with its full derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub market_id: MarketId,
    /// Weighted composite in [0, 100]
    pub score: f64,
    pub components: TrendComponents,
    /// The exact weights and caps the score was computed with
    pub config: AnalyticsConfig,
    pub decision_grade: DecisionGrade,
    pub uncertainty: Uncertainty,
    /// Fixed-length probability series of the lead outcome
    pub sparkline: Vec<SparkPoint>,
    /// Accuracy-weighted 24h stake volume
    pub informed_volume_24h: f64,
    pub computed_at: DateTime<Utc>,
}

/// Compute the trend report for one market.
///
/// `accuracy` maps user ids to their historical forecasting accuracy in
/// [0, 1]; users absent from the map count at the unproven half weight.
pub fn trend_report(
    market: &Market,
    positions: &[Position],
    snapshots: &[ProbabilitySnapshot],
    signals: &[SignalEvent],
    accuracy: &HashMap<String, f64>,
    cfg: &AnalyticsConfig,
    now: DateTime<Utc>,
) -> TrendReport {
    let current = f64::from(market.outcomes[0].probability);
    let day_ago = now - Duration::hours(24);

    let delta24h_norm = {
        // baseline: the freshest snapshot that is at least a day old,
        // falling back to the oldest mark we have
        let baseline = snapshots
            .iter()
            .rev()
            .find(|s| s.timestamp <= day_ago)
            .or_else(|| snapshots.first())
            .map(|s| f64::from(s.probability))
            .unwrap_or(current);
        let delta = (current - baseline).abs().min(cfg.delta_cap_pp);
        if cfg.delta_cap_pp > 0.0 {
            delta / cfg.delta_cap_pp
        } else {
            0.0
        }
    };

    let informed_volume_24h: f64 = positions
        .iter()
        .filter(|p| p.created_at > day_ago)
        .map(|p| {
            let acc = accuracy.get(&p.user_id).copied().unwrap_or(0.0);
            let stake = rust_decimal::prelude::ToPrimitive::to_f64(&p.stake_amount).unwrap_or(0.0);
            stake * (0.5 + acc * 0.5)
        })
        .sum();
    // log scale so one huge trade cannot saturate the component
    let informed_volume24h_norm = if cfg.volume_saturation > 0.0 {
        ((1.0 + informed_volume_24h).ln() / (1.0 + cfg.volume_saturation).ln()).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mapped: Vec<&SignalEvent> = signals
        .iter()
        .filter(|s| s.market_ids.contains(&market.id) && s.timestamp > day_ago)
        .collect();

    let info_event_impact_norm = if mapped.is_empty() {
        0.0
    } else {
        let sum: f64 = mapped
            .iter()
            .map(|s| {
                let impact = if cfg.delta_cap_pp > 0.0 {
                    (s.impact_estimate.abs() / cfg.delta_cap_pp).min(1.0)
                } else {
                    0.0
                };
                s.confidence.clamp(0.0, 1.0) * impact
            })
            .sum();
        (sum / mapped.len() as f64).clamp(0.0, 1.0)
    };

    let sentiment_consensus_norm = sentiment_consensus(&mapped);

    let score = (100.0
        * (cfg.weight_delta * delta24h_norm
            + cfg.weight_volume * informed_volume24h_norm
            + cfg.weight_events * info_event_impact_norm
            + cfg.weight_sentiment * sentiment_consensus_norm))
        .clamp(0.0, 100.0);

    let mean_confidence = if mapped.is_empty() {
        0.0
    } else {
        mapped.iter().map(|s| s.confidence).sum::<f64>() / mapped.len() as f64
    };
    let decision_grade = if mean_confidence > 0.6 {
        DecisionGrade::Signal
    } else if mean_confidence < 0.3 {
        DecisionGrade::Noise
    } else {
        DecisionGrade::Overreaction
    };
    let uncertainty = if sentiment_consensus_norm < 0.4 {
        Uncertainty::HighDisagreement
    } else if sentiment_consensus_norm > 0.8 {
        Uncertainty::LateStageOptimism
    } else {
        Uncertainty::FragileConsensus
    };

    TrendReport {
        market_id: market.id,
        score,
        components: TrendComponents {
            delta24h_norm,
            informed_volume24h_norm,
            info_event_impact_norm,
            sentiment_consensus_norm,
        },
        config: cfg.clone(),
        decision_grade,
        uncertainty,
        sparkline: sparkline(snapshots, market.outcomes[0].probability, cfg, now),
        informed_volume_24h,
        computed_at: now,
    }
}

/// Agreement strength across the expert/institutional/mass layers, [0, 1].
/// Each layer with events scores the mean confidence of its events; with
/// two or more scored layers, consensus is one minus their spread.
fn sentiment_consensus(mapped: &[&SignalEvent]) -> f64 {
    let layers = [
        SignalSource::Expert,
        SignalSource::Institutional,
        SignalSource::Mass,
    ];
    let scores: Vec<f64> = layers
        .iter()
        .filter_map(|layer| {
            let confidences: Vec<f64> = mapped
                .iter()
                .filter(|s| s.source == *layer)
                .map(|s| s.confidence.clamp(0.0, 1.0))
                .collect();
            if confidences.is_empty() {
                None
            } else {
                Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
            }
        })
        .collect();

    match scores.len() {
        0 => 0.0,
        1 => scores[0],
        _ => {
            let max = scores.iter().cloned().fold(f64::MIN, f64::max);
            let min = scores.iter().cloned().fold(f64::MAX, f64::min);
            (1.0 - (max - min)).clamp(0.0, 1.0)
        }
    }
}

/// Fixed-length, fixed-resolution probability series. Carries the last
/// known value forward through empty buckets; a market with no recorded
/// history yields a flat series at the current probability so charting
/// code never receives an empty series.
fn sparkline(
    snapshots: &[ProbabilitySnapshot],
    current: u8,
    cfg: &AnalyticsConfig,
    now: DateTime<Utc>,
) -> Vec<SparkPoint> {
    let points = cfg.sparkline_points.max(1);
    let span = Duration::hours(cfg.sparkline_span_hours.max(1));
    let step = span / points as i32;
    let start = now - span;

    let mut out = Vec::with_capacity(points);
    for k in 0..points {
        let bucket_end = start + step * (k as i32 + 1);
        let probability = snapshots
            .iter()
            .rev()
            .find(|s| s.timestamp <= bucket_end)
            .map(|s| s.probability)
            .or_else(|| snapshots.first().map(|s| s.probability))
            .unwrap_or(current);
        out.push(SparkPoint {
            timestamp: bucket_end,
            probability,
        });
    }
    out
}
