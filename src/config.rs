//! Engine configuration
//!
//! All tunables live here rather than as inline constants: fee, liquidity,
//! probability clamps, risk thresholds, analytics weights. Loadable from a
//! TOML file with `FORESIGHT_`-prefixed environment overrides.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Platform fee charged on the win branch, as a fraction (default 1%)
    pub fee: Decimal,
    /// Default liquidity parameter `b` for new markets; larger = slower
    /// price movement per unit stake
    pub liquidity: f64,
    /// Lower clamp on any reported probability
    pub probability_floor: f64,
    /// Upper clamp on any reported probability
    pub probability_ceiling: f64,
    pub risk: RiskConfig,
    pub analytics: AnalyticsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee: Decimal::new(1, 2), // 0.01
            liquidity: 100.0,
            probability_floor: 0.05,
            probability_ceiling: 0.95,
            risk: RiskConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file (missing file falls back to defaults) merged
    /// with `FORESIGHT_*` environment variables.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("FORESIGHT").separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Risk-control thresholds, evaluated before every trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Hard ceiling on capital at risk, percent of balance
    pub max_capital_risk_pct: Decimal,
    /// Soft threshold on capital at risk, percent of balance
    pub warn_capital_risk_pct: Decimal,
    /// Post-loss cooldown window in seconds (warn only)
    pub loss_cooldown_secs: i64,
    /// Rapid-trade detection window in seconds
    pub rapid_window_secs: i64,
    /// Number of trades within the window that triggers a warning
    pub rapid_trade_threshold: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_capital_risk_pct: Decimal::from(10),
            warn_capital_risk_pct: Decimal::from(5),
            loss_cooldown_secs: 30,
            rapid_window_secs: 60,
            rapid_trade_threshold: 3,
        }
    }
}

/// Trend-score weights and caps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub weight_delta: f64,
    pub weight_volume: f64,
    pub weight_events: f64,
    pub weight_sentiment: f64,
    /// Cap on the 24h probability move, percentage points
    pub delta_cap_pp: f64,
    /// 24h informed volume that saturates the log-scaled volume component
    pub volume_saturation: f64,
    /// Fixed number of sparkline points
    pub sparkline_points: usize,
    /// Time span the sparkline covers, in hours
    pub sparkline_span_hours: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            weight_delta: 0.4,
            weight_volume: 0.25,
            weight_events: 0.25,
            weight_sentiment: 0.1,
            delta_cap_pp: 20.0,
            volume_saturation: 10_000.0,
            sparkline_points: 24,
            sparkline_span_hours: 24,
        }
    }
}
