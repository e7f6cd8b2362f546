//! Market-maker price model
//!
//! Each market holds one non-negative-pressure accumulator per outcome plus
//! a liquidity parameter `b`. The implied probability of outcome `i` is the
//! softmax `exp(q_i / b) / Σ exp(q_j / b)`, computed with a max-shift so
//! extreme accumulators cannot overflow. A stake `s` on outcome `i` adds
//! `s * (1 - p_i)` to its accumulator: price impact shrinks as an outcome
//! approaches certainty. This is deliberately not the classical
//! cost-function LMSR.
//!
//! Reported probabilities are clamped to a configured band (default
//! [0.05, 0.95]) so a single large trade can never drive quoted odds to 0%
//! or 100%, even though the accumulators themselves are unbounded.

pub mod payout;

use crate::error::{EngineError, Result};

const MIN_LIQUIDITY: f64 = 1e-6;
const MAX_LIQUIDITY: f64 = 1e12;
/// Accumulators are re-centered once any weight grows past this bound;
/// softmax probabilities are invariant under a common shift.
const RECENTER_BOUND: f64 = 1e9;

/// Per-market pricing state: accumulators + liquidity + clamp band
#[derive(Debug, Clone, PartialEq)]
pub struct PriceModel {
    liquidity: f64,
    weights: Vec<f64>,
    floor: f64,
    ceiling: f64,
}

impl PriceModel {
    /// Model with a uniform starting probability across `outcomes`
    pub fn uniform(outcomes: usize, liquidity: f64, floor: f64, ceiling: f64) -> Result<Self> {
        if outcomes < 2 {
            return Err(EngineError::TooFewOutcomes(outcomes));
        }
        Self::validate_liquidity(liquidity)?;
        Ok(Self {
            liquidity,
            weights: vec![0.0; outcomes],
            floor,
            ceiling,
        })
    }

    /// Model seeded with a non-uniform starting probability per outcome,
    /// solving `q_i = b * ln(p_i)` so the softmax reproduces `probs`.
    pub fn seeded(probs: &[f64], liquidity: f64, floor: f64, ceiling: f64) -> Result<Self> {
        if probs.len() < 2 {
            return Err(EngineError::TooFewOutcomes(probs.len()));
        }
        Self::validate_liquidity(liquidity)?;
        for &p in probs {
            if !(p > 0.0 && p < 1.0) {
                return Err(EngineError::InvalidProbability(
                    rust_decimal::Decimal::try_from(p).unwrap_or_default(),
                ));
            }
        }
        Ok(Self {
            liquidity,
            weights: probs.iter().map(|p| liquidity * p.ln()).collect(),
            floor,
            ceiling,
        })
    }

    /// Binary convenience: `q_yes = b * ln(p / (1 - p))`, `q_no = 0`
    pub fn seeded_binary(p: f64, liquidity: f64, floor: f64, ceiling: f64) -> Result<Self> {
        Self::seeded(&[p, 1.0 - p], liquidity, floor, ceiling)
    }

    fn validate_liquidity(liquidity: f64) -> Result<()> {
        if !(MIN_LIQUIDITY..=MAX_LIQUIDITY).contains(&liquidity) || !liquidity.is_finite() {
            return Err(EngineError::InvalidLiquidity(liquidity));
        }
        Ok(())
    }

    pub fn outcome_count(&self) -> usize {
        self.weights.len()
    }

    pub fn liquidity(&self) -> f64 {
        self.liquidity
    }

    /// Unclamped softmax over the accumulators, max-shifted for stability
    fn raw_probabilities(&self) -> Vec<f64> {
        let max = self
            .weights
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &w| acc.max(w));
        let exps: Vec<f64> = self
            .weights
            .iter()
            .map(|&w| ((w - max) / self.liquidity).exp())
            .collect();
        let sum: f64 = exps.iter().sum();
        exps.iter().map(|&e| e / sum).collect()
    }

    /// Reported probability per outcome, clamped to the configured band
    /// with the remaining mass redistributed among unclamped outcomes.
    pub fn probabilities(&self) -> Vec<f64> {
        let mut probs = self.raw_probabilities();
        let n = probs.len();
        let mut pinned = vec![false; n];

        for _ in 0..n {
            let mut changed = false;
            for i in 0..n {
                if !pinned[i] && probs[i] < self.floor {
                    probs[i] = self.floor;
                    pinned[i] = true;
                    changed = true;
                }
            }
            changed |= Self::renormalize_free(&mut probs, &pinned, changed);
            let mut ceiling_hit = false;
            for i in 0..n {
                if !pinned[i] && probs[i] > self.ceiling {
                    probs[i] = self.ceiling;
                    pinned[i] = true;
                    ceiling_hit = true;
                }
            }
            changed |= Self::renormalize_free(&mut probs, &pinned, ceiling_hit);
            if !changed {
                break;
            }
        }
        probs
    }

    /// Scale unpinned entries so the whole vector sums to 1 again.
    /// Returns whether anything moved.
    fn renormalize_free(probs: &mut [f64], pinned: &[bool], dirty: bool) -> bool {
        if !dirty {
            return false;
        }
        let pinned_mass: f64 = probs
            .iter()
            .zip(pinned)
            .filter(|(_, &p)| p)
            .map(|(v, _)| v)
            .sum();
        let free_mass = 1.0 - pinned_mass;
        let current_free: f64 = probs
            .iter()
            .zip(pinned)
            .filter(|(_, &p)| !p)
            .map(|(v, _)| v)
            .sum();
        if free_mass <= 0.0 || current_free <= 0.0 {
            return false;
        }
        let scale = free_mass / current_free;
        for (v, &p) in probs.iter_mut().zip(pinned) {
            if !p {
                *v *= scale;
            }
        }
        true
    }

    pub fn probability(&self, outcome: usize) -> f64 {
        self.probabilities()[outcome]
    }

    /// Apply a stake to an outcome and return the new probability vector.
    ///
    /// The pressure is risk-weighted: `q_i += s * (1 - p_i)` at the current
    /// reported probability, so the further the outcome is from certainty
    /// the more a unit of stake moves it.
    pub fn apply_stake(&mut self, outcome: usize, stake: f64) -> Vec<f64> {
        let p = self.probability(outcome);
        self.weights[outcome] += stake * (1.0 - p);
        self.recenter();
        self.probabilities()
    }

    fn recenter(&mut self) {
        let max = self
            .weights
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &w| acc.max(w));
        if max.abs() > RECENTER_BOUND {
            for w in &mut self.weights {
                *w -= max;
            }
        }
    }

    /// Integer percentage view, largest-remainder rounded to sum exactly 100
    pub fn percentages(&self) -> Vec<u8> {
        let probs = self.probabilities();
        let mut pcts: Vec<u8> = probs.iter().map(|p| (p * 100.0).floor() as u8).collect();
        let assigned: u32 = pcts.iter().map(|&p| p as u32).sum();
        let mut remainders: Vec<(usize, f64)> = probs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p * 100.0 - (p * 100.0).floor()))
            .collect();
        remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut leftover = 100u32.saturating_sub(assigned);
        for (i, _) in remainders {
            if leftover == 0 {
                break;
            }
            pcts[i] += 1;
            leftover -= 1;
        }
        pcts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_fifty_stake_moves_both_sides() {
        let mut model = PriceModel::uniform(2, 100.0, 0.05, 0.95).unwrap();
        assert_eq!(model.probabilities(), vec![0.5, 0.5]);

        let after = model.apply_stake(0, 100.0);
        // q_a = 100 * 0.5 = 50 -> p_a = e^0.5 / (e^0.5 + 1)
        assert!((after[0] - 0.622_459).abs() < 1e-4);
        assert!(after[0] > 0.5);
        assert!(after[1] < 0.5);

        let pcts = model.percentages();
        assert_eq!(pcts.iter().map(|&p| p as u32).sum::<u32>(), 100);
        assert_eq!(pcts[0], 62);
    }

    #[test]
    fn reported_probability_is_clamped() {
        let mut model = PriceModel::uniform(2, 100.0, 0.05, 0.95).unwrap();
        let after = model.apply_stake(0, 1_000_000.0);
        assert_eq!(after[0], 0.95);
        assert_eq!(after[1], 0.05);
        assert!((after.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        // another huge stake keeps the quote inside the band
        let after = model.apply_stake(0, 1_000_000_000.0);
        assert_eq!(after[0], 0.95);
    }

    #[test]
    fn seeded_binary_reproduces_probability() {
        let model = PriceModel::seeded_binary(0.7, 100.0, 0.05, 0.95).unwrap();
        let probs = model.probabilities();
        assert!((probs[0] - 0.7).abs() < 1e-9);
        assert!((probs[1] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn seeded_multiway_percentages_sum_to_hundred() {
        let model = PriceModel::seeded(&[0.57, 0.29, 0.14], 250.0, 0.05, 0.95).unwrap();
        let pcts = model.percentages();
        assert_eq!(pcts.iter().map(|&p| p as u32).sum::<u32>(), 100);
        assert_eq!(pcts[0], 57);
    }

    #[test]
    fn clamp_redistributes_among_free_outcomes() {
        let model = PriceModel::seeded(&[0.9, 0.06, 0.04], 100.0, 0.05, 0.95).unwrap();
        let probs = model.probabilities();
        assert!(probs.iter().all(|&p| p >= 0.05 - 1e-12 && p <= 0.95 + 1e-12));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_degenerate_liquidity() {
        assert!(matches!(
            PriceModel::uniform(2, 0.0, 0.05, 0.95),
            Err(EngineError::InvalidLiquidity(_))
        ));
        assert!(matches!(
            PriceModel::uniform(1, 100.0, 0.05, 0.95),
            Err(EngineError::TooFewOutcomes(1))
        ));
    }
}
