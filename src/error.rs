//! Engine error taxonomy
//!
//! Every error maps to one of four caller-visible classes (plus external
//! collaborator failures) so the service layer can choose between a hard
//! stop, a user-facing message, or a silent deny without string matching.

use crate::risk::RiskBreach;
use crate::types::{MarketId, OutcomeId};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Caller-visible error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was mutated
    Validation,
    /// Risk policy rejection; nothing was mutated
    Policy,
    /// Operation conflicts with current lifecycle state; nothing was mutated
    StateConflict,
    /// Structural invariant breach; fatal to the operation
    Consistency,
    /// Ledger or other collaborator failure
    External,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("stake must be positive, got {0}")]
    InvalidStake(Decimal),

    #[error("entry probability {0} outside (0, 1)")]
    InvalidProbability(Decimal),

    #[error("fee {0} outside [0, 1)")]
    InvalidFee(Decimal),

    #[error("liquidity parameter {0} outside valid range")]
    InvalidLiquidity(f64),

    #[error("a market needs at least two outcomes, got {0}")]
    TooFewOutcomes(usize),

    #[error("market {0} not found")]
    MarketNotFound(MarketId),

    #[error("outcome {outcome} does not belong to market {market}")]
    OutcomeNotFound {
        market: MarketId,
        outcome: OutcomeId,
    },

    #[error("market {0} is not accepting trades")]
    MarketInactive(MarketId),

    #[error("market {0} is already resolved")]
    MarketAlreadyResolved(MarketId),

    #[error("outcome {outcome} is not a valid winner for market {market}")]
    InvalidWinningOutcome {
        market: MarketId,
        outcome: OutcomeId,
    },

    #[error("trade blocked by risk policy: {}", .reasons.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("; "))]
    RiskBlocked { reasons: Vec<RiskBreach> },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("ledger: {0}")]
    Ledger(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidStake(_)
            | EngineError::InvalidProbability(_)
            | EngineError::InvalidFee(_)
            | EngineError::InvalidLiquidity(_)
            | EngineError::TooFewOutcomes(_)
            | EngineError::MarketNotFound(_)
            | EngineError::OutcomeNotFound { .. } => ErrorKind::Validation,
            EngineError::RiskBlocked { .. } => ErrorKind::Policy,
            EngineError::MarketInactive(_)
            | EngineError::MarketAlreadyResolved(_)
            | EngineError::InvalidWinningOutcome { .. } => ErrorKind::StateConflict,
            EngineError::Consistency(_) => ErrorKind::Consistency,
            EngineError::Ledger(_) => ErrorKind::External,
        }
    }
}
