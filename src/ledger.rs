//! Wallet/ledger collaborator seam
//!
//! The engine never owns balances: it reads them to enforce capital-at-risk
//! checks, debits stakes at placement, and credits payouts at settlement.
//! Retry/backoff policy belongs to the implementation, not the engine.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, user: &str) -> Result<Decimal>;
    async fn credit(&self, user: &str, amount: Decimal) -> Result<()>;
    async fn debit(&self, user: &str, amount: Decimal) -> Result<()>;
}

/// In-memory ledger for tests and simulations
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: RwLock<HashMap<String, Decimal>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, user: &str, amount: Decimal) -> Self {
        self.accounts.write().insert(user.to_string(), amount);
        self
    }

    pub fn deposit(&self, user: &str, amount: Decimal) {
        *self
            .accounts
            .write()
            .entry(user.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, user: &str) -> Result<Decimal> {
        Ok(self
            .accounts
            .read()
            .get(user)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn credit(&self, user: &str, amount: Decimal) -> Result<()> {
        self.deposit(user, amount);
        Ok(())
    }

    async fn debit(&self, user: &str, amount: Decimal) -> Result<()> {
        let mut accounts = self.accounts.write();
        let balance = accounts.entry(user.to_string()).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Err(EngineError::Ledger(format!(
                "insufficient funds for {user}: balance {balance}, requested {amount}"
            )));
        }
        *balance -= amount;
        Ok(())
    }
}
