//! Foresight Engine
//!
//! Pricing, settlement, risk-control and analytics core for a forecasting
//! marketplace: users take positions on future events, a market maker
//! derives an implied probability from aggregate positions, and that
//! probability prices new trades and settles them once the event resolves.
//!
//! ## Architecture
//!
//! ```text
//! trade request → Risk Control → Pricing (PriceModel) → Position + Ledger
//!                                     ↑
//!                     Resolution Settler (terminal, atomic per market)
//!
//! Analytics/Trend ← positions + snapshots + external signal events
//! (read-only, never feeds back into pricing)
//! ```
//!
//! Transport, storage technology, identity and payment capture live outside
//! this crate; the engine consumes a [`ledger::Ledger`], a [`clock::Clock`]
//! and an optional signal feed, and keeps all durable state serde-ready.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod risk;
pub mod types;

#[cfg(test)]
mod engine_tests;
