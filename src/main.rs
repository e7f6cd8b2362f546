//! Foresight Engine CLI
//!
//! Operational front door for the pricing/settlement core: run a scripted
//! trading session against an in-memory ledger, or price a single trade.

use clap::{Parser, Subcommand};
use foresight_engine::{
    clock::SystemClock,
    config::EngineConfig,
    engine::TradeEngine,
    ledger::{Ledger, MemoryLedger},
    pricing::payout,
    types::{SignalEvent, SignalKind, SignalSource},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "foresight-engine")]
#[command(about = "Prediction market pricing, settlement and risk engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "foresight.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted multi-user trading session end to end
    Simulate,
    /// Price a single trade at a given entry probability
    Price {
        /// Stake amount
        stake: Decimal,
        /// Entry probability as an integer percentage (1-99)
        probability: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)?;

    match cli.command {
        Commands::Simulate => simulate(config).await,
        Commands::Price { stake, probability } => price(config, stake, probability),
    }
}

fn price(config: EngineConfig, stake: Decimal, probability: u8) -> anyhow::Result<()> {
    let breakdown = payout::price_trade(
        stake,
        payout::probability_from_pct(probability),
        config.fee,
    )?;

    println!("\n💱 Trade at {probability}% entry, fee {}\n", config.fee);
    println!("  win profit:       {:>12.2}", breakdown.win_profit);
    println!("  win return:       {:>12.2}", breakdown.win_return);
    println!("  loss amount:      {:>12.2}", breakdown.loss_amount);
    println!("  loss refund:      {:>12.2}", breakdown.loss_refund);
    println!("  platform revenue: {:>12.2}", breakdown.platform_revenue);
    Ok(())
}

async fn simulate(config: EngineConfig) -> anyhow::Result<()> {
    tracing::info!("starting simulated trading session");

    let ledger = Arc::new(MemoryLedger::new());
    for user in ["alice", "bob", "carol"] {
        ledger.deposit(user, dec!(2000));
    }
    let engine = TradeEngine::new(config, Arc::new(SystemClock), ledger.clone());

    let market = engine
        .create_market(
            "Will the flagship launch slip past Q3?",
            "tech",
            &["Yes", "No"],
            Some(&[0.35, 0.65]),
            None,
        )
        .await?;
    let yes = market.outcomes[0].id;
    let no = market.outcomes[1].id;

    engine.set_spend_limits("carol", Some(dec!(100)), None).await;

    for (user, outcome, stake) in [
        ("alice", yes, dec!(60)),
        ("bob", no, dec!(80)),
        ("carol", yes, dec!(40)),
        ("alice", yes, dec!(30)),
    ] {
        match engine.place_trade(user, market.id, outcome, stake).await {
            Ok(receipt) => {
                println!(
                    "{user} staked ${stake} at {}% → potential return ${:.2}",
                    receipt.position.odds_at_prediction, receipt.breakdown.win_return
                );
                for warning in &receipt.warnings {
                    println!("  ⚠ {warning}");
                }
            }
            Err(e) => println!("{user}'s trade rejected: {e}"),
        }
    }

    let snapshot = engine.market(market.id).await?;
    println!("\n📊 {}", snapshot.title);
    for outcome in &snapshot.outcomes {
        println!(
            "  {:<4} {:>3}%  (${} staked)",
            outcome.label, outcome.probability, outcome.total_stake
        );
    }
    println!("  volume ${}", snapshot.total_volume);

    let signals = vec![SignalEvent {
        id: uuid::Uuid::new_v4(),
        kind: SignalKind::News,
        title: "supplier confirms component delay".into(),
        source: SignalSource::Expert,
        timestamp: chrono::Utc::now(),
        confidence: 0.8,
        market_ids: vec![market.id],
        impact_estimate: 8.0,
    }];
    let trend = engine.trend_report(market.id, &signals).await?;
    println!(
        "\n📈 trend score {:.1} ({:?}, {:?})",
        trend.score, trend.decision_grade, trend.uncertainty
    );

    let report = engine.resolve_market(market.id, yes).await?;
    println!(
        "\n🏁 resolved: {} won / {} lost, ${} credited, ${} rebated",
        report.positions_won, report.positions_lost, report.total_credited, report.total_rebated
    );

    for user in ["alice", "bob", "carol"] {
        let balance = ledger.balance(user).await?;
        let accuracy = engine
            .risk_profile(user)
            .await
            .map(|p| p.accuracy_score)
            .unwrap_or(0.0);
        println!("  {user}: balance ${balance}, accuracy {accuracy:.2}");
    }

    Ok(())
}
