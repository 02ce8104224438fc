//! Cashdesk Simulator
//!
//! Replays contention scenarios against the Cashdesk service and checks
//! that balances stay consistent.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cashdesk_ledger::{LedgerStore, MemoryStore, PgStore};
use cashdesk_server::{AdminConfig, Cashdesk};

mod scenario;
mod controller;
mod metrics;

use controller::SimulationController;
use scenario::Scenario;

/// Cashdesk Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "cashdesk-simulator")]
#[command(about = "Cashdesk contention simulator and ledger invariant checker")]
struct Args {
    /// Number of simulated users to create
    #[arg(short, long, default_value = "10")]
    users: usize,

    /// Concurrent processors racing on each request
    #[arg(short, long, default_value = "8")]
    racers: usize,

    /// Scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::Mixed)]
    scenario: Scenario,

    /// Operations to generate in the mixed scenario
    #[arg(long, default_value = "500")]
    operations: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// PostgreSQL URL; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Cashdesk Simulator");
    info!("Scenario: {}", args.scenario);
    info!("Users: {}, racers: {}", args.users, args.racers);

    let store: Arc<dyn LedgerStore> = match &args.database_url {
        Some(url) => {
            let store = PgStore::connect(url, 32).await?;
            store.run_migrations().await?;
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let admin = AdminConfig {
        username: "simulator_admin".to_string(),
        password: "simulator".to_string(),
        email: "admin@simulator.local".to_string(),
    };
    let cashdesk = Cashdesk::new(store, &admin)?;
    cashdesk.bootstrap().await?;

    let mut controller = SimulationController::new(
        cashdesk,
        args.users,
        args.racers,
        args.operations,
        args.seed,
    );
    let report = controller.run(args.scenario).await?;

    // Print metrics
    let metrics = controller.get_metrics().await;
    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Succeeded: {}", metrics.succeeded);
    info!("Refused: {}", metrics.refused);
    info!("Failed: {}", metrics.failed);
    info!(
        "Latency: avg {}µs, p50 {}µs, p99 {}µs",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );

    if !report.is_clean() {
        for violation in &report.violations {
            error!("{}", violation);
        }
        anyhow::bail!("{} invariant violation(s)", report.violations.len());
    }

    info!("All invariants held");
    Ok(())
}
