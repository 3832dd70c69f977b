//! Roomframe simulation binary.
//!
//! Runs one scripted room-view scenario against the simulated session store
//! with every invariant checked on each render, and logs the outcome.
//!
//! # Usage
//!
//! ```bash
//! # Preview then join a public room
//! roomframe-sim --scenario join
//!
//! # Reproduce a randomized churn run
//! roomframe-sim --scenario churn --seed 42 --log-level debug
//! ```

use clap::Parser;
use roomframe_harness::{Scenario, ScenarioKind};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomframe deterministic simulation
#[derive(Parser, Debug)]
#[command(name = "roomframe-sim")]
#[command(about = "Drive a room view through a deterministic scenario")]
#[command(version)]
struct Args {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "join")]
    scenario: ScenarioKind,

    /// Room ID to open
    #[arg(short, long, default_value = "!sim:localhost")]
    room: String,

    /// Run as a guest account
    #[arg(long)]
    guest: bool,

    /// Seed for randomized scenarios
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut scenario = Scenario::new(args.scenario, args.room);
    scenario.guest = args.guest;
    scenario.seed = args.seed;

    let report = scenario.run().await?;

    match &report.final_state {
        Some(state) => tracing::info!(
            access = %state.access_state,
            unread = state.unread_count,
            search_results = state.search.as_ref().map_or(0, |search| search.result_count),
            "final state"
        ),
        None => tracing::warn!("view never rendered"),
    }
    for notification in &report.notifications {
        tracing::info!(title = %notification.title, description = %notification.description, "notification");
    }
    tracing::info!(
        renders = report.renders,
        store_calls = report.calls.len(),
        dispatched = ?report.dispatched,
        "scenario finished"
    );

    Ok(())
}
