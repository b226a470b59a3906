//! `conduit` CLI entry point (SPEC_FULL.md §A.5): initializes logging and
//! config, then drives the Demo Fault/Scenario Driver. Deliberately narrow —
//! this is not a general Dispatcher routing surface.

mod config;
mod logging;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use conduit_dispatch::{BroadcastSignalBus, DemoDriver, FaultKind, Scenario, ScenarioOutcome};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConduitConfig;
use crate::logging::init_logging;

#[derive(Parser)]
#[command(name = "conduit", about = "Conduit request-routing and agentic-execution layer")]
struct Cli {
    /// Override the tracing filter (defaults to RUST_LOG or "info").
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory to read conduit.toml from (defaults to the current directory).
    #[arg(long, global = true)]
    config_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the Demo Fault/Scenario Driver.
    Demo {
        #[command(subcommand)]
        action: DemoAction,
    },
}

#[derive(Subcommand)]
enum DemoAction {
    /// Run a canonical scenario end to end and report whether the observed
    /// terminal stage matched the expected one.
    Run {
        /// One of: successful-heal, rejected-fix, second-success.
        scenario: String,
        /// One of: message-queue-flood, leaking-worker, crashing-supervisor.
        fault: String,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Inject a single fault onto the signal bus and print its correlation id.
    Fault {
        /// One of: message-queue-flood, leaking-worker, crashing-supervisor.
        kind: String,
    },
}

fn parse_scenario(s: &str) -> Result<Scenario> {
    match s {
        "successful-heal" => Ok(Scenario::SuccessfulHeal),
        "rejected-fix" => Ok(Scenario::RejectedFix),
        "second-success" => Ok(Scenario::SecondSuccess),
        other => Err(anyhow!("unknown scenario: {other}")),
    }
}

fn parse_fault(s: &str) -> Result<FaultKind> {
    match s {
        "message-queue-flood" => Ok(FaultKind::MessageQueueFlood),
        "leaking-worker" => Ok(FaultKind::LeakingWorker),
        "crashing-supervisor" => Ok(FaultKind::CrashingSupervisor),
        other => Err(anyhow!("unknown fault kind: {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = ConduitConfig::load(cli.config_dir.as_deref())?;
    tracing::info!(provider = %config.default_provider, demo_mode = config.demo_mode, "conduit starting");

    match cli.command {
        Commands::Demo { action } => run_demo(action).await,
    }
}

async fn run_demo(action: DemoAction) -> Result<()> {
    let bus = Arc::new(BroadcastSignalBus::new());
    let driver = DemoDriver::new(bus);

    match action {
        DemoAction::Run { scenario, fault, timeout_ms } => {
            let scenario = parse_scenario(&scenario)?;
            let fault = parse_fault(&fault)?;
            let outcome = driver.run_scenario(scenario, fault, Duration::from_millis(timeout_ms)).await;
            match outcome {
                ScenarioOutcome::Matched { stage } => {
                    println!("scenario matched expected stage: {stage}");
                    Ok(())
                }
                ScenarioOutcome::Mismatched { expected, observed } => {
                    Err(anyhow!("scenario mismatch: expected {expected}, observed {observed}"))
                }
                ScenarioOutcome::TimedOut => Err(anyhow!("scenario timed out waiting for a terminal stage")),
            }
        }
        DemoAction::Fault { kind } => {
            let kind = parse_fault(&kind)?;
            let correlation_id = driver.inject_fault(kind).await;
            println!("injected fault, correlation_id={correlation_id}");
            Ok(())
        }
    }
}
