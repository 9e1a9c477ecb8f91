//! switchboard CLI: run the dispatcher against a simulated call load.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::Rng;
use switchboard_rs::config::{Config, Roster};
use switchboard_rs::engine::{Dispatcher, SimulatedHandler};
use switchboard_rs::model::{Call, Employee, Tier};
use switchboard_rs::telemetry::{TelemetryConfig, init_telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "switchboard", about = "Bounded call dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a burst of calls and report how each one ended
    Simulate {
        /// Number of calls to submit
        #[arg(long, default_value_t = 10)]
        calls: u64,
        /// Generate this many employees with random tiers
        #[arg(long, default_value_t = 5, conflicts_with = "roster")]
        employees: u32,
        /// Roster TOML file to staff the dispatcher from
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Override MAX_CONCURRENT_CALLS
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Print every resolved call as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Roster file operations
    Roster {
        #[command(subcommand)]
        action: RosterAction,
    },
}

#[derive(Subcommand)]
enum RosterAction {
    /// Validate a roster file and print it in dispatch order
    Show {
        /// Roster TOML file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            calls,
            employees,
            roster,
            max_concurrent,
            json,
        } => cmd_simulate(calls, employees, roster, max_concurrent, json).await,
        Command::Roster { action } => match action {
            RosterAction::Show { path } => cmd_roster_show(path),
        },
    }
}

async fn cmd_simulate(
    calls: u64,
    employees: u32,
    roster: Option<PathBuf>,
    max_concurrent: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(n) = max_concurrent {
        anyhow::ensure!(n > 0, "--max-concurrent must be at least 1");
        config.max_concurrent = n;
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "switchboard".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let staff = match roster {
        Some(path) => Roster::load(&path)?.into_employees(),
        None => random_staff(employees),
    };

    let dispatcher = Dispatcher::new(
        config.dispatcher_config(),
        Arc::new(SimulatedHandler::new(config.handling_time())),
    )?;
    dispatcher.replace_roster(staff);

    info!(
        calls,
        max_concurrent = config.max_concurrent,
        employees = dispatcher.roster().len(),
        "starting simulation"
    );

    let handles: Vec<_> = (0..calls).map(|id| dispatcher.submit(Call::new(id))).collect();

    let mut tally: BTreeMap<String, usize> = BTreeMap::new();
    for handle in handles {
        let call = handle.await;
        if json {
            println!("{}", serde_json::to_string(&call)?);
        }
        let key = match call.reason {
            Some(reason) => format!("{} ({reason})", call.outcome),
            None => call.outcome.to_string(),
        };
        *tally.entry(key).or_default() += 1;
    }

    if !json {
        println!("{:<40}  COUNT", "OUTCOME");
        println!("{}", "-".repeat(47));
        for (key, count) in &tally {
            println!("{key:<40}  {count}");
        }
        println!("\n{calls} call(s)");
    }
    Ok(())
}

fn cmd_roster_show(path: PathBuf) -> anyhow::Result<()> {
    let roster = Roster::load(&path)?;
    if roster.is_empty() {
        println!("Roster is empty.");
        return Ok(());
    }

    let mut employees = roster.into_employees();
    employees.sort_by_key(|e| e.tier);

    println!("{:<8}  TIER", "ID");
    println!("{}", "-".repeat(20));
    for employee in &employees {
        println!("{:<8}  {}", employee.id, employee.tier);
    }
    println!("\n{} employee(s)", employees.len());
    Ok(())
}

fn random_staff(count: u32) -> Vec<Employee> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|id| Employee::new(id, Tier::ALL[rng.gen_range(0..Tier::ALL.len())]))
        .collect()
}
