mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::analysis::AnalyzeArgs;
use commands::financing::AmortizeArgs;
use commands::metrics::MetricsArgs;
use commands::projection::{ProjectArgs, ProjectMonthlyArgs};
use commands::revenue::{OperatingCostArgs, RevenueArgs};
use commands::scenarios::SensitivityArgs;
use commands::simulation::{FailureRiskArgs, SimulateFailuresArgs};
use commands::Context;

/// Financial projections for EV charging point operators
#[derive(Parser)]
#[command(
    name = "cpo",
    version,
    about = "Financial projections for EV charging point operators",
    long_about = "A CLI for projecting the economics of EV charging stations with decimal \
                  precision. Supports revenue and operating cost estimates, loan \
                  amortization, failure simulation, cash-flow projection, investment \
                  metrics and scenario sensitivity."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine config file (.json, .yaml or .toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate annual revenue of one station
    Revenue(RevenueArgs),
    /// Estimate annual operating cost and profit of one station
    OperatingCost(OperatingCostArgs),
    /// Build a loan amortization schedule
    Amortize(AmortizeArgs),
    /// Simulate station failures over the projection horizon
    SimulateFailures(SimulateFailuresArgs),
    /// Distribution of failure cost over many seeded simulations
    FailureRisk(FailureRiskArgs),
    /// Project annual cash flows
    Project(ProjectArgs),
    /// Project monthly cash flows
    ProjectMonthly(ProjectMonthlyArgs),
    /// Calculate NPV, IRR, payback, ROI and debt metrics
    Metrics(MetricsArgs),
    /// Run the full investment analysis
    Analyze(AnalyzeArgs),
    /// Compare the analysis under alternative scenarios
    Sensitivity(SensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = match cli.config.as_deref().map(config::load_config).transpose() {
        Ok(engine_config) => Context {
            config: engine_config,
        },
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Revenue(args) => commands::revenue::run_revenue(args, &ctx),
        Commands::OperatingCost(args) => commands::revenue::run_operating_cost(args, &ctx),
        Commands::Amortize(args) => commands::financing::run_amortize(args, &ctx),
        Commands::SimulateFailures(args) => {
            commands::simulation::run_simulate_failures(args, &ctx)
        }
        Commands::FailureRisk(args) => commands::simulation::run_failure_risk(args, &ctx),
        Commands::Project(args) => commands::projection::run_project(args, &ctx),
        Commands::ProjectMonthly(args) => commands::projection::run_project_monthly(args, &ctx),
        Commands::Metrics(args) => commands::metrics::run_metrics(args, &ctx),
        Commands::Analyze(args) => commands::analysis::run_analyze(args, &ctx),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args, &ctx),
        Commands::Version => {
            println!("cpo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
