use clap::Args;
use serde_json::{json, Value};

use cpo_finance_core::simulation::distribution::{self, FailureRiskInput};
use cpo_finance_core::simulation::failure::{self, FailureSimulationInput};

use super::{override_field, parse, read_value, Context};

/// Arguments for one failure simulation
#[derive(Args)]
pub struct SimulateFailuresArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Random seed, overriding the input's
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the repeated-run failure risk distribution
#[derive(Args)]
pub struct FailureRiskArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Base seed, overriding the input's
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of runs, overriding the input's
    #[arg(long)]
    pub runs: Option<u32>,
}

pub fn run_simulate_failures(
    args: SimulateFailuresArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = read_value(args.input.as_deref(), ctx, Some(&[]), "failure simulation")?;
    if let Some(seed) = args.seed {
        override_field(&mut value, &[], "seed", json!(seed))?;
    }
    let sim_input: FailureSimulationInput = parse(value, "failure simulation")?;
    let result = failure::simulate_failures(&sim_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_failure_risk(
    args: FailureRiskArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = read_value(
        args.input.as_deref(),
        ctx,
        Some(&["simulation"]),
        "failure risk analysis",
    )?;
    if let Some(seed) = args.seed {
        override_field(&mut value, &["simulation"], "seed", json!(seed))?;
    }
    if let Some(runs) = args.runs {
        override_field(&mut value, &[], "runs", json!(runs))?;
    }
    let risk_input: FailureRiskInput = parse(value, "failure risk")?;
    let result = distribution::analyze_failure_risk(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}
