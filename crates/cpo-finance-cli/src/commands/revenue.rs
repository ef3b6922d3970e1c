use clap::Args;
use serde_json::Value;

use cpo_finance_core::cost::operating::{self, OperatingCostInput};
use cpo_finance_core::revenue::usage::{self, RevenueInput};

use super::{parse, read_value, Context};

/// Arguments for a single-station revenue estimate
#[derive(Args)]
pub struct RevenueArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a single-station operating cost and profit estimate
#[derive(Args)]
pub struct OperatingCostArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_revenue(args: RevenueArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let value = read_value(args.input.as_deref(), ctx, Some(&[]), "revenue estimate")?;
    let revenue_input: RevenueInput = parse(value, "revenue")?;
    let result = usage::estimate_revenue(&revenue_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_operating_cost(
    args: OperatingCostArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let value = read_value(args.input.as_deref(), ctx, Some(&[]), "operating cost estimate")?;
    let cost_input: OperatingCostInput = parse(value, "operating cost")?;
    let result = operating::estimate_operating_cost(&cost_input)?;
    Ok(serde_json::to_value(result)?)
}
