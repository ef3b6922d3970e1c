use clap::Args;
use serde_json::Value;

use cpo_finance_core::projection::annual::{self, ProjectionInput};
use cpo_finance_core::projection::monthly::{self, MonthlyProjectionInput};

use super::{parse, read_value, Context};

/// Arguments for the annual cash-flow projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the monthly cash-flow projection
#[derive(Args)]
pub struct ProjectMonthlyArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of months, overriding the input and config
    #[arg(long)]
    pub months: Option<u32>,
}

pub fn run_project(args: ProjectArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let value = read_value(args.input.as_deref(), ctx, None, "cash flow projection")?;
    let projection_input: ProjectionInput = parse(value, "projection")?;
    let result = annual::project_cash_flows(&projection_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_project_monthly(
    args: ProjectMonthlyArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let value = read_value(args.input.as_deref(), ctx, Some(&[]), "monthly projection")?;
    let mut monthly_input: MonthlyProjectionInput = parse(value, "monthly projection")?;
    if args.months.is_some() {
        monthly_input.months = args.months;
    }
    let result = monthly::project_monthly_cash_flows(&monthly_input)?;
    Ok(serde_json::to_value(result)?)
}
