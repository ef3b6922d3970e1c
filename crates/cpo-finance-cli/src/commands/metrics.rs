use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cpo_finance_core::metrics::investment_metrics::{self, MetricsInput};

use super::{parse, read_value, Context};

/// Arguments for investment metrics over an existing cash-flow table
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Discount rate as a decimal, overriding the input and config
    #[arg(long)]
    pub discount_rate: Option<Decimal>,
}

pub fn run_metrics(args: MetricsArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let value = read_value(args.input.as_deref(), ctx, Some(&[]), "investment metrics")?;
    let mut metrics_input: MetricsInput = parse(value, "metrics")?;
    if args.discount_rate.is_some() {
        metrics_input.discount_rate = args.discount_rate;
    }
    let result = investment_metrics::calculate_metrics(&metrics_input)?;
    Ok(serde_json::to_value(result)?)
}
