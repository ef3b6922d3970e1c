use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cpo_finance_core::financing::amortization::{self, LoanTerms};
use cpo_finance_core::PeriodUnit;

use super::{parse, read_value, Context};

/// Arguments for a loan amortization schedule. Either `--input` or the
/// three loan flags.
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long, requires_all = ["rate", "years"])]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (6.5 = 6.5%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Loan term in years
    #[arg(long)]
    pub years: Option<u32>,

    /// Interest-only years at the start of the term
    #[arg(long, default_value_t = 0)]
    pub grace_years: u32,

    /// Produce a monthly instead of an annual schedule
    #[arg(long)]
    pub monthly: bool,
}

pub fn run_amortize(args: AmortizeArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = match (args.principal, args.rate, args.years) {
        (Some(principal), Some(rate), Some(years)) => LoanTerms {
            principal,
            annual_interest_rate: rate,
            term_years: years,
            grace_years: args.grace_years,
            period_unit: if args.monthly {
                PeriodUnit::Monthly
            } else {
                PeriodUnit::Annual
            },
        },
        _ => parse(
            read_value(args.input.as_deref(), ctx, None, "loan amortization")?,
            "loan",
        )?,
    };
    let result = amortization::amortize(&terms)?;
    Ok(serde_json::to_value(result)?)
}
