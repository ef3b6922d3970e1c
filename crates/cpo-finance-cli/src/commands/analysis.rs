use clap::Args;
use serde_json::{json, Value};

use cpo_finance_core::analysis::pipeline::{self, AnalysisInput};

use super::{override_field, parse, read_value, Context};

/// Arguments for a full investment analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Failure simulation seed; enables the simulation stage if the input
    /// does not
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_analyze(args: AnalyzeArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = read_value(args.input.as_deref(), ctx, Some(&[]), "investment analysis")?;
    if let Some(seed) = args.seed {
        if value.get("simulation").map_or(true, Value::is_null) {
            override_field(&mut value, &[], "simulation", json!({}))?;
        }
        override_field(&mut value, &["simulation"], "seed", json!(seed))?;
    }
    let analysis_input: AnalysisInput = parse(value, "analysis")?;
    let result = pipeline::run_analysis(&analysis_input)?;
    Ok(serde_json::to_value(result)?)
}
