use clap::Args;
use serde_json::{json, Value};

use cpo_finance_core::scenarios::sensitivity::{self, SensitivityInput};

use super::{override_field, parse, read_value, Context};

/// Arguments for the scenario sensitivity table
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON or YAML input file. A bare analysis input runs the
    /// default pessimistic/base/optimistic set.
    #[arg(long)]
    pub input: Option<String>,

    /// Failure simulation seed shared by every scenario
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_sensitivity(
    args: SensitivityArgs,
    ctx: &Context,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut value = read_value(args.input.as_deref(), ctx, None, "sensitivity analysis")?;
    if value.get("base").is_none() {
        value = json!({ "base": value });
    }
    if let Some(engine_config) = &ctx.config {
        crate::config::inject(&mut value, engine_config, &["base"])?;
    }
    if let Some(seed) = args.seed {
        override_field(&mut value, &[], "seed", json!(seed))?;
    }
    let sens_input: SensitivityInput = parse(value, "sensitivity")?;
    let result = sensitivity::run_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}
