use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::time::Instant;

use super::failure::{simulate, FailureSimulationInput};
use super::rng::StdRandom;
use crate::cancel::{checkpoint, CancellationToken};
use crate::error::CpoFinanceError;
use crate::types::{with_metadata, ComputationOutput};
use crate::CpoFinanceResult;

const MAX_RUNS: u32 = 100_000;

/// Repeated failure simulation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRiskInput {
    pub simulation: FailureSimulationInput,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

fn default_runs() -> u32 {
    1_000
}

/// Distribution summary of one simulated quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRiskOutput {
    pub runs: u32,
    pub base_seed: u64,
    pub total_repair_cost: RiskStatistics,
    pub total_revenue_loss: RiskStatistics,
    pub mean_failures: f64,
    /// Share of runs in which at least one entity was retired
    pub retirement_share: f64,
}

fn describe(values: Vec<f64>) -> RiskStatistics {
    let mean = values.iter().mean();
    let std_dev = if values.len() > 1 {
        values.iter().std_dev()
    } else {
        0.0
    };
    let min = Statistics::min(values.iter());
    let max = Statistics::max(values.iter());

    let mut data = Data::new(values);
    RiskStatistics {
        mean,
        std_dev,
        min,
        max,
        p5: data.percentile(5),
        p50: data.percentile(50),
        p95: data.percentile(95),
    }
}

/// Run the failure simulation `runs` times, run `i` seeded with `seed + i`,
/// and summarize total repair cost and revenue loss across runs.
pub fn simulate_failure_distribution(
    input: &FailureSimulationInput,
    runs: u32,
    seed: u64,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<FailureRiskOutput> {
    if runs == 0 || runs > MAX_RUNS {
        return Err(CpoFinanceError::invalid(
            "runs",
            format!("Number of runs must be between 1 and {MAX_RUNS}"),
        ));
    }
    input.validate()?;
    let params = input.parameters();

    let mut repair_costs = Vec::with_capacity(runs as usize);
    let mut revenue_losses = Vec::with_capacity(runs as usize);
    let mut failures = Vec::with_capacity(runs as usize);
    let mut runs_with_retirement = 0u32;

    for i in 0..runs {
        checkpoint(cancel, "failure risk")?;
        let mut rng = StdRandom::seeded(seed.wrapping_add(i as u64));
        let sim = simulate(&input.entities, input.years, &params, &mut rng, None)?;

        repair_costs.push(sim.summary.total_repair_cost.to_f64().unwrap_or(0.0));
        revenue_losses.push(sim.summary.total_revenue_loss.to_f64().unwrap_or(0.0));
        failures.push(sim.summary.total_failures as f64);
        if sim.summary.retired_entities > 0 {
            runs_with_retirement += 1;
        }
    }

    tracing::debug!(runs, seed, "failure risk distribution computed");

    Ok(FailureRiskOutput {
        runs,
        base_seed: seed,
        total_repair_cost: describe(repair_costs),
        total_revenue_loss: describe(revenue_losses),
        mean_failures: failures.iter().mean(),
        retirement_share: runs_with_retirement as f64 / runs as f64,
    })
}

/// Failure risk distribution wrapped in the standard envelope. Without a
/// seed the runs start from 0 so repeated calls agree.
pub fn analyze_failure_risk(
    input: &FailureRiskInput,
) -> CpoFinanceResult<ComputationOutput<FailureRiskOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let seed = input.simulation.seed.unwrap_or(0);
    if input.runs < 100 {
        warnings.push(format!(
            "Only {} runs; percentiles are unstable below 100",
            input.runs
        ));
    }

    let result = simulate_failure_distribution(&input.simulation, input.runs, seed, None)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let mut output = with_metadata(
        "Failure Risk Distribution (repeated seeded failure simulation)",
        &serde_json::json!({
            "runs": input.runs,
            "base_seed": seed,
            "entities": input.simulation.entities.len(),
            "years": input.simulation.years,
        }),
        warnings,
        elapsed,
        result,
    );
    output.metadata.precision = "ieee754_f64".to_string();
    Ok(output)
}
