use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::analysis::pipeline::{run_analysis_with, AnalysisInput, ScenarioAdjustments};
use crate::cancel::{checkpoint, CancellationToken};
use crate::error::CpoFinanceError;
use crate::metrics::investment_metrics::FinancialMetrics;
use crate::projection::annual::ProjectionTotals;
use crate::simulation::rng::StdRandom;
use crate::time_value::checked_sum;
use crate::types::*;
use crate::CpoFinanceResult;

const PROBABILITY_TOLERANCE: Decimal = dec!(0.001);

/// One named set of multipliers applied to the base assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub revenue_factor: Multiple,
    pub cost_factor: Multiple,
    #[serde(default = "default_factor")]
    pub capex_factor: Multiple,
    /// Scenario weight for the probability-weighted NPV
    #[serde(default)]
    pub probability: Option<Rate>,
}

fn default_factor() -> Multiple {
    Decimal::ONE
}

impl ScenarioSpec {
    pub fn new(name: &str, revenue_factor: Multiple, cost_factor: Multiple) -> Self {
        ScenarioSpec {
            name: name.to_string(),
            revenue_factor,
            cost_factor,
            capex_factor: Decimal::ONE,
            probability: None,
        }
    }

    fn adjustments(&self) -> ScenarioAdjustments {
        ScenarioAdjustments {
            revenue_factor: self.revenue_factor,
            cost_factor: self.cost_factor,
            capex_factor: self.capex_factor,
        }
    }
}

/// Pessimistic, base and optimistic cases.
pub fn default_scenarios() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec::new("pessimistic", dec!(0.8), dec!(1.2)),
        ScenarioSpec::new("base", Decimal::ONE, Decimal::ONE),
        ScenarioSpec::new("optimistic", dec!(1.2), dec!(0.8)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Completed,
    Failed,
}

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub revenue_factor: Multiple,
    pub cost_factor: Multiple,
    pub capex_factor: Multiple,
    pub probability: Option<Rate>,
    pub status: ScenarioStatus,
    /// Why the scenario failed
    pub error: Option<String>,
    pub metrics: Option<FinancialMetrics>,
    pub totals: Option<ProjectionTotals>,
    /// NPV minus the base scenario's NPV
    pub npv_delta: Option<Money>,
}

impl ScenarioResult {
    fn npv(&self) -> Option<Money> {
        self.metrics.as_ref().map(|m| m.npv)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub scenarios: Vec<ScenarioResult>,
    /// Row the NPV deltas are measured against
    pub base_scenario: Option<String>,
    pub probability_weighted_npv: Option<Money>,
    pub failed_scenarios: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base: AnalysisInput,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioSpec>,
    /// Every scenario simulates from this seed, so rows differ only by
    /// their multipliers; defaults to the base simulation seed, then 0
    pub seed: Option<u64>,
}

/// Re-run the pipeline under one scenario. Analysis errors become a failed
/// row; only cancellation is returned as an error.
fn evaluate_scenario(
    base: &AnalysisInput,
    spec: &ScenarioSpec,
    seed: u64,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<ScenarioResult> {
    checkpoint(cancel, "sensitivity")?;

    let mut rng = StdRandom::seeded(seed);
    let outcome = run_analysis_with(base, &spec.adjustments(), &mut rng, cancel);

    let (status, error, metrics, totals) = match outcome {
        Ok((output, _)) => (
            ScenarioStatus::Completed,
            None,
            Some(output.metrics),
            Some(output.totals),
        ),
        Err(e @ CpoFinanceError::Cancelled { .. }) => return Err(e),
        Err(e) => {
            tracing::warn!(scenario = %spec.name, error = %e, "scenario failed");
            (ScenarioStatus::Failed, Some(e.to_string()), None, None)
        }
    };

    Ok(ScenarioResult {
        name: spec.name.clone(),
        revenue_factor: spec.revenue_factor,
        cost_factor: spec.cost_factor,
        capex_factor: spec.capex_factor,
        probability: spec.probability,
        status,
        error,
        metrics,
        totals,
        npv_delta: None,
    })
}

/// Evaluate every scenario against `base` and collect one row each.
///
/// Each scenario owns an RNG seeded with `seed`, so all rows see the same
/// failure draws. Scenarios share no state; with the `parallel` feature they
/// run on the rayon pool and produce the same rows as a sequential run.
pub fn run(
    base: &AnalysisInput,
    scenarios: &[ScenarioSpec],
    seed: u64,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<(SensitivityOutput, Vec<String>)> {
    if scenarios.is_empty() {
        return Err(CpoFinanceError::invalid(
            "scenarios",
            "At least one scenario is required",
        ));
    }
    let mut warnings: Vec<String> = Vec::new();

    #[cfg(feature = "parallel")]
    let results: Vec<CpoFinanceResult<ScenarioResult>> = scenarios
        .par_iter()
        .map(|spec| evaluate_scenario(base, spec, seed, cancel))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<CpoFinanceResult<ScenarioResult>> = scenarios
        .iter()
        .map(|spec| evaluate_scenario(base, spec, seed, cancel))
        .collect();

    let mut rows = results.into_iter().collect::<CpoFinanceResult<Vec<_>>>()?;

    let failed_scenarios = rows
        .iter()
        .filter(|r| r.status == ScenarioStatus::Failed)
        .count() as u32;
    for row in rows.iter().filter(|r| r.status == ScenarioStatus::Failed) {
        warnings.push(format!(
            "Scenario '{}' failed: {}",
            row.name,
            row.error.as_deref().unwrap_or("unknown error")
        ));
    }

    let base_index = rows
        .iter()
        .position(|r| r.name.eq_ignore_ascii_case("base"))
        .unwrap_or(0);
    let base_npv = rows[base_index].npv();
    let base_scenario = base_npv.map(|_| rows[base_index].name.clone());
    if let Some(reference) = base_npv {
        for row in &mut rows {
            row.npv_delta = row.npv().and_then(|npv| npv.checked_sub(reference));
        }
    }

    let probability_weighted_npv = weighted_npv(&rows, &mut warnings);

    tracing::debug!(
        scenarios = rows.len(),
        failed = failed_scenarios,
        "sensitivity table built"
    );

    Ok((
        SensitivityOutput {
            scenarios: rows,
            base_scenario,
            probability_weighted_npv,
            failed_scenarios,
        },
        warnings,
    ))
}

fn weighted_npv(rows: &[ScenarioResult], warnings: &mut Vec<String>) -> Option<Money> {
    let weighted = rows.iter().filter(|r| r.probability.is_some()).count();
    if weighted == 0 {
        return None;
    }
    if weighted < rows.len() {
        warnings.push("Only some scenarios carry a probability; weighted NPV skipped".into());
        return None;
    }

    let Ok(total) = checked_sum(rows.iter().filter_map(|r| r.probability), "probabilities") else {
        warnings.push("Scenario probabilities overflow; weighted NPV skipped".into());
        return None;
    };
    if (total - Decimal::ONE).abs() > PROBABILITY_TOLERANCE {
        warnings.push(format!(
            "Scenario probabilities sum to {total}, not 1; weighted NPV skipped"
        ));
        return None;
    }

    let mut sum = Decimal::ZERO;
    for row in rows {
        let (Some(p), Some(npv)) = (row.probability, row.npv()) else {
            warnings.push("A weighted scenario failed; weighted NPV skipped".into());
            return None;
        };
        let Some(next) = p.checked_mul(npv).and_then(|v| sum.checked_add(v)) else {
            warnings.push("Weighted NPV overflows; skipped".into());
            return None;
        };
        sum = next;
    }
    Some(round_money(sum))
}

/// Scenario comparison wrapped in the standard envelope.
pub fn run_sensitivity(
    input: &SensitivityInput,
) -> CpoFinanceResult<ComputationOutput<SensitivityOutput>> {
    run_sensitivity_cancellable(input, None)
}

/// [`run_sensitivity`] with a cancellation token checked at every scenario
/// and year boundary.
pub fn run_sensitivity_cancellable(
    input: &SensitivityInput,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();

    let seed = input
        .seed
        .or_else(|| input.base.simulation.as_ref().and_then(|s| s.seed))
        .unwrap_or(0);
    let (output, warnings) = run(&input.base, &input.scenarios, seed, cancel)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario Sensitivity (pipeline re-run per revenue/cost/capex multiplier set)",
        &serde_json::json!({
            "scenarios": input.scenarios.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
            "seed": seed,
            "years": input.base.macro_params.years,
            "parallel": cfg!(feature = "parallel"),
        }),
        warnings,
        elapsed,
        output,
    ))
}
