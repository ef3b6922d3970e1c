use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::rng::{RandomSource, StdRandom};
use crate::cancel::{checkpoint, CancellationToken};
use crate::config::EngineConfig;
use crate::error::CpoFinanceError;
use crate::types::*;
use crate::CpoFinanceResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Anything that can fail and be repaired: normally one charging station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedEntity {
    pub name: String,
    /// Replacement cost; repair costs are fractions of it
    pub cost: Money,
    /// Revenue lost per day of downtime
    #[serde(default)]
    pub daily_revenue: Option<Money>,
}

/// Repair cost range as fractions of entity cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairCostBounds {
    pub low: Rate,
    pub high: Rate,
}

impl Default for RepairCostBounds {
    fn default() -> Self {
        RepairCostBounds {
            low: dec!(0.05),
            high: dec!(0.20),
        }
    }
}

impl RepairCostBounds {
    pub fn midpoint(&self) -> Rate {
        (self.low + self.high) / dec!(2)
    }

    pub fn validate(&self) -> CpoFinanceResult<()> {
        if self.low < Decimal::ZERO {
            return Err(CpoFinanceError::invalid(
                "repair_cost_bounds.low",
                "Repair cost fraction cannot be negative",
            ));
        }
        if self.high < self.low {
            return Err(CpoFinanceError::invalid(
                "repair_cost_bounds.high",
                "Upper repair bound must not be below the lower bound",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Minor,
    Major,
    Replacement,
}

/// Share of failures by severity (percent, summing to 100) and the downtime
/// each severity causes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureMix {
    pub minor_pct: Rate,
    pub major_pct: Rate,
    pub replacement_pct: Rate,
    pub minor_downtime_days: u32,
    pub major_downtime_days: u32,
    pub replacement_downtime_days: u32,
}

impl Default for FailureMix {
    fn default() -> Self {
        FailureMix {
            minor_pct: dec!(70),
            major_pct: dec!(25),
            replacement_pct: dec!(5),
            minor_downtime_days: 2,
            major_downtime_days: 7,
            replacement_downtime_days: 14,
        }
    }
}

impl FailureMix {
    pub fn validate(&self) -> CpoFinanceResult<()> {
        let shares = [self.minor_pct, self.major_pct, self.replacement_pct];
        if shares.iter().any(|s| *s < Decimal::ZERO) {
            return Err(CpoFinanceError::invalid(
                "failure_mix",
                "Failure type shares cannot be negative",
            ));
        }
        let sum: Decimal = shares.iter().sum();
        if (sum - Decimal::ONE_HUNDRED).abs() > dec!(0.01) {
            return Err(CpoFinanceError::invalid(
                "failure_mix",
                format!("Failure type shares must sum to 100, got {sum}"),
            ));
        }
        Ok(())
    }

    fn downtime_days(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::Minor => self.minor_downtime_days,
            FailureKind::Major => self.major_downtime_days,
            FailureKind::Replacement => self.replacement_downtime_days,
        }
    }

    fn classify(&self, draw_pct: f64) -> FailureKind {
        let minor = self.minor_pct.to_f64().unwrap_or(0.0);
        let major = self.major_pct.to_f64().unwrap_or(0.0);
        if draw_pct < minor {
            FailureKind::Minor
        } else if draw_pct < minor + major {
            FailureKind::Major
        } else {
            FailureKind::Replacement
        }
    }
}

/// Resolved simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureParameters {
    /// Failure probability in the first year, as a decimal
    pub failure_probability: Rate,
    /// Added to the probability for each further year
    pub age_increment: Rate,
    pub repair_cost_bounds: RepairCostBounds,
    /// Chance that a failed entity is retired for good
    pub retirement_probability: Rate,
    /// Severity classification; `None` draws every repair from the bounds
    pub failure_mix: Option<FailureMix>,
}

impl FailureParameters {
    /// Probability for a 1-based year, capped at 1.
    pub fn probability_for_year(&self, year: u32) -> Rate {
        let aged = self.failure_probability + self.age_increment * Decimal::from(year.saturating_sub(1));
        aged.min(Decimal::ONE)
    }

    pub fn validate(&self) -> CpoFinanceResult<()> {
        if self.failure_probability < Decimal::ZERO || self.failure_probability > Decimal::ONE {
            return Err(CpoFinanceError::invalid(
                "failure_probability",
                "Failure probability must be between 0 and 1",
            ));
        }
        if self.age_increment < Decimal::ZERO {
            return Err(CpoFinanceError::invalid(
                "age_increment",
                "Age increment cannot be negative",
            ));
        }
        if self.retirement_probability < Decimal::ZERO || self.retirement_probability > Decimal::ONE {
            return Err(CpoFinanceError::invalid(
                "retirement_probability",
                "Retirement probability must be between 0 and 1",
            ));
        }
        self.repair_cost_bounds.validate()?;
        if let Some(mix) = &self.failure_mix {
            mix.validate()?;
        }
        Ok(())
    }
}

/// Failures booked in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub period: u32,
    pub failure_count: u32,
    pub repair_cost: Money,
    pub retired_count: u32,
    /// At least one entity was retired this period
    pub permanent_retirement: bool,
    /// Entities in service at the start of the period
    pub active_entities: u32,
    /// Failure probability applied this period
    pub failure_rate: Rate,
    /// Revenue lost to downtime
    pub revenue_loss: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub total_failures: u32,
    pub total_repair_cost: Money,
    pub total_revenue_loss: Money,
    /// Repair cost plus revenue loss
    pub total_impact: Money,
    pub retired_entities: u32,
    pub average_yearly_failures: Decimal,
    pub average_yearly_cost: Money,
    pub average_failures_per_entity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSimulation {
    pub events: Vec<FailureEvent>,
    pub summary: FailureSummary,
}

impl FailureSimulation {
    pub fn repair_costs(&self) -> Vec<Money> {
        self.events.iter().map(|e| e.repair_cost).collect()
    }

    pub fn revenue_losses(&self) -> Vec<Money> {
        self.events.iter().map(|e| e.revenue_loss).collect()
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

fn to_decimal(x: f64) -> Decimal {
    Decimal::from_f64(x).unwrap_or(Decimal::ZERO)
}

fn to_f64(x: Decimal) -> f64 {
    x.to_f64().unwrap_or(0.0)
}

/// Simulate `years` periods of failures over `entities`.
///
/// Per active entity and year: one draw against the year's probability; on a
/// failure, a repair cost fraction (and severity, with a mix), then a
/// retirement draw. Retired entities drop out of later years. Draw order is
/// fixed so a seeded source reproduces the same events.
pub fn simulate<R: RandomSource + ?Sized>(
    entities: &[SimulatedEntity],
    years: u32,
    params: &FailureParameters,
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<FailureSimulation> {
    if years == 0 {
        return Err(CpoFinanceError::invalid(
            "years",
            "Simulation horizon must be at least 1 year",
        ));
    }
    params.validate()?;

    let low = to_f64(params.repair_cost_bounds.low);
    let high = to_f64(params.repair_cost_bounds.high);
    let mid = to_f64(params.repair_cost_bounds.midpoint());
    let retirement = to_f64(params.retirement_probability);

    let mut active = vec![true; entities.len()];
    let mut events = Vec::with_capacity(years as usize);

    for year in 1..=years {
        checkpoint(cancel, "failure simulation")?;

        let failure_rate = params.probability_for_year(year);
        let threshold = to_f64(failure_rate);
        let active_entities = active.iter().filter(|a| **a).count() as u32;

        let mut failure_count = 0u32;
        let mut retired_count = 0u32;
        let mut repair_cost = Decimal::ZERO;
        let mut revenue_loss = Decimal::ZERO;

        for (entity, in_service) in entities.iter().zip(active.iter_mut()) {
            if !*in_service || rng.next_unit() >= threshold {
                continue;
            }
            failure_count += 1;

            let (fraction, downtime_days) = match &params.failure_mix {
                None => (to_decimal(rng.uniform(low, high)), 0),
                Some(mix) => {
                    let kind = mix.classify(rng.next_unit() * 100.0);
                    let fraction = match kind {
                        FailureKind::Minor => to_decimal(rng.uniform(low, mid)),
                        FailureKind::Major => to_decimal(rng.uniform(mid, high)),
                        FailureKind::Replacement => Decimal::ONE,
                    };
                    (fraction, mix.downtime_days(kind))
                }
            };
            repair_cost += entity.cost * fraction;
            if let Some(daily) = entity.daily_revenue {
                revenue_loss += daily * Decimal::from(downtime_days);
            }

            if rng.next_unit() < retirement {
                *in_service = false;
                retired_count += 1;
            }
        }

        events.push(FailureEvent {
            period: year,
            failure_count,
            repair_cost: round_money(repair_cost),
            retired_count,
            permanent_retirement: retired_count > 0,
            active_entities,
            failure_rate,
            revenue_loss: round_money(revenue_loss),
        });
    }

    let summary = summarize(&events, years, entities.len());
    tracing::debug!(
        years,
        entities = entities.len(),
        failures = summary.total_failures,
        retired = summary.retired_entities,
        "failure simulation finished"
    );

    Ok(FailureSimulation { events, summary })
}

fn summarize(events: &[FailureEvent], years: u32, entity_count: usize) -> FailureSummary {
    let total_failures: u32 = events.iter().map(|e| e.failure_count).sum();
    let total_repair_cost: Money = events.iter().map(|e| e.repair_cost).sum();
    let total_revenue_loss: Money = events.iter().map(|e| e.revenue_loss).sum();
    let retired_entities: u32 = events.iter().map(|e| e.retired_count).sum();
    let year_count = Decimal::from(years.max(1));

    FailureSummary {
        total_failures,
        total_repair_cost,
        total_revenue_loss,
        total_impact: total_repair_cost + total_revenue_loss,
        retired_entities,
        average_yearly_failures: round_pct(Decimal::from(total_failures) / year_count),
        average_yearly_cost: round_money(total_repair_cost / year_count),
        average_failures_per_entity: (entity_count > 0)
            .then(|| round_pct(Decimal::from(total_failures) / Decimal::from(entity_count as u64))),
    }
}

// ---------------------------------------------------------------------------
// Top-level operation
// ---------------------------------------------------------------------------

/// Input for a standalone failure simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSimulationInput {
    pub entities: Vec<SimulatedEntity>,
    pub years: u32,
    /// First-year failure probability as a decimal (0.02 = 2%)
    pub failure_probability: Rate,
    /// Defaults to `config.failure_age_increment`
    pub age_increment: Option<Rate>,
    /// Defaults to `config.repair_cost_bounds`
    pub repair_cost_bounds: Option<RepairCostBounds>,
    /// Defaults to `config.retirement_probability`
    pub retirement_probability: Option<Rate>,
    #[serde(default)]
    pub failure_mix: Option<FailureMix>,
    /// Omit for an unseeded, non-reproducible run
    pub seed: Option<u64>,
    #[serde(default)]
    pub config: EngineConfig,
}

impl FailureSimulationInput {
    pub fn parameters(&self) -> FailureParameters {
        FailureParameters {
            failure_probability: self.failure_probability,
            age_increment: self.age_increment.unwrap_or(self.config.failure_age_increment),
            repair_cost_bounds: self
                .repair_cost_bounds
                .clone()
                .unwrap_or_else(|| self.config.repair_cost_bounds.clone()),
            retirement_probability: self
                .retirement_probability
                .unwrap_or(self.config.retirement_probability),
            failure_mix: self.failure_mix.clone(),
        }
    }

    pub(crate) fn validate(&self) -> CpoFinanceResult<()> {
        self.config.validate()?;
        for (i, entity) in self.entities.iter().enumerate() {
            if entity.cost < Decimal::ZERO {
                return Err(CpoFinanceError::invalid(
                    format!("entities[{i}].cost"),
                    "Entity cost cannot be negative",
                ));
            }
        }
        self.parameters().validate()
    }
}

/// Run one failure simulation and wrap it in the standard envelope.
pub fn simulate_failures(
    input: &FailureSimulationInput,
) -> CpoFinanceResult<ComputationOutput<FailureSimulation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.validate()?;
    let params = input.parameters();

    if input.entities.is_empty() {
        warnings.push("No entities to simulate; all periods are empty".into());
    }
    let mut rng = match input.seed {
        Some(seed) => StdRandom::seeded(seed),
        None => {
            warnings.push("No seed given; results are not reproducible".into());
            StdRandom::from_entropy()
        }
    };

    let result = simulate(&input.entities, input.years, &params, &mut rng, None)?;

    if result.summary.retired_entities > 0 {
        warnings.push(format!(
            "{} of {} entities permanently retired over {} years",
            result.summary.retired_entities,
            input.entities.len(),
            input.years
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stochastic Failure Simulation (age-weighted Bernoulli failures, uniform repair cost)",
        &serde_json::json!({
            "entities": input.entities.len(),
            "years": input.years,
            "failure_probability": params.failure_probability.to_string(),
            "age_increment": params.age_increment.to_string(),
            "retirement_probability": params.retirement_probability.to_string(),
            "failure_mix": params.failure_mix.is_some(),
            "seed": input.seed,
        }),
        warnings,
        elapsed,
        result,
    ))
}
