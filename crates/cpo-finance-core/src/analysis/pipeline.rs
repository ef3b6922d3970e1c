use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cancel::{checkpoint, CancellationToken};
use crate::config::EngineConfig;
use crate::cost::investment::Investment;
use crate::cost::operating::annual_operating_cost;
use crate::error::CpoFinanceError;
use crate::financing::amortization::{loan_payments_by_year, schedule, AmortizationSchedule, LoanTerms};
use crate::metrics::investment_metrics::{compute, FinancialMetrics, IrrMode};
use crate::projection::annual::{
    project, projection_totals, CashFlowPeriod, GrowthAssumptions, ProjectionDrivers,
    ProjectionInput, ProjectionTotals,
};
use crate::projection::monthly::{project_monthly, MonthlyCashFlow, MonthlyProjectionInput};
use crate::revenue::usage::{
    compute_annual_revenue, daily_revenue, RevenueOptions, UtilizationProfile,
};
use crate::simulation::failure::{
    simulate, FailureMix, FailureParameters, FailureSimulation, RepairCostBounds, SimulatedEntity,
};
use crate::simulation::rng::{RandomSource, StdRandom};
use crate::types::*;
use crate::CpoFinanceResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One charging station of the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationInput {
    pub name: String,
    pub investment: Investment,
    pub profile: UtilizationProfile,
    /// Basis for maintenance and repair cost; defaults to the equipment cost
    pub station_cost: Option<Money>,
}

impl StationInput {
    pub fn station_cost(&self) -> Money {
        self.station_cost
            .unwrap_or_else(|| self.investment.equipment_cost())
    }
}

/// Macro-economic and horizon assumptions. Rates are decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroParameters {
    #[serde(default)]
    pub growth_rate: Rate,
    #[serde(default)]
    pub inflation_rate: Rate,
    #[serde(default)]
    pub price_escalation_rate: Rate,
    #[serde(default)]
    pub energy_price_escalation_rate: Rate,
    /// Defaults to `config.discount_rate`
    pub discount_rate: Option<Rate>,
    /// First-year failure probability per station
    #[serde(default)]
    pub failure_probability: Rate,
    /// Defaults to `config.repair_cost_bounds`
    pub repair_cost_bounds: Option<RepairCostBounds>,
    pub years: u32,
}

impl MacroParameters {
    fn growth(&self) -> GrowthAssumptions {
        GrowthAssumptions {
            growth_rate: self.growth_rate,
            inflation_rate: self.inflation_rate,
            price_escalation_rate: self.price_escalation_rate,
            energy_price_escalation_rate: self.energy_price_escalation_rate,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Enables the failure simulation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Omit for a non-reproducible run
    pub seed: Option<u64>,
    #[serde(default)]
    pub failure_mix: Option<FailureMix>,
    /// Book repair costs and downtime losses in the cash-flow table
    #[serde(default = "default_true")]
    pub include_in_cash_flow: bool,
}

/// Enables the monthly projection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySettings {
    pub start_date: NaiveDate,
    /// Defaults to `config.monthly_horizon`
    pub months: Option<u32>,
    #[serde(default)]
    pub apply_seasonality: bool,
}

/// Everything a full analysis run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub name: String,
    pub stations: Vec<StationInput>,
    pub loan: Option<LoanTerms>,
    pub macro_params: MacroParameters,
    #[serde(default)]
    pub revenue_options: RevenueOptions,
    #[serde(default)]
    pub simulation: Option<SimulationSettings>,
    #[serde(default)]
    pub monthly: Option<MonthlySettings>,
    #[serde(default)]
    pub config: EngineConfig,
}

/// Multipliers a scenario applies on top of the base assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAdjustments {
    /// Revenue and downtime losses
    pub revenue_factor: Multiple,
    /// Energy, maintenance and repair cost
    pub cost_factor: Multiple,
    /// Capital investment
    pub capex_factor: Multiple,
}

impl Default for ScenarioAdjustments {
    fn default() -> Self {
        ScenarioAdjustments {
            revenue_factor: Decimal::ONE,
            cost_factor: Decimal::ONE,
            capex_factor: Decimal::ONE,
        }
    }
}

impl ScenarioAdjustments {
    pub fn validate(&self) -> CpoFinanceResult<()> {
        for (name, factor) in [
            ("revenue_factor", self.revenue_factor),
            ("cost_factor", self.cost_factor),
            ("capex_factor", self.capex_factor),
        ] {
            if factor < Decimal::ZERO {
                return Err(CpoFinanceError::invalid(name, "Scenario factor cannot be negative"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// First-year economics of one station, before growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub investment_total: Money,
    pub station_cost: Money,
    pub annual_revenue: Money,
    pub annual_energy_cost: Money,
    pub annual_maintenance_cost: Money,
    pub annual_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub name: String,
    pub investment_total: Money,
    pub loan_amount: Money,
    pub stations: Vec<StationSummary>,
    pub cash_flows: Vec<CashFlowPeriod>,
    pub totals: ProjectionTotals,
    pub metrics: FinancialMetrics,
    pub amortization: Option<AmortizationSchedule>,
    pub failures: Option<FailureSimulation>,
    pub monthly: Option<Vec<MonthlyCashFlow>>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn validate_analysis_input(input: &AnalysisInput) -> CpoFinanceResult<()> {
    input.config.validate()?;
    if input.stations.is_empty() {
        return Err(CpoFinanceError::invalid(
            "stations",
            "At least one station is required",
        ));
    }
    for (i, station) in input.stations.iter().enumerate() {
        station.investment.validate(&format!("stations[{i}].investment"))?;
        station.profile.validate(&format!("stations[{i}].profile"))?;
        if station.station_cost() < Decimal::ZERO {
            return Err(CpoFinanceError::invalid(
                format!("stations[{i}].station_cost"),
                "Station cost cannot be negative",
            ));
        }
    }
    if input.macro_params.years == 0 {
        return Err(CpoFinanceError::invalid(
            "macro_params.years",
            "Projection horizon must be at least 1 year",
        ));
    }
    let fp = input.macro_params.failure_probability;
    if fp < Decimal::ZERO || fp > Decimal::ONE {
        return Err(CpoFinanceError::invalid(
            "macro_params.failure_probability",
            "Failure probability must be between 0 and 1",
        ));
    }
    Ok(())
}

/// Run every stage for one set of assumptions.
///
/// Stages: per-station revenue and operating cost, loan schedule, failure
/// simulation (drawing from `rng`), annual projection, metrics and the
/// optional monthly projection. `rng` is only consumed when
/// `input.simulation` is set.
pub fn run_analysis_with<R: RandomSource + ?Sized>(
    input: &AnalysisInput,
    adjustments: &ScenarioAdjustments,
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<(AnalysisOutput, Vec<String>)> {
    validate_analysis_input(input)?;
    adjustments.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let config = &input.config;
    let params = &input.macro_params;
    let options = input.revenue_options;

    // Stations
    if options.include_availability && options.include_seasonality {
        warnings.push(
            "Seasonal revenue uses 12 x 30-day months while availability uses a 365-day year; \
             the two day counts are not reconciled"
                .into(),
        );
    }

    let mut stations = Vec::with_capacity(input.stations.len());
    let mut base_revenue = Decimal::ZERO;
    let mut base_energy_cost = Decimal::ZERO;
    let mut base_maintenance_cost = Decimal::ZERO;
    let mut investment_total = Decimal::ZERO;

    for station in &input.stations {
        let station_cost = station.station_cost();
        let revenue = compute_annual_revenue(
            &station.profile,
            options.include_availability,
            options.include_seasonality,
            &config.seasonal_factors,
        );
        let cost = annual_operating_cost(
            &station.profile,
            station.profile.energy_cost_per_kwh,
            station_cost,
            config.maintenance_pct,
        );

        base_revenue += revenue;
        base_energy_cost += cost.energy_cost;
        base_maintenance_cost += cost.maintenance_cost;
        investment_total += station.investment.total();

        stations.push(StationSummary {
            name: station.name.clone(),
            investment_total: round_money(station.investment.total()),
            station_cost,
            annual_revenue: round_money(revenue),
            annual_energy_cost: round_money(cost.energy_cost),
            annual_maintenance_cost: round_money(cost.maintenance_cost),
            annual_profit: round_money(revenue) - round_money(cost.total),
        });
    }
    let investment_total = round_money(investment_total * adjustments.capex_factor);
    tracing::debug!(stations = stations.len(), %investment_total, "station economics aggregated");

    // Loan
    checkpoint(cancel, "loan schedule")?;
    let amortization = match &input.loan {
        Some(terms) if terms.principal.is_zero() => {
            warnings.push("Loan principal is zero; analysis runs without financing".into());
            None
        }
        Some(terms) => Some(schedule(terms)?),
        None => None,
    };
    let loan_amount = amortization
        .as_ref()
        .and(input.loan.as_ref())
        .map(|t| t.principal)
        .unwrap_or(Decimal::ZERO);
    let loan_payments = amortization
        .as_ref()
        .map(|s| loan_payments_by_year(s, params.years))
        .unwrap_or_default();
    if let Some(terms) = &input.loan {
        if terms.term_years > params.years {
            warnings.push(format!(
                "Loan term of {} years exceeds the {}-year horizon; later payments are not projected",
                terms.term_years, params.years
            ));
        }
    }

    // Failures
    let failures = match &input.simulation {
        Some(settings) => {
            let entities: Vec<SimulatedEntity> = input
                .stations
                .iter()
                .map(|s| SimulatedEntity {
                    name: s.name.clone(),
                    cost: s.station_cost(),
                    daily_revenue: Some(daily_revenue(&s.profile)),
                })
                .collect();
            let failure_params = FailureParameters {
                failure_probability: params.failure_probability,
                age_increment: config.failure_age_increment,
                repair_cost_bounds: params
                    .repair_cost_bounds
                    .clone()
                    .unwrap_or_else(|| config.repair_cost_bounds.clone()),
                retirement_probability: config.retirement_probability,
                failure_mix: settings.failure_mix.clone(),
            };
            Some(simulate(&entities, params.years, &failure_params, rng, cancel)?)
        }
        None => None,
    };
    let fold_failures = input
        .simulation
        .as_ref()
        .is_some_and(|s| s.include_in_cash_flow);
    let (repair_costs, revenue_losses) = match (&failures, fold_failures) {
        (Some(sim), true) => (
            scale(&sim.repair_costs(), adjustments.cost_factor),
            scale(&sim.revenue_losses(), adjustments.revenue_factor),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    // Projection
    let drivers = ProjectionDrivers {
        base_revenue: base_revenue * adjustments.revenue_factor,
        base_energy_cost: base_energy_cost * adjustments.cost_factor,
        base_maintenance_cost: base_maintenance_cost * adjustments.cost_factor,
    };
    let projection_input = ProjectionInput {
        investment_total,
        drivers: drivers.clone(),
        growth: params.growth(),
        years: params.years,
        loan_payments: loan_payments.clone(),
        repair_costs,
        revenue_losses,
    };
    let cash_flows = project(&projection_input, cancel)?;
    let totals = projection_totals(&cash_flows)?;

    // Metrics
    checkpoint(cancel, "metrics")?;
    let discount_rate = params.discount_rate.unwrap_or(config.discount_rate);
    let (metrics, metric_warnings) = compute(
        &cash_flows,
        discount_rate,
        investment_total,
        loan_amount,
        IrrMode::from_config(config),
    )?;
    warnings.extend(metric_warnings);

    // Monthly
    let monthly = match &input.monthly {
        Some(settings) => Some(project_monthly(
            &MonthlyProjectionInput {
                start_date: settings.start_date,
                months: settings.months,
                investment_total,
                drivers,
                growth: params.growth(),
                loan_payments,
                apply_seasonality: settings.apply_seasonality,
                config: config.clone(),
            },
            cancel,
        )?),
        None => None,
    };

    tracing::info!(
        name = %input.name,
        years = params.years,
        npv = %metrics.npv,
        "analysis complete"
    );

    Ok((
        AnalysisOutput {
            name: input.name.clone(),
            investment_total,
            loan_amount,
            stations,
            cash_flows,
            totals,
            metrics,
            amortization,
            failures,
            monthly,
        },
        warnings,
    ))
}

fn scale(values: &[Money], factor: Multiple) -> Vec<Money> {
    values.iter().map(|v| *v * factor).collect()
}

/// Full analysis with base assumptions, wrapped in the standard envelope.
pub fn run_analysis(input: &AnalysisInput) -> CpoFinanceResult<ComputationOutput<AnalysisOutput>> {
    run_analysis_cancellable(input, None)
}

/// [`run_analysis`] with a cancellation token checked at each year boundary.
pub fn run_analysis_cancellable(
    input: &AnalysisInput,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<ComputationOutput<AnalysisOutput>> {
    let start = Instant::now();

    let seed = input.simulation.as_ref().and_then(|s| s.seed);
    let mut rng = match seed {
        Some(seed) => StdRandom::seeded(seed),
        None => StdRandom::from_entropy(),
    };

    let (output, mut warnings) =
        run_analysis_with(input, &ScenarioAdjustments::default(), &mut rng, cancel)?;
    if input.simulation.is_some() && seed.is_none() {
        warnings.push("Failure simulation has no seed; results are not reproducible".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Charging Project Investment Analysis (revenue, opex, loan, failures, cash flow, metrics)",
        &serde_json::json!({
            "stations": input.stations.len(),
            "years": input.macro_params.years,
            "growth_rate": input.macro_params.growth_rate.to_string(),
            "inflation_rate": input.macro_params.inflation_rate.to_string(),
            "price_escalation_rate": input.macro_params.price_escalation_rate.to_string(),
            "discount_rate": input
                .macro_params
                .discount_rate
                .unwrap_or(input.config.discount_rate)
                .to_string(),
            "include_availability": input.revenue_options.include_availability,
            "include_seasonality": input.revenue_options.include_seasonality,
            "failure_simulation": input.simulation.is_some(),
            "seed": seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}
