use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::CpoFinanceError;
use crate::revenue::calendar::DAYS_PER_YEAR;
use crate::revenue::usage::{compute_annual_revenue, RevenueOptions, UtilizationProfile};
use crate::types::*;
use crate::CpoFinanceResult;

/// Recurring cost of running one station for a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingCost {
    pub energy_cost: Money,
    pub maintenance_cost: Money,
    pub total: Money,
}

/// `energy = energy_cost_kwh * kwh_per_session * sessions_per_day * 365`,
/// `maintenance = station_cost * maintenance_pct`.
pub fn annual_operating_cost(
    profile: &UtilizationProfile,
    energy_cost_kwh: Money,
    station_cost: Money,
    maintenance_pct: Rate,
) -> OperatingCost {
    let energy_cost = energy_cost_kwh * profile.daily_energy_kwh() * Decimal::from(DAYS_PER_YEAR);
    let maintenance_cost = station_cost * maintenance_pct;
    OperatingCost {
        energy_cost,
        maintenance_cost,
        total: energy_cost + maintenance_cost,
    }
}

/// Input for a single-station operating cost and profit estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingCostInput {
    pub profile: UtilizationProfile,
    /// Station (equipment) cost that maintenance is a share of
    pub station_cost: Money,
    /// Overrides `config.maintenance_pct`
    pub maintenance_pct: Option<Rate>,
    #[serde(default)]
    pub revenue_options: RevenueOptions,
    #[serde(default)]
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingCostOutput {
    pub annual_revenue: Money,
    pub energy_cost: Money,
    pub maintenance_cost: Money,
    pub annual_operating_cost: Money,
    pub annual_profit: Money,
    /// Profit as a percentage of revenue, undefined without revenue
    pub operating_margin_pct: Option<Rate>,
}

/// Annual revenue, operating cost and profit of one station.
pub fn estimate_operating_cost(
    input: &OperatingCostInput,
) -> CpoFinanceResult<ComputationOutput<OperatingCostOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.profile.validate("profile")?;
    input.config.validate()?;
    if input.station_cost < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "station_cost",
            "Station cost cannot be negative",
        ));
    }
    let maintenance_pct = input.maintenance_pct.unwrap_or(input.config.maintenance_pct);
    if maintenance_pct < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "maintenance_pct",
            "Maintenance percentage cannot be negative",
        ));
    }

    let revenue = compute_annual_revenue(
        &input.profile,
        input.revenue_options.include_availability,
        input.revenue_options.include_seasonality,
        &input.config.seasonal_factors,
    );
    let cost = annual_operating_cost(
        &input.profile,
        input.profile.energy_cost_per_kwh,
        input.station_cost,
        maintenance_pct,
    );

    let annual_revenue = round_money(revenue);
    let annual_operating_cost = round_money(cost.total);
    let annual_profit = annual_revenue - annual_operating_cost;

    let operating_margin_pct = if annual_revenue.is_zero() {
        warnings.push("Annual revenue is zero; operating margin is undefined".into());
        None
    } else {
        Some(round_pct(annual_profit / annual_revenue * Decimal::ONE_HUNDRED))
    };
    if annual_profit < Decimal::ZERO {
        warnings.push(format!(
            "Operating cost exceeds revenue by {}",
            -annual_profit
        ));
    }

    let output = OperatingCostOutput {
        annual_revenue,
        energy_cost: round_money(cost.energy_cost),
        maintenance_cost: round_money(cost.maintenance_cost),
        annual_operating_cost,
        annual_profit,
        operating_margin_pct,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Station Operating Cost (energy purchase + maintenance as % of station cost)",
        &serde_json::json!({
            "energy_cost_per_kwh": input.profile.energy_cost_per_kwh.to_string(),
            "station_cost": input.station_cost.to_string(),
            "maintenance_pct": maintenance_pct.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
