use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::annual::{GrowthAssumptions, ProjectionDrivers};
use crate::cancel::{checkpoint, CancellationToken};
use crate::config::EngineConfig;
use crate::error::CpoFinanceError;
use crate::revenue::calendar::SeasonalFactors;
use crate::time_value::{checked_product, checked_sum, compound_factor};
use crate::types::*;
use crate::CpoFinanceResult;

const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyProjectionInput {
    pub start_date: NaiveDate,
    /// Defaults to `config.monthly_horizon`
    pub months: Option<u32>,
    pub investment_total: Money,
    /// Annual first-year figures
    pub drivers: ProjectionDrivers,
    pub growth: GrowthAssumptions,
    /// Annual debt service, index 0 = loan year 1
    #[serde(default)]
    pub loan_payments: Vec<Money>,
    /// Scale revenue and energy cost by the calendar month's factor
    #[serde(default)]
    pub apply_seasonality: bool,
    #[serde(default)]
    pub config: EngineConfig,
}

/// One month of the short-horizon projection. Month 0 carries the investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashFlow {
    pub month: u32,
    /// Calendar month, `YYYY-MM`
    pub label: String,
    pub seasonal_factor: Rate,
    pub revenue: Money,
    pub energy_cost: Money,
    pub maintenance_cost: Money,
    pub operating_cost: Money,
    pub loan_payment: Money,
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
}

fn month_date(start: NaiveDate, offset: u32) -> CpoFinanceResult<NaiveDate> {
    start.checked_add_months(Months::new(offset)).ok_or_else(|| {
        CpoFinanceError::DateError(format!("{start} plus {offset} months is out of range"))
    })
}

/// Monthly cash flows from `start_date`.
///
/// Month `m` takes a twelfth of the annual drivers compounded at the annual
/// rates divided by 12 for `m - 1` months; the loan payment is a twelfth of
/// the enclosing loan year's payment.
pub fn project_monthly(
    input: &MonthlyProjectionInput,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<Vec<MonthlyCashFlow>> {
    input.config.validate()?;
    input.growth.validate()?;
    let months = input.months.unwrap_or(input.config.monthly_horizon);
    if months == 0 {
        return Err(CpoFinanceError::invalid(
            "months",
            "Monthly horizon must be at least 1 month",
        ));
    }

    let per_year = Decimal::from(MONTHS_PER_YEAR);
    let growth = &input.growth;
    let g = growth.growth_rate / per_year;
    let p = growth.price_escalation_rate / per_year;
    let e = growth.energy_price_escalation_rate / per_year;
    let i = growth.inflation_rate / per_year;
    let factors: &SeasonalFactors = &input.config.seasonal_factors;

    let monthly_revenue = input.drivers.base_revenue / per_year;
    let monthly_energy = input.drivers.base_energy_cost / per_year;
    let monthly_maintenance = input.drivers.base_maintenance_cost / per_year;

    let mut rows = Vec::with_capacity(months as usize + 1);
    let mut cumulative = -input.investment_total;
    rows.push(MonthlyCashFlow {
        month: 0,
        label: input.start_date.format("%Y-%m").to_string(),
        seasonal_factor: Decimal::ONE,
        revenue: Decimal::ZERO,
        energy_cost: Decimal::ZERO,
        maintenance_cost: Decimal::ZERO,
        operating_cost: Decimal::ZERO,
        loan_payment: Decimal::ZERO,
        net_cash_flow: cumulative,
        cumulative_cash_flow: cumulative,
    });

    for month in 1..=months {
        checkpoint(cancel, "monthly projection")?;
        let elapsed = month - 1;
        let date = month_date(input.start_date, elapsed)?;

        let seasonal_factor = if input.apply_seasonality {
            factors.factor(date.month())
        } else {
            Decimal::ONE
        };
        let usage = compound_factor(g, elapsed)?;

        let revenue = round_money(checked_product(
            &[monthly_revenue, usage, compound_factor(p, elapsed)?, seasonal_factor],
            "monthly revenue",
        )?);
        let energy_cost = round_money(checked_product(
            &[monthly_energy, usage, compound_factor(e, elapsed)?, seasonal_factor],
            "monthly energy cost",
        )?);
        let maintenance_cost = round_money(checked_product(
            &[monthly_maintenance, compound_factor(i, elapsed)?],
            "monthly maintenance cost",
        )?);
        let operating_cost = checked_sum([energy_cost, maintenance_cost], "monthly operating cost")?;

        let loan_year = (elapsed / MONTHS_PER_YEAR) as usize;
        let loan_payment = round_money(
            input
                .loan_payments
                .get(loan_year)
                .copied()
                .unwrap_or(Decimal::ZERO)
                / per_year,
        );

        let net_cash_flow = checked_sum(
            [revenue, -operating_cost, -loan_payment],
            "monthly net cash flow",
        )?;
        cumulative = checked_sum([cumulative, net_cash_flow], "monthly cumulative cash flow")?;

        rows.push(MonthlyCashFlow {
            month,
            label: date.format("%Y-%m").to_string(),
            seasonal_factor,
            revenue,
            energy_cost,
            maintenance_cost,
            operating_cost,
            loan_payment,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
        });
    }

    tracing::debug!(months, start = %input.start_date, "monthly cash flows projected");
    Ok(rows)
}

/// Monthly projection wrapped in the standard envelope.
pub fn project_monthly_cash_flows(
    input: &MonthlyProjectionInput,
) -> CpoFinanceResult<ComputationOutput<Vec<MonthlyCashFlow>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let rows = project_monthly(input, None)?;
    if !input.apply_seasonality {
        warnings.push("Seasonality off: every month is a flat twelfth of the year".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly Cash Flow Projection (annual drivers / 12, monthly compounding)",
        &serde_json::json!({
            "start_date": input.start_date.to_string(),
            "months": rows.len() - 1,
            "apply_seasonality": input.apply_seasonality,
        }),
        warnings,
        elapsed,
        rows,
    ))
}
