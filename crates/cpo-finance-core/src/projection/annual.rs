use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cancel::{checkpoint, CancellationToken};
use crate::error::CpoFinanceError;
use crate::time_value::{checked_product, checked_sum, compound_factor};
use crate::types::*;
use crate::CpoFinanceResult;

/// First-year figures that the projection grows from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDrivers {
    pub base_revenue: Money,
    pub base_energy_cost: Money,
    pub base_maintenance_cost: Money,
}

/// Annual compounding rates, as decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthAssumptions {
    /// Usage growth, applied to revenue and energy cost
    pub growth_rate: Rate,
    /// Applied to maintenance cost
    pub inflation_rate: Rate,
    /// Charging tariff escalation, applied to revenue
    pub price_escalation_rate: Rate,
    /// Energy purchase price escalation, applied to energy cost
    #[serde(default)]
    pub energy_price_escalation_rate: Rate,
}

impl GrowthAssumptions {
    pub fn validate(&self) -> CpoFinanceResult<()> {
        let rates = [
            ("growth_rate", self.growth_rate),
            ("inflation_rate", self.inflation_rate),
            ("price_escalation_rate", self.price_escalation_rate),
            ("energy_price_escalation_rate", self.energy_price_escalation_rate),
        ];
        for (name, rate) in rates {
            if rate <= dec!(-1) {
                return Err(CpoFinanceError::invalid(name, "Rate must be greater than -100%"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub investment_total: Money,
    pub drivers: ProjectionDrivers,
    pub growth: GrowthAssumptions,
    pub years: u32,
    /// Debt service per year, index 0 = year 1; missing years pay nothing
    #[serde(default)]
    pub loan_payments: Vec<Money>,
    /// Simulated repair cost per year, index 0 = year 1
    #[serde(default)]
    pub repair_costs: Vec<Money>,
    /// Revenue lost to downtime per year, index 0 = year 1
    #[serde(default)]
    pub revenue_losses: Vec<Money>,
}

/// One row of the cash-flow table. Period 0 carries the investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub period: u32,
    /// Net of downtime losses
    pub revenue: Money,
    pub energy_cost: Money,
    pub maintenance_cost: Money,
    pub repair_cost: Money,
    /// `energy_cost + maintenance_cost + repair_cost`
    pub operating_cost: Money,
    pub loan_payment: Money,
    pub net_cash_flow: Money,
    pub cumulative_cash_flow: Money,
}

impl CashFlowPeriod {
    fn investment(total: Money) -> Self {
        CashFlowPeriod {
            period: 0,
            revenue: Decimal::ZERO,
            energy_cost: Decimal::ZERO,
            maintenance_cost: Decimal::ZERO,
            repair_cost: Decimal::ZERO,
            operating_cost: Decimal::ZERO,
            loan_payment: Decimal::ZERO,
            net_cash_flow: -total,
            cumulative_cash_flow: -total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionTotals {
    pub total_revenue: Money,
    /// Operating cost plus debt service
    pub total_costs: Money,
    pub total_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowProjection {
    pub periods: Vec<CashFlowPeriod>,
    pub totals: ProjectionTotals,
}

fn year_value(values: &[Money], year: u32) -> Money {
    values
        .get((year - 1) as usize)
        .copied()
        .unwrap_or(Decimal::ZERO)
}

/// Build the `years + 1` row cash-flow table.
///
/// Year `t` grows revenue by `(1+g)^(t-1) * (1+p)^(t-1)`, energy cost by
/// `(1+g)^(t-1) * (1+e)^(t-1)` and maintenance by `(1+i)^(t-1)`. Figures are
/// rounded per row and `net`/`cumulative` derive from the rounded values.
pub fn project(
    input: &ProjectionInput,
    cancel: Option<&CancellationToken>,
) -> CpoFinanceResult<Vec<CashFlowPeriod>> {
    validate_projection_input(input)?;

    let growth = &input.growth;
    let drivers = &input.drivers;
    let mut periods = Vec::with_capacity(input.years as usize + 1);
    periods.push(CashFlowPeriod::investment(input.investment_total));
    let mut cumulative = -input.investment_total;

    for year in 1..=input.years {
        checkpoint(cancel, "cash flow projection")?;
        let elapsed = year - 1;

        let usage = compound_factor(growth.growth_rate, elapsed)?;
        let gross_revenue = checked_product(
            &[
                drivers.base_revenue,
                usage,
                compound_factor(growth.price_escalation_rate, elapsed)?,
            ],
            "projected revenue",
        )?;
        let revenue = checked_sum(
            [
                round_money(gross_revenue),
                -round_money(year_value(&input.revenue_losses, year)),
            ],
            "projected revenue",
        )?;

        let energy_cost = round_money(checked_product(
            &[
                drivers.base_energy_cost,
                usage,
                compound_factor(growth.energy_price_escalation_rate, elapsed)?,
            ],
            "projected energy cost",
        )?);
        let maintenance_cost = round_money(checked_product(
            &[
                drivers.base_maintenance_cost,
                compound_factor(growth.inflation_rate, elapsed)?,
            ],
            "projected maintenance cost",
        )?);
        let repair_cost = round_money(year_value(&input.repair_costs, year));
        let operating_cost = checked_sum(
            [energy_cost, maintenance_cost, repair_cost],
            "operating cost",
        )?;
        let loan_payment = round_money(year_value(&input.loan_payments, year));

        let net_cash_flow = checked_sum([revenue, -operating_cost, -loan_payment], "net cash flow")?;
        cumulative = checked_sum([cumulative, net_cash_flow], "cumulative cash flow")?;

        periods.push(CashFlowPeriod {
            period: year,
            revenue,
            energy_cost,
            maintenance_cost,
            repair_cost,
            operating_cost,
            loan_payment,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
        });
    }

    tracing::debug!(years = input.years, final_cumulative = %cumulative, "cash flows projected");
    Ok(periods)
}

/// Revenue, cost and profit over periods 1..
pub fn projection_totals(periods: &[CashFlowPeriod]) -> CpoFinanceResult<ProjectionTotals> {
    let operating = periods.get(1..).unwrap_or(&[]);
    let total_revenue = checked_sum(operating.iter().map(|p| p.revenue), "total revenue")?;
    let total_costs = checked_sum(
        operating
            .iter()
            .flat_map(|p| [p.operating_cost, p.loan_payment]),
        "total costs",
    )?;
    Ok(ProjectionTotals {
        total_revenue,
        total_costs,
        total_profit: checked_sum([total_revenue, -total_costs], "total profit")?,
    })
}

/// Cash-flow projection wrapped in the standard envelope.
pub fn project_cash_flows(
    input: &ProjectionInput,
) -> CpoFinanceResult<ComputationOutput<CashFlowProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let periods = project(input, None)?;
    let totals = projection_totals(&periods)?;

    let horizon = input.years as usize;
    for (name, series) in [
        ("loan_payments", &input.loan_payments),
        ("repair_costs", &input.repair_costs),
        ("revenue_losses", &input.revenue_losses),
    ] {
        if series.len() > horizon {
            warnings.push(format!(
                "{name} has {} entries; only the first {horizon} are used",
                series.len()
            ));
        }
    }
    if let Some(last) = periods.last() {
        if last.cumulative_cash_flow < Decimal::ZERO {
            warnings.push(format!(
                "Investment not recovered within {} years",
                input.years
            ));
        }
    }

    let output = CashFlowProjection { periods, totals };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annual Cash Flow Projection (compounded growth, inflation and price escalation)",
        &serde_json::json!({
            "investment_total": input.investment_total.to_string(),
            "years": input.years,
            "growth_rate": input.growth.growth_rate.to_string(),
            "inflation_rate": input.growth.inflation_rate.to_string(),
            "price_escalation_rate": input.growth.price_escalation_rate.to_string(),
            "energy_price_escalation_rate": input.growth.energy_price_escalation_rate.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate_projection_input(input: &ProjectionInput) -> CpoFinanceResult<()> {
    if input.years == 0 {
        return Err(CpoFinanceError::invalid(
            "years",
            "Projection horizon must be at least 1 year",
        ));
    }
    if input.investment_total < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "investment_total",
            "Investment cannot be negative",
        ));
    }
    input.growth.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_input() -> ProjectionInput {
        ProjectionInput {
            investment_total: dec!(15000),
            drivers: ProjectionDrivers {
                base_revenue: dec!(12318.75),
                base_energy_cost: dec!(6843.75),
                base_maintenance_cost: dec!(500),
            },
            growth: GrowthAssumptions::default(),
            years: 10,
            loan_payments: vec![],
            repair_costs: vec![],
            revenue_losses: vec![],
        }
    }

    #[test]
    fn test_period_zero_is_investment() {
        let periods = project(&standard_input(), None).unwrap();
        assert_eq!(periods.len(), 11);
        assert_eq!(periods[0].net_cash_flow, dec!(-15000));
        assert_eq!(periods[0].cumulative_cash_flow, dec!(-15000));
    }

    #[test]
    fn test_flat_projection() {
        let periods = project(&standard_input(), None).unwrap();
        for p in &periods[1..] {
            assert_eq!(p.revenue, dec!(12318.75));
            assert_eq!(p.operating_cost, dec!(7343.75));
            assert_eq!(p.net_cash_flow, dec!(4975.00));
        }
        assert_eq!(periods[10].cumulative_cash_flow, dec!(34750.00));
    }

    #[test]
    fn test_invariants_hold() {
        let mut input = standard_input();
        input.growth = GrowthAssumptions {
            growth_rate: dec!(0.03),
            inflation_rate: dec!(0.02),
            price_escalation_rate: dec!(0.015),
            energy_price_escalation_rate: dec!(0.025),
        };
        input.loan_payments = vec![dec!(1234.56); 5];
        let periods = project(&input, None).unwrap();
        for w in periods.windows(2) {
            let p = &w[1];
            assert_eq!(p.net_cash_flow, p.revenue - p.operating_cost - p.loan_payment);
            assert_eq!(p.cumulative_cash_flow, w[0].cumulative_cash_flow + p.net_cash_flow);
        }
        assert_eq!(periods[5].loan_payment, dec!(1234.56));
        assert_eq!(periods[6].loan_payment, Decimal::ZERO);
    }

    #[test]
    fn test_growth_compounds_from_year_two() {
        let mut input = standard_input();
        input.growth.growth_rate = dec!(0.10);
        input.growth.price_escalation_rate = dec!(0.10);
        input.growth.inflation_rate = dec!(0.10);
        let periods = project(&input, None).unwrap();
        assert_eq!(periods[1].revenue, dec!(12318.75));
        // 12318.75 * 1.1 * 1.1
        assert_eq!(periods[2].revenue, dec!(14905.69));
        // Energy grows with usage only
        assert_eq!(periods[2].energy_cost, dec!(7528.13));
        assert_eq!(periods[2].maintenance_cost, dec!(550.00));
    }

    #[test]
    fn test_repair_and_downtime_folded_in() {
        let mut input = standard_input();
        input.repair_costs = vec![dec!(0), dec!(1500)];
        input.revenue_losses = vec![dec!(0), dec!(236.25)];
        let periods = project(&input, None).unwrap();
        assert_eq!(periods[2].repair_cost, dec!(1500));
        assert_eq!(periods[2].operating_cost, dec!(8843.75));
        assert_eq!(periods[2].revenue, dec!(12082.50));
        assert_eq!(periods[3].repair_cost, Decimal::ZERO);
    }

    #[test]
    fn test_totals() {
        let mut input = standard_input();
        input.loan_payments = vec![dec!(1000); 10];
        let periods = project(&input, None).unwrap();
        let totals = projection_totals(&periods).unwrap();
        assert_eq!(totals.total_revenue, dec!(123187.50));
        assert_eq!(totals.total_costs, dec!(83437.50));
        assert_eq!(totals.total_profit, dec!(39750.00));
    }

    #[test]
    fn test_zero_years_rejected() {
        let mut input = standard_input();
        input.years = 0;
        match project(&input, None) {
            Err(CpoFinanceError::InvalidInput { field, .. }) => assert_eq!(field, "years"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_runaway_growth_returns_overflow() {
        let mut input = standard_input();
        input.years = 300;
        input.growth.growth_rate = dec!(0.3);
        assert!(matches!(
            project(&input, None),
            Err(CpoFinanceError::Overflow { .. })
        ));
    }

    #[test]
    fn test_cancellation_stops_projection() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            project(&standard_input(), Some(&token)),
            Err(CpoFinanceError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_envelope_warns_on_unrecovered_investment() {
        let mut input = standard_input();
        input.investment_total = dec!(100000);
        let out = project_cash_flows(&input).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.result.periods.len(), 11);
    }
}
