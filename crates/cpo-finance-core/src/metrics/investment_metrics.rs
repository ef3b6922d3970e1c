use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::CpoFinanceError;
use crate::projection::annual::CashFlowPeriod;
use crate::time_value::{checked_sum, irr, npv};
use crate::types::*;
use crate::CpoFinanceResult;

const IRR_GUESS: Rate = dec!(0.10);

/// What to report when IRR cannot be solved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrMode {
    /// Report IRR as undefined
    #[default]
    Strict,
    /// Report 0, for comparing against legacy outputs
    LegacyZero,
}

impl IrrMode {
    pub fn from_config(config: &EngineConfig) -> Self {
        if config.legacy_irr_zero {
            IrrMode::LegacyZero
        } else {
            IrrMode::Strict
        }
    }
}

/// Investment metrics of one cash-flow series. `None` marks a value that is
/// undefined for the series (no IRR root, no debt service, zero investment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub npv: Money,
    /// Percent
    pub irr: Option<Rate>,
    /// Horizon when the investment is never recovered
    pub payback_years: Years,
    pub payback_reached: bool,
    /// Percent
    pub roi: Option<Rate>,
    pub profitability_index: Option<Multiple>,
    pub dscr: Option<Multiple>,
    /// Percent
    pub ltv: Option<Rate>,
    pub break_even_year: Option<Years>,
}

/// Interpolated point where the cumulative series turns non-negative.
fn recovery_point(periods: &[CashFlowPeriod]) -> Option<Years> {
    let first = periods.first()?;
    if first.cumulative_cash_flow >= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    periods.windows(2).find_map(|w| {
        let (prev, cur) = (&w[0], &w[1]);
        if cur.cumulative_cash_flow < Decimal::ZERO || cur.net_cash_flow.is_zero() {
            return None;
        }
        let fraction = -prev.cumulative_cash_flow / cur.net_cash_flow;
        Some(Decimal::from(prev.period) + fraction)
    })
}

fn average(values: impl Iterator<Item = Money>, count: usize) -> CpoFinanceResult<Money> {
    if count == 0 {
        return Ok(Decimal::ZERO);
    }
    Ok(checked_sum(values, "average")? / Decimal::from(count as u64))
}

/// `numerator / denominator * scale` at 2 dp.
fn scaled_ratio(
    numerator: Money,
    denominator: Money,
    scale: Decimal,
    what: &str,
) -> CpoFinanceResult<Decimal> {
    numerator
        .checked_div(denominator)
        .and_then(|r| r.checked_mul(scale))
        .map(round_pct)
        .ok_or_else(|| CpoFinanceError::overflow(what))
}

/// Derive every metric from a cash-flow table whose period 0 is the
/// investment. Returns the metrics and any warnings about undefined values.
pub fn compute(
    periods: &[CashFlowPeriod],
    discount_rate: Rate,
    investment_total: Money,
    loan_amount: Money,
    mode: IrrMode,
) -> CpoFinanceResult<(FinancialMetrics, Vec<String>)> {
    if periods.len() < 2 {
        return Err(CpoFinanceError::InsufficientData(
            "Metrics need the investment period and at least one operating period".into(),
        ));
    }
    if investment_total < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "investment_total",
            "Investment cannot be negative",
        ));
    }

    let mut warnings = Vec::new();
    let horizon = (periods.len() - 1) as u32;
    let flows: Vec<Money> = periods.iter().map(|p| p.net_cash_flow).collect();
    let operating = &periods[1..];

    let npv_value = npv(discount_rate, &flows)?;

    let irr_value = match irr(&flows, IRR_GUESS) {
        Ok(rate) => Some(round_pct(rate * Decimal::ONE_HUNDRED)),
        Err(e) => match mode {
            IrrMode::Strict => {
                tracing::warn!(error = %e, "IRR undefined");
                warnings.push(format!("IRR undefined: {e}"));
                None
            }
            IrrMode::LegacyZero => {
                warnings.push(format!("IRR could not be solved ({e}); reported as 0 (legacy mode)"));
                Some(Decimal::ZERO)
            }
        },
    };

    let recovery = recovery_point(periods).map(round_pct);
    let (payback_years, payback_reached) = match recovery {
        Some(years) => (years, true),
        None => {
            warnings.push(format!(
                "Investment not recovered within {horizon} years; payback reported as the horizon"
            ));
            (Decimal::from(horizon), false)
        }
    };

    let total_net = checked_sum(operating.iter().map(|p| p.net_cash_flow), "total net cash flow")?;
    let (roi, profitability_index, ltv) = if investment_total.is_zero() {
        warnings.push("Zero investment: ROI, profitability index and LTV are undefined".into());
        (None, None, None)
    } else {
        let recovered = checked_sum([npv_value, investment_total], "profitability index")?;
        (
            Some(scaled_ratio(total_net, investment_total, Decimal::ONE_HUNDRED, "ROI")?),
            Some(scaled_ratio(recovered, investment_total, Decimal::ONE, "profitability index")?),
            Some(scaled_ratio(loan_amount, investment_total, Decimal::ONE_HUNDRED, "LTV")?),
        )
    };

    let avg_debt_service = average(operating.iter().map(|p| p.loan_payment), operating.len())?;
    let dscr = if avg_debt_service.is_zero() {
        None
    } else {
        let avg_net = average(operating.iter().map(|p| p.net_cash_flow), operating.len())?;
        Some(scaled_ratio(avg_net, avg_debt_service, Decimal::ONE, "DSCR")?)
    };

    let metrics = FinancialMetrics {
        npv: round_money(npv_value),
        irr: irr_value,
        payback_years,
        payback_reached,
        roi,
        profitability_index,
        dscr,
        ltv,
        break_even_year: recovery,
    };

    tracing::debug!(npv = %metrics.npv, irr = ?metrics.irr, "metrics computed");
    Ok((metrics, warnings))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsInput {
    pub cash_flows: Vec<CashFlowPeriod>,
    /// Defaults to `config.discount_rate`
    pub discount_rate: Option<Rate>,
    /// Defaults to the period 0 outflow
    pub investment_total: Option<Money>,
    #[serde(default)]
    pub loan_amount: Money,
    /// Defaults to the mode implied by `config.legacy_irr_zero`
    pub irr_mode: Option<IrrMode>,
    #[serde(default)]
    pub config: EngineConfig,
}

/// Investment metrics wrapped in the standard envelope.
pub fn calculate_metrics(
    input: &MetricsInput,
) -> CpoFinanceResult<ComputationOutput<FinancialMetrics>> {
    let start = Instant::now();

    input.config.validate()?;
    if input.loan_amount < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "loan_amount",
            "Loan amount cannot be negative",
        ));
    }
    let discount_rate = input.discount_rate.unwrap_or(input.config.discount_rate);
    let investment_total = input.investment_total.unwrap_or_else(|| {
        input
            .cash_flows
            .first()
            .map(|p| -p.net_cash_flow)
            .unwrap_or(Decimal::ZERO)
    });
    let mode = input
        .irr_mode
        .unwrap_or_else(|| IrrMode::from_config(&input.config));

    let (metrics, warnings) = compute(
        &input.cash_flows,
        discount_rate,
        investment_total,
        input.loan_amount,
        mode,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Investment Metrics (NPV, IRR, payback, ROI, PI, DSCR, LTV)",
        &serde_json::json!({
            "discount_rate": discount_rate.to_string(),
            "investment_total": investment_total.to_string(),
            "loan_amount": input.loan_amount.to_string(),
            "periods": input.cash_flows.len(),
            "irr_mode": mode,
        }),
        warnings,
        elapsed,
        metrics,
    ))
}
