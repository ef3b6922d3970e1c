use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::calendar::{
    availability_factor, AvailabilityExclusions, SeasonalFactors, DAYS_PER_YEAR,
    SEASONAL_MONTH_DAYS,
};
use crate::config::EngineConfig;
use crate::error::CpoFinanceError;
use crate::types::*;
use crate::CpoFinanceResult;

/// Usage and tariff assumptions for one charging station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationProfile {
    /// Expected charging sessions per day
    pub sessions_per_day: Decimal,
    /// Average energy delivered per session (kWh)
    pub kwh_per_session: Decimal,
    /// Tariff charged to drivers per kWh
    pub price_per_kwh: Money,
    /// Energy purchase cost per kWh
    pub energy_cost_per_kwh: Money,
    /// Days the site cannot be used
    #[serde(default)]
    pub exclusions: AvailabilityExclusions,
}

impl UtilizationProfile {
    pub fn daily_energy_kwh(&self) -> Decimal {
        self.kwh_per_session * self.sessions_per_day
    }

    /// Reject negative usage or tariff figures. `field` prefixes the error path.
    pub fn validate(&self, field: &str) -> CpoFinanceResult<()> {
        let checks = [
            ("sessions_per_day", self.sessions_per_day),
            ("kwh_per_session", self.kwh_per_session),
            ("price_per_kwh", self.price_per_kwh),
            ("energy_cost_per_kwh", self.energy_cost_per_kwh),
        ];
        for (name, value) in checks {
            if value < Decimal::ZERO {
                return Err(CpoFinanceError::invalid(
                    format!("{field}.{name}"),
                    "Value cannot be negative",
                ));
            }
        }
        Ok(())
    }
}

/// Which calendar adjustments apply to the annual revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueOptions {
    pub include_availability: bool,
    pub include_seasonality: bool,
}

/// Revenue for one month of the seasonal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: u32,
    pub multiplier: Rate,
    pub revenue: Money,
}

/// `price_per_kwh * kwh_per_session * sessions_per_day`
pub fn daily_revenue(profile: &UtilizationProfile) -> Money {
    profile.price_per_kwh * profile.kwh_per_session * profile.sessions_per_day
}

/// Twelve 30-day months, each scaled by its seasonal multiplier.
pub fn seasonal_monthly_revenue(
    profile: &UtilizationProfile,
    factors: &SeasonalFactors,
) -> Vec<MonthlyRevenue> {
    let month_days = Decimal::from(SEASONAL_MONTH_DAYS);
    (1..=12)
        .map(|month| {
            let multiplier = factors.factor(month);
            let revenue = profile.sessions_per_day
                * month_days
                * multiplier
                * profile.kwh_per_session
                * profile.price_per_kwh;
            MonthlyRevenue {
                month,
                multiplier,
                revenue,
            }
        })
        .collect()
}

/// Expected annual revenue before growth and escalation.
///
/// With seasonality the 365-day annualization is replaced by the sum of
/// twelve 30-day seasonal months; the availability factor, when enabled, is
/// applied on top of whichever base was used. The two models do not share a
/// day count (365 vs 360).
pub fn compute_annual_revenue(
    profile: &UtilizationProfile,
    include_availability: bool,
    include_seasonality: bool,
    factors: &SeasonalFactors,
) -> Money {
    let mut annual = if include_seasonality {
        seasonal_monthly_revenue(profile, factors)
            .iter()
            .map(|m| m.revenue)
            .sum()
    } else {
        daily_revenue(profile) * Decimal::from(DAYS_PER_YEAR)
    };

    if include_availability {
        annual *= availability_factor(&profile.exclusions);
    }

    annual
}

/// Input for a standalone revenue estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueInput {
    pub profile: UtilizationProfile,
    #[serde(default)]
    pub options: RevenueOptions,
    #[serde(default)]
    pub config: EngineConfig,
}

/// Breakdown of the revenue estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueOutput {
    pub daily_revenue: Money,
    /// `daily_revenue * 365`, no adjustments
    pub unadjusted_annual_revenue: Money,
    /// Present when availability was applied
    pub availability_factor: Option<Rate>,
    /// Present when seasonality was applied
    pub seasonal_months: Option<Vec<MonthlyRevenue>>,
    pub annual_revenue: Money,
}

/// Estimate annual revenue for one station with optional calendar adjustments.
pub fn estimate_revenue(input: &RevenueInput) -> CpoFinanceResult<ComputationOutput<RevenueOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.profile.validate("profile")?;
    input.config.validate()?;

    let options = input.options;
    let factors = &input.config.seasonal_factors;
    let daily = daily_revenue(&input.profile);

    if options.include_availability && options.include_seasonality {
        warnings.push(
            "Seasonal revenue uses 12 x 30-day months while availability uses a 365-day year; \
             the two day counts are not reconciled"
                .into(),
        );
    }
    if input.profile.exclusions.unavailable_days() >= DAYS_PER_YEAR {
        warnings.push("Unavailable days cover the whole year; availability factor is 0".into());
    }

    let annual = compute_annual_revenue(
        &input.profile,
        options.include_availability,
        options.include_seasonality,
        factors,
    );

    let seasonal_months = options.include_seasonality.then(|| {
        seasonal_monthly_revenue(&input.profile, factors)
            .into_iter()
            .map(|m| MonthlyRevenue {
                revenue: round_money(m.revenue),
                ..m
            })
            .collect()
    });

    tracing::debug!(%annual, ?options, "annual revenue estimated");

    let output = RevenueOutput {
        daily_revenue: round_money(daily),
        unadjusted_annual_revenue: round_money(daily * Decimal::from(DAYS_PER_YEAR)),
        availability_factor: options
            .include_availability
            .then(|| availability_factor(&input.profile.exclusions).round_dp(6)),
        seasonal_months,
        annual_revenue: round_money(annual),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Charging Revenue Estimate (365-day base, optional availability and 12x30-day seasonality)",
        &serde_json::json!({
            "sessions_per_day": input.profile.sessions_per_day.to_string(),
            "kwh_per_session": input.profile.kwh_per_session.to_string(),
            "price_per_kwh": input.profile.price_per_kwh.to_string(),
            "include_availability": options.include_availability,
            "include_seasonality": options.include_seasonality,
        }),
        warnings,
        elapsed,
        output,
    ))
}
