use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CpoFinanceError;
use crate::types::Rate;
use crate::CpoFinanceResult;

/// Day count of the availability model.
pub const DAYS_PER_YEAR: u32 = 365;

/// Days lost to a weekly closure (market day, street cleaning, ...).
pub const WEEKLY_CLOSURE_DAYS: u32 = 52;

/// Share of a rainy day's usage that is lost.
pub const RAIN_IMPACT: Decimal = dec!(0.3);

/// Day count of one month in the seasonal model (12 × 30 = 360).
pub const SEASONAL_MONTH_DAYS: u32 = 30;

/// Days per year on which a site cannot generate revenue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityExclusions {
    /// One closure day every week
    pub weekly_closure: bool,
    /// Local festival days per year
    pub festival_days: u32,
    /// Expected rainy days per year
    pub rainy_days: u32,
}

impl AvailabilityExclusions {
    pub fn unavailable_days(&self) -> u32 {
        let weekly = if self.weekly_closure {
            WEEKLY_CLOSURE_DAYS
        } else {
            0
        };
        weekly.saturating_add(self.festival_days)
    }
}

/// Fraction of the year the site is usable, always within `[0, 1]`.
///
/// `base = (365 - unavailable) / 365`, `rain = rainy_days * 0.3 / 365`,
/// `factor = base * (1 - rain)`. Both terms are clamped to `[0, 1]` before
/// the product, so two negative terms cannot yield a positive factor.
pub fn availability_factor(exclusions: &AvailabilityExclusions) -> Rate {
    let days = Decimal::from(DAYS_PER_YEAR);
    let unavailable = Decimal::from(exclusions.unavailable_days());

    let base = clamp_unit((days - unavailable) / days);
    let rain_impact = Decimal::from(exclusions.rainy_days) * RAIN_IMPACT / days;
    let dry_share = clamp_unit(Decimal::ONE - rain_impact);

    clamp_unit(base * dry_share)
}

fn clamp_unit(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

/// Monthly usage multipliers, index 0 = January.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonalFactors([Rate; 12]);

impl Default for SeasonalFactors {
    /// Summer peak (June to September) and winter trough (December to February).
    fn default() -> Self {
        let mut factors = [Decimal::ONE; 12];
        for month in [6, 7, 8, 9] {
            factors[month - 1] = dec!(1.2);
        }
        for month in [12, 1, 2] {
            factors[month - 1] = dec!(0.8);
        }
        SeasonalFactors(factors)
    }
}

impl SeasonalFactors {
    pub fn new(factors: [Rate; 12]) -> Self {
        SeasonalFactors(factors)
    }

    /// No seasonal variation.
    pub fn flat() -> Self {
        SeasonalFactors([Decimal::ONE; 12])
    }

    /// Multiplier for a 1-based calendar month. Months outside 1..=12 get 1.
    pub fn factor(&self, month: u32) -> Rate {
        match month {
            1..=12 => self.0[(month - 1) as usize],
            _ => Decimal::ONE,
        }
    }

    pub fn as_slice(&self) -> &[Rate] {
        &self.0
    }

    pub fn validate(&self) -> CpoFinanceResult<()> {
        if let Some(pos) = self.0.iter().position(|f| *f < Decimal::ZERO) {
            return Err(CpoFinanceError::invalid(
                format!("seasonal_factors[{pos}]"),
                "Seasonal factors cannot be negative",
            ));
        }
        Ok(())
    }
}
