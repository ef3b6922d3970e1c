use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%) unless a field says otherwise.
pub type Rate = Decimal;

/// Ratios such as DSCR or the profitability index.
pub type Multiple = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Decimal places carried by every reported currency figure.
pub const MONEY_DP: u32 = 2;

/// Decimal places carried by every reported percentage or ratio.
pub const PCT_DP: u32 = 2;

/// Round a currency amount to cents.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a percentage or ratio for reporting.
pub fn round_pct(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PCT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Granularity of a loan schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    #[default]
    Annual,
    Monthly,
}

impl PeriodUnit {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PeriodUnit::Annual => 1,
            PeriodUnit::Monthly => 12,
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(12318.75)), dec!(12318.75));
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(PeriodUnit::Annual.periods_per_year(), 1);
        assert_eq!(PeriodUnit::Monthly.periods_per_year(), 12);
    }

    #[test]
    fn test_period_unit_serde() {
        let unit: PeriodUnit = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(unit, PeriodUnit::Monthly);
    }
}
