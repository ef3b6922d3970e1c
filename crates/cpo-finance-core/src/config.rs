use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CpoFinanceError;
use crate::revenue::calendar::SeasonalFactors;
use crate::simulation::failure::RepairCostBounds;
use crate::types::Rate;
use crate::CpoFinanceResult;

/// Engine-wide defaults. Every field is optional in serialized form; missing
/// fields take the values below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Discount rate used for NPV when the macro bundle does not supply one
    pub discount_rate: Rate,
    /// Monthly usage multipliers, January first
    pub seasonal_factors: SeasonalFactors,
    /// Annual maintenance as a fraction of station cost
    pub maintenance_pct: Rate,
    /// Chance that a failed entity cannot be repaired
    pub retirement_probability: Rate,
    /// Repair cost range as fractions of entity cost
    pub repair_cost_bounds: RepairCostBounds,
    /// Added to the failure probability for each year of age
    pub failure_age_increment: Rate,
    /// Months covered by the monthly projection
    pub monthly_horizon: u32,
    /// Report IRR as 0 instead of undefined when it cannot be solved
    pub legacy_irr_zero: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            discount_rate: dec!(0.05),
            seasonal_factors: SeasonalFactors::default(),
            maintenance_pct: dec!(0.05),
            retirement_probability: dec!(0.10),
            repair_cost_bounds: RepairCostBounds::default(),
            failure_age_increment: dec!(0.01),
            monthly_horizon: 24,
            legacy_irr_zero: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> CpoFinanceResult<()> {
        if self.discount_rate <= dec!(-1) {
            return Err(CpoFinanceError::invalid(
                "config.discount_rate",
                "Discount rate must be greater than -100%",
            ));
        }
        if self.maintenance_pct < Decimal::ZERO || self.maintenance_pct > Decimal::ONE {
            return Err(CpoFinanceError::invalid(
                "config.maintenance_pct",
                "Maintenance percentage must be between 0 and 1",
            ));
        }
        if self.retirement_probability < Decimal::ZERO || self.retirement_probability > Decimal::ONE {
            return Err(CpoFinanceError::invalid(
                "config.retirement_probability",
                "Probability must be between 0 and 1",
            ));
        }
        if self.failure_age_increment < Decimal::ZERO {
            return Err(CpoFinanceError::invalid(
                "config.failure_age_increment",
                "Age increment cannot be negative",
            ));
        }
        if self.monthly_horizon == 0 {
            return Err(CpoFinanceError::invalid(
                "config.monthly_horizon",
                "Monthly horizon must be at least 1 month",
            ));
        }
        self.seasonal_factors.validate()?;
        self.repair_cost_bounds.validate()?;
        Ok(())
    }
}
