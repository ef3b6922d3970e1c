use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CpoFinanceError;
use crate::types::Money;
use crate::CpoFinanceResult;

/// Capital cost breakdown of a charging station. Missing components count
/// as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Investment {
    /// Charger hardware (the "station cost")
    pub equipment: Option<Money>,
    pub installation: Option<Money>,
    pub grid_connection: Option<Money>,
    pub permits: Option<Money>,
    pub civil_works: Option<Money>,
    pub other: Option<Money>,
}

impl Investment {
    fn components(&self) -> [(&'static str, Option<Money>); 6] {
        [
            ("equipment", self.equipment),
            ("installation", self.installation),
            ("grid_connection", self.grid_connection),
            ("permits", self.permits),
            ("civil_works", self.civil_works),
            ("other", self.other),
        ]
    }

    pub fn total(&self) -> Money {
        total_investment(&self.components().map(|(_, amount)| amount))
    }

    pub fn equipment_cost(&self) -> Money {
        self.equipment.unwrap_or(Decimal::ZERO)
    }

    pub fn validate(&self, field: &str) -> CpoFinanceResult<()> {
        for (name, amount) in self.components() {
            if amount.is_some_and(|a| a < Decimal::ZERO) {
                return Err(CpoFinanceError::invalid(
                    format!("{field}.{name}"),
                    "Cost component cannot be negative",
                ));
            }
        }
        Ok(())
    }
}

/// Sum of cost items, `None` treated as zero.
pub fn total_investment(components: &[Option<Money>]) -> Money {
    components.iter().flatten().copied().sum()
}
