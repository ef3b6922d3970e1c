use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CpoFinanceError;
use crate::time_value::{annuity_payment, checked_sum};
use crate::types::*;
use crate::CpoFinanceResult;

/// Longest loan accepted, in years.
pub const MAX_TERM_YEARS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Loan financing part of an investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual interest rate in percent (6.5 = 6.5%)
    pub annual_interest_rate: Rate,
    pub term_years: u32,
    /// Leading years in which only interest is paid
    #[serde(default)]
    pub grace_years: u32,
    #[serde(default)]
    pub period_unit: PeriodUnit,
}

impl LoanTerms {
    /// Interest rate per schedule period as a decimal.
    pub fn periodic_rate(&self) -> Rate {
        self.annual_interest_rate
            / Decimal::ONE_HUNDRED
            / Decimal::from(self.period_unit.periods_per_year())
    }

    /// Saturates at `u32::MAX`; `schedule` rejects terms long enough to matter.
    pub fn total_periods(&self) -> u32 {
        self.term_years
            .checked_mul(self.period_unit.periods_per_year())
            .unwrap_or(u32::MAX)
    }

    pub fn grace_periods(&self) -> u32 {
        self.grace_years
            .checked_mul(self.period_unit.periods_per_year())
            .unwrap_or(u32::MAX)
    }
}

/// One row of the amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    /// 1-based period number
    pub period: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    /// Outstanding balance after this period
    pub balance: Money,
    pub in_grace: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationTotals {
    pub total_payment: Money,
    pub total_interest: Money,
    pub total_principal: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    /// Level payment once the grace period is over
    pub periodic_payment: Money,
    pub period_unit: PeriodUnit,
    pub entries: Vec<AmortizationEntry>,
    pub totals: AmortizationTotals,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Build the period-by-period schedule.
///
/// Grace periods pay `balance * r` with no principal. Afterwards a level
/// annuity over the remaining periods; the last period repays whatever
/// balance rounding has left so the balance ends at exactly zero.
pub fn schedule(terms: &LoanTerms) -> CpoFinanceResult<AmortizationSchedule> {
    validate_loan_terms(terms)?;

    let rate = terms.periodic_rate();
    let total_periods = terms.total_periods();
    let grace_periods = terms.grace_periods();
    let repayment_periods = total_periods - grace_periods;

    let periodic_payment = round_money(annuity_payment(terms.principal, rate, repayment_periods)?);

    let mut entries = Vec::with_capacity(total_periods as usize);
    let mut balance = terms.principal;

    for period in 1..=total_periods {
        let interest = round_money(balance * rate);

        if period <= grace_periods {
            entries.push(AmortizationEntry {
                period,
                payment: interest,
                interest,
                principal: Decimal::ZERO,
                balance,
                in_grace: true,
            });
            continue;
        }

        let mut principal = periodic_payment - interest;
        if period == total_periods || principal > balance {
            principal = balance;
        }
        principal = principal.max(Decimal::ZERO);
        balance -= principal;

        entries.push(AmortizationEntry {
            period,
            payment: interest + principal,
            interest,
            principal,
            balance,
            in_grace: false,
        });
    }

    let totals = AmortizationTotals {
        total_payment: checked_sum(entries.iter().map(|e| e.payment), "total loan payments")?,
        total_interest: checked_sum(entries.iter().map(|e| e.interest), "total loan interest")?,
        total_principal: checked_sum(entries.iter().map(|e| e.principal), "total loan principal")?,
    };

    tracing::debug!(
        periods = total_periods,
        grace = grace_periods,
        %periodic_payment,
        "loan schedule built"
    );

    Ok(AmortizationSchedule {
        periodic_payment,
        period_unit: terms.period_unit,
        entries,
        totals,
    })
}

/// Debt service per loan year; index 0 is year 1. Years past the term are
/// zero.
pub fn loan_payments_by_year(schedule: &AmortizationSchedule, years: u32) -> Vec<Money> {
    let per_year = schedule.period_unit.periods_per_year();
    let mut payments = vec![Decimal::ZERO; years as usize];
    for entry in &schedule.entries {
        let year_index = ((entry.period - 1) / per_year) as usize;
        if let Some(slot) = payments.get_mut(year_index) {
            *slot += entry.payment;
        }
    }
    payments
}

/// Amortization schedule wrapped in the standard envelope.
pub fn amortize(terms: &LoanTerms) -> CpoFinanceResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = schedule(terms)?;

    if terms.annual_interest_rate.is_zero() {
        warnings.push("Zero interest rate: payments are principal / periods".into());
    }
    if terms.grace_years > 0 {
        warnings.push(format!(
            "{} grace year(s): interest-only payments of {} before amortization",
            terms.grace_years,
            round_money(terms.principal * terms.periodic_rate())
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level Annuity Amortization with Interest-Only Grace Period",
        &serde_json::json!({
            "principal": terms.principal.to_string(),
            "annual_interest_rate_pct": terms.annual_interest_rate.to_string(),
            "term_years": terms.term_years,
            "grace_years": terms.grace_years,
            "period_unit": terms.period_unit,
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn validate_loan_terms(terms: &LoanTerms) -> CpoFinanceResult<()> {
    if terms.term_years == 0 {
        return Err(CpoFinanceError::invalid(
            "term_years",
            "Loan term must be at least 1 year",
        ));
    }
    if terms.term_years > MAX_TERM_YEARS {
        return Err(CpoFinanceError::invalid(
            "term_years",
            format!("Loan term cannot exceed {MAX_TERM_YEARS} years"),
        ));
    }
    if terms.grace_years >= terms.term_years {
        return Err(CpoFinanceError::invalid(
            "grace_years",
            "Grace period must be shorter than the loan term",
        ));
    }
    if terms.principal <= Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "principal",
            "Loan principal must be positive",
        ));
    }
    if terms.annual_interest_rate < Decimal::ZERO {
        return Err(CpoFinanceError::invalid(
            "annual_interest_rate",
            "Interest rate cannot be negative",
        ));
    }
    Ok(())
}
