use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::CpoFinanceError;
use crate::types::{Money, Rate};
use crate::CpoFinanceResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const BISECTION_WIDTH: Decimal = dec!(0.0000000001);
const IRR_FLOOR: Decimal = dec!(-0.99);
const IRR_CEILING: Decimal = dec!(100);

/// Rates probed for a sign change when Newton-Raphson fails.
const BRACKET_GRID: [Decimal; 13] = [
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(0),
    dec!(0.1),
    dec!(0.25),
    dec!(0.5),
    dec!(1),
    dec!(2),
    dec!(10),
    dec!(100),
];

/// `(1 + rate)^periods` by repeated multiplication, exact for integer powers.
/// Fails with `Overflow` once the factor leaves the `Decimal` range.
pub fn compound_factor(rate: Rate, periods: u32) -> CpoFinanceResult<Decimal> {
    let overflow = || CpoFinanceError::overflow(format!("(1 + {rate})^{periods}"));
    let one_plus_r = Decimal::ONE.checked_add(rate).ok_or_else(overflow)?;
    let mut factor = Decimal::ONE;
    for _ in 0..periods {
        factor = factor.checked_mul(one_plus_r).ok_or_else(overflow)?;
    }
    Ok(factor)
}

/// Product of `factors`; `context` names the figure in the overflow error.
pub fn checked_product(factors: &[Decimal], context: &str) -> CpoFinanceResult<Decimal> {
    factors.iter().try_fold(Decimal::ONE, |acc, f| {
        acc.checked_mul(*f)
            .ok_or_else(|| CpoFinanceError::overflow(context))
    })
}

/// Sum of `values`; `context` names the figure in the overflow error.
pub fn checked_sum<I>(values: I, context: &str) -> CpoFinanceResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| CpoFinanceError::overflow(context))
    })
}

/// Net Present Value of a series of cash flows. Index 0 is undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> CpoFinanceResult<Money> {
    if rate <= dec!(-1) {
        return Err(CpoFinanceError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_checked(rate, cash_flows).ok_or_else(|| CpoFinanceError::DivisionByZero {
        context: format!("NPV discount factor at rate {rate}"),
    })
}

/// NPV with overflow-checked arithmetic. `None` when a discount factor
/// underflows to zero or a term overflows.
fn npv_checked(rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut total = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        total = total.checked_add(cf.checked_div(discount)?)?;
    }

    Some(total)
}

/// NPV and its first derivative with respect to the rate.
fn npv_with_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let t_dec = Decimal::from(t as i64);
            let term = t_dec
                .checked_mul(*cf)?
                .checked_div(discount.checked_mul(one_plus_r)?)?;
            derivative = derivative.checked_sub(term)?;
        }
    }

    Some((value, derivative))
}

/// True when the series contains both a strictly negative and a strictly
/// positive flow, the precondition for a real IRR.
pub fn has_sign_change(cash_flows: &[Money]) -> bool {
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    has_negative && has_positive
}

/// Internal Rate of Return as a decimal rate.
///
/// Newton-Raphson from `guess`, falling back to bisection over the first
/// bracket in a fixed rate grid whose endpoints give NPVs of opposite sign.
pub fn irr(cash_flows: &[Money], guess: Rate) -> CpoFinanceResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(CpoFinanceError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    if !has_sign_change(cash_flows) {
        return Err(CpoFinanceError::InsufficientData(
            "IRR requires at least one sign change in the cash flows".into(),
        ));
    }

    if let Some(rate) = newton_irr(cash_flows, guess) {
        return Ok(rate);
    }

    bisect_irr(cash_flows)
}

fn newton_irr(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    let mut rate = guess;

    for _ in 0..MAX_IRR_ITERATIONS {
        let (value, derivative) = npv_with_derivative(rate, cash_flows)?;

        if value.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }
        if derivative.is_zero() {
            return None;
        }

        rate = rate.checked_sub(value.checked_div(derivative)?)?;

        // Guard against divergence
        if rate < IRR_FLOOR {
            rate = IRR_FLOOR;
        } else if rate > IRR_CEILING {
            rate = IRR_CEILING;
        }
    }

    None
}

fn bisect_irr(cash_flows: &[Money]) -> CpoFinanceResult<Rate> {
    let samples: Vec<(Rate, Money)> = BRACKET_GRID
        .iter()
        .filter_map(|&r| npv_checked(r, cash_flows).map(|v| (r, v)))
        .collect();

    let bracket = samples.windows(2).find(|w| {
        w[0].1.is_zero() || w[0].1.is_sign_negative() != w[1].1.is_sign_negative()
    });

    let (mut lo, mut f_lo, mut hi) = match bracket {
        Some(w) if w[0].1.is_zero() => return Ok(w[0].0),
        Some(w) => (w[0].0, w[0].1, w[1].0),
        None => {
            return Err(CpoFinanceError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: MAX_IRR_ITERATIONS,
                last_delta: samples.last().map(|s| s.1).unwrap_or(Decimal::MAX),
            })
        }
    };

    let mut f_mid = f_lo;
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        f_mid = npv_checked(mid, cash_flows).ok_or_else(|| CpoFinanceError::DivisionByZero {
            context: format!("IRR bisection at rate {mid}"),
        })?;

        if f_mid.abs() < CONVERGENCE_THRESHOLD || hi - lo < BISECTION_WIDTH {
            return Ok(mid);
        }

        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(CpoFinanceError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_BISECTION_ITERATIONS,
        last_delta: f_mid,
    })
}

/// Level annuity payment that repays `principal` over `periods` at `rate`
/// per period. Returned as a positive amount.
pub fn annuity_payment(principal: Money, rate: Rate, periods: u32) -> CpoFinanceResult<Money> {
    if periods == 0 {
        return Err(CpoFinanceError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(periods));
    }

    let compound = compound_factor(rate, periods)?;
    let denominator = compound
        .checked_sub(Decimal::ONE)
        .ok_or_else(|| CpoFinanceError::overflow("annuity factor"))?;
    if denominator.is_zero() {
        return Err(CpoFinanceError::DivisionByZero {
            context: "annuity factor".into(),
        });
    }

    // PMT = P * r * [(1+r)^n / ((1+r)^n - 1)]
    let ratio = compound
        .checked_div(denominator)
        .ok_or_else(|| CpoFinanceError::overflow("annuity factor"))?;
    checked_product(&[principal, rate, ratio], "annuity payment")
}
