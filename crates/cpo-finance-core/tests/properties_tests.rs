use cpo_finance_core::financing::amortization::{schedule, LoanTerms};
use cpo_finance_core::projection::annual::{
    project, GrowthAssumptions, ProjectionDrivers, ProjectionInput,
};
use cpo_finance_core::revenue::calendar::{availability_factor, AvailabilityExclusions};
use cpo_finance_core::simulation::failure::{simulate, FailureParameters, SimulatedEntity};
use cpo_finance_core::simulation::rng::StdRandom;
use cpo_finance_core::time_value::npv;
use cpo_finance_core::{round_money, Money, PeriodUnit};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Strategies
// ===========================================================================

/// Whole-cent amounts between 0.01 and 1,000,000.00
fn money(max_cents: i64) -> impl Strategy<Value = Money> {
    (1i64..=max_cents).prop_map(|cents| Decimal::new(cents, 2))
}

/// Rates in basis points, as decimals
fn rate(max_bps: i64) -> impl Strategy<Value = Decimal> {
    (0i64..=max_bps).prop_map(|bps| Decimal::new(bps, 4))
}

fn loan_terms() -> impl Strategy<Value = LoanTerms> {
    (
        money(100_000_000),
        (0i64..=1500).prop_map(|bp| Decimal::new(bp, 2)),
        1u32..=30,
        0u32..=29,
        prop_oneof![Just(PeriodUnit::Annual), Just(PeriodUnit::Monthly)],
    )
        .prop_filter_map("grace must be shorter than term", |(p, r, term, grace, unit)| {
            (grace < term).then_some(LoanTerms {
                principal: p,
                annual_interest_rate: r,
                term_years: term,
                grace_years: grace,
                period_unit: unit,
            })
        })
}

fn projection_input() -> impl Strategy<Value = ProjectionInput> {
    (
        money(10_000_000),
        money(5_000_000),
        money(2_000_000),
        money(500_000),
        rate(2000),
        rate(1000),
        1u32..=25,
    )
        .prop_map(|(investment, revenue, energy, maintenance, g, i, years)| ProjectionInput {
            investment_total: investment,
            drivers: ProjectionDrivers {
                base_revenue: revenue,
                base_energy_cost: energy,
                base_maintenance_cost: maintenance,
            },
            growth: GrowthAssumptions {
                growth_rate: g,
                inflation_rate: i,
                price_escalation_rate: i,
                energy_price_escalation_rate: i,
            },
            years,
            loan_payments: vec![],
            repair_costs: vec![],
            revenue_losses: vec![],
        })
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn availability_factor_is_a_fraction(
        weekly_closure in any::<bool>(),
        festival_days in 0u32..400,
        rainy_days in 0u32..400,
    ) {
        let factor = availability_factor(&AvailabilityExclusions {
            weekly_closure,
            festival_days,
            rainy_days,
        });
        prop_assert!(factor >= Decimal::ZERO);
        prop_assert!(factor <= Decimal::ONE);
    }

    #[test]
    fn schedule_repays_exact_principal(terms in loan_terms()) {
        let result = schedule(&terms).unwrap();
        prop_assert_eq!(result.entries.len() as u32, terms.total_periods());
        prop_assert_eq!(result.totals.total_principal, terms.principal);
        prop_assert_eq!(
            result.totals.total_interest + result.totals.total_principal,
            result.totals.total_payment
        );
        prop_assert_eq!(result.entries.last().unwrap().balance, Decimal::ZERO);
        let mut previous = terms.principal;
        for entry in &result.entries {
            prop_assert!(entry.balance <= previous);
            previous = entry.balance;
        }
    }

    #[test]
    fn zero_rate_payment_is_even_split(
        principal in money(10_000_000),
        term_years in 1u32..=20,
    ) {
        let terms = LoanTerms {
            principal,
            annual_interest_rate: Decimal::ZERO,
            term_years,
            grace_years: 0,
            period_unit: PeriodUnit::Annual,
        };
        let result = schedule(&terms).unwrap();
        prop_assert_eq!(
            result.periodic_payment,
            round_money(principal / Decimal::from(term_years))
        );
        prop_assert!(result.totals.total_interest.is_zero());
    }

    #[test]
    fn projection_starts_with_investment_and_chains(input in projection_input()) {
        let periods = project(&input, None).unwrap();
        prop_assert_eq!(periods.len() as u32, input.years + 1);
        prop_assert_eq!(periods[0].cumulative_cash_flow, -input.investment_total);
        for w in periods.windows(2) {
            prop_assert_eq!(
                w[1].cumulative_cash_flow,
                w[0].cumulative_cash_flow + w[1].net_cash_flow
            );
            prop_assert_eq!(
                w[1].net_cash_flow,
                w[1].revenue - w[1].operating_cost - w[1].loan_payment
            );
        }
    }

    #[test]
    fn npv_at_zero_rate_is_plain_sum(
        flows in prop::collection::vec((-1_000_000i64..1_000_000).prop_map(|c| Decimal::new(c, 2)), 1..30)
    ) {
        let total: Decimal = flows.iter().copied().sum();
        prop_assert_eq!(npv(Decimal::ZERO, &flows).unwrap(), total);
    }

    #[test]
    fn seeded_simulation_is_deterministic(
        seed in any::<u64>(),
        probability in rate(10_000),
        years in 1u32..=15,
    ) {
        let entities: Vec<SimulatedEntity> = (0..3)
            .map(|i| SimulatedEntity {
                name: format!("E{i}"),
                cost: dec!(20000),
                daily_revenue: Some(dec!(30)),
            })
            .collect();
        let params = FailureParameters {
            failure_probability: probability,
            age_increment: dec!(0.01),
            repair_cost_bounds: Default::default(),
            retirement_probability: dec!(0.1),
            failure_mix: None,
        };
        let a = simulate(&entities, years, &params, &mut StdRandom::seeded(seed), None).unwrap();
        let b = simulate(&entities, years, &params, &mut StdRandom::seeded(seed), None).unwrap();
        prop_assert_eq!(a, b);
    }
}
