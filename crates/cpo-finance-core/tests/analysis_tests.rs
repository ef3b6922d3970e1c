use chrono::NaiveDate;
use cpo_finance_core::analysis::pipeline::{
    run_analysis, run_analysis_cancellable, run_analysis_with, AnalysisInput, MacroParameters,
    MonthlySettings, ScenarioAdjustments, SimulationSettings, StationInput,
};
use cpo_finance_core::cost::investment::Investment;
use cpo_finance_core::financing::amortization::LoanTerms;
use cpo_finance_core::revenue::calendar::AvailabilityExclusions;
use cpo_finance_core::revenue::usage::{RevenueOptions, UtilizationProfile};
use cpo_finance_core::simulation::failure::RepairCostBounds;
use cpo_finance_core::simulation::rng::StdRandom;
use cpo_finance_core::{CancellationToken, CpoFinanceError, EngineConfig, PeriodUnit};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn station(name: &str) -> StationInput {
    StationInput {
        name: name.into(),
        investment: Investment {
            equipment: Some(dec!(10000)),
            installation: Some(dec!(5000)),
            ..Default::default()
        },
        profile: UtilizationProfile {
            sessions_per_day: dec!(5),
            kwh_per_session: dec!(15),
            price_per_kwh: dec!(0.45),
            energy_cost_per_kwh: dec!(0.25),
            exclusions: AvailabilityExclusions::default(),
        },
        station_cost: None,
    }
}

fn single_station_project() -> AnalysisInput {
    AnalysisInput {
        name: "Piazza Garibaldi".into(),
        stations: vec![station("Garibaldi 1")],
        loan: None,
        macro_params: MacroParameters {
            growth_rate: Decimal::ZERO,
            inflation_rate: Decimal::ZERO,
            price_escalation_rate: Decimal::ZERO,
            energy_price_escalation_rate: Decimal::ZERO,
            discount_rate: Some(dec!(0.05)),
            failure_probability: Decimal::ZERO,
            repair_cost_bounds: None,
            years: 10,
        },
        revenue_options: RevenueOptions::default(),
        simulation: None,
        monthly: None,
        config: EngineConfig::default(),
    }
}

fn certain_failures(input: &mut AnalysisInput, include_in_cash_flow: bool) {
    input.macro_params.failure_probability = Decimal::ONE;
    input.macro_params.repair_cost_bounds = Some(RepairCostBounds {
        low: dec!(0.10),
        high: dec!(0.10),
    });
    input.config.retirement_probability = Decimal::ZERO;
    input.simulation = Some(SimulationSettings {
        seed: Some(7),
        failure_mix: None,
        include_in_cash_flow,
    });
}

// ===========================================================================
// Base pipeline
// ===========================================================================

#[test]
fn test_single_station_reference_case() {
    let output = run_analysis(&single_station_project()).unwrap();
    let result = &output.result;

    assert_eq!(result.investment_total, dec!(15000));
    assert_eq!(result.stations[0].station_cost, dec!(10000));
    assert_eq!(result.stations[0].annual_profit, dec!(4975.00));
    assert_eq!(result.cash_flows.len(), 11);
    assert_eq!(result.cash_flows[1].net_cash_flow, dec!(4975.00));
    assert_eq!(result.totals.total_revenue, dec!(123187.50));
    assert_eq!(result.metrics.payback_years, dec!(3.02));
    assert!(result.metrics.npv > Decimal::ZERO);
    assert!(result.amortization.is_none());
    assert!(result.failures.is_none());
}

#[test]
fn test_multiple_stations_aggregate() {
    let mut input = single_station_project();
    input.stations.push(station("Garibaldi 2"));
    let result = run_analysis(&input).unwrap().result;
    assert_eq!(result.investment_total, dec!(30000));
    assert_eq!(result.stations.len(), 2);
    assert_eq!(result.cash_flows[1].revenue, dec!(24637.50));
    assert_eq!(result.cash_flows[1].net_cash_flow, dec!(9950.00));
}

#[test]
fn test_loan_payments_enter_cash_flow() {
    let mut input = single_station_project();
    input.loan = Some(LoanTerms {
        principal: dec!(10000),
        annual_interest_rate: dec!(5),
        term_years: 10,
        grace_years: 0,
        period_unit: PeriodUnit::Annual,
    });
    let result = run_analysis(&input).unwrap().result;
    assert_eq!(result.loan_amount, dec!(10000));
    assert_eq!(result.cash_flows[1].loan_payment, dec!(1295.05));
    assert_eq!(result.cash_flows[1].net_cash_flow, dec!(3679.95));
    assert_eq!(result.metrics.ltv, Some(dec!(66.67)));
    assert!(result.metrics.dscr.is_some());
    assert_eq!(result.amortization.unwrap().entries.len(), 10);
}

#[test]
fn test_zero_principal_loan_is_skipped() {
    let mut input = single_station_project();
    input.loan = Some(LoanTerms {
        principal: Decimal::ZERO,
        annual_interest_rate: dec!(5),
        term_years: 10,
        grace_years: 0,
        period_unit: PeriodUnit::Annual,
    });
    let output = run_analysis(&input).unwrap();
    assert_eq!(output.result.loan_amount, Decimal::ZERO);
    assert!(output.result.amortization.is_none());
    assert!(output.warnings.iter().any(|w| w.contains("principal is zero")));
}

#[test]
fn test_long_loan_warns() {
    let mut input = single_station_project();
    input.macro_params.years = 5;
    input.loan = Some(LoanTerms {
        principal: dec!(5000),
        annual_interest_rate: dec!(4),
        term_years: 8,
        grace_years: 0,
        period_unit: PeriodUnit::Monthly,
    });
    let output = run_analysis(&input).unwrap();
    assert!(output.warnings.iter().any(|w| w.contains("exceeds the 5-year horizon")));
    assert_eq!(output.result.cash_flows.len(), 6);
}

// ===========================================================================
// Failures
// ===========================================================================

#[test]
fn test_failures_folded_into_cash_flow() {
    let mut input = single_station_project();
    certain_failures(&mut input, true);
    let result = run_analysis(&input).unwrap().result;
    let failures = result.failures.as_ref().unwrap();
    assert_eq!(failures.summary.total_failures, 10);
    for period in &result.cash_flows[1..] {
        assert_eq!(period.repair_cost, dec!(1000.00));
        assert_eq!(period.net_cash_flow, dec!(3975.00));
    }
}

#[test]
fn test_failures_reported_but_not_folded() {
    let mut input = single_station_project();
    certain_failures(&mut input, false);
    let result = run_analysis(&input).unwrap().result;
    assert!(result.failures.is_some());
    assert!(result.cash_flows.iter().all(|p| p.repair_cost.is_zero()));
    assert_eq!(result.cash_flows[1].net_cash_flow, dec!(4975.00));
}

#[test]
fn test_seeded_analysis_reproducible() {
    let mut input = single_station_project();
    input.macro_params.failure_probability = dec!(0.3);
    input.simulation = Some(SimulationSettings {
        seed: Some(99),
        failure_mix: None,
        include_in_cash_flow: true,
    });
    let a = run_analysis(&input).unwrap().result;
    let b = run_analysis(&input).unwrap().result;
    assert_eq!(a, b);
}

#[test]
fn test_unseeded_simulation_warns() {
    let mut input = single_station_project();
    input.macro_params.failure_probability = dec!(0.1);
    input.simulation = Some(SimulationSettings {
        seed: None,
        failure_mix: None,
        include_in_cash_flow: true,
    });
    let output = run_analysis(&input).unwrap();
    assert!(output.warnings.iter().any(|w| w.contains("no seed")));
}

// ===========================================================================
// Adjustments, monthly stage and errors
// ===========================================================================

#[test]
fn test_adjustments_scale_drivers_and_capex() {
    let input = single_station_project();
    let adjustments = ScenarioAdjustments {
        revenue_factor: dec!(1.2),
        cost_factor: dec!(0.8),
        capex_factor: dec!(2),
    };
    let mut rng = StdRandom::seeded(0);
    let (output, _) = run_analysis_with(&input, &adjustments, &mut rng, None).unwrap();
    assert_eq!(output.investment_total, dec!(30000));
    assert_eq!(output.cash_flows[1].revenue, dec!(14782.50));
    assert_eq!(output.cash_flows[1].operating_cost, dec!(5875.00));
}

#[test]
fn test_monthly_stage() {
    let mut input = single_station_project();
    input.monthly = Some(MonthlySettings {
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        months: Some(6),
        apply_seasonality: false,
    });
    let result = run_analysis(&input).unwrap().result;
    let monthly = result.monthly.unwrap();
    assert_eq!(monthly.len(), 7);
    assert_eq!(monthly[0].cumulative_cash_flow, dec!(-15000));
    assert_eq!(monthly[1].label, "2026-03");
}

#[test]
fn test_no_stations_rejected() {
    let mut input = single_station_project();
    input.stations.clear();
    match run_analysis(&input) {
        Err(CpoFinanceError::InvalidInput { field, .. }) => assert_eq!(field, "stations"),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_invalid_station_field_path() {
    let mut input = single_station_project();
    input.stations[0].investment.permits = Some(dec!(-1));
    match run_analysis(&input) {
        Err(CpoFinanceError::InvalidInput { field, .. }) => {
            assert_eq!(field, "stations[0].investment.permits")
        }
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_cancelled_analysis() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(
        run_analysis_cancellable(&single_station_project(), Some(&token)),
        Err(CpoFinanceError::Cancelled { .. })
    ));
}

#[test]
fn test_analysis_input_from_json() {
    let input: AnalysisInput = serde_json::from_str(
        r#"{
            "name": "Porto",
            "stations": [{
                "name": "Molo 1",
                "investment": {"equipment": 10000, "installation": 5000},
                "profile": {
                    "sessions_per_day": 5,
                    "kwh_per_session": 15,
                    "price_per_kwh": 0.45,
                    "energy_cost_per_kwh": 0.25
                }
            }],
            "macro_params": {"years": 10, "discount_rate": 0.05}
        }"#,
    )
    .unwrap();
    assert!(input.loan.is_none());
    assert!(input.simulation.is_none());
    let result = run_analysis(&input).unwrap().result;
    assert_eq!(result.cash_flows[1].net_cash_flow, dec!(4975.00));
}
