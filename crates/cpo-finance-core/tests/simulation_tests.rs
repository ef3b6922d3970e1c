use cpo_finance_core::simulation::distribution::{
    analyze_failure_risk, simulate_failure_distribution, FailureRiskInput,
};
use cpo_finance_core::simulation::failure::{
    simulate, simulate_failures, FailureMix, FailureSimulationInput, RepairCostBounds,
    SimulatedEntity,
};
use cpo_finance_core::simulation::rng::StdRandom;
use cpo_finance_core::{CpoFinanceError, EngineConfig};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn fleet(count: usize) -> Vec<SimulatedEntity> {
    (0..count)
        .map(|i| SimulatedEntity {
            name: format!("Station {}", i + 1),
            cost: dec!(10000),
            daily_revenue: Some(dec!(40)),
        })
        .collect()
}

fn fleet_input(failure_probability: Decimal) -> FailureSimulationInput {
    FailureSimulationInput {
        entities: fleet(4),
        years: 8,
        failure_probability,
        age_increment: None,
        repair_cost_bounds: None,
        retirement_probability: None,
        failure_mix: None,
        seed: Some(2024),
        config: EngineConfig::default(),
    }
}

fn fixed_repair(fraction: Decimal) -> Option<RepairCostBounds> {
    Some(RepairCostBounds {
        low: fraction,
        high: fraction,
    })
}

// ===========================================================================
// Single simulation
// ===========================================================================

#[test]
fn test_seed_reproduces_events() {
    let a = simulate_failures(&fleet_input(dec!(0.2))).unwrap();
    let b = simulate_failures(&fleet_input(dec!(0.2))).unwrap();
    assert_eq!(a.result, b.result);
    assert_eq!(a.result.events.len(), 8);
}

#[test]
fn test_zero_probability_never_fails() {
    let mut input = fleet_input(Decimal::ZERO);
    input.age_increment = Some(Decimal::ZERO);
    let result = simulate_failures(&input).unwrap().result;
    assert_eq!(result.summary.total_failures, 0);
    assert_eq!(result.summary.total_repair_cost, Decimal::ZERO);
    assert!(result.events.iter().all(|e| e.active_entities == 4));
}

#[test]
fn test_certain_failure_fixed_repair() {
    let mut input = fleet_input(Decimal::ONE);
    input.repair_cost_bounds = fixed_repair(dec!(0.10));
    input.retirement_probability = Some(Decimal::ZERO);
    let result = simulate_failures(&input).unwrap().result;
    for event in &result.events {
        assert_eq!(event.failure_count, 4);
        assert_eq!(event.repair_cost, dec!(4000.00));
        assert!(!event.permanent_retirement);
    }
    assert_eq!(result.summary.total_repair_cost, dec!(32000.00));
    assert_eq!(result.summary.average_yearly_cost, dec!(4000.00));
    assert_eq!(result.summary.average_failures_per_entity, Some(dec!(8)));
}

#[test]
fn test_retired_entities_leave_service() {
    let mut input = fleet_input(Decimal::ONE);
    input.retirement_probability = Some(Decimal::ONE);
    let output = simulate_failures(&input).unwrap();
    let events = &output.result.events;
    assert_eq!(events[0].retired_count, 4);
    assert!(events[0].permanent_retirement);
    assert_eq!(events[1].active_entities, 0);
    assert_eq!(events[1].failure_count, 0);
    assert_eq!(output.result.summary.retired_entities, 4);
    assert!(output.warnings.iter().any(|w| w.contains("permanently retired")));
}

#[test]
fn test_probability_grows_with_age() {
    let mut input = fleet_input(dec!(0.95));
    input.age_increment = Some(dec!(0.02));
    let result = simulate_failures(&input).unwrap().result;
    assert_eq!(result.events[0].failure_rate, dec!(0.95));
    assert_eq!(result.events[1].failure_rate, dec!(0.97));
    assert_eq!(result.events[2].failure_rate, dec!(0.99));
    // Capped at certainty
    assert_eq!(result.events[3].failure_rate, Decimal::ONE);
}

#[test]
fn test_replacement_mix_costs_full_entity_and_downtime() {
    let mut input = fleet_input(Decimal::ONE);
    input.retirement_probability = Some(Decimal::ZERO);
    input.failure_mix = Some(FailureMix {
        minor_pct: Decimal::ZERO,
        major_pct: Decimal::ZERO,
        replacement_pct: dec!(100),
        ..Default::default()
    });
    let result = simulate_failures(&input).unwrap().result;
    let first = &result.events[0];
    assert_eq!(first.repair_cost, dec!(40000.00));
    // 14 days of downtime at 40 per day, four stations
    assert_eq!(first.revenue_loss, dec!(2240.00));
    assert_eq!(result.revenue_losses().len(), 8);
}

#[test]
fn test_unbalanced_mix_rejected() {
    let mut input = fleet_input(dec!(0.1));
    input.failure_mix = Some(FailureMix {
        minor_pct: dec!(50),
        major_pct: dec!(20),
        replacement_pct: dec!(5),
        ..Default::default()
    });
    match simulate_failures(&input) {
        Err(CpoFinanceError::InvalidInput { field, .. }) => assert_eq!(field, "failure_mix"),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_unseeded_run_warns() {
    let mut input = fleet_input(dec!(0.1));
    input.seed = None;
    let output = simulate_failures(&input).unwrap();
    assert!(output.warnings.iter().any(|w| w.contains("not reproducible")));
}

#[test]
fn test_simulate_with_explicit_source() {
    let input = fleet_input(dec!(0.3));
    let params = input.parameters();
    let mut rng = StdRandom::seeded(2024);
    let direct = simulate(&input.entities, input.years, &params, &mut rng, None).unwrap();
    let wrapped = simulate_failures(&input).unwrap().result;
    assert_eq!(direct, wrapped);
}

#[test]
fn test_input_from_json_uses_config_defaults() {
    let input: FailureSimulationInput = serde_json::from_str(
        r#"{
            "entities": [{"name": "A", "cost": "8000"}],
            "years": 3,
            "failure_probability": "0.05",
            "seed": 1
        }"#,
    )
    .unwrap();
    let params = input.parameters();
    assert_eq!(params.age_increment, dec!(0.01));
    assert_eq!(params.retirement_probability, dec!(0.10));
    assert_eq!(params.repair_cost_bounds, RepairCostBounds::default());
}

// ===========================================================================
// Distribution
// ===========================================================================

#[test]
fn test_deterministic_distribution_has_no_spread() {
    let mut input = fleet_input(Decimal::ONE);
    input.repair_cost_bounds = fixed_repair(dec!(0.10));
    input.retirement_probability = Some(Decimal::ZERO);
    let out = simulate_failure_distribution(&input, 20, 5, None).unwrap();
    assert_eq!(out.total_repair_cost.mean, 32000.0);
    assert_eq!(out.total_repair_cost.std_dev, 0.0);
    assert_eq!(out.total_repair_cost.min, out.total_repair_cost.max);
    assert_eq!(out.mean_failures, 32.0);
    assert_eq!(out.retirement_share, 0.0);
}

#[test]
fn test_run_limits() {
    let input = fleet_input(dec!(0.1));
    assert!(simulate_failure_distribution(&input, 0, 1, None).is_err());
    assert!(simulate_failure_distribution(&input, 100_001, 1, None).is_err());
}

#[test]
fn test_risk_envelope() {
    let input = FailureRiskInput {
        simulation: fleet_input(dec!(0.15)),
        runs: 50,
    };
    let output = analyze_failure_risk(&input).unwrap();
    assert_eq!(output.metadata.precision, "ieee754_f64");
    assert_eq!(output.result.runs, 50);
    assert_eq!(output.result.base_seed, 2024);
    assert!(output.warnings.iter().any(|w| w.contains("unstable")));

    let again = analyze_failure_risk(&input).unwrap();
    assert_eq!(output.result, again.result);
}
