//! Tests for the calculation phase
//!
//! Critical invariants tested:
//! - Weekly mode activates at most once per ledger
//! - All three parameters switch together and never revert
//! - The max steps override works in either phase

use commission_ledger_core_rs::core::time::SECONDS_PER_WEEK;
use commission_ledger_core_rs::{
    CalculationPhase, GatewayError, LedgerConfig, OrderGateway, PhaseError, PhaseParameters,
    PhaseState,
};

/// Monday 2024-01-01 00:00:00 UTC
const MONDAY: i64 = 1_704_067_200;

#[test]
fn test_launch_parameters() {
    let phase = CalculationPhase::new();
    assert_eq!(phase.max_steps(), 5);
    assert_eq!(phase.bv_balance_threshold(), 500);
    assert_eq!(phase.commission_per_step(), 60);
    assert_eq!(phase.weekly_start_time(), 0);
    assert!(!phase.is_weekly());
}

#[test]
fn test_activation_switches_all_parameters() {
    let mut phase = CalculationPhase::new();
    let start = phase.activate_weekly_mode(MONDAY + 3 * 86_400).unwrap();

    assert_eq!(start, MONDAY + SECONDS_PER_WEEK);
    assert_eq!(phase.weekly_start_time(), start);
    assert_eq!(phase.state(), PhaseState::Weekly { weekly_start_time: start });
    assert_eq!(phase.max_steps(), 20);
    assert_eq!(phase.bv_balance_threshold(), 600);
    assert_eq!(phase.commission_per_step(), 70);
}

#[test]
fn test_second_activation_fails_and_changes_nothing() {
    let mut phase = CalculationPhase::new();
    let start = phase.activate_weekly_mode(MONDAY).unwrap();
    let before = phase.clone();

    assert_eq!(
        phase.activate_weekly_mode(MONDAY + 52 * SECONDS_PER_WEEK),
        Err(PhaseError::AlreadyActivated { weekly_start_time: start })
    );
    assert_eq!(phase, before);
}

#[test]
fn test_override_before_activation_is_replaced_by_weekly_cap() {
    let mut phase = CalculationPhase::new();
    assert_eq!(phase.set_max_steps(2), 5);
    assert_eq!(phase.max_steps(), 2);

    phase.activate_weekly_mode(MONDAY).unwrap();
    assert_eq!(phase.max_steps(), 20);
}

#[test]
fn test_override_after_activation() {
    let mut phase = CalculationPhase::new();
    phase.activate_weekly_mode(MONDAY).unwrap();

    assert_eq!(phase.set_max_steps(8), 20);
    assert_eq!(phase.max_steps(), 8);
    // Only the cap changes
    assert_eq!(phase.bv_balance_threshold(), 600);
    assert_eq!(phase.commission_per_step(), 70);
    assert!(phase.is_weekly());
}

#[test]
fn test_custom_parameter_sets() {
    let launch = PhaseParameters {
        max_steps: 3,
        bv_balance_threshold: 100,
        commission_per_step: 10,
    };
    let weekly = PhaseParameters {
        max_steps: 4,
        bv_balance_threshold: 200,
        commission_per_step: 15,
    };
    let mut phase = CalculationPhase::with_parameters(launch, weekly);
    assert_eq!(phase.parameters(), launch);

    phase.activate_weekly_mode(MONDAY).unwrap();
    assert_eq!(phase.parameters(), weekly);
}

#[test]
fn test_gateway_activation_once_per_instance() {
    let mut first = OrderGateway::new(LedgerConfig::default()).unwrap();
    let mut second = OrderGateway::new(LedgerConfig::default()).unwrap();

    assert!(first.activate_weekly_mode(MONDAY).is_ok());
    assert!(matches!(
        first.activate_weekly_mode(MONDAY),
        Err(GatewayError::Phase(PhaseError::AlreadyActivated { .. }))
    ));
    // Independent instance keeps its own phase
    assert!(!second.phase().is_weekly());
    assert!(second.activate_weekly_mode(MONDAY).is_ok());

    assert_eq!(
        first.event_log().events_of_type("WeeklyModeActivated").len(),
        1
    );
}
