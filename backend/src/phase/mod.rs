//! Calculation Phase
//!
//! Global distribution parameters and their one-way switch from the launch
//! phase to the weekly phase.
//!
//! # Phases
//!
//! | Phase  | max steps | BV balance threshold | commission per step |
//! |--------|-----------|----------------------|---------------------|
//! | Launch | 5         | 500                  | 60                  |
//! | Weekly | 20        | 600                  | 70                  |
//!
//! The switch is an explicit state transition: [`PhaseState::Launch`] moves
//! to [`PhaseState::Weekly`] exactly once and never back. The only other
//! mutation is the administrative `max_steps` override.

use crate::core::time::{next_week_start, weeks_between};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors raised by phase transitions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Weekly mode already activated (weekly start {weekly_start_time})")]
    AlreadyActivated { weekly_start_time: i64 },

    #[error("Timestamp {timestamp} is outside the representable calendar range")]
    InvalidTimestamp { timestamp: i64 },
}

/// One parameter set of the commission algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseParameters {
    /// Propagation depth cap per order
    pub max_steps: u32,
    /// Unpaid slot volume an ancestor needs before a step is credited
    pub bv_balance_threshold: i64,
    /// Commission credited per step
    pub commission_per_step: i64,
}

impl PhaseParameters {
    /// Parameters in force before weekly mode
    pub const LAUNCH: PhaseParameters = PhaseParameters {
        max_steps: 5,
        bv_balance_threshold: 500,
        commission_per_step: 60,
    };

    /// Parameters in force once weekly mode is activated
    pub const WEEKLY: PhaseParameters = PhaseParameters {
        max_steps: 20,
        bv_balance_threshold: 600,
        commission_per_step: 70,
    };
}

/// Which phase the ledger is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseState {
    Launch,
    Weekly {
        /// Monday 00:00 UTC of the first weekly period (Unix seconds)
        weekly_start_time: i64,
    },
}

/// Mutable distribution parameters with a one-way weekly switch
///
/// # Example
/// ```
/// use commission_ledger_core_rs::phase::{CalculationPhase, PhaseError};
///
/// let mut phase = CalculationPhase::new();
/// assert_eq!(phase.max_steps(), 5);
///
/// // Wednesday 2024-01-03 12:00 UTC -> weekly start Monday 2024-01-08
/// let start = phase.activate_weekly_mode(1_704_283_200).unwrap();
/// assert_eq!(start, 1_704_672_000);
/// assert_eq!(phase.max_steps(), 20);
/// assert!(matches!(
///     phase.activate_weekly_mode(1_704_283_200),
///     Err(PhaseError::AlreadyActivated { .. })
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationPhase {
    state: PhaseState,
    params: PhaseParameters,
    /// Parameters applied when weekly mode is activated
    weekly: PhaseParameters,
}

impl Default for CalculationPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationPhase {
    /// Launch phase with the standard parameter sets
    pub fn new() -> Self {
        Self::with_parameters(PhaseParameters::LAUNCH, PhaseParameters::WEEKLY)
    }

    /// Launch phase with custom parameter sets
    pub fn with_parameters(launch: PhaseParameters, weekly: PhaseParameters) -> Self {
        Self {
            state: PhaseState::Launch,
            params: launch,
            weekly,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Current parameters (copied so a distribution reads them once)
    pub fn parameters(&self) -> PhaseParameters {
        self.params
    }

    /// Weekly start time, or 0 while in the launch phase
    pub fn weekly_start_time(&self) -> i64 {
        match self.state {
            PhaseState::Launch => 0,
            PhaseState::Weekly { weekly_start_time } => weekly_start_time,
        }
    }

    /// Parameter set applied on weekly activation
    pub fn weekly_parameters(&self) -> PhaseParameters {
        self.weekly
    }

    /// Whether this phase can have been produced from the given parameter sets
    ///
    /// Only the active `max_steps` may differ, as the administrative override
    /// changes it in either phase. A weekly start must fall on Monday 00:00 UTC.
    pub fn conforms_to(&self, launch: PhaseParameters, weekly: PhaseParameters) -> bool {
        let (expected, start_ok) = match self.state {
            PhaseState::Launch => (launch, true),
            PhaseState::Weekly { weekly_start_time } => (
                weekly,
                weekly_start_time
                    .checked_sub(1)
                    .and_then(next_week_start)
                    == Some(weekly_start_time),
            ),
        };
        let active = PhaseParameters {
            max_steps: self.params.max_steps,
            ..expected
        };
        start_ok && self.weekly == weekly && self.params == active
    }

    pub fn is_weekly(&self) -> bool {
        matches!(self.state, PhaseState::Weekly { .. })
    }

    pub fn max_steps(&self) -> u32 {
        self.params.max_steps
    }

    pub fn bv_balance_threshold(&self) -> i64 {
        self.params.bv_balance_threshold
    }

    pub fn commission_per_step(&self) -> i64 {
        self.params.commission_per_step
    }

    /// Switch to weekly mode, returning the computed weekly start time
    ///
    /// The weekly start is the Monday 00:00 UTC following the week that
    /// contains `timestamp`. All three parameters switch together.
    pub fn activate_weekly_mode(&mut self, timestamp: i64) -> Result<i64, PhaseError> {
        if let PhaseState::Weekly { weekly_start_time } = self.state {
            return Err(PhaseError::AlreadyActivated { weekly_start_time });
        }
        let weekly_start_time =
            next_week_start(timestamp).ok_or(PhaseError::InvalidTimestamp { timestamp })?;

        self.state = PhaseState::Weekly { weekly_start_time };
        self.params = self.weekly;
        info!(
            activated_at = timestamp,
            weekly_start_time,
            max_steps = self.params.max_steps,
            bv_balance_threshold = self.params.bv_balance_threshold,
            commission_per_step = self.params.commission_per_step,
            "weekly mode activated"
        );
        Ok(weekly_start_time)
    }

    /// Administrative override of the propagation depth cap
    ///
    /// Returns the previous value. Usable in either phase; activating weekly
    /// mode later still applies the weekly cap.
    pub fn set_max_steps(&mut self, max_steps: u32) -> u32 {
        let old = self.params.max_steps;
        self.params.max_steps = max_steps;
        info!(old, new = max_steps, "max steps updated");
        old
    }

    /// Whole weeks since the weekly start, or None if not yet started
    pub fn week_index(&self, timestamp: i64) -> Option<u64> {
        match self.state {
            PhaseState::Launch => None,
            PhaseState::Weekly { weekly_start_time } => weeks_between(weekly_start_time, timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::SECONDS_PER_WEEK;

    const MONDAY: i64 = 1_704_067_200;

    #[test]
    fn test_launch_defaults() {
        let phase = CalculationPhase::new();
        assert_eq!(phase.state(), PhaseState::Launch);
        assert_eq!(phase.weekly_start_time(), 0);
        assert_eq!(phase.parameters(), PhaseParameters::LAUNCH);
    }

    #[test]
    fn test_activation_is_one_way() {
        let mut phase = CalculationPhase::new();
        let start = phase.activate_weekly_mode(MONDAY + 3600).unwrap();
        assert_eq!(start, MONDAY + SECONDS_PER_WEEK);

        let again = phase.activate_weekly_mode(MONDAY + 10 * SECONDS_PER_WEEK);
        assert_eq!(again, Err(PhaseError::AlreadyActivated { weekly_start_time: start }));
        assert_eq!(phase.weekly_start_time(), start);
        assert_eq!(phase.parameters(), PhaseParameters::WEEKLY);
    }

    #[test]
    fn test_invalid_timestamp_leaves_launch_phase() {
        let mut phase = CalculationPhase::new();
        assert_eq!(
            phase.activate_weekly_mode(i64::MAX),
            Err(PhaseError::InvalidTimestamp { timestamp: i64::MAX })
        );
        assert!(!phase.is_weekly());
        assert_eq!(phase.parameters(), PhaseParameters::LAUNCH);
    }

    #[test]
    fn test_week_index() {
        let mut phase = CalculationPhase::new();
        assert_eq!(phase.week_index(MONDAY), None);

        let start = phase.activate_weekly_mode(MONDAY).unwrap();
        assert_eq!(phase.week_index(start - 1), None);
        assert_eq!(phase.week_index(start), Some(0));
        assert_eq!(phase.week_index(start + 2 * SECONDS_PER_WEEK + 5), Some(2));
    }

    #[test]
    fn test_conforms_to_allows_only_max_steps_override() {
        let mut phase = CalculationPhase::new();
        let (launch, weekly) = (PhaseParameters::LAUNCH, PhaseParameters::WEEKLY);
        assert!(phase.conforms_to(launch, weekly));

        phase.set_max_steps(12);
        assert!(phase.conforms_to(launch, weekly));

        let mut other = weekly;
        other.commission_per_step = 99;
        assert!(!phase.conforms_to(launch, other));
        assert!(!phase.conforms_to(weekly, weekly));

        phase.activate_weekly_mode(MONDAY).unwrap();
        assert!(phase.conforms_to(launch, weekly));
        assert!(!phase.conforms_to(launch, other));
    }

    #[test]
    fn test_conforms_to_rejects_off_boundary_start() {
        let phase = CalculationPhase {
            state: PhaseState::Weekly {
                weekly_start_time: MONDAY + 3_600,
            },
            params: PhaseParameters::WEEKLY,
            weekly: PhaseParameters::WEEKLY,
        };
        assert!(!phase.conforms_to(PhaseParameters::LAUNCH, PhaseParameters::WEEKLY));
    }
}
