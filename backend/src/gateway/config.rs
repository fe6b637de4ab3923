//! Ledger configuration
//!
//! Everything that shapes the ledger's arithmetic lives in one
//! serde-deserializable record so collaborators can ship it as JSON and
//! checkpoints can pin it by hash.
//!
//! ```json
//! {
//!   "value_split": { "bv_bps": 5000, "uv_bps": 3000 },
//!   "launch_parameters": { "max_steps": 5, "bv_balance_threshold": 500, "commission_per_step": 60 },
//!   "weekly_parameters": { "max_steps": 20, "bv_balance_threshold": 600, "commission_per_step": 70 },
//!   "commission": { "step_budget": "every_ancestor", "propagation": { "mode": "raw" } }
//! }
//! ```
//!
//! Every field is optional; omitted fields take the defaults shown above.

use crate::commission::{CommissionConfig, PropagationValue, BPS_DENOMINATOR};
use crate::models::order::ValueComponents;
use crate::phase::PhaseParameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Value split exceeds 100%: bv_bps {bv_bps} + uv_bps {uv_bps} > 10000")]
    SplitExceedsWhole { bv_bps: u32, uv_bps: u32 },

    #[error("{phase} parameters invalid: {reason}")]
    InvalidParameters { phase: &'static str, reason: String },

    #[error("Decay retain_bps {retain_bps} exceeds 10000")]
    InvalidDecay { retain_bps: u32 },
}

/// Fixed ratio used to split an allocation's business value
///
/// `bv` and `uv` are floor-rounded shares; `fv` takes the remainder so the
/// three components always sum to the business value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSplit {
    pub bv_bps: u32,
    pub uv_bps: u32,
}

impl Default for ValueSplit {
    fn default() -> Self {
        Self {
            bv_bps: 5_000,
            uv_bps: 3_000,
        }
    }
}

impl ValueSplit {
    /// Split a business value into its bv/uv/fv components
    ///
    /// # Example
    /// ```
    /// use commission_ledger_core_rs::gateway::ValueSplit;
    ///
    /// let parts = ValueSplit::default().split(1_001);
    /// assert_eq!((parts.bv, parts.uv, parts.fv), (500, 300, 201));
    /// ```
    pub fn split(&self, business_value: i64) -> ValueComponents {
        let share = |bps: u32| {
            (i128::from(business_value) * i128::from(bps) / i128::from(BPS_DENOMINATOR)) as i64
        };
        let bv = share(self.bv_bps);
        let uv = share(self.uv_bps);
        ValueComponents {
            bv,
            uv,
            fv: business_value - bv - uv,
        }
    }
}

/// Complete ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub value_split: ValueSplit,
    pub launch_parameters: PhaseParameters,
    pub weekly_parameters: PhaseParameters,
    pub commission: CommissionConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            value_split: ValueSplit::default(),
            launch_parameters: PhaseParameters::LAUNCH,
            weekly_parameters: PhaseParameters::WEEKLY,
            commission: CommissionConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is within range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ValueSplit { bv_bps, uv_bps } = self.value_split;
        if i64::from(bv_bps) + i64::from(uv_bps) > BPS_DENOMINATOR {
            return Err(ConfigError::SplitExceedsWhole { bv_bps, uv_bps });
        }

        validate_parameters("launch", &self.launch_parameters)?;
        validate_parameters("weekly", &self.weekly_parameters)?;

        if let PropagationValue::Decaying { retain_bps } = self.commission.propagation {
            if i64::from(retain_bps) > BPS_DENOMINATOR {
                return Err(ConfigError::InvalidDecay { retain_bps });
            }
        }
        Ok(())
    }
}

fn validate_parameters(phase: &'static str, params: &PhaseParameters) -> Result<(), ConfigError> {
    if params.bv_balance_threshold <= 0 {
        return Err(ConfigError::InvalidParameters {
            phase,
            reason: format!(
                "bv_balance_threshold must be positive, got {}",
                params.bv_balance_threshold
            ),
        });
    }
    if params.commission_per_step < 0 {
        return Err(ConfigError::InvalidParameters {
            phase,
            reason: format!(
                "commission_per_step must be non-negative, got {}",
                params.commission_per_step
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::StepBudgetPolicy;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(LedgerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        assert_eq!(LedgerConfig::from_json("{}").unwrap(), LedgerConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = LedgerConfig::from_json(
            r#"{
                "value_split": { "bv_bps": 10000, "uv_bps": 0 },
                "commission": {
                    "step_budget": "credited_only",
                    "propagation": { "mode": "decaying", "retain_bps": 9000 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.value_split.bv_bps, 10_000);
        assert_eq!(config.commission.step_budget, StepBudgetPolicy::CreditedOnly);
        assert_eq!(
            config.commission.propagation,
            PropagationValue::Decaying { retain_bps: 9_000 }
        );
        assert_eq!(config.weekly_parameters, PhaseParameters::WEEKLY);
    }

    #[test]
    fn test_rejects_oversized_split() {
        let result = LedgerConfig::from_json(r#"{ "value_split": { "bv_bps": 8000, "uv_bps": 3000 } }"#);
        assert_eq!(
            result,
            Err(ConfigError::SplitExceedsWhole {
                bv_bps: 8_000,
                uv_bps: 3_000
            })
        );
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut config = LedgerConfig::default();
        config.weekly_parameters.bv_balance_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameters { phase: "weekly", .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            LedgerConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
