//! Commission engine
//!
//! Two behaviors of the walk are configurable:
//!
//! - [`StepBudgetPolicy`]: whether every visited ancestor consumes one unit
//!   of `max_steps`, or only credited ancestors do
//! - [`PropagationValue`]: whether each level receives the order's raw BV or
//!   a per-level decayed amount

use crate::ledger::UserLedger;
use crate::models::account::AccountId;
use crate::models::event::Event;
use crate::models::order::OrderId;
use crate::phase::PhaseParameters;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Basis points in one whole
pub const BPS_DENOMINATOR: i64 = 10_000;

/// What consumes the `max_steps` budget during a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepBudgetPolicy {
    /// Every visited ancestor consumes one step, credited or not
    #[default]
    EveryAncestor,
    /// Only credited ancestors consume a step; the walk continues toward the
    /// root until the budget is spent
    CreditedOnly,
}

/// Volume recorded at each level of the walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PropagationValue {
    /// The order's BV, unchanged at every level
    #[default]
    Raw,
    /// Each level receives `retain_bps / 10_000` of the previous level
    Decaying { retain_bps: u32 },
}

impl PropagationValue {
    /// Volume passed to the next level up
    fn next(&self, value: i64) -> i64 {
        match *self {
            PropagationValue::Raw => value,
            PropagationValue::Decaying { retain_bps } => {
                (i128::from(value) * i128::from(retain_bps) / i128::from(BPS_DENOMINATOR)) as i64
            }
        }
    }
}

/// Engine behavior settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    pub step_budget: StepBudgetPolicy,
    pub propagation: PropagationValue,
}

/// One ancestor visited by a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRecord {
    pub account_id: AccountId,
    pub slot: u8,
    /// Distance from the buyer (1 = parent)
    pub level: u32,
    /// Volume added to the slot's aggregate counter
    pub value: i64,
    pub credited: bool,
}

/// One commission step credited to an ancestor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionCredit {
    pub account_id: AccountId,
    pub slot: u8,
    pub level: u32,
    pub amount: i64,
}

/// Report of a single order's distribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub order_id: OrderId,
    pub levels: Vec<LevelRecord>,
    pub credits: Vec<CommissionCredit>,
}

impl Distribution {
    fn empty(order_id: OrderId) -> Self {
        Self {
            order_id,
            ..Self::default()
        }
    }

    pub fn total_commission(&self) -> i64 {
        self.credits.iter().map(|c| c.amount).sum()
    }

    /// One `CommissionCredited` event per credit, nearest ancestor first
    pub fn to_events(&self) -> Vec<Event> {
        self.credits
            .iter()
            .map(|credit| Event::CommissionCredited {
                order_id: self.order_id,
                account_id: credit.account_id,
                slot: credit.slot,
                level: credit.level,
                amount: credit.amount,
            })
            .collect()
    }
}

/// Walks ancestor chains and applies commission steps
///
/// # Example
/// ```
/// use commission_ledger_core_rs::commission::CommissionEngine;
/// use commission_ledger_core_rs::ledger::{BvSeed, UserLedger};
/// use commission_ledger_core_rs::phase::PhaseParameters;
///
/// let mut ledger = UserLedger::new();
/// let root = ledger.place("0xroot", 0, 0, BvSeed::default()).unwrap();
/// let buyer = ledger.place("0xbuyer", root, 1, BvSeed::default()).unwrap();
///
/// let engine = CommissionEngine::default();
/// let report = engine.distribute(&mut ledger, PhaseParameters::LAUNCH, 1, buyer, 500);
///
/// assert_eq!(report.total_commission(), 60);
/// assert_eq!(ledger.get_user_by_id(root).unwrap().children_safe_bv()[1], 500);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommissionEngine {
    config: CommissionConfig,
}

impl CommissionEngine {
    pub fn new(config: CommissionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CommissionConfig {
        self.config
    }

    /// Distribute `bv` from `buyer_id` up its ancestor chain
    ///
    /// Zero or negative BV performs no distribution. Unknown buyers and the
    /// root have no ancestors and also produce an empty report.
    ///
    /// Counters are added unchecked; callers keep them in range, as
    /// [`OrderGateway`](crate::gateway::OrderGateway) does before committing.
    pub fn distribute(
        &self,
        ledger: &mut UserLedger,
        params: PhaseParameters,
        order_id: OrderId,
        buyer_id: AccountId,
        bv: i64,
    ) -> Distribution {
        let mut report = Distribution::empty(order_id);
        if bv <= 0 {
            return report;
        }

        let mut value = bv;
        let mut steps_used: u32 = 0;
        for ancestor in ledger.ancestors(buyer_id) {
            if steps_used >= params.max_steps || value <= 0 {
                break;
            }
            let Some(account) = ledger.get_user_mut(ancestor.id) else {
                break;
            };

            account.add_aggregate_bv(ancestor.slot, value);
            let credited = account.unpaid_bv(ancestor.slot) >= params.bv_balance_threshold;
            if credited {
                account.settle_step(
                    ancestor.slot,
                    params.bv_balance_threshold,
                    params.commission_per_step,
                );
                report.credits.push(CommissionCredit {
                    account_id: ancestor.id,
                    slot: ancestor.slot,
                    level: ancestor.level,
                    amount: params.commission_per_step,
                });
            }
            debug!(
                order_id,
                account_id = ancestor.id,
                slot = ancestor.slot,
                level = ancestor.level,
                value,
                credited,
                "commission level applied"
            );
            report.levels.push(LevelRecord {
                account_id: ancestor.id,
                slot: ancestor.slot,
                level: ancestor.level,
                value,
                credited,
            });

            steps_used += match self.config.step_budget {
                StepBudgetPolicy::EveryAncestor => 1,
                StepBudgetPolicy::CreditedOnly => u32::from(credited),
            };
            value = self.config.propagation.next(value);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BvSeed;

    /// Straight chain root -> ... of `depth` levels below the root, all in slot 0
    fn chain(depth: usize) -> (UserLedger, AccountId) {
        let mut ledger = UserLedger::new();
        let mut last = ledger.place("0x0", 0, 0, BvSeed::default()).unwrap();
        for i in 1..=depth {
            last = ledger
                .place(&format!("0x{}", i), last, 0, BvSeed::default())
                .unwrap();
        }
        (ledger, last)
    }

    #[test]
    fn test_zero_bv_is_noop() {
        let (mut ledger, leaf) = chain(3);
        let before = ledger.accounts().to_vec();
        let report = CommissionEngine::default().distribute(&mut ledger, PhaseParameters::LAUNCH, 1, leaf, 0);

        assert!(report.levels.is_empty());
        assert_eq!(ledger.accounts(), before.as_slice());
    }

    #[test]
    fn test_decay_next_value() {
        let decay = PropagationValue::Decaying { retain_bps: 5_000 };
        assert_eq!(decay.next(1_000), 500);
        assert_eq!(decay.next(1), 0);
        assert_eq!(PropagationValue::Raw.next(1_000), 1_000);
    }

    #[test]
    fn test_walk_stops_at_root() {
        let (mut ledger, leaf) = chain(2);
        let report = CommissionEngine::default().distribute(&mut ledger, PhaseParameters::LAUNCH, 1, leaf, 100);
        assert_eq!(report.levels.len(), 2);
        assert!(report.credits.is_empty());
    }

    #[test]
    fn test_to_events_carry_order_id() {
        let (mut ledger, leaf) = chain(1);
        let report = CommissionEngine::default().distribute(&mut ledger, PhaseParameters::LAUNCH, 9, leaf, 800);
        let events = report.to_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id(), Some(9));
        assert_eq!(report.total_commission(), 60);
    }
}
