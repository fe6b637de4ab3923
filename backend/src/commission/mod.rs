//! Commission Module
//!
//! Converts an order's BV into per-ancestor commission credits.
//!
//! The engine walks the buyer's ancestor chain nearest first. At each level
//! the arriving volume is added to the ancestor's aggregate counter for the
//! slot it came through; if the unpaid volume on that slot reaches the phase
//! threshold, the ancestor is credited one commission step and the threshold
//! amount moves from unpaid to safe.
//!
//! # Critical Invariants
//!
//! 1. **Depth Cap**: at most `max_steps` ancestors are credited per order
//! 2. **Eligibility**: no ancestor is credited below the threshold
//!    (exactly equal is eligible)
//! 3. **Safe ≤ Aggregate**: a step never moves more volume to safe than is
//!    unpaid on the slot
//! 4. **Single Read**: phase parameters are copied once per distribution

pub mod engine;

pub use engine::{
    CommissionConfig, CommissionCredit, CommissionEngine, Distribution, LevelRecord,
    PropagationValue, StepBudgetPolicy, BPS_DENOMINATOR,
};
