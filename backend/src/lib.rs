//! Commission Ledger Core - Rust Engine
//!
//! Referral ledger that turns orders from external markets into commission
//! credits along a quaternary account tree.
//!
//! # Architecture
//!
//! - **core**: Path codec and calendar week arithmetic
//! - **models**: Domain types (Account, Order, Seller, Event)
//! - **ledger**: The account tree and placement rules
//! - **phase**: Calculation phase parameters and the weekly switch
//! - **commission**: Ancestor walk producing commission credits
//! - **gateway**: Collaborator entry point, config, and checkpoints
//!
//! # Critical Invariants
//!
//! 1. All value amounts are i64 (smallest platform unit)
//! 2. Every operation is all-or-nothing; rejected calls change nothing
//! 3. FFI boundary is minimal and safe

// Module declarations
pub mod commission;
pub mod core;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod phase;

// Re-exports for convenience
pub use commission::{CommissionConfig, CommissionEngine, Distribution, PropagationValue, StepBudgetPolicy};
pub use gateway::{
    Allocation, AllocationError, CheckpointError, ConfigError, GatewayError, LedgerConfig,
    MigrationRecord, OrderGateway, ValueSplit,
};
pub use ledger::{BvSeed, PlacementError, UserLedger};
pub use models::{
    account::{Account, AccountId, ROOT_SENTINEL},
    event::{Event, EventLog},
    order::{Order, OrderId},
    seller::{Seller, SellerId, SellerRef},
};
pub use phase::{CalculationPhase, PhaseError, PhaseParameters, PhaseState};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn commission_ledger_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::gateway::PyLedger>()?;
    Ok(())
}
