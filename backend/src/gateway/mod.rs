//! Order Gateway - collaborator entry point
//!
//! Validates submissions from external order-issuing collaborators, owns the
//! ledger state, and drives the commission engine.
//!
//! See `engine.rs` for the gateway itself.

pub mod checkpoint;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use checkpoint::{compute_config_hash, AccountSnapshot, CheckpointError, SellerSnapshot, StateSnapshot};
pub use config::{ConfigError, LedgerConfig, ValueSplit};
pub use engine::{Allocation, AllocationError, GatewayError, MigrationRecord, OrderGateway};
