//! Checkpoint - Save/Load Ledger State
//!
//! Serializes the complete gateway state (accounts, sellers, orders, phase)
//! to JSON and restores it.
//!
//! # Critical Invariants
//!
//! - **Tree Integrity**: restored accounts are replayed through placement
//!   validation, so a tampered snapshot cannot break the tree invariants
//! - **Referential Integrity**: every order names an existing buyer and seller
//! - **Dense Ids**: account, seller and order ids run from 1 without gaps
//! - **Config Matching**: state can only be loaded with the config it was
//!   saved under, and the restored phase must carry that config's
//!   parameters (apart from a `max_steps` override)
//! - **Counter Sanity**: no negative counter, and safe never exceeds
//!   aggregate on any slot

use crate::gateway::config::LedgerConfig;
use crate::gateway::engine::OrderGateway;
use crate::ledger::UserLedger;
use crate::models::account::{Account, AccountId, SlotValues};
use crate::models::order::{Order, OrderId};
use crate::models::seller::{Seller, SellerId, SellerRegistry};
use crate::phase::CalculationPhase;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while saving or restoring a checkpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config mismatch: checkpoint hash {found}, current config hash {expected}")]
    ConfigMismatch { expected: String, found: String },

    #[error("Invalid checkpoint state: {0}")]
    InvalidState(String),
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete ledger state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Unique id of this snapshot
    pub snapshot_id: String,

    /// SHA256 hash of the config the state was produced under
    pub config_hash: String,

    pub phase: CalculationPhase,

    /// Accounts in id order
    pub accounts: Vec<AccountSnapshot>,

    /// Sellers in id order
    pub sellers: Vec<SellerSnapshot>,

    /// Orders in id order
    pub orders: Vec<Order>,
}

/// Account state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub address: String,
    pub parent_id: AccountId,
    pub position: u8,
    pub path: Vec<u8>,
    pub children: [AccountId; 4],
    pub bv: i64,
    pub children_safe_bv: SlotValues,
    pub children_aggregate_bv: SlotValues,
    pub commission_earned: i64,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        AccountSnapshot {
            id: account.id(),
            address: account.address().to_string(),
            parent_id: account.parent_id(),
            position: account.position(),
            path: account.path().to_vec(),
            children: *account.children(),
            bv: account.bv(),
            children_safe_bv: *account.children_safe_bv(),
            children_aggregate_bv: *account.children_aggregate_bv(),
            commission_earned: account.commission_earned(),
        }
    }
}

impl From<AccountSnapshot> for Account {
    fn from(snapshot: AccountSnapshot) -> Self {
        Account::from_snapshot(
            snapshot.id,
            snapshot.address,
            snapshot.parent_id,
            snapshot.position,
            snapshot.path,
            snapshot.children,
            snapshot.bv,
            snapshot.children_safe_bv,
            snapshot.children_aggregate_bv,
            snapshot.commission_earned,
        )
    }
}

/// Seller state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerSnapshot {
    pub id: SellerId,
    pub address: String,
    pub bv: i64,
    pub exists: bool,
}

impl From<&Seller> for SellerSnapshot {
    fn from(seller: &Seller) -> Self {
        SellerSnapshot {
            id: seller.id(),
            address: seller.address().to_string(),
            bv: seller.bv(),
            exists: seller.exists(),
        }
    }
}

impl From<SellerSnapshot> for Seller {
    fn from(snapshot: SellerSnapshot) -> Self {
        Seller::from_snapshot(snapshot.id, snapshot.address, snapshot.bv, snapshot.exists)
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, CheckpointError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        CheckpointError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        CheckpointError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Save / Load
// ============================================================================

/// Capture the gateway's state as a snapshot
pub fn snapshot(gateway: &OrderGateway) -> Result<StateSnapshot, CheckpointError> {
    Ok(StateSnapshot {
        snapshot_id: uuid::Uuid::new_v4().to_string(),
        config_hash: compute_config_hash(gateway.config())?,
        phase: gateway.phase().clone(),
        accounts: gateway
            .ledger()
            .accounts()
            .iter()
            .map(AccountSnapshot::from)
            .collect(),
        sellers: gateway
            .sellers()
            .sellers()
            .iter()
            .map(SellerSnapshot::from)
            .collect(),
        orders: gateway.orders().to_vec(),
    })
}

pub(crate) fn save(gateway: &OrderGateway) -> Result<String, CheckpointError> {
    let snapshot = snapshot(gateway)?;
    serde_json::to_string(&snapshot)
        .map_err(|e| CheckpointError::Serialization(format!("State serialization failed: {}", e)))
}

pub(crate) fn load(config: LedgerConfig, json: &str) -> Result<OrderGateway, CheckpointError> {
    let snapshot: StateSnapshot = serde_json::from_str(json)
        .map_err(|e| CheckpointError::Serialization(format!("State parse failed: {}", e)))?;

    let expected = compute_config_hash(&config)?;
    if snapshot.config_hash != expected {
        return Err(CheckpointError::ConfigMismatch {
            expected,
            found: snapshot.config_hash,
        });
    }

    if !snapshot
        .phase
        .conforms_to(config.launch_parameters, config.weekly_parameters)
    {
        return Err(CheckpointError::InvalidState(
            "phase parameters do not match the config".into(),
        ));
    }

    let accounts: Vec<Account> = snapshot.accounts.into_iter().map(Account::from).collect();
    let ledger = UserLedger::from_accounts(accounts)
        .map_err(|e| CheckpointError::InvalidState(e.to_string()))?;

    let sellers: Vec<Seller> = snapshot.sellers.into_iter().map(Seller::from).collect();
    let sellers = SellerRegistry::from_sellers(sellers).ok_or_else(|| {
        CheckpointError::InvalidState(
            "seller ids must be sequential with unique addresses and non-negative bv".into(),
        )
    })?;

    validate_orders(&snapshot.orders, &ledger, &sellers)?;

    Ok(OrderGateway::from_parts(
        config,
        ledger,
        snapshot.phase,
        sellers,
        snapshot.orders,
    ))
}

/// Validate order ids and references against restored accounts and sellers
pub fn validate_orders(
    orders: &[Order],
    ledger: &UserLedger,
    sellers: &SellerRegistry,
) -> Result<(), CheckpointError> {
    for (index, order) in orders.iter().enumerate() {
        let expected = index as OrderId + 1;
        if order.id() != expected {
            return Err(CheckpointError::InvalidState(format!(
                "order ids must be sequential: expected {}, found {}",
                expected,
                order.id()
            )));
        }
        if ledger.get_user_by_id(order.buyer_id()).is_none() {
            return Err(CheckpointError::InvalidState(format!(
                "order {} references unknown buyer {}",
                order.id(),
                order.buyer_id()
            )));
        }
        let values = order.values();
        if order.seller_value() <= 0 || values.bv < 0 || values.uv < 0 || values.fv < 0 {
            return Err(CheckpointError::InvalidState(format!(
                "order {} has invalid amounts",
                order.id()
            )));
        }
        if sellers.get(order.seller_id()).is_none() {
            return Err(CheckpointError::InvalidState(format!(
                "order {} references unknown seller {}",
                order.id(),
                order.seller_id()
            )));
        }
    }
    Ok(())
}
