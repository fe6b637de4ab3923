//! Order gateway
//!
//! The single owner of ledger state. External collaborators (marketplace,
//! order-book, exchange, fundraising) submit allocations here; the gateway
//! validates the whole submission, then commits it and runs one commission
//! distribution per resulting order.
//!
//! # Submission Flow
//!
//! ```text
//! create_order(buyer, parent, position, allocations, timestamp)
//!     │
//!     ├─ 1. Validate: buyer placement (if unknown), sellers, amounts,
//!     │      counter capacity
//!     │      └─ any failure → Err, nothing written
//!     │
//!     └─ 2. Commit (infallible from here)
//!            ├─ place buyer (UserMigrated)
//!            └─ per allocation:
//!                 ├─ record Order (OrderCreated)
//!                 └─ CommissionEngine::distribute (CommissionCredited*)
//! ```
//!
//! # Critical Invariants
//!
//! - **All-or-Nothing**: a rejected call changes no account, seller, order
//!   or event
//! - **Bounded Counters**: a batch that would overflow any counter it touches
//!   is rejected during validation
//! - **Sequential Ids**: order ids are dense and never reused, so each is
//!   distributed exactly once

use crate::commission::CommissionEngine;
use crate::gateway::checkpoint::{self, CheckpointError};
use crate::gateway::config::{ConfigError, LedgerConfig};
use crate::ledger::{BvSeed, PlacementError, UserLedger};
use crate::models::account::{normalize_address, Account, AccountId, SlotValues, ROOT_SENTINEL};
use crate::models::event::{Event, EventLog};
use crate::models::order::{Order, OrderId, ValueComponents};
use crate::models::seller::{Seller, SellerId, SellerRef, SellerRegistry};
use crate::phase::{CalculationPhase, PhaseError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Requests & Errors
// ============================================================================

/// Errors in a collaborator's allocation list
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Allocation {index}: seller {seller} not found")]
    SellerNotFound { index: usize, seller: String },

    #[error("Allocation {index}: amounts must be positive (seller_value {seller_value}, business_value {business_value})")]
    InvalidAmounts {
        index: usize,
        seller_value: i64,
        business_value: i64,
    },

    #[error("Allocation {index}: accumulated value overflows a {counter} counter")]
    ValueOverflow { index: usize, counter: &'static str },
}

/// Any error surfaced by the gateway
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Seller address must not be blank")]
    InvalidSellerAddress,
}

impl GatewayError {
    /// Stable machine-readable name of the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Placement(e) => match e {
                PlacementError::FirstUserMustBeRoot => "FirstUserMustBeRoot",
                PlacementError::UserAlreadyRegistered { .. } => "UserAlreadyRegistered",
                PlacementError::InvalidParentId { .. } => "InvalidParentId",
                PlacementError::PositionAlreadyTaken { .. } => "PositionAlreadyTaken",
                PlacementError::InvalidPosition { .. } => "InvalidPosition",
                PlacementError::InvalidAddress => "InvalidAddress",
                PlacementError::InvalidSeedBv => "InvalidSeedBv",
            },
            GatewayError::Phase(e) => match e {
                PhaseError::AlreadyActivated { .. } => "AlreadyActivated",
                PhaseError::InvalidTimestamp { .. } => "InvalidTimestamp",
            },
            GatewayError::Allocation(e) => match e {
                AllocationError::SellerNotFound { .. } => "SellerNotFound",
                AllocationError::InvalidAmounts { .. } => "InvalidAmounts",
                AllocationError::ValueOverflow { .. } => "ValueOverflow",
            },
            GatewayError::Config(_) => "InvalidConfig",
            GatewayError::Checkpoint(_) => "InvalidCheckpoint",
            GatewayError::InvalidSellerAddress => "InvalidSellerAddress",
        }
    }
}

/// One traded unit as reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub seller: SellerRef,
    /// Seller's share of the unit price
    pub seller_value: i64,
    /// Platform share, split into bv/uv/fv
    pub business_value: i64,
    /// Opaque collaborator data stored on the order
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Allocation {
    pub fn new(seller: SellerRef, seller_value: i64, business_value: i64) -> Self {
        Self {
            seller,
            seller_value,
            business_value,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

/// One account record for bulk historical migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub user_address: String,
    /// `None` (or blank) places the account under the root sentinel
    pub parent_address: Option<String>,
    pub position: u8,
    #[serde(default)]
    pub bv: i64,
    #[serde(default)]
    pub children_safe_bv: SlotValues,
    #[serde(default)]
    pub children_aggregate_bv: SlotValues,
}

impl MigrationRecord {
    /// Live-style record with zeroed counters
    pub fn new(user_address: &str, parent_address: Option<&str>, position: u8) -> Self {
        Self {
            user_address: user_address.to_string(),
            parent_address: parent_address.map(str::to_string),
            position,
            bv: 0,
            children_safe_bv: [0; 4],
            children_aggregate_bv: [0; 4],
        }
    }

    fn seed(&self) -> BvSeed {
        BvSeed {
            bv: self.bv,
            safe: self.children_safe_bv,
            aggregate: self.children_aggregate_bv,
        }
    }
}

/// Validated allocation ready to commit
struct PreparedOrder {
    seller_id: SellerId,
    seller_value: i64,
    values: ValueComponents,
    payload: Vec<u8>,
}

// ============================================================================
// Gateway
// ============================================================================

/// Owner of all ledger state and entry point for collaborators
///
/// # Example
///
/// ```rust
/// use commission_ledger_core_rs::gateway::{Allocation, LedgerConfig, OrderGateway};
/// use commission_ledger_core_rs::models::SellerRef;
///
/// let mut gateway = OrderGateway::new(LedgerConfig::default()).unwrap();
/// let seller = gateway.register_seller("0xshop").unwrap();
///
/// gateway.register_user("0xroot", None, 0).unwrap();
/// let orders = gateway
///     .create_order(
///         "0xbuyer",
///         Some("0xroot"),
///         2,
///         &[Allocation::new(SellerRef::Id(seller), 900, 2_000)],
///         1_704_067_200,
///     )
///     .unwrap();
///
/// assert_eq!(orders, vec![1]);
/// assert_eq!(gateway.get_order(1).unwrap().bv(), 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct OrderGateway {
    config: LedgerConfig,
    ledger: UserLedger,
    phase: CalculationPhase,
    engine: CommissionEngine,
    sellers: SellerRegistry,
    orders: Vec<Order>,
    event_log: EventLog,
}

impl OrderGateway {
    /// Create an empty ledger from a validated configuration
    pub fn new(config: LedgerConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            ledger: UserLedger::new(),
            phase: CalculationPhase::with_parameters(
                config.launch_parameters,
                config.weekly_parameters,
            ),
            engine: CommissionEngine::new(config.commission),
            sellers: SellerRegistry::new(),
            orders: Vec::new(),
            event_log: EventLog::new(),
            config,
        })
    }

    /// Assemble a gateway from restored parts (checkpoint loading)
    pub(crate) fn from_parts(
        config: LedgerConfig,
        ledger: UserLedger,
        phase: CalculationPhase,
        sellers: SellerRegistry,
        orders: Vec<Order>,
    ) -> Self {
        Self {
            engine: CommissionEngine::new(config.commission),
            config,
            ledger,
            phase,
            sellers,
            orders,
            event_log: EventLog::new(),
        }
    }

    // ========================================================================
    // Sellers
    // ========================================================================

    /// Register a seller, returning its id (existing id if already known)
    pub fn register_seller(&mut self, address: &str) -> Result<SellerId, GatewayError> {
        if normalize_address(address).is_empty() {
            return Err(GatewayError::InvalidSellerAddress);
        }
        let known = self.sellers.len();
        let seller_id = self.sellers.register(address);
        if self.sellers.len() > known {
            let address = normalize_address(address);
            info!(seller_id, address = %address, "seller registered");
            self.event_log
                .log(Event::SellerRegistered { seller_id, address });
        }
        Ok(seller_id)
    }

    // ========================================================================
    // Placement
    // ========================================================================

    fn resolve_parent(&self, parent_address: Option<&str>) -> Result<AccountId, PlacementError> {
        let Some(address) = parent_address.filter(|a| !normalize_address(a).is_empty()) else {
            return Ok(ROOT_SENTINEL);
        };
        match self.ledger.id_of(address) {
            Some(id) => Ok(id),
            None if self.ledger.is_empty() => Err(PlacementError::FirstUserMustBeRoot),
            None => Err(PlacementError::InvalidParentId {
                parent_id: ROOT_SENTINEL,
            }),
        }
    }

    fn place_record(&mut self, record: &MigrationRecord) -> Result<AccountId, PlacementError> {
        let parent_id = self.resolve_parent(record.parent_address.as_deref())?;
        self.ledger
            .place(&record.user_address, parent_id, record.position, record.seed())
    }

    fn placement_event(&self, id: AccountId) -> Option<Event> {
        self.ledger.get_user_by_id(id).map(|account| Event::UserMigrated {
            id,
            parent_id: account.parent_id(),
            position: account.position(),
            address: account.address().to_string(),
        })
    }

    /// Place one account with its historical counters
    pub fn migrate_user(&mut self, record: &MigrationRecord) -> Result<AccountId, GatewayError> {
        let id = self.place_record(record).map_err(|e| {
            warn!(address = %record.user_address, error = %e, "migration rejected");
            e
        })?;
        let event = self.placement_event(id);
        self.event_log.extend(event);
        Ok(id)
    }

    /// Place a batch of accounts in order, all or nothing
    ///
    /// Records may name parents placed earlier in the same batch. If any
    /// record fails, every account placed by this call is removed again.
    pub fn migrate_users(
        &mut self,
        records: &[MigrationRecord],
    ) -> Result<Vec<AccountId>, GatewayError> {
        let mark = self.ledger.len();
        let mut ids = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.place_record(record) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    self.ledger.rollback_to(mark);
                    warn!(index, address = %record.user_address, error = %e, "migration batch rejected");
                    return Err(e.into());
                }
            }
        }
        let events: Vec<Event> = ids.iter().filter_map(|&id| self.placement_event(id)).collect();
        self.event_log.extend(events);
        info!(count = ids.len(), "migration batch applied");
        Ok(ids)
    }

    /// Live registration: place an account with zeroed counters
    pub fn register_user(
        &mut self,
        address: &str,
        parent_address: Option<&str>,
        position: u8,
    ) -> Result<AccountId, GatewayError> {
        self.migrate_user(&MigrationRecord::new(address, parent_address, position))
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Accept a collaborator submission
    ///
    /// Places the buyer first if unknown (using `parent_address` and
    /// `position`; both are ignored for known buyers), then records one
    /// order per allocation and distributes its BV. Returns the new order
    /// ids. An empty allocation list is a no-op.
    pub fn create_order(
        &mut self,
        buyer_address: &str,
        parent_address: Option<&str>,
        position: u8,
        allocations: &[Allocation],
        timestamp: i64,
    ) -> Result<Vec<OrderId>, GatewayError> {
        if allocations.is_empty() {
            return Ok(Vec::new());
        }
        self.try_create_order(buyer_address, parent_address, position, allocations, timestamp)
            .map_err(|e| {
                warn!(buyer = %buyer_address, error = %e, "order submission rejected");
                e
            })
    }

    fn try_create_order(
        &mut self,
        buyer_address: &str,
        parent_address: Option<&str>,
        position: u8,
        allocations: &[Allocation],
        timestamp: i64,
    ) -> Result<Vec<OrderId>, GatewayError> {
        // 1. Validate everything before any write
        let pending_placement = match self.ledger.id_of(buyer_address) {
            Some(_) => None,
            None => {
                let parent_id = self.resolve_parent(parent_address)?;
                self.ledger.check_placement(buyer_address, parent_id, position)?;
                Some(parent_id)
            }
        };
        let prepared = self.prepare_allocations(allocations)?;
        self.check_value_capacity(buyer_address, pending_placement, position, &prepared)?;

        // 2. Commit
        let buyer_id = match pending_placement {
            Some(parent_id) => {
                let id = self
                    .ledger
                    .place(buyer_address, parent_id, position, BvSeed::default())?;
                let event = self.placement_event(id);
                self.event_log.extend(event);
                id
            }
            None => self
                .ledger
                .id_of(buyer_address)
                .ok_or(PlacementError::InvalidAddress)?,
        };

        let mut order_ids = Vec::with_capacity(prepared.len());
        for item in prepared {
            order_ids.push(self.commit_order(buyer_id, item, timestamp));
        }
        Ok(order_ids)
    }

    fn prepare_allocations(
        &self,
        allocations: &[Allocation],
    ) -> Result<Vec<PreparedOrder>, AllocationError> {
        allocations
            .iter()
            .enumerate()
            .map(|(index, allocation)| {
                let seller_id = self.sellers.resolve(&allocation.seller).ok_or_else(|| {
                    AllocationError::SellerNotFound {
                        index,
                        seller: allocation.seller.to_string(),
                    }
                })?;
                if allocation.seller_value <= 0 || allocation.business_value <= 0 {
                    return Err(AllocationError::InvalidAmounts {
                        index,
                        seller_value: allocation.seller_value,
                        business_value: allocation.business_value,
                    });
                }
                Ok(PreparedOrder {
                    seller_id,
                    seller_value: allocation.seller_value,
                    values: self.config.value_split.split(allocation.business_value),
                    payload: allocation.payload.clone(),
                })
            })
            .collect()
    }

    /// Reject a batch whose running totals would overflow a counter it touches
    ///
    /// Each ancestor is charged the full bv of every order and one commission
    /// step per order, which bounds both propagation modes and both budgets.
    fn check_value_capacity(
        &self,
        buyer_address: &str,
        pending_parent: Option<AccountId>,
        position: u8,
        prepared: &[PreparedOrder],
    ) -> Result<(), AllocationError> {
        let (mut buyer_bv, chain): (i64, Vec<(AccountId, u8)>) = match pending_parent {
            Some(parent_id) if self.ledger.get_user_by_id(parent_id).is_some() => {
                let mut chain = vec![(parent_id, position)];
                chain.extend(
                    self.ledger
                        .ancestors(parent_id)
                        .iter()
                        .map(|a| (a.id, a.slot)),
                );
                (0, chain)
            }
            Some(_) => (0, Vec::new()),
            None => match self.ledger.get_user_by_address(buyer_address) {
                Some(buyer) => (
                    buyer.bv(),
                    self.ledger
                        .ancestors(buyer.id())
                        .iter()
                        .map(|a| (a.id, a.slot))
                        .collect(),
                ),
                None => (0, Vec::new()),
            },
        };

        let mut totals: Vec<(i64, i64)> = chain
            .iter()
            .filter_map(|&(id, slot)| self.ledger.get_user_by_id(id).map(|a| (a, slot)))
            .map(|(a, slot)| (a.children_aggregate_bv()[usize::from(slot)], a.commission_earned()))
            .collect();
        let mut seller_bv: HashMap<SellerId, i64> = HashMap::new();
        let commission = self.phase.commission_per_step();

        for (index, item) in prepared.iter().enumerate() {
            let overflow = |counter: &'static str| AllocationError::ValueOverflow { index, counter };
            let bv = item.values.bv;

            buyer_bv = buyer_bv
                .checked_add(bv)
                .ok_or_else(|| overflow("buyer bv"))?;
            let seller_total = seller_bv
                .entry(item.seller_id)
                .or_insert_with(|| self.sellers.get(item.seller_id).map_or(0, Seller::bv));
            *seller_total = seller_total
                .checked_add(bv)
                .ok_or_else(|| overflow("seller bv"))?;
            for (aggregate, earned) in totals.iter_mut() {
                *aggregate = aggregate
                    .checked_add(bv)
                    .ok_or_else(|| overflow("aggregate bv"))?;
                *earned = earned
                    .checked_add(commission)
                    .ok_or_else(|| overflow("commission"))?;
            }
        }
        Ok(())
    }

    fn commit_order(&mut self, buyer_id: AccountId, item: PreparedOrder, timestamp: i64) -> OrderId {
        let order_id = self.orders.len() as OrderId + 1;
        let values = item.values;
        self.orders.push(Order::new(
            order_id,
            buyer_id,
            item.seller_id,
            item.seller_value,
            values,
            timestamp,
            self.phase.week_index(timestamp),
            item.payload,
        ));

        if let Some(buyer) = self.ledger.get_user_mut(buyer_id) {
            buyer.add_own_bv(values.bv);
        }
        if let Some(seller) = self.sellers.get_mut(item.seller_id) {
            seller.add_bv(values.bv);
        }

        self.event_log.log(Event::OrderCreated {
            order_id,
            seller_id: item.seller_id,
            buyer_id,
            bv: values.bv,
            uv: values.uv,
            fv: values.fv,
        });

        let distribution = self.engine.distribute(
            &mut self.ledger,
            self.phase.parameters(),
            order_id,
            buyer_id,
            values.bv,
        );
        info!(
            order_id,
            buyer_id,
            seller_id = item.seller_id,
            bv = values.bv,
            levels = distribution.levels.len(),
            credits = distribution.credits.len(),
            commission = distribution.total_commission(),
            "order created"
        );
        self.event_log.extend(distribution.to_events());
        order_id
    }

    // ========================================================================
    // Phase
    // ========================================================================

    /// One-way switch to weekly parameters; returns the weekly start time
    pub fn activate_weekly_mode(&mut self, timestamp: i64) -> Result<i64, GatewayError> {
        let weekly_start_time = self.phase.activate_weekly_mode(timestamp)?;
        self.event_log.log(Event::WeeklyModeActivated {
            activated_at: timestamp,
            weekly_start_time,
        });
        Ok(weekly_start_time)
    }

    /// Administrative override of the propagation depth cap
    pub fn set_max_steps(&mut self, max_steps: u32) {
        let old = self.phase.set_max_steps(max_steps);
        self.event_log.log(Event::MaxStepsUpdated {
            old,
            new: max_steps,
        });
    }

    // ========================================================================
    // Checkpoint
    // ========================================================================

    /// Serialize the complete ledger state to JSON
    pub fn save_state(&self) -> Result<String, GatewayError> {
        Ok(checkpoint::save(self)?)
    }

    /// Restore a ledger saved by [`OrderGateway::save_state`]
    ///
    /// Fails if `config` differs from the configuration the state was saved
    /// under. The restored gateway starts with an empty event log.
    pub fn load_state(config: LedgerConfig, json: &str) -> Result<Self, GatewayError> {
        config.validate()?;
        let gateway = checkpoint::load(config, json)?;
        info!(
            accounts = gateway.ledger.len(),
            orders = gateway.orders.len(),
            "ledger state restored"
        );
        Ok(gateway)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &UserLedger {
        &self.ledger
    }

    pub fn phase(&self) -> &CalculationPhase {
        &self.phase
    }

    pub fn get_user_by_id(&self, id: AccountId) -> Option<&Account> {
        self.ledger.get_user_by_id(id)
    }

    pub fn get_user_by_address(&self, address: &str) -> Option<&Account> {
        self.ledger.get_user_by_address(address)
    }

    pub fn get_user_path(&self, id: AccountId) -> Option<&[u8]> {
        self.ledger.get_user_path(id)
    }

    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.orders.get(index)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get_seller(&self, id: SellerId) -> Option<&Seller> {
        self.sellers.get(id)
    }

    pub fn sellers(&self) -> &SellerRegistry {
        &self.sellers
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> OrderGateway {
        OrderGateway::new(LedgerConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = LedgerConfig::default();
        config.value_split.bv_bps = 20_000;
        assert!(matches!(
            OrderGateway::new(config),
            Err(GatewayError::Config(ConfigError::SplitExceedsWhole { .. }))
        ));
    }

    #[test]
    fn test_error_kind() {
        let err = GatewayError::from(PlacementError::PositionAlreadyTaken {
            parent_id: 1,
            position: 0,
        });
        assert_eq!(err.kind(), "PositionAlreadyTaken");
        assert_eq!(
            GatewayError::from(AllocationError::ValueOverflow {
                index: 2,
                counter: "buyer bv"
            })
            .kind(),
            "ValueOverflow"
        );
    }

    #[test]
    fn test_unknown_parent_address() {
        let mut gw = gateway();
        assert_eq!(
            gw.register_user("0xa", Some("0xghost"), 0),
            Err(GatewayError::Placement(PlacementError::FirstUserMustBeRoot))
        );
        gw.register_user("0xa", None, 0).unwrap();
        assert_eq!(
            gw.register_user("0xb", Some("0xghost"), 0),
            Err(GatewayError::Placement(PlacementError::InvalidParentId { parent_id: 0 }))
        );
    }

    #[test]
    fn test_blank_parent_address_means_root() {
        let mut gw = gateway();
        assert_eq!(gw.register_user("0xa", Some(""), 0), Ok(1));
    }

    #[test]
    fn test_register_seller_logs_once() {
        let mut gw = gateway();
        assert_eq!(gw.register_seller("0xS"), Ok(1));
        assert_eq!(gw.register_seller("0xs"), Ok(1));
        assert_eq!(gw.event_log().events_of_type("SellerRegistered").len(), 1);
        assert_eq!(
            gw.register_seller("  "),
            Err(GatewayError::InvalidSellerAddress)
        );
    }

    #[test]
    fn test_set_max_steps_logs_event() {
        let mut gw = gateway();
        gw.set_max_steps(9);
        assert_eq!(gw.phase().max_steps(), 9);
        assert_eq!(
            gw.event_log().events(),
            &[Event::MaxStepsUpdated { old: 5, new: 9 }]
        );
    }
}
