//! Event log for ledger notifications and auditing.
//!
//! Every accepted state change is recorded as an [`Event`] in the order it
//! was applied. Rejected submissions never log anything, so the log is an
//! exact replay of committed transitions.
//!
//! # Event Types
//!
//! - **Placement**: `UserMigrated` for every new account (live or migrated)
//! - **Sellers**: `SellerRegistered`
//! - **Orders**: `OrderCreated` per accepted allocation
//! - **Commission**: `CommissionCredited` per credited ancestor
//! - **Phase**: `WeeklyModeActivated`, `MaxStepsUpdated`
//!
//! # Example
//!
//! ```rust
//! use commission_ledger_core_rs::models::event::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::UserMigrated {
//!     id: 1,
//!     parent_id: 0,
//!     position: 0,
//!     address: "0xroot".to_string(),
//! });
//! assert_eq!(log.events_of_type("UserMigrated").len(), 1);
//! ```

use crate::models::account::AccountId;
use crate::models::order::OrderId;
use crate::models::seller::SellerId;
use serde::{Deserialize, Serialize};

/// Ledger event capturing a committed state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Account placed in the tree
    UserMigrated {
        id: AccountId,
        parent_id: AccountId,
        position: u8,
        address: String,
    },

    /// Seller registered for future allocations
    SellerRegistered { seller_id: SellerId, address: String },

    /// Order accepted from a collaborator allocation
    OrderCreated {
        order_id: OrderId,
        seller_id: SellerId,
        buyer_id: AccountId,
        bv: i64,
        uv: i64,
        fv: i64,
    },

    /// Ancestor credited one commission step for an order
    CommissionCredited {
        order_id: OrderId,
        account_id: AccountId,
        slot: u8,
        /// Ancestor level, 1 = buyer's parent
        level: u32,
        amount: i64,
    },

    /// One-way switch to the weekly calculation phase
    WeeklyModeActivated {
        activated_at: i64,
        weekly_start_time: i64,
    },

    /// Administrative override of the propagation depth cap
    MaxStepsUpdated { old: u32, new: u32 },
}

impl Event {
    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::UserMigrated { .. } => "UserMigrated",
            Event::SellerRegistered { .. } => "SellerRegistered",
            Event::OrderCreated { .. } => "OrderCreated",
            Event::CommissionCredited { .. } => "CommissionCredited",
            Event::WeeklyModeActivated { .. } => "WeeklyModeActivated",
            Event::MaxStepsUpdated { .. } => "MaxStepsUpdated",
        }
    }

    /// Get order ID if event relates to a specific order
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Event::OrderCreated { order_id, .. } => Some(*order_id),
            Event::CommissionCredited { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }

    /// Get account ID if event relates to a specific account
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Event::UserMigrated { id, .. } => Some(*id),
            Event::OrderCreated { buyer_id, .. } => Some(*buyer_id),
            Event::CommissionCredited { account_id, .. } => Some(*account_id),
            _ => None,
        }
    }
}

/// Event log for storing and querying ledger events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Append a batch of events in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific order
    pub fn events_for_order(&self, order_id: OrderId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.order_id() == Some(order_id))
            .collect()
    }

    /// Get events for a specific account
    pub fn events_for_account(&self, account_id: AccountId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.account_id() == Some(account_id))
            .collect()
    }
}
