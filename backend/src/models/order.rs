//! Order model
//!
//! An order records one seller allocation accepted by the gateway.
//! Each order has:
//! - Buyer account and seller ids
//! - The decomposed values (bv, uv, fv) plus the seller's own share
//! - Submission timestamp and the weekly-phase week it falls in
//! - An opaque collaborator payload
//!
//! Orders are immutable once created. Only the existence flag may change,
//! and only through cancellation flows that live outside the ledger.
//!
//! CRITICAL: All value amounts are i64 (smallest platform unit)

use crate::models::account::AccountId;
use crate::models::seller::SellerId;
use serde::{Deserialize, Serialize};

/// Sequential order identifier (first order is 1)
pub type OrderId = u64;

/// Value components derived from one allocation's business value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueComponents {
    /// Business value, propagated up the referral tree
    pub bv: i64,
    /// Utility value
    pub uv: i64,
    /// Fund value
    pub fv: i64,
}

impl ValueComponents {
    pub fn total(&self) -> i64 {
        self.bv + self.uv + self.fv
    }
}

/// A recorded order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    buyer_id: AccountId,
    seller_id: SellerId,
    seller_value: i64,
    values: ValueComponents,
    timestamp: i64,
    /// Weeks since the weekly phase started; None before it starts
    week: Option<u64>,
    payload: Vec<u8>,
    exists: bool,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        buyer_id: AccountId,
        seller_id: SellerId,
        seller_value: i64,
        values: ValueComponents,
        timestamp: i64,
        week: Option<u64>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id,
            buyer_id,
            seller_id,
            seller_value,
            values,
            timestamp,
            week,
            payload,
            exists: true,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn buyer_id(&self) -> AccountId {
        self.buyer_id
    }

    pub fn seller_id(&self) -> SellerId {
        self.seller_id
    }

    pub fn seller_value(&self) -> i64 {
        self.seller_value
    }

    pub fn values(&self) -> ValueComponents {
        self.values
    }

    pub fn bv(&self) -> i64 {
        self.values.bv
    }

    pub fn uv(&self) -> i64 {
        self.values.uv
    }

    pub fn fv(&self) -> i64 {
        self.values.fv
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn week(&self) -> Option<u64> {
        self.week
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn exists(&self) -> bool {
        self.exists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_exists() {
        let values = ValueComponents { bv: 50, uv: 30, fv: 20 };
        let order = Order::new(1, 3, 1, 400, values, 1_700_000_000, None, b"lot-7".to_vec());

        assert!(order.exists());
        assert_eq!(order.bv(), 50);
        assert_eq!(order.values().total(), 100);
        assert_eq!(order.payload(), b"lot-7");
        assert_eq!(order.week(), None);
    }
}
