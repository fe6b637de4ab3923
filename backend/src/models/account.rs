//! Account model
//!
//! Represents a participant placed in the quaternary referral tree.
//! Each account has:
//! - A dense sequential id and an immutable, case-insensitive address
//! - A parent id and the slot (0..=3) it occupies under that parent
//! - The encoded root-to-node path (see [`crate::core::path`])
//! - Its own accumulated BV plus per-slot safe and aggregate BV counters
//!
//! CRITICAL: All value amounts are i64 (smallest platform unit)

use crate::core::path::SLOT_COUNT;
use serde::{Deserialize, Serialize};

/// Dense, sequential account identifier (first account is 1)
pub type AccountId = u64;

/// Parent id carried by the root account
pub const ROOT_SENTINEL: AccountId = 0;

/// Per-slot value counters
pub type SlotValues = [i64; SLOT_COUNT];

/// Normalize an external address for identity comparison
///
/// Addresses are compared case-insensitively and ignore surrounding
/// whitespace, so `"0xAbC"` and `" 0xabc "` name the same participant.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// A participant in the referral tree
///
/// # Example
/// ```
/// use commission_ledger_core_rs::models::account::{Account, ROOT_SENTINEL};
///
/// let root = Account::new(1, "0xROOT", ROOT_SENTINEL, 0, Vec::new());
/// assert!(root.is_root());
/// assert_eq!(root.address(), "0xroot");
/// assert_eq!(root.depth(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Sequential id, never reused
    id: AccountId,

    /// Normalized external address
    address: String,

    /// Parent account id ([`ROOT_SENTINEL`] for the root)
    parent_id: AccountId,

    /// Slot occupied under the parent (0..=3)
    position: u8,

    /// Encoded slot trail from the root, root's own slot excluded
    path: Vec<u8>,

    /// Child account id per slot (0 = empty)
    children: [AccountId; SLOT_COUNT],

    /// BV generated by this account's own purchases
    bv: i64,

    /// Per-slot BV that cleared the threshold check and was paid out
    children_safe_bv: SlotValues,

    /// Per-slot BV received from each subtree, paid or not
    children_aggregate_bv: SlotValues,

    /// Total commission credited to this account
    commission_earned: i64,
}

impl Account {
    /// Create an account with zeroed counters
    pub fn new(
        id: AccountId,
        address: &str,
        parent_id: AccountId,
        position: u8,
        path: Vec<u8>,
    ) -> Self {
        Self {
            id,
            address: normalize_address(address),
            parent_id,
            position,
            path,
            children: [0; SLOT_COUNT],
            bv: 0,
            children_safe_bv: [0; SLOT_COUNT],
            children_aggregate_bv: [0; SLOT_COUNT],
            commission_earned: 0,
        }
    }

    /// Seed historical BV counters (bulk migration)
    pub fn with_seed(mut self, bv: i64, safe: SlotValues, aggregate: SlotValues) -> Self {
        self.bv = bv;
        self.children_safe_bv = safe;
        self.children_aggregate_bv = aggregate;
        self
    }

    /// Restore an account with every field preserved (checkpoint loading)
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        id: AccountId,
        address: String,
        parent_id: AccountId,
        position: u8,
        path: Vec<u8>,
        children: [AccountId; SLOT_COUNT],
        bv: i64,
        children_safe_bv: SlotValues,
        children_aggregate_bv: SlotValues,
        commission_earned: i64,
    ) -> Self {
        Self {
            id,
            address,
            parent_id,
            position,
            path,
            children,
            bv,
            children_safe_bv,
            children_aggregate_bv,
            commission_earned,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn parent_id(&self) -> AccountId {
        self.parent_id
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    /// Raw path bytes
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_SENTINEL
    }

    pub fn children(&self) -> &[AccountId; SLOT_COUNT] {
        &self.children
    }

    /// Child id in `slot`, if occupied
    pub fn child(&self, slot: u8) -> Option<AccountId> {
        self.children
            .get(usize::from(slot))
            .copied()
            .filter(|&id| id != 0)
    }

    pub fn bv(&self) -> i64 {
        self.bv
    }

    pub fn children_safe_bv(&self) -> &SlotValues {
        &self.children_safe_bv
    }

    pub fn children_aggregate_bv(&self) -> &SlotValues {
        &self.children_aggregate_bv
    }

    /// Volume received on `slot` that has not yet been paid out
    ///
    /// # Example
    /// ```
    /// use commission_ledger_core_rs::models::account::{Account, ROOT_SENTINEL};
    ///
    /// let account = Account::new(1, "0xa", ROOT_SENTINEL, 0, Vec::new())
    ///     .with_seed(0, [100, 0, 0, 0], [650, 0, 0, 0]);
    /// assert_eq!(account.unpaid_bv(0), 550);
    /// ```
    pub fn unpaid_bv(&self, slot: u8) -> i64 {
        let slot = usize::from(slot);
        self.children_aggregate_bv[slot] - self.children_safe_bv[slot]
    }

    pub fn commission_earned(&self) -> i64 {
        self.commission_earned
    }

    pub(crate) fn link_child(&mut self, slot: u8, child_id: AccountId) {
        self.children[usize::from(slot)] = child_id;
    }

    pub(crate) fn clear_children(&mut self) {
        self.children = [0; SLOT_COUNT];
    }

    pub(crate) fn unlink_child(&mut self, slot: u8) {
        self.children[usize::from(slot)] = 0;
    }

    pub(crate) fn add_own_bv(&mut self, amount: i64) {
        self.bv += amount;
    }

    /// Record incoming subtree volume on `slot`
    pub(crate) fn add_aggregate_bv(&mut self, slot: u8, amount: i64) {
        self.children_aggregate_bv[usize::from(slot)] += amount;
    }

    /// Move `amount` of unpaid volume on `slot` to safe and credit commission
    pub(crate) fn settle_step(&mut self, slot: u8, amount: i64, commission: i64) {
        self.children_safe_bv[usize::from(slot)] += amount;
        self.commission_earned += commission;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_normalized() {
        let account = Account::new(2, "  0xDeadBeef ", 1, 3, vec![3]);
        assert_eq!(account.address(), "0xdeadbeef");
        assert!(!account.is_root());
    }

    #[test]
    fn test_child_links() {
        let mut account = Account::new(1, "0xa", ROOT_SENTINEL, 0, Vec::new());
        assert_eq!(account.child(2), None);

        account.link_child(2, 7);
        assert_eq!(account.child(2), Some(7));
        assert_eq!(account.children(), &[0, 0, 7, 0]);

        account.unlink_child(2);
        assert_eq!(account.child(2), None);
        assert_eq!(account.child(9), None);
    }

    #[test]
    fn test_settle_step_moves_volume_to_safe() {
        let mut account = Account::new(1, "0xa", ROOT_SENTINEL, 0, Vec::new());
        account.add_aggregate_bv(1, 700);
        assert_eq!(account.unpaid_bv(1), 700);

        account.settle_step(1, 500, 60);
        assert_eq!(account.children_safe_bv(), &[0, 500, 0, 0]);
        assert_eq!(account.unpaid_bv(1), 200);
        assert_eq!(account.commission_earned(), 60);
    }
}
