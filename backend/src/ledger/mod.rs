//! User Ledger
//!
//! The quaternary account tree: an arena of [`Account`] records indexed by
//! dense id, plus an address index. Parent and child links are plain ids, so
//! the tree has no owning back-references.
//!
//! # Critical Invariants
//!
//! 1. **Single Root**: only the first account carries [`ROOT_SENTINEL`] as
//!    parent, and it sits in slot 0
//! 2. **Existing Parents**: every other account's parent was placed earlier
//! 3. **Unique Slots**: a (parent, slot) pair holds at most one account
//! 4. **Unique Addresses**: addresses are unique after normalization
//! 5. **Dense Ids**: ids run 1..=len with no gaps and are never reused

use crate::core::path::{self, MAX_SLOT};
use crate::models::account::{normalize_address, Account, AccountId, SlotValues, ROOT_SENTINEL};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while placing an account
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("First user must be the root: parent must be the sentinel and position 0")]
    FirstUserMustBeRoot,

    #[error("User already registered: {address}")]
    UserAlreadyRegistered { address: String },

    #[error("Invalid parent id {parent_id}")]
    InvalidParentId { parent_id: AccountId },

    #[error("Position {position} under parent {parent_id} is already taken")]
    PositionAlreadyTaken { parent_id: AccountId, position: u8 },

    #[error("Invalid position {position}: must be in 0..={max}", max = MAX_SLOT)]
    InvalidPosition { position: u8 },

    #[error("Address must not be blank")]
    InvalidAddress,

    #[error("Seed BV values must be non-negative with safe not above aggregate")]
    InvalidSeedBv,
}

/// Errors raised while rebuilding a ledger from restored accounts
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error("Account ids must be sequential: expected {expected}, found {found}")]
    NonSequentialId { expected: AccountId, found: AccountId },

    #[error("Account {id} violates placement rules: {source}")]
    Placement { id: AccountId, source: PlacementError },

    #[error("Account {id} has a path that does not extend its parent's path")]
    PathMismatch { id: AccountId },

    #[error("Account {id} has child links that disagree with its children")]
    ChildLinkMismatch { id: AccountId },

    #[error("Account {id} has negative counters or safe BV above aggregate BV")]
    InvalidCounters { id: AccountId },
}

/// One step of an ancestor chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestor {
    /// Ancestor account id
    pub id: AccountId,
    /// Child slot of the ancestor that leads toward the descendant
    pub slot: u8,
    /// Distance from the descendant (1 = parent)
    pub level: u32,
}

/// Seed counters for historical migration (zeros for live placement)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BvSeed {
    pub bv: i64,
    pub safe: SlotValues,
    pub aggregate: SlotValues,
}

impl BvSeed {
    fn is_valid(&self) -> bool {
        self.bv >= 0
            && self.safe.iter().all(|v| *v >= 0)
            && self.aggregate.iter().all(|v| *v >= 0)
            && self.safe.iter().zip(&self.aggregate).all(|(s, a)| s <= a)
    }
}

/// The account tree store
///
/// # Example
///
/// ```rust
/// use commission_ledger_core_rs::ledger::{BvSeed, UserLedger};
/// use commission_ledger_core_rs::models::ROOT_SENTINEL;
///
/// let mut ledger = UserLedger::new();
/// let a = ledger.place("0xA", ROOT_SENTINEL, 0, BvSeed::default()).unwrap();
/// let b = ledger.place("0xB", a, 0, BvSeed::default()).unwrap();
/// let c = ledger.place("0xC", b, 2, BvSeed::default()).unwrap();
///
/// assert_eq!((a, b, c), (1, 2, 3));
/// assert_eq!(ledger.get_user_path(c), Some(&[0u8, 2u8][..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct UserLedger {
    /// Accounts in id order (account id = index + 1)
    accounts: Vec<Account>,

    /// Normalized address -> account id
    by_address: HashMap<String, AccountId>,
}

impl UserLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from restored accounts, re-checking every invariant
    ///
    /// Accounts are replayed in id order through the same placement checks
    /// as live placement, then the restored child links are compared with
    /// the links the replay produced.
    pub fn from_accounts(accounts: Vec<Account>) -> Result<Self, RestoreError> {
        let mut ledger = Self::new();
        let mut declared_children = Vec::with_capacity(accounts.len());

        for mut account in accounts {
            let id = account.id();
            if id != ledger.next_id() {
                return Err(RestoreError::NonSequentialId {
                    expected: ledger.next_id(),
                    found: id,
                });
            }
            ledger
                .check_placement(account.address(), account.parent_id(), account.position())
                .map_err(|source| RestoreError::Placement { id, source })?;

            let counters = BvSeed {
                bv: account.bv(),
                safe: *account.children_safe_bv(),
                aggregate: *account.children_aggregate_bv(),
            };
            if !counters.is_valid() || account.commission_earned() < 0 {
                return Err(RestoreError::InvalidCounters { id });
            }

            let expected = match ledger.get_user_by_id(account.parent_id()) {
                Some(parent) => path::child_path(parent.path(), account.position())
                    .map_err(|_| RestoreError::PathMismatch { id })?,
                None => Vec::new(),
            };
            if account.path() != expected.as_slice() {
                return Err(RestoreError::PathMismatch { id });
            }

            declared_children.push(*account.children());
            account.clear_children();
            if let Some(parent) = ledger.get_user_mut(account.parent_id()) {
                parent.link_child(account.position(), id);
            }
            ledger.insert(account);
        }

        for (account, declared) in ledger.accounts.iter().zip(&declared_children) {
            if account.children() != declared {
                return Err(RestoreError::ChildLinkMismatch { id: account.id() });
            }
        }
        Ok(ledger)
    }

    /// Id the next placed account will receive
    pub fn next_id(&self) -> AccountId {
        self.accounts.len() as AccountId + 1
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Validate a placement without touching state
    ///
    /// Returns exactly the error [`UserLedger::place`] would return.
    pub fn check_placement(
        &self,
        address: &str,
        parent_id: AccountId,
        position: u8,
    ) -> Result<(), PlacementError> {
        if self.is_empty() && (parent_id != ROOT_SENTINEL || position != 0) {
            return Err(PlacementError::FirstUserMustBeRoot);
        }

        let key = normalize_address(address);
        if key.is_empty() {
            return Err(PlacementError::InvalidAddress);
        }
        if self.by_address.contains_key(&key) {
            return Err(PlacementError::UserAlreadyRegistered { address: key });
        }
        if position > MAX_SLOT {
            return Err(PlacementError::InvalidPosition { position });
        }
        if self.is_empty() {
            return Ok(());
        }

        // Once the root exists the sentinel is no longer a valid parent
        let parent = self
            .get_user_by_id(parent_id)
            .ok_or(PlacementError::InvalidParentId { parent_id })?;
        if parent.child(position).is_some() {
            return Err(PlacementError::PositionAlreadyTaken {
                parent_id,
                position,
            });
        }
        Ok(())
    }

    /// Place a new account under `parent_id` in slot `position`
    ///
    /// Live placement passes `BvSeed::default()`; bulk migration passes the
    /// account's historical counters.
    pub fn place(
        &mut self,
        address: &str,
        parent_id: AccountId,
        position: u8,
        seed: BvSeed,
    ) -> Result<AccountId, PlacementError> {
        self.check_placement(address, parent_id, position)?;
        if !seed.is_valid() {
            return Err(PlacementError::InvalidSeedBv);
        }

        let path = match self.get_user_by_id(parent_id) {
            Some(parent) => path::child_path(parent.path(), position)
                .map_err(|_| PlacementError::InvalidPosition { position })?,
            None => Vec::new(),
        };

        let id = self.next_id();
        let account = Account::new(id, address, parent_id, position, path)
            .with_seed(seed.bv, seed.safe, seed.aggregate);
        if let Some(parent) = self.get_user_mut(parent_id) {
            parent.link_child(position, id);
        }
        info!(
            account_id = id,
            parent_id,
            position,
            address = account.address(),
            depth = account.depth(),
            "account placed"
        );
        self.insert(account);
        Ok(id)
    }

    fn insert(&mut self, account: Account) {
        self.by_address
            .insert(account.address().to_string(), account.id());
        self.accounts.push(account);
    }

    /// Remove every account placed after the first `count`, newest first
    ///
    /// Used to undo a partially applied migration batch.
    pub fn rollback_to(&mut self, count: usize) {
        while self.accounts.len() > count {
            let Some(account) = self.accounts.pop() else {
                break;
            };
            self.by_address.remove(account.address());
            if let Some(parent) = self.get_user_mut(account.parent_id()) {
                parent.unlink_child(account.position());
            }
            debug!(account_id = account.id(), "placement rolled back");
        }
    }

    pub fn get_user_by_id(&self, id: AccountId) -> Option<&Account> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.accounts.get(index)
    }

    pub(crate) fn get_user_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.accounts.get_mut(index)
    }

    pub fn get_user_by_address(&self, address: &str) -> Option<&Account> {
        let id = *self.by_address.get(&normalize_address(address))?;
        self.get_user_by_id(id)
    }

    /// Id of the account registered at `address`
    pub fn id_of(&self, address: &str) -> Option<AccountId> {
        self.by_address.get(&normalize_address(address)).copied()
    }

    /// Raw path bytes of an account
    pub fn get_user_path(&self, id: AccountId) -> Option<&[u8]> {
        self.get_user_by_id(id).map(Account::path)
    }

    /// Decoded slot trail of an account
    pub fn get_user_positions(&self, id: AccountId) -> Option<Vec<u8>> {
        self.get_user_path(id)
            .and_then(|bytes| path::decode(bytes).ok())
    }

    pub fn root(&self) -> Option<&Account> {
        self.accounts.first()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Ancestor chain of `id`, nearest first
    ///
    /// Derived by replaying the account's path from the root through child
    /// slots. Unknown ids and the root yield an empty chain.
    pub fn ancestors(&self, id: AccountId) -> Vec<Ancestor> {
        let (Some(account), Some(root)) = (self.get_user_by_id(id), self.root()) else {
            return Vec::new();
        };
        let path = account.path();
        let depth = path.len();

        let mut chain = Vec::with_capacity(depth);
        let mut current = root.id();
        for (index, &slot) in path.iter().enumerate() {
            chain.push(Ancestor {
                id: current,
                slot,
                level: (depth - index) as u32,
            });
            match self.get_user_by_id(current).and_then(|a| a.child(slot)) {
                Some(next) => current = next,
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    /// Total BV across every account's own purchases
    pub fn total_own_bv(&self) -> i64 {
        self.accounts.iter().map(Account::bv).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(ledger: &mut UserLedger, address: &str, parent: AccountId, pos: u8) -> Result<AccountId, PlacementError> {
        ledger.place(address, parent, pos, BvSeed::default())
    }

    #[test]
    fn test_first_user_must_be_root() {
        let mut ledger = UserLedger::new();
        assert_eq!(place(&mut ledger, "0xa", 1, 0), Err(PlacementError::FirstUserMustBeRoot));
        assert_eq!(place(&mut ledger, "0xa", ROOT_SENTINEL, 1), Err(PlacementError::FirstUserMustBeRoot));
        assert_eq!(place(&mut ledger, "0xa", ROOT_SENTINEL, 0), Ok(1));
    }

    #[test]
    fn test_sentinel_parent_rejected_after_root() {
        let mut ledger = UserLedger::new();
        place(&mut ledger, "0xa", ROOT_SENTINEL, 0).unwrap();
        assert_eq!(
            place(&mut ledger, "0xb", ROOT_SENTINEL, 0),
            Err(PlacementError::InvalidParentId { parent_id: 0 })
        );
    }

    #[test]
    fn test_ancestors_follow_path() {
        let mut ledger = UserLedger::new();
        let a = place(&mut ledger, "0xa", ROOT_SENTINEL, 0).unwrap();
        let b = place(&mut ledger, "0xb", a, 3).unwrap();
        let c = place(&mut ledger, "0xc", b, 1).unwrap();

        let chain = ledger.ancestors(c);
        assert_eq!(
            chain,
            vec![
                Ancestor { id: b, slot: 1, level: 1 },
                Ancestor { id: a, slot: 3, level: 2 },
            ]
        );
        assert!(ledger.ancestors(a).is_empty());
        assert!(ledger.ancestors(99).is_empty());
    }

    #[test]
    fn test_rollback_unlinks_and_frees_addresses() {
        let mut ledger = UserLedger::new();
        let a = place(&mut ledger, "0xa", ROOT_SENTINEL, 0).unwrap();
        let mark = ledger.len();
        place(&mut ledger, "0xb", a, 0).unwrap();
        place(&mut ledger, "0xc", 2, 1).unwrap();

        ledger.rollback_to(mark);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get_user_by_id(a).unwrap().children(), &[0, 0, 0, 0]);
        assert!(ledger.get_user_by_address("0xb").is_none());
        assert_eq!(place(&mut ledger, "0xb", a, 0), Ok(2));
    }

    #[test]
    fn test_negative_seed_rejected() {
        let mut ledger = UserLedger::new();
        let seed = BvSeed {
            bv: 0,
            safe: [0, -1, 0, 0],
            aggregate: [0; 4],
        };
        assert_eq!(
            ledger.place("0xa", ROOT_SENTINEL, 0, seed),
            Err(PlacementError::InvalidSeedBv)
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_seed_safe_above_aggregate_rejected() {
        let mut ledger = UserLedger::new();
        let seed = BvSeed {
            bv: 0,
            safe: [600, 0, 0, 0],
            aggregate: [500, 0, 0, 0],
        };
        assert_eq!(
            ledger.place("0xa", ROOT_SENTINEL, 0, seed),
            Err(PlacementError::InvalidSeedBv)
        );
    }

    #[test]
    fn test_from_accounts_round_trip() {
        let mut ledger = UserLedger::new();
        let a = place(&mut ledger, "0xa", ROOT_SENTINEL, 0).unwrap();
        let b = place(&mut ledger, "0xb", a, 2).unwrap();
        place(&mut ledger, "0xc", b, 0).unwrap();

        let rebuilt = UserLedger::from_accounts(ledger.accounts().to_vec()).unwrap();
        assert_eq!(rebuilt.accounts(), ledger.accounts());
        assert_eq!(rebuilt.id_of("0xC"), Some(3));
    }

    #[test]
    fn test_from_accounts_rejects_bad_counters() {
        let restored = |safe: SlotValues, aggregate: SlotValues| {
            UserLedger::from_accounts(vec![Account::from_snapshot(
                1,
                "0xa".to_string(),
                ROOT_SENTINEL,
                0,
                Vec::new(),
                [0; 4],
                0,
                safe,
                aggregate,
                0,
            )])
        };

        assert!(restored([0, 0, 0, 0], [10, 0, 0, 0]).is_ok());
        assert_eq!(
            restored([-5, 0, 0, 0], [0; 4]).unwrap_err(),
            RestoreError::InvalidCounters { id: 1 }
        );
        assert_eq!(
            restored([20, 0, 0, 0], [10, 0, 0, 0]).unwrap_err(),
            RestoreError::InvalidCounters { id: 1 }
        );
    }
}
