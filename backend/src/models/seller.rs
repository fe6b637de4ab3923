//! Seller model
//!
//! Sellers are the counterparties named by collaborator allocations.
//! They are registered ahead of order submission and accumulate the BV of
//! every order booked against them.

use crate::models::account::normalize_address;
use serde::{Deserialize, Serialize};

/// Sequential seller identifier (first seller is 1)
pub type SellerId = u64;

/// How an allocation names its seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerRef {
    Id(SellerId),
    Address(String),
}

impl std::fmt::Display for SellerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SellerRef::Id(id) => write!(f, "#{}", id),
            SellerRef::Address(address) => write!(f, "{}", address),
        }
    }
}

/// A registered seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    id: SellerId,
    address: String,
    /// Sum of BV over all orders booked against this seller
    bv: i64,
    exists: bool,
}

impl Seller {
    pub fn new(id: SellerId, address: &str) -> Self {
        Self {
            id,
            address: normalize_address(address),
            bv: 0,
            exists: true,
        }
    }

    pub fn from_snapshot(id: SellerId, address: String, bv: i64, exists: bool) -> Self {
        Self {
            id,
            address,
            bv,
            exists,
        }
    }

    pub fn id(&self) -> SellerId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn bv(&self) -> i64 {
        self.bv
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn add_bv(&mut self, amount: i64) {
        self.bv += amount;
    }
}

/// Seller records indexed by id and by normalized address
#[derive(Debug, Clone, Default)]
pub struct SellerRegistry {
    sellers: Vec<Seller>,
    by_address: std::collections::HashMap<String, SellerId>,
}

impl SellerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from restored sellers (ids must be dense from 1,
    /// addresses unique, bv non-negative)
    pub fn from_sellers(sellers: Vec<Seller>) -> Option<Self> {
        let mut registry = Self::new();
        for seller in sellers {
            if seller.id() != registry.next_id()
                || seller.bv() < 0
                || registry.by_address.contains_key(seller.address())
            {
                return None;
            }
            registry
                .by_address
                .insert(seller.address().to_string(), seller.id());
            registry.sellers.push(seller);
        }
        Some(registry)
    }

    /// Id the next registered seller will receive
    pub fn next_id(&self) -> SellerId {
        self.sellers.len() as SellerId + 1
    }

    /// Register a seller, returning the existing id if the address is known
    pub fn register(&mut self, address: &str) -> SellerId {
        let key = normalize_address(address);
        if let Some(&id) = self.by_address.get(&key) {
            return id;
        }
        let id = self.next_id();
        self.sellers.push(Seller::new(id, &key));
        self.by_address.insert(key, id);
        id
    }

    pub fn get(&self, id: SellerId) -> Option<&Seller> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.sellers.get(index)
    }

    pub fn get_mut(&mut self, id: SellerId) -> Option<&mut Seller> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.sellers.get_mut(index)
    }

    /// Resolve a reference to the id of an existing seller
    pub fn resolve(&self, seller: &SellerRef) -> Option<SellerId> {
        let id = match seller {
            SellerRef::Id(id) => *id,
            SellerRef::Address(address) => *self.by_address.get(&normalize_address(address))?,
        };
        self.get(id).filter(|s| s.exists()).map(|s| s.id())
    }

    pub fn sellers(&self) -> &[Seller] {
        &self.sellers
    }

    pub fn len(&self) -> usize {
        self.sellers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sellers.is_empty()
    }
}
