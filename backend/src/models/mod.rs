//! Domain models for the commission ledger

pub mod account;
pub mod event;
pub mod order;
pub mod seller;

// Re-exports
pub use account::{normalize_address, Account, AccountId, SlotValues, ROOT_SENTINEL};
pub use event::{Event, EventLog};
pub use order::{Order, OrderId, ValueComponents};
pub use seller::{Seller, SellerId, SellerRef, SellerRegistry};
