//! Core primitives shared by every ledger component
//!
//! - **path**: compact root-to-node slot trail (PathCodec)
//! - **time**: calendar week boundaries for the weekly calculation phase

pub mod path;
pub mod time;

pub use path::{decode, encode, PathError, MAX_SLOT, SLOT_COUNT};
pub use time::{next_week_start, weeks_between, SECONDS_PER_WEEK};
