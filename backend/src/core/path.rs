//! Path codec for the quaternary account tree
//!
//! Every account stores the slots chosen on the way down from the root, one
//! byte per level. The root's own slot is not part of any path, so the root
//! has an empty path and an account's path length equals its depth.
//!
//! ```text
//!            root (path = [])
//!          /   |   |   \
//!         0    1   2    3
//!         |
//!        B (path = [0])
//!             \
//!              2
//!              |
//!             C (path = [0, 2])
//! ```
//!
//! Ancestors are derived by replaying the path from the root through child
//! slots, so no query ever recurses through parent links.

use thiserror::Error;

/// Number of child slots under every account
pub const SLOT_COUNT: usize = 4;

/// Highest valid slot value
pub const MAX_SLOT: u8 = (SLOT_COUNT - 1) as u8;

/// Errors raised while encoding or decoding a path
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid slot {slot} at depth {depth}: slots must be in 0..={max}", max = MAX_SLOT)]
    InvalidSlot { depth: usize, slot: u8 },
}

/// Encode a root-to-node slot trail into its byte form
///
/// # Example
/// ```
/// use commission_ledger_core_rs::core::path::encode;
///
/// assert_eq!(encode(&[0, 2]).unwrap(), vec![0u8, 2u8]);
/// assert!(encode(&[4]).is_err());
/// ```
pub fn encode(positions: &[u8]) -> Result<Vec<u8>, PathError> {
    positions
        .iter()
        .enumerate()
        .map(|(depth, &slot)| check_slot(depth, slot))
        .collect()
}

/// Decode a stored path back into its slot trail (inverse of [`encode`])
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>, PathError> {
    bytes
        .iter()
        .enumerate()
        .map(|(depth, &slot)| check_slot(depth, slot))
        .collect()
}

/// Path of a child placed at `slot` under a parent with `parent_path`
pub fn child_path(parent_path: &[u8], slot: u8) -> Result<Vec<u8>, PathError> {
    let mut path = Vec::with_capacity(parent_path.len() + 1);
    path.extend_from_slice(parent_path);
    path.extend(encode(&[slot])?);
    Ok(path)
}

fn check_slot(depth: usize, slot: u8) -> Result<u8, PathError> {
    if slot > MAX_SLOT {
        return Err(PathError::InvalidSlot { depth, slot });
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_root() {
        assert_eq!(encode(&[]).unwrap(), Vec::<u8>::new());
        assert_eq!(decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_order_is_preserved() {
        let trail = [3, 0, 1, 2, 2];
        let bytes = encode(&trail).unwrap();
        assert_eq!(bytes.len(), trail.len());
        assert_eq!(decode(&bytes).unwrap(), trail.to_vec());
    }

    #[test]
    fn test_invalid_slot_reports_depth() {
        assert_eq!(
            encode(&[0, 1, 7]),
            Err(PathError::InvalidSlot { depth: 2, slot: 7 })
        );
        assert_eq!(
            decode(&[9]),
            Err(PathError::InvalidSlot { depth: 0, slot: 9 })
        );
    }

    #[test]
    fn test_child_path_appends_slot() {
        assert_eq!(child_path(&[0], 2).unwrap(), vec![0, 2]);
        assert!(child_path(&[0], 4).is_err());
    }
}
