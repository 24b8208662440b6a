//! Merkle tree sizing for compressed NFT collections.

use asset_programs::bubblegum::merkle_tree_account_size;
use serde::Serialize;

use crate::error::DeskError;

/// Shape of a concurrent Merkle tree. Capacity is `2^max_depth` leaves and
/// cannot change after the tree is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MerkleTreeConfig {
    pub max_depth: u32,
    pub max_buffer_size: u32,
}

impl MerkleTreeConfig {
    pub const fn new(max_depth: u32, max_buffer_size: u32) -> Self {
        Self {
            max_depth,
            max_buffer_size,
        }
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.max_depth
    }
}

/// Supported configurations, ordered by depth and then buffer size.
pub const TREE_CONFIGS: [MerkleTreeConfig; 9] = [
    MerkleTreeConfig::new(14, 64),
    MerkleTreeConfig::new(14, 256),
    MerkleTreeConfig::new(14, 1024),
    MerkleTreeConfig::new(20, 64),
    MerkleTreeConfig::new(20, 256),
    MerkleTreeConfig::new(20, 1024),
    MerkleTreeConfig::new(30, 64),
    MerkleTreeConfig::new(30, 256),
    MerkleTreeConfig::new(30, 1024),
];

/// Largest number of leaves any supported tree can hold.
pub const MAX_TREE_CAPACITY: u64 = 1 << 30;

const BASE_TREE_COST_SOL: f64 = 0.000_001;
const COST_PER_LEAF_SOL: f64 = 0.000_000_1;

/// Smallest supported tree that fits `quantity` leaves.
///
/// Fails with `InvalidAmount` for zero and `CapacityExceeded` above
/// [`MAX_TREE_CAPACITY`]; an oversized request is never mapped onto a smaller
/// tree.
pub fn recommend(quantity: u64) -> Result<MerkleTreeConfig, DeskError> {
    if quantity == 0 {
        return Err(DeskError::InvalidAmount(
            "tree must hold at least one NFT".into(),
        ));
    }
    if quantity > MAX_TREE_CAPACITY {
        return Err(DeskError::CapacityExceeded {
            quantity,
            max: MAX_TREE_CAPACITY,
        });
    }

    // ceil(log2(quantity))
    let min_depth = quantity.next_power_of_two().trailing_zeros();

    TREE_CONFIGS
        .iter()
        .find(|c| c.max_depth >= min_depth)
        .copied()
        .ok_or(DeskError::CapacityExceeded {
            quantity,
            max: MAX_TREE_CAPACITY,
        })
}

/// Rough creation cost in SOL for a tree of the given depth.
pub fn estimate_cost(max_depth: u32) -> f64 {
    BASE_TREE_COST_SOL + COST_PER_LEAF_SOL * 2f64.powi(max_depth as i32)
}

/// Bytes to allocate for the tree account (no canopy).
pub fn tree_account_size(config: &MerkleTreeConfig) -> u64 {
    merkle_tree_account_size(config.max_depth, config.max_buffer_size, 0)
}
