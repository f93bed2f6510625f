use crate::error::{ChainError, Result};

use super::block::Block;

/// The candidate must fill every transaction slot.
pub fn validate_complete(block: &Block, capacity: usize) -> Result<()> {
    if block.len() != capacity {
        return Err(ChainError::IncompleteBlock {
            have: block.len(),
            need: capacity,
        });
    }
    Ok(())
}

/// Both hashes must exist and the candidate must point at the current tip.
pub fn validate_linkage(block: &Block, root: &Block) -> Result<()> {
    if block.hash().is_empty() || root.hash().is_empty() || block.parent_hash() != root.hash() {
        return Err(ChainError::HashMismatch);
    }
    Ok(())
}

/// The locally recomputed hash must equal, byte for byte, the one a proposer announced.
pub fn validate_consensus(block: &Block, expected_hash: &[u8]) -> Result<()> {
    if block.hash() != expected_hash {
        return Err(ChainError::ConsensusMismatch {
            expected: hex::encode(expected_hash),
            actual: hex::encode(block.hash()),
        });
    }
    Ok(())
}
