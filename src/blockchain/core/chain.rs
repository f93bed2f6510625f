use crate::config::ChainParams;
use crate::error::{ChainError, Result};
use crate::merkle::MerkleTree;
use std::fmt;
use tracing::{debug, info};

use super::block::Block;
use super::validation::{validate_complete, validate_consensus, validate_linkage};

/// Append-only list of accepted blocks plus an aggregator over their hashes.
///
/// Genesis is always present, so the chain is never empty and `root()` is the
/// tip the next candidate must point at.
#[derive(Debug, Clone)]
pub struct BlockChain {
    blocks: Vec<Block>,
    tree: MerkleTree,
    params: ChainParams,
}

impl BlockChain {
    /// Create a new chain with a freshly mined genesis block.
    pub fn new(params: ChainParams) -> Result<Self> {
        let genesis = Block::genesis(params)?;
        info!("Genesis block created: {}", genesis.hash_str());

        let blocks = vec![genesis];
        let tree = MerkleTree::build(&blocks);
        Ok(BlockChain {
            blocks,
            tree,
            params,
        })
    }

    pub fn params(&self) -> ChainParams {
        self.params
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: genesis is created with the chain.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The chain tip.
    pub fn root(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn aggregator_root(&self) -> &[u8] {
        self.tree.root()
    }

    /// Mine `candidate`, then accept it if it is full and extends the tip.
    ///
    /// On any failure the chain is left untouched.
    pub fn add_block(&mut self, mut candidate: Block) -> Result<()> {
        candidate.mine()?;

        validate_complete(&candidate, self.params.capacity)
            .and_then(|_| validate_linkage(&candidate, self.root()))
            .inspect_err(|e| debug!("Rejected block {}: {}", candidate.hash_str(), e))?;

        self.commit(candidate);
        Ok(())
    }

    /// Mine a block another node announced and accept it only if the recomputed
    /// hash matches `expected_hash` and the usual checks pass.
    pub fn add_consensus_block(
        &mut self,
        mut candidate: Block,
        expected_hash: &[u8],
    ) -> Result<()> {
        candidate.mine()?;

        validate_consensus(&candidate, expected_hash)
            .and_then(|_| validate_complete(&candidate, self.params.capacity))
            .and_then(|_| validate_linkage(&candidate, self.root()))
            .inspect_err(|e| {
                debug!("Rejected consensus block {}: {}", candidate.hash_str(), e)
            })?;

        self.commit(candidate);
        Ok(())
    }

    fn commit(&mut self, block: Block) {
        self.blocks.push(block);
        self.tree.rebuild(&self.blocks);
        info!(
            "Block {} added to chain: {}",
            self.blocks.len(),
            self.root().hash_str()
        );
    }

    /// One pass of the integrity sweep: every aggregator node must match the
    /// blocks it was built from.
    pub fn verify_integrity(&self) -> Result<()> {
        if !self.tree.verify() {
            return Err(ChainError::IntegrityFailure(
                "chain aggregator nodes do not recompute".to_string(),
            ));
        }
        if !self.tree.verify_content(&self.blocks) {
            return Err(ChainError::IntegrityFailure(format!(
                "chain aggregator does not match the {} accepted blocks",
                self.blocks.len()
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn block_mut(&mut self, index: usize) -> &mut Block {
        &mut self.blocks[index]
    }
}

impl fmt::Display for BlockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "***BlockChain*** ({} blocks)", self.blocks.len())?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}
