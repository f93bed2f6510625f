//! Content aggregator: a binary Merkle tree over an ordered item list.
//!
//! Used twice: over a block's transactions and over a chain's blocks. Odd
//! levels duplicate their last node; an empty list has an empty root.

use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Anything that can be placed in a [`MerkleTree`].
pub trait Content {
    fn content_hash(&self) -> Sha256Hash;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    /// levels[0] are the leaves, the last level holds the root
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    pub fn build<C: Content>(items: &[C]) -> Self {
        let leaves = items.iter().map(Content::content_hash).collect();
        Self::from_leaves(leaves)
    }

    /// Full rebuild over `items`; there is no incremental update.
    pub fn rebuild<C: Content>(&mut self, items: &[C]) {
        *self = Self::build(items);
    }

    fn from_leaves(leaves: Vec<Sha256Hash>) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 && levels.len() > 1 {
                break;
            }
            let next = Self::build_next_level(current);
            levels.push(next);
        }

        Self { levels }
    }

    fn build_next_level(level: &[Sha256Hash]) -> Vec<Sha256Hash> {
        level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                hash_pair(&left, &right)
            })
            .collect()
    }

    /// Root digest, or an empty slice for a tree built over nothing.
    pub fn root(&self) -> &[u8] {
        match self.levels.last() {
            Some(top) => &top[0][..],
            None => &[],
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Recompute every internal node from the stored leaves.
    pub fn verify(&self) -> bool {
        match self.levels.first() {
            Some(leaves) => Self::from_leaves(leaves.clone()) == *self,
            None => true,
        }
    }

    /// [`verify`](Self::verify) plus a leaf-by-leaf check against `items`.
    pub fn verify_content<C: Content>(&self, items: &[C]) -> bool {
        if items.len() != self.leaf_count() {
            return false;
        }
        let leaves_match = self
            .levels
            .first()
            .map_or(true, |leaves| {
                leaves
                    .iter()
                    .zip(items)
                    .all(|(leaf, item)| *leaf == item.content_hash())
            });
        leaves_match && self.verify()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_node(&mut self, level: usize, index: usize) {
        self.levels[level][index][0] ^= 0xff;
    }
}

fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
