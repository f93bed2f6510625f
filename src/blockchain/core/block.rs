use crate::config::ChainParams;
use crate::error::{ChainError, Result};
use crate::merkle::{Content, MerkleTree, Sha256Hash};
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use std::fmt;

use super::pow::ProofOfWork;

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn timestamp_nanos() -> i64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}

/// Block metadata. `hash` stays empty until a mine succeeds; `parent_hash` is
/// empty only for genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub(crate) timestamp: i64,
    pub(crate) parent_hash: Vec<u8>,
    pub(crate) hash: Vec<u8>,
    pub(crate) nonce: u64,
}

impl BlockHeader {
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn parent_hash(&self) -> &[u8] {
        &self.parent_hash
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(f, "Parent Block Hash: {}", hex::encode(&self.parent_hash))?;
        writeln!(f, "Hash: {}", hex::encode(&self.hash))?;
        writeln!(f, "Nonce: {}", self.nonce)
    }
}

/// A capacity-bounded, ordered buffer of transactions sealed by proof-of-work.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) header: BlockHeader,
    transactions: Vec<Transaction>,
    tree: MerkleTree,
    pow: ProofOfWork,
    params: ChainParams,
}

impl Block {
    /// Fresh, empty block on top of `parent_hash`, stamped with the current time.
    pub fn new(parent_hash: impl Into<Vec<u8>>, params: ChainParams) -> Self {
        Block {
            header: BlockHeader {
                timestamp: timestamp_nanos(),
                parent_hash: parent_hash.into(),
                hash: Vec::new(),
                nonce: 0,
            },
            transactions: Vec::new(),
            tree: MerkleTree::default(),
            pow: ProofOfWork::new(),
            params,
        }
    }

    /// Rebuild a block from fields announced by a peer.
    pub fn from_parts(
        timestamp: i64,
        parent_hash: impl Into<Vec<u8>>,
        nonce: u64,
        transactions: Vec<Transaction>,
        params: ChainParams,
    ) -> Result<Self> {
        if transactions.len() > params.capacity {
            return Err(ChainError::CapacityExceeded {
                capacity: params.capacity,
            });
        }

        let tree = MerkleTree::build(&transactions);
        Ok(Block {
            header: BlockHeader {
                timestamp,
                parent_hash: parent_hash.into(),
                hash: Vec::new(),
                nonce,
            },
            transactions,
            tree,
            pow: ProofOfWork::new(),
            params,
        })
    }

    /// Genesis: no parent, filled with placeholders, already mined.
    pub fn genesis(params: ChainParams) -> Result<Self> {
        let mut genesis = Block::new(Vec::new(), params);
        for _ in 0..params.capacity {
            genesis.append(Transaction::placeholder())?;
        }
        genesis.mine()?;
        Ok(genesis)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn parent_hash(&self) -> &[u8] {
        &self.header.parent_hash
    }

    pub fn hash(&self) -> &[u8] {
        &self.header.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(&self.header.hash)
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    /// Eligible for chaining only once every slot is used.
    pub fn is_full(&self) -> bool {
        self.transactions.len() == self.params.capacity
    }

    pub fn target(&self) -> &Sha256Hash {
        self.pow.target()
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty()
    }

    pub fn aggregator_root(&self) -> &[u8] {
        self.tree.root()
    }

    /// Append a transaction and rebuild the aggregator over the whole list.
    pub fn append(&mut self, transaction: Transaction) -> Result<()> {
        if self.transactions.len() >= self.params.capacity {
            return Err(ChainError::CapacityExceeded {
                capacity: self.params.capacity,
            });
        }
        self.transactions.push(transaction);
        self.tree.rebuild(&self.transactions);
        Ok(())
    }

    /// Re-anchor a block that was created before the true chain tip was known.
    ///
    /// Committed blocks are owned by their chain and can no longer reach this.
    pub fn set_parent_hash(&mut self, parent_hash: impl Into<Vec<u8>>) {
        self.header.parent_hash = parent_hash.into();
    }

    /// SHA-256(parent ∥ aggregator root ∥ nonce ∥ difficulty), integers as i64 BE.
    pub fn content_hash(&self) -> Sha256Hash {
        self.content_hash_with_nonce(self.header.nonce)
    }

    fn content_hash_with_nonce(&self, nonce: u64) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(&self.header.parent_hash);
        hasher.update(self.tree.root());
        hasher.update((nonce as i64).to_be_bytes());
        hasher.update((self.pow.difficulty() as i64).to_be_bytes());
        hasher.finalize().into()
    }

    /// Search for a nonce from 0 and seal the header with the winning hash.
    ///
    /// Calling this again restarts from 0 and lands on the same pair.
    pub fn mine(&mut self) -> Result<(u64, Sha256Hash)> {
        let pow = self.pow;
        let (nonce, hash) = pow.search(|nonce| self.content_hash_with_nonce(nonce))?;
        self.header.nonce = nonce;
        self.header.hash = hash.to_vec();
        Ok((nonce, hash))
    }

    pub fn is_mined(&self) -> bool {
        !self.header.hash.is_empty()
    }
}

impl Content for Block {
    fn content_hash(&self) -> Sha256Hash {
        Block::content_hash(self)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**Block**")?;
        write!(f, "{}", self.header)?;
        writeln!(
            f,
            "Transactions ({}/{}), root {}:",
            self.transactions.len(),
            self.params.capacity,
            hex::encode(self.tree.root())
        )?;
        for tx in &self.transactions {
            writeln!(f, "  {}", tx)?;
        }
        Ok(())
    }
}
