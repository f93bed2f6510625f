/// Transaction type for RelayChain
use crate::merkle::{Content, Sha256Hash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Payload carried by every genesis placeholder transaction.
pub const PLACEHOLDER_DATA: &[u8] = b"init";

/// An immutable record moved from `sender` to `recipient`.
///
/// Sender and recipient are opaque identities (the CLI uses node addresses);
/// `data` is a free-form payload. The same value travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "serde_bytes")]
    sender: Vec<u8>,
    #[serde(with = "serde_bytes")]
    recipient: Vec<u8>,
    timestamp: i64,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<Vec<u8>>,
        recipient: impl Into<Vec<u8>>,
        timestamp: i64,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            timestamp,
            data: data.into(),
        }
    }

    /// Filler used to bring the genesis block up to capacity.
    pub fn placeholder() -> Self {
        Transaction::new(Vec::new(), Vec::new(), 0, PLACEHOLDER_DATA)
    }

    pub fn sender(&self) -> &[u8] {
        &self.sender
    }

    pub fn recipient(&self) -> &[u8] {
        &self.recipient
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// sender ∥ recipient ∥ timestamp (i64, big-endian) ∥ data
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(self.sender.len() + self.recipient.len() + 8 + self.data.len());
        bytes.extend_from_slice(&self.sender);
        bytes.extend_from_slice(&self.recipient);
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Calculate the hash of this transaction
    pub fn hash(&self) -> Sha256Hash {
        Sha256::digest(self.to_bytes()).into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}

impl Content for Transaction {
    fn content_hash(&self) -> Sha256Hash {
        self.hash()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} @ {} ({} bytes)",
            self.hash_str(),
            String::from_utf8_lossy(&self.sender),
            String::from_utf8_lossy(&self.recipient),
            self.timestamp,
            self.data.len()
        )
    }
}
