//! Error types for RelayChain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Block is full: capacity of {capacity} transactions reached")]
    CapacityExceeded { capacity: usize },

    #[error("Block is not full ({have}/{need} transactions), cannot add to chain")]
    IncompleteBlock { have: usize, need: usize },

    #[error("Block hash does not match root hash, or block hash does not exist")]
    HashMismatch,

    #[error("Consensus not reached: expected {expected}, recomputed {actual}")]
    ConsensusMismatch { expected: String, actual: String },

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Chain integrity check failed: {0}")]
    IntegrityFailure(String),

    #[error("Hash computation failed: {0}")]
    HashComputation(String),

    #[error("Worker task failed: {0}")]
    TaskFailure(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Codec(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ChainError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChainError::TaskFailure(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
