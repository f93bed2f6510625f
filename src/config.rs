//! Configuration management for RelayChain
//!
//! Two sources feed a node: `config.toml` for tunables and a newline-delimited
//! cluster file listing every node's address (line index == node id).

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Transactions per block when nothing else is configured.
pub const DEFAULT_BLOCK_CAPACITY: usize = 7;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_cluster_file")]
    pub cluster_file: String,
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,
    /// Per-call deadline for outbound RPCs. Absent means wait for the peer forever.
    #[serde(default)]
    pub rpc_timeout_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cluster_file: default_cluster_file(),
            connect_retry_ms: default_connect_retry_ms(),
            rpc_timeout_ms: None,
        }
    }
}

impl NodeConfig {
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_block_capacity")]
    pub block_capacity: usize,
    #[serde(default = "default_integrity_interval_ms")]
    pub integrity_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block_capacity: default_block_capacity(),
            integrity_interval_ms: default_integrity_interval_ms(),
        }
    }
}

impl ChainConfig {
    pub fn params(&self) -> ChainParams {
        ChainParams {
            capacity: self.block_capacity,
        }
    }

    pub fn integrity_interval(&self) -> Duration {
        Duration::from_millis(self.integrity_interval_ms)
    }
}

/// Parameters fixed for the lifetime of a chain and every block built for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    pub capacity: usize,
}

impl ChainParams {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BLOCK_CAPACITY)
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chain.block_capacity == 0 {
            return Err(ChainError::Config(
                "chain.block_capacity must be greater than zero".to_string(),
            ));
        }
        if self.chain.integrity_interval_ms == 0 {
            return Err(ChainError::Config(
                "chain.integrity_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.node.cluster_file.is_empty() {
            return Err(ChainError::Config(
                "node.cluster_file must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)?;
    Config::from_toml(&text)
}

fn default_cluster_file() -> String {
    "nodes.txt".to_string()
}

fn default_connect_retry_ms() -> u64 {
    250
}

fn default_block_capacity() -> usize {
    DEFAULT_BLOCK_CAPACITY
}

fn default_integrity_interval_ms() -> u64 {
    300
}

/// A peer entry from the cluster file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub id: usize,
    pub address: String,
}

/// This node's view of the cluster: its own listen address and everyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub node_id: usize,
    pub self_address: String,
    pub peers: Vec<PeerAddress>,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>, node_id: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ChainError::Config(format!("cannot read cluster file {}: {}", path.display(), e))
        })?;
        Self::parse(&text, node_id)
    }

    pub fn parse(text: &str, node_id: usize) -> Result<Self> {
        let addresses: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if node_id >= addresses.len() {
            return Err(ChainError::Config(format!(
                "node id {} out of range: cluster lists {} node(s)",
                node_id,
                addresses.len()
            )));
        }

        let peers = addresses
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != node_id)
            .map(|(index, address)| PeerAddress {
                id: index,
                address: address.to_string(),
            })
            .collect();

        Ok(Self {
            node_id,
            self_address: addresses[node_id].to_string(),
            peers,
        })
    }
}
