//! Replication fan-out for RelayChain
//!
//! This module pushes locally produced blocks and transactions to every peer:
//! - One outbound connection per peer, dialed until it succeeds
//! - Parallel broadcast with a join barrier (the call returns once every peer answered)
//! - Per-peer delivery statistics
//! - Reconnect scheduling when a call fails

use crate::config::PeerAddress;
use crate::network::{BlockArg, PeerConnection, Request, TransactionArg};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Delivery statistics for one peer
#[derive(Debug, Clone, Default)]
pub struct PeerStats {
    pub accepted: u64,
    pub rejected: u64,
    pub failures: u32,
    pub last_seen: Option<Instant>,
}

impl PeerStats {
    /// Check if peer should be considered unreliable
    pub fn is_unreliable(&self) -> bool {
        self.failures >= 3
    }
}

/// Outcome of one broadcast across all peers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Peers not connected yet; they miss this broadcast.
    pub skipped: usize,
}

pub struct Replicator {
    peers: Vec<Arc<PeerConnection>>,
    connect_retry: Duration,
    rpc_timeout: Option<Duration>,
    stats: Arc<RwLock<HashMap<usize, PeerStats>>>,
}

impl Replicator {
    pub fn new(
        peers: &[PeerAddress],
        connect_retry: Duration,
        rpc_timeout: Option<Duration>,
    ) -> Self {
        Self {
            peers: peers.iter().map(|p| Arc::new(PeerConnection::new(p))).collect(),
            connect_retry,
            rpc_timeout,
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn peers(&self) -> &[Arc<PeerConnection>] {
        &self.peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn connected_count(&self) -> usize {
        self.peers.iter().filter(|p| p.is_connected()).count()
    }

    /// Start dialing every peer in the background.
    pub fn connect_all(&self) -> Vec<JoinHandle<()>> {
        self.peers
            .iter()
            .map(|peer| self.spawn_connect(peer.clone()))
            .collect()
    }

    fn spawn_connect(&self, peer: Arc<PeerConnection>) -> JoinHandle<()> {
        let interval = self.connect_retry;
        tokio::spawn(async move {
            peer.connect_with_retry(interval).await;
        })
    }

    pub async fn broadcast_block(&self, arg: BlockArg) -> BroadcastReport {
        self.broadcast(Request::ReceiveBlock(arg)).await
    }

    pub async fn broadcast_transaction(&self, arg: TransactionArg) -> BroadcastReport {
        self.broadcast(Request::ReceiveTransaction(arg)).await
    }

    /// Call every connected peer in parallel and wait for all of them.
    async fn broadcast(&self, request: Request) -> BroadcastReport {
        let request = Arc::new(request);
        let mut report = BroadcastReport::default();
        let mut calls = JoinSet::new();

        for peer in &self.peers {
            if !peer.is_connected() {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;

            let peer = peer.clone();
            let request = request.clone();
            let timeout = self.rpc_timeout;
            calls.spawn(async move {
                let outcome = peer.call(&request, timeout).await;
                (peer, outcome)
            });
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((peer, Ok(response))) => {
                    let success = response.success();
                    self.record_reply(peer.id(), success).await;
                    if success {
                        report.accepted += 1;
                        info!(
                            "Response >>> {} accepted by peer {}",
                            request.name(),
                            peer.id()
                        );
                    } else {
                        report.rejected += 1;
                        warn!(
                            "Response >>> {} rejected by peer {}",
                            request.name(),
                            peer.id()
                        );
                    }
                }
                Ok((peer, Err(e))) => {
                    report.failed += 1;
                    self.record_failure(peer.id()).await;
                    warn!(
                        "{} to peer {} failed: {}; reconnecting",
                        request.name(),
                        peer.id(),
                        e
                    );
                    self.spawn_connect(peer);
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Broadcast task for {} aborted: {}", request.name(), e);
                }
            }
        }

        report
    }

    async fn record_reply(&self, peer_id: usize, success: bool) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(peer_id).or_default();
        if success {
            entry.accepted += 1;
        } else {
            entry.rejected += 1;
        }
        entry.last_seen = Some(Instant::now());
    }

    async fn record_failure(&self, peer_id: usize) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(peer_id).or_default();
        entry.failures += 1;
        if entry.is_unreliable() {
            warn!("Peer {} has failed {} calls", peer_id, entry.failures);
        }
    }

    pub async fn peer_stats(&self, peer_id: usize) -> Option<PeerStats> {
        self.stats.read().await.get(&peer_id).cloned()
    }
}
