use crate::blockchain::{Block, BlockChain};
use crate::config::{ChainParams, ClusterConfig, Config};
use crate::error::{ChainError, Result};
use crate::network::{
    read_frame, write_frame, BlockArg, BlockReply, Request, Response, TransactionArg,
    TransactionReply,
};
use crate::sync::Replicator;
use crate::transaction::Transaction;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Mutable node state. One lock covers both so a commit and the pending
/// block that replaces it are observed together.
#[derive(Debug)]
pub struct Ledger {
    pub pending: Option<Block>,
    pub chain: BlockChain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The transaction sits in the pending block, which now holds `pending` entries.
    Buffered { pending: usize },
    /// The transaction filled the pending block, which was mined and chained.
    Committed { hash: Vec<u8>, nonce: u64 },
}

/// Background tasks owned by a running node.
pub struct NodeHandles {
    pub server: JoinHandle<()>,
    /// Resolves only when the sweep finds corruption.
    pub integrity: JoinHandle<Result<()>>,
}

enum SubmitStep {
    Buffered { arg: TransactionArg, pending: usize },
    Committed { block: BlockArg, skeleton: BlockArg },
}

pub struct Node {
    id: usize,
    self_address: String,
    params: ChainParams,
    integrity_interval: Duration,
    ledger: Arc<Mutex<Ledger>>,
    replicator: Replicator,
}

impl Node {
    /// Build the node and mine its genesis block. Nothing is bound or dialed yet.
    pub fn new(cluster: ClusterConfig, config: &Config) -> Result<Self> {
        let params = config.chain.params();
        let chain = BlockChain::new(params)?;
        let replicator = Replicator::new(
            &cluster.peers,
            config.node.connect_retry(),
            config.node.rpc_timeout(),
        );

        info!(
            "Node {} initialised with {} peer(s), block capacity {}",
            cluster.node_id,
            cluster.peers.len(),
            params.capacity
        );

        Ok(Node {
            id: cluster.node_id,
            self_address: cluster.self_address,
            params,
            integrity_interval: config.chain.integrity_interval(),
            ledger: Arc::new(Mutex::new(Ledger {
                pending: None,
                chain,
            })),
            replicator,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    pub fn replicator(&self) -> &Replicator {
        &self.replicator
    }

    /// Bind the configured address and start serving.
    pub async fn start(self: &Arc<Self>) -> Result<NodeHandles> {
        let listener = TcpListener::bind(&self.self_address).await.map_err(|e| {
            ChainError::ConnectionFailure(format!("cannot listen on {}: {}", self.self_address, e))
        })?;
        Ok(self.start_with_listener(listener))
    }

    /// Serve on an already bound listener, dial every peer and start the
    /// integrity sweep.
    pub fn start_with_listener(self: &Arc<Self>, listener: TcpListener) -> NodeHandles {
        match listener.local_addr() {
            Ok(addr) => info!("Node {} listening on {}", self.id, addr),
            Err(_) => info!("Node {} listening", self.id),
        }

        self.replicator.connect_all();
        NodeHandles {
            server: tokio::spawn(self.clone().serve(listener)),
            integrity: tokio::spawn(self.clone().integrity_sweep()),
        }
    }

    async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    let node = self.clone();
                    tokio::spawn(async move { node.handle_connection(stream, addr).await });
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, addr: SocketAddr) {
        loop {
            let request: Request = match read_frame(&mut stream).await {
                Ok(request) => request,
                Err(ChainError::ConnectionFailure(_)) => {
                    debug!("Peer {} disconnected", addr);
                    return;
                }
                Err(e) => {
                    warn!("Dropping connection from {}: {}", addr, e);
                    return;
                }
            };

            let response = self.dispatch(request).await;
            if let Err(e) = write_frame(&mut stream, &response).await {
                warn!("Reply to {} failed: {}", addr, e);
                return;
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        info!("Request <<< {}", request.name());
        match request {
            Request::ReceiveBlock(arg) => Response::Block(self.receive_block(arg).await),
            Request::ReceiveTransaction(arg) => {
                Response::Transaction(self.receive_transaction(arg).await)
            }
        }
    }

    /// Run `f` against the locked ledger on the blocking pool; `f` may mine.
    async fn run_locked<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut ledger = self.ledger.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut *ledger)).await?
    }

    /// Handle a block announced by a peer.
    ///
    /// A skeleton replaces the pending block. Anything else is rebuilt on top
    /// of the local tip, re-mined and accepted only if it hashes to the
    /// announced value.
    pub async fn receive_block(&self, arg: BlockArg) -> BlockReply {
        let params = self.params;
        let skeleton = arg.is_skeleton();
        let outcome = self
            .run_locked(move |ledger| {
                let tip = ledger.chain.root().hash().to_vec();
                if arg.is_skeleton() {
                    ledger.pending = Some(arg.into_block(tip, params)?);
                    return Ok(ledger.chain.len());
                }

                let expected = arg.hash.clone();
                let candidate = arg.into_block(tip, params)?;
                ledger.chain.add_consensus_block(candidate, &expected)?;
                ledger.pending = None;
                Ok(ledger.chain.len())
            })
            .await;

        match outcome {
            Ok(_) if skeleton => {
                debug!("Pending block replaced by announced skeleton");
                BlockReply { success: true }
            }
            Ok(len) => {
                info!("Accepted replicated block, chain length {}", len);
                BlockReply { success: true }
            }
            Err(e) => {
                warn!("Rejected replicated block: {}", e);
                BlockReply { success: false }
            }
        }
    }

    /// Buffer a transaction relayed by the proposer into the pending block,
    /// creating one keyed by the proposer's block timestamp if needed.
    pub async fn receive_transaction(&self, arg: TransactionArg) -> TransactionReply {
        let params = self.params;
        let outcome = self
            .run_locked(move |ledger| {
                let mut pending = match ledger.pending.take() {
                    Some(block) => block,
                    None => Block::from_parts(
                        arg.block_timestamp,
                        ledger.chain.root().hash().to_vec(),
                        0,
                        Vec::new(),
                        params,
                    )?,
                };
                let appended = pending.append(arg.to_transaction());
                let len = pending.len();
                ledger.pending = Some(pending);
                appended.map(|_| len)
            })
            .await;

        match outcome {
            Ok(len) => {
                debug!("Buffered replicated transaction ({}/{})", len, params.capacity);
                TransactionReply { success: true }
            }
            Err(e) => {
                warn!("Rejected replicated transaction: {}", e);
                TransactionReply { success: false }
            }
        }
    }

    /// Add a locally originated transaction.
    ///
    /// When it fills the pending block, the block is anchored to the tip, mined
    /// and chained; the committed block and the skeleton of its successor are
    /// then pushed to every peer. Otherwise the transaction itself is relayed.
    pub async fn submit_transaction(&self, transaction: Transaction) -> Result<SubmitOutcome> {
        let params = self.params;
        let step = self
            .run_locked(move |ledger| {
                let tip = ledger.chain.root().hash().to_vec();
                let mut pending = ledger
                    .pending
                    .take()
                    .unwrap_or_else(|| Block::new(tip.clone(), params));

                if let Err(e) = pending.append(transaction.clone()) {
                    ledger.pending = Some(pending);
                    return Err(e);
                }

                if !pending.is_full() {
                    let step = SubmitStep::Buffered {
                        arg: TransactionArg::new(&transaction, pending.timestamp()),
                        pending: pending.len(),
                    };
                    ledger.pending = Some(pending);
                    return Ok(step);
                }

                pending.set_parent_hash(tip);
                if let Err(e) = ledger.chain.add_block(pending.clone()) {
                    ledger.pending = Some(pending);
                    return Err(e);
                }

                let committed = ledger.chain.root();
                let block = BlockArg::from_block(committed);
                let next = Block::new(committed.hash().to_vec(), params);
                let skeleton = BlockArg::from_block(&next);
                ledger.pending = Some(next);
                Ok(SubmitStep::Committed { block, skeleton })
            })
            .await?;

        match step {
            SubmitStep::Buffered { arg, pending } => {
                self.send_transaction(arg).await;
                Ok(SubmitOutcome::Buffered { pending })
            }
            SubmitStep::Committed { block, skeleton } => {
                let outcome = SubmitOutcome::Committed {
                    hash: block.hash.clone(),
                    nonce: block.nonce,
                };
                self.send_block(block).await;
                self.send_block(skeleton).await;
                Ok(outcome)
            }
        }
    }

    async fn send_block(&self, arg: BlockArg) {
        let report = self.replicator.broadcast_block(arg).await;
        debug!("ReceiveBlock broadcast: {:?}", report);
    }

    async fn send_transaction(&self, arg: TransactionArg) {
        let report = self.replicator.broadcast_transaction(arg).await;
        debug!("ReceiveTransaction broadcast: {:?}", report);
    }

    /// Re-verify the chain aggregator every interval. Returns only on corruption.
    pub async fn integrity_sweep(self: Arc<Self>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.integrity_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let ledger = self.ledger.lock().await;
            if let Err(e) = ledger.chain.verify_integrity() {
                error!("Blockchain integrity check failed: {}", e);
                return Err(e);
            }
        }
    }

    pub async fn chain_len(&self) -> usize {
        self.ledger.lock().await.chain.len()
    }

    pub async fn tip_hash(&self) -> Vec<u8> {
        self.ledger.lock().await.chain.root().hash().to_vec()
    }

    pub async fn chain_string(&self) -> String {
        self.ledger.lock().await.chain.to_string()
    }

    /// Transactions in the pending block, zero if there is none.
    pub async fn pending_len(&self) -> usize {
        self.ledger
            .lock()
            .await
            .pending
            .as_ref()
            .map_or(0, Block::len)
    }

    /// Wait until at least `count` peers are connected or `limit` elapses.
    /// Returns the number connected at that point.
    pub async fn wait_for_peers(&self, count: usize, limit: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + limit;
        while self.replicator.connected_count() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.replicator.connected_count()
    }
}
