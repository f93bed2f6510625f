use crate::config::PeerAddress;
use crate::error::{ChainError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{read_frame, write_frame, Request, Response};

/// One outbound RPC channel to a peer, established lazily.
///
/// Calls are strictly request/response, so the stream mutex also serialises
/// concurrent callers.
#[derive(Debug)]
pub struct PeerConnection {
    id: usize,
    address: String,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    connecting: AtomicBool,
}

impl PeerConnection {
    pub fn new(peer: &PeerAddress) -> Self {
        PeerConnection {
            id: peer.id,
            address: peer.address.clone(),
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Dial until the peer answers, sleeping `interval` between attempts.
    ///
    /// Returns immediately if another task is already dialing this peer.
    pub async fn connect_with_retry(&self, interval: Duration) {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match TcpStream::connect(&self.address).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", self.address, e);
                    }
                    *self.stream.lock().await = Some(stream);
                    self.connected.store(true, Ordering::SeqCst);
                    info!(
                        "Connected to peer {} at {} after {} attempt(s)",
                        self.id, self.address, attempts
                    );
                    break;
                }
                Err(e) => {
                    debug!("Dial {} failed (attempt {}): {}", self.address, attempts, e);
                    tokio::time::sleep(interval).await;
                }
            }
        }

        self.connecting.store(false, Ordering::SeqCst);
    }

    /// Send `request` and wait for the reply, optionally bounded by `timeout`.
    ///
    /// Any failure drops the stream; the caller is expected to schedule a
    /// reconnect.
    pub async fn call(&self, request: &Request, timeout: Option<Duration>) -> Result<Response> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or_else(|| {
            ChainError::ConnectionFailure(format!("peer {} is not connected", self.address))
        })?;

        let exchange = Self::exchange(stream, request);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange).await.unwrap_or_else(|_| {
                Err(ChainError::ConnectionFailure(format!(
                    "{} to {} timed out after {:?}",
                    request.name(),
                    self.address,
                    limit
                )))
            }),
            None => exchange.await,
        };

        if let Err(e) = &result {
            warn!("RPC {} to peer {} failed: {}", request.name(), self.address, e);
            *guard = None;
            self.connected.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn exchange(stream: &mut TcpStream, request: &Request) -> Result<Response> {
        write_frame(stream, request).await?;
        let response: Response = read_frame(stream).await?;
        if !response.answers(request) {
            return Err(ChainError::Protocol(format!(
                "unexpected reply to {}",
                request.name()
            )));
        }
        Ok(response)
    }
}
