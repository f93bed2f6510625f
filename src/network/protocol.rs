//! RPC messages exchanged between nodes and their framing on a TCP stream.
//!
//! Wire format: MAGIC (4) + LENGTH (u32 LE) + bincode PAYLOAD

use crate::blockchain::Block;
use crate::config::ChainParams;
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PROTOCOL_MAGIC: [u8; 4] = *b"RLCH";

/// Upper bound on a single payload; blocks are small so this is generous.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Everything a follower needs to rebuild and re-verify a block. The parent
/// hash is not sent: the receiver uses its own chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockArg {
    pub nonce: u64,
    pub timestamp: i64,
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    pub transactions: Vec<Transaction>,
}

impl BlockArg {
    pub fn from_block(block: &Block) -> Self {
        BlockArg {
            nonce: block.nonce(),
            timestamp: block.timestamp(),
            hash: block.hash().to_vec(),
            transactions: block.transactions().to_vec(),
        }
    }

    /// An empty, unmined block announces the proposer's next pending block.
    pub fn is_skeleton(&self) -> bool {
        self.transactions.is_empty() && self.nonce == 0
    }

    pub fn into_block(self, parent_hash: Vec<u8>, params: ChainParams) -> Result<Block> {
        Block::from_parts(
            self.timestamp,
            parent_hash,
            self.nonce,
            self.transactions,
            params,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReply {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionArg {
    #[serde(with = "serde_bytes")]
    pub sender: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub recipient: Vec<u8>,
    pub timestamp: i64,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Timestamp of the sender's pending block, used to key the receiver's.
    pub block_timestamp: i64,
}

impl TransactionArg {
    pub fn new(transaction: &Transaction, block_timestamp: i64) -> Self {
        TransactionArg {
            sender: transaction.sender().to_vec(),
            recipient: transaction.recipient().to_vec(),
            timestamp: transaction.timestamp(),
            data: transaction.data().to_vec(),
            block_timestamp,
        }
    }

    pub fn to_transaction(&self) -> Transaction {
        Transaction::new(
            self.sender.clone(),
            self.recipient.clone(),
            self.timestamp,
            self.data.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReply {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    ReceiveBlock(BlockArg),
    ReceiveTransaction(TransactionArg),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::ReceiveBlock(_) => "ReceiveBlock",
            Request::ReceiveTransaction(_) => "ReceiveTransaction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Block(BlockReply),
    Transaction(TransactionReply),
}

impl Response {
    pub fn success(&self) -> bool {
        match self {
            Response::Block(reply) => reply.success,
            Response::Transaction(reply) => reply.success,
        }
    }

    /// Whether this is the reply kind `request` expects.
    pub fn answers(&self, request: &Request) -> bool {
        matches!(
            (request, self),
            (Request::ReceiveBlock(_), Response::Block(_))
                | (Request::ReceiveTransaction(_), Response::Transaction(_))
        )
    }
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(msg)?;
    if data.len() > MAX_FRAME_SIZE {
        return Err(ChainError::Protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            data.len(),
            MAX_FRAME_SIZE
        )));
    }

    writer.write_all(&PROTOCOL_MAGIC).await?;
    writer.write_all(&(data.len() as u32).to_le_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. A stream closed cleanly between frames surfaces as
/// [`ChainError::ConnectionFailure`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut magic = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut magic).await {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => {
                ChainError::ConnectionFailure("connection closed".to_string())
            }
            _ => e.into(),
        });
    }
    if magic != PROTOCOL_MAGIC {
        return Err(ChainError::Protocol("invalid magic".to_string()));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    // Early size check prevents memory exhaustion
    if len > MAX_FRAME_SIZE {
        return Err(ChainError::Protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(bincode::deserialize(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        Transaction::new("s1", "r1", 1682708458208064001, "data1")
    }

    #[test]
    fn test_skeleton_detection() {
        let skeleton = BlockArg {
            nonce: 0,
            timestamp: 5,
            hash: Vec::new(),
            transactions: Vec::new(),
        };
        assert!(skeleton.is_skeleton());

        let mined_empty = BlockArg {
            nonce: 3,
            ..skeleton.clone()
        };
        assert!(!mined_empty.is_skeleton());

        let with_tx = BlockArg {
            transactions: vec![sample_transaction()],
            ..skeleton
        };
        assert!(!with_tx.is_skeleton());
    }

    #[test]
    fn test_transaction_arg_preserves_fields() {
        let tx = sample_transaction();
        let arg = TransactionArg::new(&tx, 42);
        assert_eq!(arg.block_timestamp, 42);
        assert_eq!(arg.to_transaction(), tx);
    }

    #[test]
    fn test_response_answers_matching_request() {
        let request = Request::ReceiveTransaction(TransactionArg::new(&sample_transaction(), 1));
        let rejected = Response::Transaction(TransactionReply { success: false });
        let wrong_kind = Response::Block(BlockReply { success: true });
        assert!(rejected.answers(&request));
        assert!(!wrong_kind.answers(&request));
        assert_eq!(request.name(), "ReceiveTransaction");
    }

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut client, mut server) = tokio::io::duplex(64 * 1024);
            let arg = TransactionArg::new(&sample_transaction(), 7);
            let request = Request::ReceiveTransaction(arg);

            write_frame(&mut client, &request).await.unwrap();
            let received: Request = read_frame(&mut server).await.unwrap();
            assert_eq!(received, request);
        })
        .await
        .expect("test_frame_roundtrip_over_duplex timed out");
    }

    #[tokio::test]
    async fn test_bad_magic_is_rejected() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut client, mut server) = tokio::io::duplex(1024);
            client.write_all(b"NOPE\x00\x00\x00\x00").await.unwrap();

            let err = read_frame::<_, Request>(&mut server).await.unwrap_err();
            assert!(matches!(err, ChainError::Protocol(_)));
        })
        .await
        .expect("test_bad_magic_is_rejected timed out");
    }

    #[tokio::test]
    async fn test_closed_stream_reports_connection_failure() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (client, mut server) = tokio::io::duplex(1024);
            drop(client);

            let err = read_frame::<_, Request>(&mut server).await.unwrap_err();
            assert!(matches!(err, ChainError::ConnectionFailure(_)));
        })
        .await
        .expect("test_closed_stream_reports_connection_failure timed out");
    }

    #[tokio::test]
    async fn test_oversized_length_is_rejected() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let (mut client, mut server) = tokio::io::duplex(1024);
            client.write_all(&PROTOCOL_MAGIC).await.unwrap();
            client.write_all(&u32::MAX.to_le_bytes()).await.unwrap();

            let err = read_frame::<_, Request>(&mut server).await.unwrap_err();
            assert!(matches!(err, ChainError::Protocol(_)));
        })
        .await
        .expect("test_oversized_length_is_rejected timed out");
    }
}
