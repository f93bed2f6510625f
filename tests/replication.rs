use relaychain::config::{ClusterConfig, Config};
use relaychain::node::{Node, NodeHandles, SubmitOutcome};
use relaychain::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn test_config(capacity: usize) -> Config {
    let mut config = Config::default();
    config.chain.block_capacity = capacity;
    config.node.connect_retry_ms = 20;
    config.node.rpc_timeout_ms = Some(10_000);
    config
}

/// Start `count` nodes on loopback, each knowing all the others.
async fn start_cluster(count: usize, capacity: usize) -> Vec<(Arc<Node>, NodeHandles)> {
    let mut listeners = Vec::new();
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    let cluster_file = listeners
        .iter()
        .map(|l| l.local_addr().unwrap().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let config = test_config(capacity);
    let mut nodes = Vec::new();
    for (id, listener) in listeners.into_iter().enumerate() {
        let cluster = ClusterConfig::parse(&cluster_file, id).unwrap();
        let node = Arc::new(Node::new(cluster, &config).unwrap());
        let handles = node.start_with_listener(listener);
        nodes.push((node, handles));
    }

    for (node, _) in &nodes {
        let connected = node.wait_for_peers(count - 1, Duration::from_secs(10)).await;
        assert_eq!(connected, count - 1);
    }
    nodes
}

fn tx(sender: &str, i: i64) -> Transaction {
    Transaction::new(sender, format!("r{}", i), 1682708458208064000 + i, format!("data{}", i))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_nodes_converge_on_committed_block() {
    tokio::time::timeout(Duration::from_secs(60), async {
        let nodes = start_cluster(2, 2).await;
        let (a, _) = &nodes[0];
        let (b, _) = &nodes[1];
        assert_eq!(a.tip_hash().await, b.tip_hash().await);

        assert_eq!(
            a.submit_transaction(tx("a", 1)).await.unwrap(),
            SubmitOutcome::Buffered { pending: 1 }
        );
        assert_eq!(b.pending_len().await, 1);

        let outcome = a.submit_transaction(tx("a", 2)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Committed { .. }));

        // Broadcast waits for every reply, so B has already re-mined the block.
        assert_eq!(a.chain_len().await, 2);
        assert_eq!(b.chain_len().await, 2);
        assert_eq!(a.tip_hash().await, b.tip_hash().await);
        assert_eq!(b.pending_len().await, 0);

        let stats = a.replicator().peer_stats(1).await.unwrap();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.failures, 0);
    })
    .await
    .expect("test_two_nodes_converge_on_committed_block timed out");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_either_node_can_propose() {
    tokio::time::timeout(Duration::from_secs(60), async {
        let nodes = start_cluster(3, 1).await;

        for (round, (proposer, _)) in nodes.iter().enumerate() {
            let outcome = proposer.submit_transaction(tx("p", round as i64)).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Committed { .. }));
        }

        let tip = nodes[0].0.tip_hash().await;
        for (node, _) in &nodes {
            assert_eq!(node.chain_len().await, 4);
            assert_eq!(node.tip_hash().await, tip);
        }
        assert!(nodes[2].0.chain_string().await.contains(&hex::encode(&tip)));
    })
    .await
    .expect("test_either_node_can_propose timed out");
}
