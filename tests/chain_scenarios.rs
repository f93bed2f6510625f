use relaychain::blockchain::{hash_to_target, Block, BlockChain, DIFFICULTY};
use relaychain::config::ChainParams;
use relaychain::error::ChainError;
use relaychain::network::BlockArg;
use relaychain::transaction::Transaction;

fn tx(i: i64) -> Transaction {
    Transaction::new(
        format!("s{}", i),
        format!("r{}", i),
        1682708458208064000 + i,
        format!("data{}", i),
    )
}

fn block_on_tip(chain: &BlockChain, txs: &[Transaction]) -> Block {
    let mut block = Block::new(chain.root().hash().to_vec(), chain.params());
    for t in txs {
        block.append(t.clone()).unwrap();
    }
    block
}

#[test]
fn test_single_transaction_block_is_mined_and_chained() {
    let mut chain = BlockChain::new(ChainParams::with_capacity(1)).unwrap();
    let transaction = Transaction::new("s1", "r1", 1682708458208064001, "data1");

    chain.add_block(block_on_tip(&chain, &[transaction.clone()])).unwrap();

    assert_eq!(chain.len(), 2);
    let tip = chain.root();
    assert_eq!(tip.transactions(), &[transaction]);
    assert_eq!(tip.parent_hash(), chain.genesis().hash());

    // Below 2^(256-12): first byte zero, high nibble of the second zero.
    let hash = tip.hash();
    assert_eq!(hash.len(), 32);
    assert_eq!(hash[0], 0);
    assert!(hash[1] < 0x10);
    assert!(hash < &hash_to_target(DIFFICULTY)[..]);
}

#[test]
fn test_underfull_block_is_rejected() {
    let mut chain = BlockChain::new(ChainParams::with_capacity(7)).unwrap();
    let txs: Vec<Transaction> = (0..6).map(tx).collect();

    let err = chain.add_block(block_on_tip(&chain, &txs)).unwrap_err();

    assert_eq!(err, ChainError::IncompleteBlock { have: 6, need: 7 });
    assert_eq!(chain.len(), 1);
}

#[test]
fn test_tampered_announced_hash_is_rejected() {
    let params = ChainParams::with_capacity(2);
    let mut proposer = BlockChain::new(params).unwrap();
    let mut follower = BlockChain::new(params).unwrap();
    proposer.add_block(block_on_tip(&proposer, &[tx(1), tx(2)])).unwrap();

    let arg = BlockArg::from_block(proposer.root());
    let mut flipped = arg.hash.clone();
    flipped[31] ^= 0x01;

    let candidate = arg.clone().into_block(follower.root().hash().to_vec(), params).unwrap();
    let err = follower.add_consensus_block(candidate, &flipped).unwrap_err();
    assert!(matches!(err, ChainError::ConsensusMismatch { .. }));
    assert_eq!(follower.len(), 1);

    let candidate = arg.clone().into_block(follower.root().hash().to_vec(), params).unwrap();
    follower.add_consensus_block(candidate, &arg.hash).unwrap();
    assert_eq!(follower.root().hash(), proposer.root().hash());
}

#[test]
fn test_mining_is_deterministic() {
    let params = ChainParams::with_capacity(3);
    let mut a = Block::from_parts(1, vec![9u8; 32], 0, vec![tx(1), tx(2), tx(3)], params).unwrap();
    let mut b = Block::from_parts(2, vec![9u8; 32], 55, vec![tx(1), tx(2), tx(3)], params).unwrap();

    assert_eq!(a.mine().unwrap(), b.mine().unwrap());
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn test_chain_grows_by_one_per_accepted_block() {
    let mut chain = BlockChain::new(ChainParams::with_capacity(2)).unwrap();

    for round in 0..3i64 {
        let before = chain.len();
        let parent = chain.root().hash().to_vec();

        // A failed attempt never moves the chain.
        assert!(chain.add_block(block_on_tip(&chain, &[tx(round)])).is_err());
        assert_eq!(chain.len(), before);

        chain
            .add_block(block_on_tip(&chain, &[tx(round * 2), tx(round * 2 + 1)]))
            .unwrap();
        assert_eq!(chain.len(), before + 1);
        assert_eq!(chain.root().parent_hash(), &parent[..]);
    }

    for pair in chain.blocks().windows(2) {
        assert_eq!(pair[1].parent_hash(), pair[0].hash());
    }
    assert!(chain.verify_integrity().is_ok());
}

#[test]
fn test_genesis_is_shared_by_every_node() {
    let params = ChainParams::default();
    let a = BlockChain::new(params).unwrap();
    let b = BlockChain::new(params).unwrap();

    let genesis = a.genesis();
    assert!(genesis.parent_hash().is_empty());
    assert_eq!(genesis.len(), params.capacity);
    assert!(genesis
        .transactions()
        .iter()
        .all(|t| t.data() == b"init" && t.sender().is_empty() && t.timestamp() == 0));
    assert_eq!(genesis.hash(), b.genesis().hash());
}

#[test]
fn test_block_survives_the_wire() {
    let params = ChainParams::with_capacity(2);
    let mut proposer = BlockChain::new(params).unwrap();
    let mut follower = BlockChain::new(params).unwrap();
    proposer.add_block(block_on_tip(&proposer, &[tx(7), tx(8)])).unwrap();

    let bytes = bincode::serialize(&BlockArg::from_block(proposer.root())).unwrap();
    let received: BlockArg = bincode::deserialize(&bytes).unwrap();
    assert!(!received.is_skeleton());

    let expected = received.hash.clone();
    let candidate = received.into_block(follower.root().hash().to_vec(), params).unwrap();
    follower.add_consensus_block(candidate, &expected).unwrap();

    assert_eq!(follower.len(), 2);
    assert_eq!(follower.root().transactions(), proposer.root().transactions());
}
