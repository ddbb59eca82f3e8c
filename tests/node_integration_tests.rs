//! Node facade integration tests
//!
//! Exercises the control surface end to end: genesis state, mining,
//! transaction flow through the pool, fork choice and rejection paths.

use ember_chain::core::{cumulative_work, UnspentTxOut};
use ember_chain::{Chain, Keystore, Node, NodeError, Peers, Server, Wallet};
use std::sync::Arc;
use tempfile::TempDir;

const GENESIS_HASH: &str = "91a73664bc84c0baa1fc75ea6e4aa6d1d20c5df664c724e3159aefc2e1186627";

// A node with no listener running; broadcasts go to an empty session set.
fn test_node() -> (Node, Arc<Wallet>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Keystore::new(dir.path().join("private_key"));
    let wallet = Arc::new(Wallet::new(&keystore).unwrap());

    let sessions = Peers::new();
    let chain = Chain::new(Arc::new(sessions.clone())).unwrap();
    let server = Server::new(chain.clone(), sessions);
    let node = Node::new(chain, Arc::clone(&wallet), server);
    (node, wallet, dir)
}

fn other_address() -> String {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Keystore::new(dir.path().join("private_key"));
    Wallet::new(&keystore).unwrap().get_address().to_string()
}

#[test]
fn test_fresh_node_starts_at_genesis() {
    let (node, _, _dir) = test_node();

    let chain = node.list_chain();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].get_hash(), GENESIS_HASH);
    // This wallet owns nothing of the genesis output
    assert_eq!(node.get_balance(), 0);
    assert!(node.list_my_unspent().is_empty());
    assert_eq!(node.list_unspent().len(), 1);
}

#[test]
fn test_mine_empty_block() {
    let (node, _, _dir) = test_node();

    let block = node.mine_block().unwrap();
    assert_eq!(block.get_index(), 1);
    assert_eq!(block.get_previous_hash(), GENESIS_HASH);
    assert_eq!(block.get_difficulty(), 0);
    assert_eq!(block.get_data().len(), 1);

    let coinbase = &block.get_data()[0];
    assert_eq!(coinbase.get_tx_outs().len(), 1);
    assert_eq!(coinbase.get_tx_outs()[0].get_address(), node.get_address());
    assert_eq!(coinbase.get_tx_outs()[0].get_amount(), 50);

    // The UTXO set is now the genesis output plus the fresh coinbase
    assert_eq!(node.list_unspent().len(), 2);
    assert_eq!(node.get_balance(), 50);
}

#[test]
fn test_send_transaction_waits_in_pool() {
    let (node, _, _dir) = test_node();
    let receiver = other_address();

    let mined = node.mine_block().unwrap();
    let tx = node.send_transaction(&receiver, 10).unwrap();

    let pool = node.list_mempool();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0], tx);

    // One input, referencing the block-1 coinbase
    assert_eq!(tx.get_tx_ins().len(), 1);
    assert_eq!(
        tx.get_tx_ins()[0].get_tx_out_id(),
        mined.get_data()[0].get_id()
    );

    // Two outputs: the transfer and the change
    assert_eq!(tx.get_tx_outs().len(), 2);
    assert_eq!(tx.get_tx_outs()[0].get_address(), receiver);
    assert_eq!(tx.get_tx_outs()[0].get_amount(), 10);
    assert_eq!(tx.get_tx_outs()[1].get_address(), node.get_address());
    assert_eq!(tx.get_tx_outs()[1].get_amount(), 40);

    // Confirmed balance is untouched until the transfer is mined
    assert_eq!(node.get_balance(), 50);
}

#[test]
fn test_mining_confirms_pending_transaction() {
    let (node, _, _dir) = test_node();
    let receiver = other_address();

    node.mine_block().unwrap();
    let pending = node.send_transaction(&receiver, 10).unwrap();

    let block = node.mine_block().unwrap();
    assert_eq!(block.get_index(), 2);
    assert_eq!(block.get_data().len(), 2);
    assert_eq!(block.get_data()[1], pending);

    // Two coinbase rewards minus the ten sent away
    assert_eq!(node.get_balance(), 90);
    assert!(node.list_mempool().is_empty());
    assert_eq!(node.list_by_address(&receiver).len(), 1);
}

#[test]
fn test_double_spend_rejected_while_pending() {
    let (node, _, _dir) = test_node();
    let receiver = other_address();

    node.mine_block().unwrap();
    node.send_transaction(&receiver, 10).unwrap();

    // The only coinbase is already committed to the pooled transfer
    let err = node.send_transaction(&receiver, 10).unwrap_err();
    assert!(matches!(err, NodeError::InsufficientFunds { .. }));
    assert_eq!(node.list_mempool().len(), 1);
}

#[test]
fn test_unbalanced_transaction_rejected() {
    let (node, wallet, _dir) = test_node();
    let receiver = other_address();

    node.mine_block().unwrap();

    // A snapshot lying about the coinbase amount lets the wallet build a
    // signed transaction whose outputs exceed the real input
    let mine = node.list_my_unspent();
    let real = &mine[0];
    let doctored = vec![UnspentTxOut::new(
        real.get_tx_out_id().to_string(),
        real.get_tx_out_index(),
        real.get_address().to_string(),
        60,
    )];
    let overspend = wallet
        .build_transaction(&receiver, 60, &doctored, &[])
        .unwrap();

    let err = node.get_chain().add_transaction(overspend).unwrap_err();
    assert!(matches!(err, NodeError::Transaction(_)));
    assert!(node.list_mempool().is_empty());
}

#[test]
fn test_fork_choice_adopts_heavier_chain() {
    let (ours, _, _dir1) = test_node();
    let (theirs, _, _dir2) = test_node();

    ours.mine_block().unwrap();
    ours.mine_block().unwrap();

    theirs.mine_block().unwrap();
    theirs.mine_block().unwrap();
    theirs.mine_block().unwrap();

    let candidate = theirs.list_chain();
    let replaced = ours.get_chain().replace_chain(candidate.clone()).unwrap();
    assert!(replaced);
    assert_eq!(ours.list_chain(), candidate);
    assert!(
        cumulative_work(&ours.list_chain()) > cumulative_work(&[ours.list_chain()[0].clone()])
    );
}

#[test]
fn test_fork_choice_keeps_chain_on_equal_work() {
    let (ours, _, _dir1) = test_node();
    let (theirs, _, _dir2) = test_node();

    ours.mine_block().unwrap();
    theirs.mine_block().unwrap();

    let head_before = ours.list_chain().last().unwrap().clone();
    let replaced = ours.get_chain().replace_chain(theirs.list_chain()).unwrap();
    assert!(!replaced);
    assert_eq!(ours.list_chain().last().unwrap(), &head_before);
}

#[test]
fn test_mine_transaction_in_one_step() {
    let (node, _, _dir) = test_node();
    let receiver = other_address();

    node.mine_block().unwrap();
    let block = node.mine_transaction(&receiver, 25).unwrap();

    assert_eq!(block.get_index(), 2);
    assert_eq!(block.get_data().len(), 2);
    assert_eq!(node.get_balance(), 75);
    assert_eq!(node.list_by_address(&receiver)[0].get_amount(), 25);
}

#[test]
fn test_mine_raw_block_rejects_invalid_data() {
    let (node, _, _dir) = test_node();
    // No coinbase in the data, the commit must refuse it
    assert!(node.mine_raw_block(vec![]).is_err());
    assert_eq!(node.list_chain().len(), 1);
}

#[test]
fn test_read_queries() {
    let (node, _, _dir) = test_node();
    let block = node.mine_block().unwrap();
    let coinbase = block.get_data()[0].clone();

    assert_eq!(node.get_block_by_hash(block.get_hash()), Some(block));
    assert_eq!(node.get_block_by_hash("missing"), None);
    assert_eq!(
        node.get_transaction_by_id(coinbase.get_id()),
        Some(coinbase)
    );
    assert_eq!(node.get_transaction_by_id("missing"), None);
}

#[test]
fn test_replaying_the_chain_reproduces_the_utxo_set() {
    let (node, _, _dir) = test_node();
    let receiver = other_address();

    node.mine_block().unwrap();
    node.send_transaction(&receiver, 10).unwrap();
    node.mine_block().unwrap();

    let refolded = ember_chain::core::validate_chain(&node.list_chain()).unwrap();
    assert_eq!(refolded, node.list_unspent());
}
