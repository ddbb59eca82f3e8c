//! The node facade
//!
//! The small command surface the external control layer consumes: chain
//! and UTXO queries, wallet operations, block production and peer
//! management, all delegating into the owning subsystems.

use crate::core::{Block, Chain, Transaction, UnspentTxOut};
use crate::error::{NodeError, Result};
use crate::network::Server;
use crate::wallet::Wallet;
use std::sync::Arc;

#[derive(Clone)]
pub struct Node {
    chain: Chain,
    wallet: Arc<Wallet>,
    server: Server,
}

impl Node {
    pub fn new(chain: Chain, wallet: Arc<Wallet>, server: Server) -> Node {
        Node {
            chain,
            wallet,
            server,
        }
    }

    pub fn get_chain(&self) -> &Chain {
        &self.chain
    }

    pub fn get_server(&self) -> &Server {
        &self.server
    }

    /// Snapshot of the full chain.
    pub fn list_chain(&self) -> Vec<Block> {
        self.chain.get_blocks()
    }

    /// Addresses of all registered peer sessions.
    pub fn list_peers(&self) -> Vec<String> {
        self.server.get_peers().get_addresses()
    }

    /// Dial a peer given as "host:port".
    pub fn add_peer(&self, addr: &str) -> Result<()> {
        self.server.connect(addr)
    }

    /// This wallet's address.
    pub fn get_address(&self) -> String {
        self.wallet.get_address().to_string()
    }

    /// Confirmed balance of this wallet.
    pub fn get_balance(&self) -> u64 {
        self.wallet.get_balance(&self.chain.get_unspent_tx_outs())
    }

    pub fn list_unspent(&self) -> Vec<UnspentTxOut> {
        self.chain.get_unspent_tx_outs()
    }

    pub fn list_my_unspent(&self) -> Vec<UnspentTxOut> {
        self.list_by_address(self.wallet.get_address())
    }

    pub fn list_by_address(&self, address: &str) -> Vec<UnspentTxOut> {
        self.chain
            .get_unspent_tx_outs()
            .into_iter()
            .filter(|u| u.get_address() == address)
            .collect()
    }

    pub fn list_mempool(&self) -> Vec<Transaction> {
        self.chain.get_pool_snapshot()
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<Block> {
        self.chain
            .get_blocks()
            .into_iter()
            .find(|b| b.get_hash() == hash)
    }

    pub fn get_transaction_by_id(&self, id: &str) -> Option<Transaction> {
        self.chain
            .get_blocks()
            .iter()
            .flat_map(|b| b.get_data().iter())
            .find(|tx| tx.get_id() == id)
            .cloned()
    }

    /// Mine the next block from a fresh coinbase plus everything currently
    /// pooled.
    pub fn mine_block(&self) -> Result<Block> {
        let next_index = self.chain.get_latest().get_index() + 1;
        let coinbase = Transaction::new_coinbase(self.wallet.get_address(), next_index)?;
        let mut data = vec![coinbase];
        data.extend(self.chain.get_pool_snapshot());
        self.mine(data)
    }

    /// Mine a block over caller-provided transactions. Only meaningful when
    /// they form a valid block body; anything else is rejected at commit.
    pub fn mine_raw_block(&self, data: Vec<Transaction>) -> Result<Block> {
        self.mine(data)
    }

    /// Build, sign and mine a transfer in one step.
    pub fn mine_transaction(&self, receiver: &str, amount: u64) -> Result<Block> {
        let tx = self.wallet.build_transaction(
            receiver,
            amount,
            &self.chain.get_unspent_tx_outs(),
            &self.chain.get_pool_snapshot(),
        )?;
        let next_index = self.chain.get_latest().get_index() + 1;
        let coinbase = Transaction::new_coinbase(self.wallet.get_address(), next_index)?;
        self.mine(vec![coinbase, tx])
    }

    /// Build and sign a transfer, admit it to the pool and announce it.
    pub fn send_transaction(&self, receiver: &str, amount: u64) -> Result<Transaction> {
        let tx = self.wallet.build_transaction(
            receiver,
            amount,
            &self.chain.get_unspent_tx_outs(),
            &self.chain.get_pool_snapshot(),
        )?;
        self.chain.add_transaction(tx.clone())?;
        Ok(tx)
    }

    fn mine(&self, data: Vec<Transaction>) -> Result<Block> {
        self.chain.mine_with(data)?.ok_or_else(|| {
            NodeError::Mining("Mining attempt was preempted by a new head".to_string())
        })
    }
}
