// This is the core chain engine - the heart of the node
// It owns the block sequence and the authoritative UTXO set, serializes
// every mutation behind one lock, and resolves forks by cumulative work.

use crate::core::block::Block;
use crate::core::difficulty::get_difficulty;
use crate::core::proof_of_work::{find_block, hash_matches_difficulty, CancelToken};
use crate::core::transaction::{process_transactions, Transaction, UnspentTxOut};
use crate::error::{NodeError, Result};
use crate::pool::TransactionPool;
use crate::utils::current_timestamp;
use log::info;
use num_bigint::BigInt;
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

// Accepted clock skew for block timestamps, in seconds, both ways.
const TIMESTAMP_TOLERANCE: u64 = 60;

/// Broadcast capability the chain engine needs from the gossip layer.
/// Injected at construction so the engine never depends on networking
/// directly.
pub trait Broadcaster: Send + Sync {
    fn broadcast_latest(&self, block: &Block);
    fn broadcast_pool(&self, transactions: &[Transaction]);
}

/// A broadcaster that drops everything, for nodes without peers.
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast_latest(&self, _block: &Block) {}
    fn broadcast_pool(&self, _transactions: &[Transaction]) {}
}

// All consensus state lives behind one lock: the chain, the UTXO set it
// implies, and the pool of unconfirmed transactions. Handlers for peer
// messages, mining completion and control commands all mutate through it,
// which makes every observable state linearizable.
struct ChainState {
    blocks: Vec<Block>,
    unspent_tx_outs: Vec<UnspentTxOut>,
    pool: TransactionPool,
}

#[derive(Clone)]
pub struct Chain {
    state: Arc<RwLock<ChainState>>,
    // Bumped on every committed head change; in-flight mining attempts
    // watch it through their cancellation token.
    generation: Arc<AtomicU64>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Chain {
    /// A fresh chain holding only the genesis block, with the UTXO set
    /// folded from it.
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Result<Chain> {
        let genesis = Block::genesis();
        let unspent_tx_outs = process_transactions(genesis.get_data(), &[], 0)?;
        Ok(Chain {
            state: Arc::new(RwLock::new(ChainState {
                blocks: vec![genesis],
                unspent_tx_outs,
                pool: TransactionPool::new(),
            })),
            generation: Arc::new(AtomicU64::new(0)),
            broadcaster,
        })
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ChainState> {
        self.state
            .read()
            .expect("Failed to acquire read lock on chain state - this should never happen")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ChainState> {
        self.state
            .write()
            .expect("Failed to acquire write lock on chain state - this should never happen")
    }

    pub fn get_latest(&self) -> Block {
        self.read_state()
            .blocks
            .last()
            .expect("Chain always holds at least the genesis block")
            .clone()
    }

    /// Snapshot of the whole chain.
    pub fn get_blocks(&self) -> Vec<Block> {
        self.read_state().blocks.clone()
    }

    /// Defensive copy of the authoritative UTXO set.
    pub fn get_unspent_tx_outs(&self) -> Vec<UnspentTxOut> {
        self.read_state().unspent_tx_outs.clone()
    }

    /// Snapshot of the unconfirmed transaction pool.
    pub fn get_pool_snapshot(&self) -> Vec<Transaction> {
        self.read_state().pool.snapshot()
    }

    /// Validate and append a single block extending the current head, then
    /// commit the UTXO set, reconcile the pool and announce the new latest.
    pub fn accept_block(&self, block: Block) -> Result<()> {
        {
            let mut state = self.write_state();
            self.commit(&mut state, &block)?;
        }
        self.broadcaster.broadcast_latest(&block);
        Ok(())
    }

    // The single commit path. Runs under the write lock; the generation
    // bump cancels any miner still working on the old head.
    fn commit(&self, state: &mut ChainState, block: &Block) -> Result<()> {
        let latest = state
            .blocks
            .last()
            .expect("Chain always holds at least the genesis block");
        validate_new_block(block, latest, current_timestamp()?)?;
        let next_unspent =
            process_transactions(block.get_data(), &state.unspent_tx_outs, block.get_index())?;

        state.blocks.push(block.clone());
        state.unspent_tx_outs = next_unspent;
        state.pool.reconcile(&state.unspent_tx_outs);
        self.generation.fetch_add(1, Ordering::SeqCst);

        info!(
            "Accepted block {} at index {} ({} transaction(s), difficulty {})",
            block.get_hash(),
            block.get_index(),
            block.get_data().len(),
            block.get_difficulty()
        );
        Ok(())
    }

    /// Fork choice. A valid candidate chain with strictly greater
    /// cumulative work replaces the current one wholesale; ties keep what
    /// we have. Returns whether the chain was replaced.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> Result<bool> {
        let next_unspent = validate_chain(&candidate)?;

        let latest = {
            let mut state = self.write_state();
            let current_work = cumulative_work(&state.blocks);
            let candidate_work = cumulative_work(&candidate);
            if candidate_work <= current_work {
                info!(
                    "Keeping current chain: candidate work {candidate_work} does not exceed {current_work}"
                );
                return Ok(false);
            }

            state.blocks = candidate;
            state.unspent_tx_outs = next_unspent;
            let next_unspent_for_pool = state.unspent_tx_outs.clone();
            state.pool.reconcile(&next_unspent_for_pool);
            self.generation.fetch_add(1, Ordering::SeqCst);

            let latest = state
                .blocks
                .last()
                .expect("A validated chain always holds at least the genesis block")
                .clone();
            info!(
                "Replaced chain: new head {} at index {}",
                latest.get_hash(),
                latest.get_index()
            );
            latest
        };

        self.broadcaster.broadcast_latest(&latest);
        Ok(true)
    }

    /// Produce the next block for the given transactions. The nonce search
    /// runs on the caller's thread, off the mutation lane, and aborts as
    /// soon as some other path commits a new head. Returns None when the
    /// attempt was preempted.
    pub fn mine_with(&self, data: Vec<Transaction>) -> Result<Option<Block>> {
        let (index, previous_hash, difficulty) = {
            let state = self.read_state();
            let latest = state
                .blocks
                .last()
                .expect("Chain always holds at least the genesis block");
            (
                latest.get_index() + 1,
                latest.get_hash().to_string(),
                get_difficulty(&state.blocks),
            )
        };
        let timestamp = current_timestamp()?;
        let cancel = CancelToken::new(Arc::clone(&self.generation));

        let mined = match find_block(index, &previous_hash, timestamp, &data, difficulty, &cancel) {
            Some(block) => block,
            None => {
                info!("Mining attempt at index {index} was preempted by a new head");
                return Ok(None);
            }
        };

        // The search may have raced a commit between the last cancel check
        // and here; only a block that still extends the head is kept.
        let stale = {
            let mut state = self.write_state();
            let head_hash = state
                .blocks
                .last()
                .expect("Chain always holds at least the genesis block")
                .get_hash()
                .to_string();
            if head_hash != mined.get_previous_hash() {
                true
            } else {
                self.commit(&mut state, &mined)?;
                false
            }
        };
        if stale {
            info!("Discarding stale mined block at index {index}");
            return Ok(None);
        }

        self.broadcaster.broadcast_latest(&mined);
        Ok(Some(mined))
    }

    /// Admit a transaction to the pool against the current UTXO set and
    /// announce the updated pool on success.
    pub fn add_transaction(&self, tx: Transaction) -> Result<()> {
        let pool_snapshot = {
            let mut state = self.write_state();
            let ChainState {
                pool,
                unspent_tx_outs,
                ..
            } = &mut *state;
            pool.add(tx, unspent_tx_outs)?;
            pool.snapshot()
        };
        self.broadcaster.broadcast_pool(&pool_snapshot);
        Ok(())
    }
}

/// All checks a block extending `previous` must pass: declared structure,
/// consecutive index, matching previous hash, a timestamp within tolerance
/// of both its predecessor and the wall clock, a hash that recomputes from
/// its contents, and proof-of-work at its declared difficulty.
pub fn validate_new_block(block: &Block, previous: &Block, now: u64) -> Result<()> {
    if !block.is_valid_structure() {
        return Err(NodeError::Structure(format!(
            "Block {} has invalid structure",
            block.get_index()
        )));
    }
    if block.get_index() != previous.get_index() + 1 {
        return Err(NodeError::InvalidBlock(format!(
            "Index {} does not follow {}",
            block.get_index(),
            previous.get_index()
        )));
    }
    if block.get_previous_hash() != previous.get_hash() {
        return Err(NodeError::InvalidBlock(format!(
            "Previous hash mismatch at index {}",
            block.get_index()
        )));
    }
    // prev - 60 < ts and ts - 60 < now, rearranged to avoid underflow
    let timestamp_ok = previous.get_timestamp() < block.get_timestamp() + TIMESTAMP_TOLERANCE
        && block.get_timestamp() < now + TIMESTAMP_TOLERANCE;
    if !timestamp_ok {
        return Err(NodeError::InvalidBlock(format!(
            "Timestamp {} out of range at index {}",
            block.get_timestamp(),
            block.get_index()
        )));
    }
    if block.compute_hash() != block.get_hash() {
        return Err(NodeError::InvalidBlock(format!(
            "Hash does not match content at index {}",
            block.get_index()
        )));
    }
    if !hash_matches_difficulty(block.get_hash(), block.get_difficulty()) {
        return Err(NodeError::InvalidBlock(format!(
            "Hash does not meet difficulty {} at index {}",
            block.get_difficulty(),
            block.get_index()
        )));
    }
    Ok(())
}

/// Validate a whole candidate chain: byte-identical genesis, then every
/// block against its predecessor while folding the UTXO set forward.
/// Yields the final UTXO set.
pub fn validate_chain(candidate: &[Block]) -> Result<Vec<UnspentTxOut>> {
    match candidate.first() {
        Some(first) if *first == Block::genesis() => {}
        _ => {
            return Err(NodeError::InvalidChain(
                "Chain does not start with the genesis block".to_string(),
            ))
        }
    }

    let now = current_timestamp()?;
    let mut unspent_tx_outs: Vec<UnspentTxOut> = Vec::new();
    for (i, block) in candidate.iter().enumerate() {
        if i != 0 {
            validate_new_block(block, &candidate[i - 1], now)?;
        }
        unspent_tx_outs =
            process_transactions(block.get_data(), &unspent_tx_outs, block.get_index())
                .map_err(|e| NodeError::InvalidChain(format!("Block {i}: {e}")))?;
    }
    Ok(unspent_tx_outs)
}

/// The fork-choice metric: the sum of 2^difficulty over a chain.
pub fn cumulative_work(blocks: &[Block]) -> BigInt {
    let mut total = BigInt::from(0);
    for block in blocks {
        let mut term = BigInt::from(1);
        term.shl_assign(block.get_difficulty());
        total += term;
    }
    total
}
