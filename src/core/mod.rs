//! Core consensus functionality
//!
//! Blocks, transactions, the chain engine, proof-of-work and difficulty
//! retargeting.

pub mod block;
pub mod chain;
pub mod difficulty;
pub mod proof_of_work;
pub mod transaction;

pub use block::{calculate_hash, Block};
pub use chain::{
    cumulative_work, validate_chain, validate_new_block, Broadcaster, Chain, NoopBroadcaster,
};
pub use difficulty::{get_difficulty, BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL};
pub use proof_of_work::{find_block, hash_matches_difficulty, CancelToken};
pub use transaction::{
    compute_transaction_id, is_valid_address, process_transactions, validate_transaction,
    Transaction, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT,
};
