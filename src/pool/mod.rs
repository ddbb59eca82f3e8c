//! The transaction pool
//!
//! Unconfirmed transactions waiting for a block, with conflict rejection
//! on admission and reconciliation after every chain change.

pub mod transaction_pool;

pub use transaction_pool::TransactionPool;
