//! # Ember Chain - A Minimal Proof-of-Work Cryptocurrency Node
//!
//! A process that maintains a replicated append-only chain of blocks
//! carrying signed value transfers, gossips with explicitly dialed peers to
//! converge on the longest-by-work chain, and exposes a command facade for
//! wallet operations and block production.
//!
//! ## How the Code Is Organized
//! - `core/`: blocks, transactions, the chain engine, proof-of-work and
//!   difficulty retargeting
//! - `pool/`: the unconfirmed transaction pool
//! - `wallet/`: the single private key, balances, transaction building
//! - `network/`: peer sessions and the gossip protocol
//! - `node/`: the command facade the control surface consumes
//! - `config/`: environment-seeded settings
//! - `utils/`: hashing, hex and timestamps
//! - `cli/`: argument parsing for the binary
//!
//! ## Key Design Decisions
//! - One lock serializes every mutation of chain, UTXO set and pool
//! - Mining runs off that lock and aborts when the head moves under it
//! - The chain engine reaches the gossip layer only through an injected
//!   broadcast capability
//! - All consensus state is process-resident; only the private key touches
//!   the filesystem

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod pool;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use crate::core::{
    Block, Broadcaster, Chain, NoopBroadcaster, Transaction, TxIn, TxOut, UnspentTxOut,
    COINBASE_AMOUNT,
};
pub use error::{NodeError, Result};
pub use network::{Message, MessageKind, PeerSession, Peers, Server};
pub use node::Node;
pub use pool::TransactionPool;
pub use wallet::{Keystore, Wallet};
