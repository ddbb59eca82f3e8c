//! Error handling for the node
//!
//! One crate-wide error type covering consensus, wallet, pool and network
//! failures. Peer-sourced errors are logged and confined to the offending
//! message; control-surface errors travel back to the caller.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Error types for all node operations
#[derive(Debug, Clone)]
pub enum NodeError {
    /// Malformed block or message structure
    Structure(String),
    /// Block-level validation errors (index, previous hash, timestamp, hash, difficulty)
    InvalidBlock(String),
    /// Whole-chain validation errors
    InvalidChain(String),
    /// Transaction validation errors (id mismatch, missing UTXO, unbalanced amounts, coinbase rules)
    Transaction(String),
    /// Signature production or verification errors
    Signature(String),
    /// Mempool admission errors (conflicting inputs)
    Pool(String),
    /// Wallet operation errors
    Wallet(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Insufficient funds for transaction construction
    InsufficientFunds { required: u64, available: u64 },
    /// Mining errors
    Mining(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Structure(msg) => write!(f, "Invalid structure: {msg}"),
            NodeError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            NodeError::InvalidChain(msg) => write!(f, "Invalid chain: {msg}"),
            NodeError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            NodeError::Signature(msg) => write!(f, "Signature error: {msg}"),
            NodeError::Pool(msg) => write!(f, "Transaction pool error: {msg}"),
            NodeError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            NodeError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            NodeError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            NodeError::Mining(msg) => write!(f, "Mining error: {msg}"),
            NodeError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NodeError::Network(msg) => write!(f, "Network error: {msg}"),
            NodeError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NodeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            NodeError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<secp256k1::Error> for NodeError {
    fn from(err: secp256k1::Error) -> Self {
        NodeError::Crypto(err.to_string())
    }
}
