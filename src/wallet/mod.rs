//! Wallet and key management
//!
//! One private key per node, provided by a file-backed keystore; the
//! wallet derives the address, reads balances and builds signed
//! transactions.

pub mod keystore;
#[allow(clippy::module_inception)]
pub mod wallet;

pub use keystore::Keystore;
pub use wallet::Wallet;
