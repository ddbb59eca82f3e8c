//! Configuration management
//!
//! Environment-seeded settings for the node: listener ports, the private
//! key location and the peers to dial at startup.

pub mod settings;

pub use settings::{Config, DEFAULT_HTTP_PORT, DEFAULT_KEY_PATH, DEFAULT_P2P_PORT, GLOBAL_CONFIG};
