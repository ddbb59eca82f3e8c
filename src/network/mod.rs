//! Peer-to-peer gossip
//!
//! JSON text frames over TCP between explicitly dialed peers: chain
//! queries and responses, transaction pool synchronization, and
//! best-effort broadcast over the registered sessions.

pub mod message;
pub mod peers;
pub mod server;

pub use message::{Message, MessageKind};
pub use peers::{PeerSession, Peers};
pub use server::Server;
