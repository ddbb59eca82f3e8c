use crate::core::{Block, Broadcaster, Transaction};
use crate::error::{NodeError, Result};
use crate::network::Message;
use log::{error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// One live peer connection. Writes go through a per-session mutex so
/// concurrent senders cannot interleave frames.
pub struct PeerSession {
    id: u64,
    addr: String,
    writer: Mutex<TcpStream>,
}

impl PeerSession {
    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    /// Write one JSON frame to this peer.
    pub fn send(&self, message: &Message) -> Result<()> {
        let mut stream = self
            .writer
            .lock()
            .map_err(|_| NodeError::Network("Peer writer lock poisoned".to_string()))?;
        serde_json::to_writer(&mut *stream, message)
            .map_err(|e| NodeError::Network(format!("Failed to send message: {e}")))?;
        stream
            .write_all(b"\n")
            .map_err(|e| NodeError::Network(format!("Failed to send message: {e}")))?;
        stream
            .flush()
            .map_err(|e| NodeError::Network(format!("Failed to flush message: {e}")))?;
        Ok(())
    }

    fn close(&self) {
        if let Ok(stream) = self.writer.lock() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// The session registry the gossip layer broadcasts through. Registration
/// happens on dial or accept, deregistration on close or error; broadcast
/// walks a snapshot so slow peers never hold the registry lock.
#[derive(Clone)]
pub struct Peers {
    sessions: Arc<RwLock<HashMap<u64, Arc<PeerSession>>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for Peers {
    fn default() -> Self {
        Self::new()
    }
}

impl Peers {
    pub fn new() -> Peers {
        Peers {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn register(&self, stream: TcpStream, addr: String) -> Arc<PeerSession> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(PeerSession {
            id,
            addr,
            writer: Mutex::new(stream),
        });
        let mut sessions = self
            .sessions
            .write()
            .expect("Failed to acquire write lock on peer sessions - this should never happen");
        sessions.insert(id, Arc::clone(&session));
        info!("Registered peer session {id} ({})", session.get_addr());
        session
    }

    pub fn deregister(&self, id: u64) {
        let removed = {
            let mut sessions = self.sessions.write().expect(
                "Failed to acquire write lock on peer sessions - this should never happen",
            );
            sessions.remove(&id)
        };
        if let Some(session) = removed {
            session.close();
            info!("Deregistered peer session {id} ({})", session.get_addr());
        }
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.sessions
            .read()
            .expect("Failed to acquire read lock on peer sessions - this should never happen")
            .values()
            .map(|s| s.get_addr().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .expect("Failed to acquire read lock on peer sessions - this should never happen")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<PeerSession>> {
        self.sessions
            .read()
            .expect("Failed to acquire read lock on peer sessions - this should never happen")
            .values()
            .cloned()
            .collect()
    }

    /// Best-effort fan-out. A failed send tears down that session only.
    pub fn broadcast(&self, message: &Message) {
        for session in self.snapshot() {
            if let Err(e) = session.send(message) {
                warn!(
                    "Dropping peer session {} ({}) after send failure: {e}",
                    session.get_id(),
                    session.get_addr()
                );
                self.deregister(session.get_id());
            }
        }
    }

    /// Reply on one session; failures close it, nothing propagates.
    pub fn send_or_close(&self, session: &PeerSession, message: &Message) {
        if let Err(e) = session.send(message) {
            warn!(
                "Dropping peer session {} ({}) after send failure: {e}",
                session.get_id(),
                session.get_addr()
            );
            self.deregister(session.get_id());
        }
    }
}

impl Broadcaster for Peers {
    fn broadcast_latest(&self, block: &Block) {
        match Message::response_blockchain(std::slice::from_ref(block)) {
            Ok(message) => self.broadcast(&message),
            Err(e) => error!("Failed to encode latest block for broadcast: {e}"),
        }
    }

    fn broadcast_pool(&self, transactions: &[Transaction]) {
        match Message::response_transaction_pool(transactions) {
            Ok(message) => self.broadcast(&message),
            Err(e) => error!("Failed to encode transaction pool for broadcast: {e}"),
        }
    }
}
