use crate::core::{Block, Chain};
use crate::error::{NodeError, Result};
use crate::network::message::MessageKind;
use crate::network::peers::PeerSession;
use crate::network::{Message, Peers};
use log::{error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Every fresh session asks for the peer's latest block immediately and for
// its transaction pool shortly after, once the chain query had a chance to
// settle.
const POOL_QUERY_DELAY_MS: u64 = 500;
const DIAL_TIMEOUT_MS: u64 = 5000;

/// The gossip endpoint: accepts inbound peers, dials outbound ones, and
/// routes every received message into the chain engine. All of its errors
/// stay confined to the session they happened on.
#[derive(Clone)]
pub struct Server {
    chain: Chain,
    peers: Peers,
}

impl Server {
    pub fn new(chain: Chain, peers: Peers) -> Server {
        Server { chain, peers }
    }

    pub fn get_peers(&self) -> &Peers {
        &self.peers
    }

    /// Bind the listener and start accepting inbound sessions in the
    /// background. Returns the actually bound port, which matters when the
    /// caller asked for port zero.
    pub fn start(&self, port: u16) -> Result<u16> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| NodeError::Network(format!("Failed to bind p2p port {port}: {e}")))?;
        let local_port = listener
            .local_addr()
            .map_err(|e| NodeError::Network(format!("Failed to read bound address: {e}")))?
            .port();
        info!("Listening for peers on port {local_port}");

        let server = self.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let addr = stream
                            .peer_addr()
                            .map(|a| a.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        info!("Accepted peer connection from {addr}");
                        server.attach_session(stream, addr);
                    }
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                    }
                }
            }
        });
        Ok(local_port)
    }

    /// Dial a peer given as "host:port" and attach a session to it.
    pub fn connect(&self, addr: &str) -> Result<()> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| NodeError::Network(format!("Invalid peer address {addr}: {e}")))?
            .next()
            .ok_or_else(|| {
                NodeError::Network(format!("Peer address {addr} resolves to nothing"))
            })?;
        let stream =
            TcpStream::connect_timeout(&socket_addr, Duration::from_millis(DIAL_TIMEOUT_MS))
                .map_err(|e| NodeError::Network(format!("Failed to connect to {addr}: {e}")))?;
        info!("Connected to peer {addr}");
        self.attach_session(stream, addr.to_string());
        Ok(())
    }

    // Shared path for inbound and outbound connections: register the
    // session, greet it with a latest-block query, schedule the deferred
    // pool query, and hand the read side to its own thread.
    fn attach_session(&self, stream: TcpStream, addr: String) {
        let read_half = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                error!("Failed to clone stream for {addr}: {e}");
                return;
            }
        };
        let session = self.peers.register(stream, addr);
        self.peers.send_or_close(&session, &Message::query_latest());

        let peers = self.peers.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(POOL_QUERY_DELAY_MS));
            // The session may be gone by now; broadcasting is a no-op then
            peers.broadcast(&Message::query_transaction_pool());
        });

        let server = self.clone();
        thread::spawn(move || server.read_loop(session, read_half));
    }

    // Messages on one session are processed strictly in arrival order.
    fn read_loop(&self, session: Arc<PeerSession>, stream: TcpStream) {
        let reader = BufReader::new(stream);
        let frames = Deserializer::from_reader(reader).into_iter::<Message>();
        for frame in frames {
            match frame {
                Ok(message) => {
                    if let Err(e) = self.process_message(&session, message) {
                        warn!(
                            "Ignoring message from {}: {e}",
                            session.get_addr()
                        );
                    }
                }
                Err(e) => {
                    // The stream position is unknown after a framing error
                    warn!("Closing session to {}: {e}", session.get_addr());
                    break;
                }
            }
        }
        self.peers.deregister(session.get_id());
    }

    fn process_message(&self, session: &Arc<PeerSession>, message: Message) -> Result<()> {
        match message.get_kind()? {
            MessageKind::QueryLatest => {
                let reply = Message::response_blockchain(&[self.chain.get_latest()])?;
                self.peers.send_or_close(session, &reply);
            }
            MessageKind::QueryAll => {
                let reply = Message::response_blockchain(&self.chain.get_blocks())?;
                self.peers.send_or_close(session, &reply);
            }
            MessageKind::ResponseBlockchain => {
                let blocks = message.decode_blocks()?;
                self.handle_blockchain_response(blocks);
            }
            MessageKind::QueryTransactionPool => {
                let reply =
                    Message::response_transaction_pool(&self.chain.get_pool_snapshot())?;
                self.peers.send_or_close(session, &reply);
            }
            MessageKind::ResponseTransactionPool => {
                let transactions = message.decode_transactions()?;
                for tx in transactions {
                    let id = tx.get_id().to_string();
                    // A rejected transaction never aborts the batch
                    if let Err(e) = self.chain.add_transaction(tx) {
                        info!(
                            "Rejected transaction {id} from {}: {e}",
                            session.get_addr()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    // The blockchain response protocol: a single block extending our head
    // is accepted directly, a longer foreign tip makes us ask for the full
    // chain, and a full chain goes through fork choice. Anything not ahead
    // of us is ignored.
    fn handle_blockchain_response(&self, received: Vec<Block>) {
        let last = match received.last() {
            Some(block) => block.clone(),
            None => {
                warn!("Received an empty blockchain response");
                return;
            }
        };
        if !last.is_valid_structure() {
            warn!("Received block with invalid structure, ignoring");
            return;
        }

        let held = self.chain.get_latest();
        if last.get_index() <= held.get_index() {
            return;
        }

        if last.get_previous_hash() == held.get_hash() {
            // The chain announces the new latest itself on success
            if let Err(e) = self.chain.accept_block(last) {
                info!("Rejected block from peer: {e}");
            }
        } else if received.len() == 1 {
            // A lone block that does not extend us: fetch the whole chain
            self.peers.broadcast(&Message::query_all());
        } else {
            match self.chain.replace_chain(received) {
                Ok(true) => {}
                Ok(false) => info!("Received chain does not carry more work, keeping ours"),
                Err(e) => info!("Rejected chain from peer: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoopBroadcaster;

    fn test_server() -> Server {
        let peers = Peers::new();
        let chain = Chain::new(Arc::new(NoopBroadcaster)).unwrap();
        Server::new(chain, peers)
    }

    #[test]
    fn test_start_binds_an_ephemeral_port() {
        let server = test_server();
        let port = server.start(0).unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_connect_to_nothing_fails_cleanly() {
        let server = test_server();
        // A port nothing listens on; the dial error stays local
        assert!(server.connect("127.0.0.1:1").is_err());
        assert!(server.get_peers().is_empty());
    }

    #[test]
    fn test_blockchain_response_ignores_stale_tips() {
        let server = test_server();
        // Our own genesis back at us: index not ahead, nothing changes
        server.handle_blockchain_response(vec![Block::genesis()]);
        assert_eq!(server.chain.get_blocks().len(), 1);
    }
}
