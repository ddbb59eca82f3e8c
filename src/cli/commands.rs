use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ember-chain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start", about = "Start the node and listen for peers")]
    Start {
        #[arg(long, help = "Port for the peer listener (overrides P2P_PORT)")]
        p2p_port: Option<u16>,
        #[arg(
            long = "peer",
            help = "Peer to dial at startup as host:port, repeatable"
        )]
        peers: Vec<String>,
        #[arg(long, help = "Path to the private key file (overrides PRIVATE_KEY_PATH)")]
        key_file: Option<String>,
    },
    #[command(name = "address", about = "Print this node's wallet address")]
    Address {
        #[arg(long, help = "Path to the private key file (overrides PRIVATE_KEY_PATH)")]
        key_file: Option<String>,
    },
}
