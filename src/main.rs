// This is the main entry point for the node binary
// It wires the wallet, chain, gossip server and facade together and then
// parks; everything interesting happens on the listener and peer threads.

use clap::Parser;
use ember_chain::{
    Chain, Command, Keystore, Node, Opt, Peers, Server, Wallet, GLOBAL_CONFIG,
};
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Start {
            p2p_port,
            peers,
            key_file,
        } => {
            if let Some(port) = p2p_port {
                GLOBAL_CONFIG.set_p2p_port(port);
            }
            if let Some(path) = key_file {
                GLOBAL_CONFIG.set_key_path(path);
            }

            let keystore = Keystore::new(GLOBAL_CONFIG.get_key_path());
            let wallet = Arc::new(Wallet::new(&keystore)?);
            info!("Wallet address: {}", wallet.get_address());

            // The session registry is the broadcast capability the chain
            // engine gets injected with
            let sessions = Peers::new();
            let chain = Chain::new(Arc::new(sessions.clone()))?;
            let server = Server::new(chain.clone(), sessions);
            let node = Node::new(chain, wallet, server.clone());

            let port = server.start(GLOBAL_CONFIG.get_p2p_port())?;
            info!(
                "Node is up: p2p on port {port}, control surface expected on port {}",
                GLOBAL_CONFIG.get_http_port()
            );

            let mut dials = GLOBAL_CONFIG.get_initial_peers();
            dials.extend(peers);
            for peer in dials {
                if let Err(e) = node.add_peer(&peer) {
                    warn!("Could not dial {peer}: {e}");
                }
            }

            // Peer and listener threads carry the node from here on
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }
        Command::Address { key_file } => {
            if let Some(path) = key_file {
                GLOBAL_CONFIG.set_key_path(path);
            }
            let keystore = Keystore::new(GLOBAL_CONFIG.get_key_path());
            let wallet = Wallet::new(&keystore)?;
            println!("{}", wallet.get_address());
        }
    }
    Ok(())
}
