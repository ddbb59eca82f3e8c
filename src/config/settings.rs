use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

pub const DEFAULT_P2P_PORT: u16 = 6001;
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_KEY_PATH: &str = "node/wallet/private_key";

const P2P_PORT_KEY: &str = "P2P_PORT";
const HTTP_PORT_KEY: &str = "HTTP_PORT";
const KEY_PATH_KEY: &str = "PRIVATE_KEY_PATH";
const PEERS_KEY: &str = "PEERS";

/// Process configuration, seeded from the environment and overridable at
/// startup. Ports for the peer listener and the external HTTP layer, the
/// private key location, and the peers to dial on boot.
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        for key in [P2P_PORT_KEY, HTTP_PORT_KEY, KEY_PATH_KEY, PEERS_KEY] {
            if let Ok(value) = env::var(key) {
                map.insert(String::from(key), value);
            }
        }
        Config {
            inner: RwLock::new(map),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.insert(String::from(key), value);
    }

    pub fn get_p2p_port(&self) -> u16 {
        self.get(P2P_PORT_KEY)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_P2P_PORT)
    }

    pub fn set_p2p_port(&self, port: u16) {
        self.set(P2P_PORT_KEY, port.to_string());
    }

    /// Port the external HTTP control layer is expected to serve on. The
    /// core only records it.
    pub fn get_http_port(&self) -> u16 {
        self.get(HTTP_PORT_KEY)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn get_key_path(&self) -> String {
        self.get(KEY_PATH_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_KEY_PATH))
    }

    pub fn set_key_path(&self, path: String) {
        self.set(KEY_PATH_KEY, path);
    }

    /// Peers to dial at startup, comma-separated "host:port" entries.
    pub fn get_initial_peers(&self) -> Vec<String> {
        self.get(PEERS_KEY)
            .map(|peers| {
                peers
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
