use crate::core::transaction::{is_valid_transaction_structure, Transaction, TxIn, TxOut};
use crate::utils::{is_hex, sha256_hex};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// The genesis block is an agreed constant. Its hash is pinned rather than
// recomputed; every other block's hash must match its canonical preimage.
const GENESIS_HASH: &str = "91a73664bc84c0baa1fc75ea6e4aa6d1d20c5df664c724e3159aefc2e1186627";
const GENESIS_TIMESTAMP: u64 = 1465154705;
const GENESIS_ADDRESS: &str = "04bfcab8722991ae774db48f934ca79cfb7dd991229153b9f732ba5334aafcd8e7266e47076996b55a14bf9913ee3145ce0cfc1372ada8ada74bd287450313534a";

static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| {
    let tx_in = TxIn::new(String::new(), 0);
    let tx_out = TxOut::new(GENESIS_ADDRESS.to_string(), crate::core::COINBASE_AMOUNT)
        .expect("Genesis address is a fixed valid constant");
    let genesis_tx = Transaction::new(vec![tx_in], vec![tx_out]);
    Block {
        index: 0,
        previous_hash: String::new(),
        timestamp: GENESIS_TIMESTAMP,
        data: vec![genesis_tx],
        hash: GENESIS_HASH.to_string(),
        difficulty: 0,
        nonce: 0,
    }
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    previous_hash: String,
    timestamp: u64,
    data: Vec<Transaction>,
    hash: String,
    difficulty: u32,
    nonce: u64,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: u64,
        data: Vec<Transaction>,
        difficulty: u32,
        nonce: u64,
    ) -> Block {
        let hash = calculate_hash(index, &previous_hash, timestamp, &data, difficulty, nonce);
        Block {
            index,
            previous_hash,
            timestamp,
            data,
            hash,
            difficulty,
            nonce,
        }
    }

    /// The fixed first block of every chain.
    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_data(&self) -> &[Transaction] {
        self.data.as_slice()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    /// Recompute this block's hash from its own contents.
    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.data,
            self.difficulty,
            self.nonce,
        )
    }

    /// Shape checks on a block received from a peer. Hashes must be hex and
    /// every carried transaction must be well-formed; semantic validation
    /// happens against the chain.
    pub fn is_valid_structure(&self) -> bool {
        if self.hash.len() != 64 || !is_hex(&self.hash) {
            return false;
        }
        if !self.previous_hash.is_empty()
            && (self.previous_hash.len() != 64 || !is_hex(&self.previous_hash))
        {
            return false;
        }
        self.data.iter().all(is_valid_transaction_structure)
    }
}

/// The canonical hash preimage: decimal index, previous hash, decimal
/// timestamp, the JSON rendering of the transaction list, decimal
/// difficulty, decimal nonce, concatenated in that order. Peers must
/// produce byte-identical preimages or the network forks.
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    data: &[Transaction],
    difficulty: u32,
    nonce: u64,
) -> String {
    let serialized_data = serde_json::to_string(data)
        .expect("Transaction serialization is infallible for in-memory values");
    let preimage = format!(
        "{index}{previous_hash}{timestamp}{serialized_data}{difficulty}{nonce}"
    );
    sha256_hex(preimage.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_constants() {
        let genesis = Block::genesis();
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_previous_hash(), "");
        assert_eq!(
            genesis.get_hash(),
            "91a73664bc84c0baa1fc75ea6e4aa6d1d20c5df664c724e3159aefc2e1186627"
        );
        assert_eq!(genesis.get_difficulty(), 0);
        assert_eq!(genesis.get_data().len(), 1);
        assert_eq!(genesis.get_data()[0].get_tx_outs()[0].get_amount(), 50);
    }

    #[test]
    fn test_genesis_transaction_id_recomputes() {
        let genesis = Block::genesis();
        let tx = &genesis.get_data()[0];
        assert_eq!(
            crate::core::transaction::compute_transaction_id(tx.get_tx_ins(), tx.get_tx_outs()),
            tx.get_id()
        );
    }

    #[test]
    fn test_calculate_hash_is_deterministic() {
        let genesis = Block::genesis();
        let a = calculate_hash(1, genesis.get_hash(), 1700000000, genesis.get_data(), 2, 7);
        let b = calculate_hash(1, genesis.get_hash(), 1700000000, genesis.get_data(), 2, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // Any field change moves the hash
        let c = calculate_hash(1, genesis.get_hash(), 1700000000, genesis.get_data(), 2, 8);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_block_hash_matches_contents() {
        let genesis = Block::genesis();
        let block = Block::new(
            1,
            genesis.get_hash().to_string(),
            1700000000,
            vec![],
            0,
            0,
        );
        assert_eq!(block.get_hash(), block.compute_hash());
    }

    #[test]
    fn test_structure_validation() {
        let genesis = Block::genesis();
        assert!(genesis.is_valid_structure());

        let bad_hash = Block {
            hash: "not-hex".to_string(),
            ..genesis.clone()
        };
        assert!(!bad_hash.is_valid_structure());

        let bad_prev = Block {
            previous_hash: "zz".repeat(32),
            ..genesis
        };
        assert!(!bad_prev.is_valid_structure());
    }

    #[test]
    fn test_json_round_trip() {
        let block = Block::genesis();
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"previousHash\""));
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, decoded);
    }
}
