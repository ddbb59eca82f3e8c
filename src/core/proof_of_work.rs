use crate::core::block::{calculate_hash, Block};
use crate::core::Transaction;
use crate::utils::hex_decode;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// How often the mining loop looks at its cancellation token.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Cancellation token for an in-flight mining attempt. The chain engine
/// bumps its head generation on every commit; a miner that observes a newer
/// generation abandons its search and discards the partial result.
#[derive(Clone)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    observed: u64,
}

impl CancelToken {
    pub fn new(generation: Arc<AtomicU64>) -> CancelToken {
        let observed = generation.load(Ordering::SeqCst);
        CancelToken {
            generation,
            observed,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.observed
    }
}

/// The difficulty target: a hash qualifies when, read as a 256-bit
/// big-endian integer, it is below 2^(256 - difficulty). That is exactly
/// "at least `difficulty` leading zero bits".
fn target_for(difficulty: u32) -> BigInt {
    let mut target = BigInt::from(1);
    target.shl_assign(256 - difficulty.min(256));
    target
}

/// Check a hex hash against a difficulty.
pub fn hash_matches_difficulty(hash: &str, difficulty: u32) -> bool {
    let bytes = match hex_decode(hash) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let hash_int = BigInt::from_bytes_be(Sign::Plus, bytes.as_slice());
    hash_int < target_for(difficulty)
}

/// Search nonces from zero until the block hash meets the difficulty.
/// Returns None when the token cancels the attempt, which happens whenever
/// a new head is adopted while this search runs.
pub fn find_block(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    data: &[Transaction],
    difficulty: u32,
    cancel: &CancelToken,
) -> Option<Block> {
    let target = target_for(difficulty);
    let mut nonce: u64 = 0;
    loop {
        if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_canceled() {
            return None;
        }

        let hash = calculate_hash(index, previous_hash, timestamp, data, difficulty, nonce);
        let hash_bytes = hex_decode(&hash).expect("Computed hash is always valid hex");
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash_bytes.as_slice());
        if hash_int < target {
            return Some(Block::new(
                index,
                previous_hash.to_string(),
                timestamp,
                data.to_vec(),
                difficulty,
                nonce,
            ));
        }
        nonce += 1;
    }
}
