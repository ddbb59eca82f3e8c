use crate::core::Block;
use log::info;

/// Target seconds between blocks.
pub const BLOCK_GENERATION_INTERVAL: u64 = 10;
/// Retarget every this many blocks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// Difficulty for the next block of the given chain. Retargets only when
/// the latest block sits on an adjustment boundary; otherwise the current
/// difficulty carries forward.
///
/// The chain passed in is the one being examined, which matters when
/// validating a candidate chain that is not our own.
pub fn get_difficulty(chain: &[Block]) -> u32 {
    let latest = match chain.last() {
        Some(block) => block,
        None => return 0,
    };
    if latest.get_index() % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 && latest.get_index() != 0 {
        get_adjusted_difficulty(latest, chain)
    } else {
        latest.get_difficulty()
    }
}

fn get_adjusted_difficulty(latest: &Block, chain: &[Block]) -> u32 {
    let anchor_index = (latest.get_index() - DIFFICULTY_ADJUSTMENT_INTERVAL) as usize;
    let previous_adjustment = &chain[anchor_index];
    let expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL;
    let taken = latest
        .get_timestamp()
        .saturating_sub(previous_adjustment.get_timestamp());

    let current = previous_adjustment.get_difficulty();
    let adjusted = if taken < expected / 2 {
        current + 1
    } else if taken > expected * 2 {
        // Difficulty never drops below zero
        current.saturating_sub(1)
    } else {
        current
    };

    if adjusted != current {
        info!(
            "Difficulty retarget at index {}: {current} -> {adjusted} (took {taken}s, expected {expected}s)",
            latest.get_index()
        );
    }
    adjusted
}
