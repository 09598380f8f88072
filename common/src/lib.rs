//! Chain metadata shared by the Relic client crates: block-history chunk
//! arithmetic, the supported network table, beacon-chain time conversion and
//! Solidity storage layout helpers.

pub mod network;
pub mod storage;

/// Number of consecutive blocks covered by a single imported Merkle root.
pub const BLOCKS_PER_CHUNK: u64 = 8192;

/// Returns the index of the Merkle-root chunk containing `block_num`.
pub const fn block_number_to_chunk(block_num: u64) -> u64 {
    block_num / BLOCKS_PER_CHUNK
}

/// Returns the last block number covered by chunk `chunk`, or `None` if it
/// does not fit in a `u64`.
pub const fn chunk_last_block(chunk: u64) -> Option<u64> {
    match chunk.checked_add(1) {
        Some(next) => match next.checked_mul(BLOCKS_PER_CHUNK) {
            Some(end) => Some(end - 1),
            None => None,
        },
        None => None,
    }
}

#[test]
fn test_block_number_to_chunk() {
    assert_eq!(block_number_to_chunk(0), 0);
    assert_eq!(block_number_to_chunk(8191), 0);
    assert_eq!(block_number_to_chunk(8192), 1);
    assert_eq!(block_number_to_chunk(15_000_000), 1831);
}

#[test]
fn test_chunk_last_block() {
    assert_eq!(chunk_last_block(0), Some(8191));
    assert_eq!(chunk_last_block(1831), Some(15_007_743));
    assert_eq!(block_number_to_chunk(15_007_743), 1831);
    assert_eq!(block_number_to_chunk(15_007_744), 1832);
    assert_eq!(
        chunk_last_block(u64::MAX / BLOCKS_PER_CHUNK - 1),
        Some((u64::MAX / BLOCKS_PER_CHUNK) * BLOCKS_PER_CHUNK - 1)
    );
    assert_eq!(chunk_last_block(u64::MAX / BLOCKS_PER_CHUNK), None);
    assert_eq!(chunk_last_block(u64::MAX), None);
}
