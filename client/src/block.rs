use alloy::rpc::types::BlockId;
use tracing::trace;

use crate::error::{RelicError, Result};
use crate::provider::{BlockHeader, ChainProvider};

/// Finds the last block with a timestamp at or before `timestamp`, by
/// interpolation search between block 1 and the chain head.
pub async fn block_for_timestamp<P: ChainProvider>(
    provider: &P,
    timestamp: u64,
) -> Result<BlockHeader> {
    let mut end = provider.block_header(BlockId::latest()).await?;
    if end.timestamp < timestamp {
        return Err(RelicError::TimestampAfterCurrent(timestamp));
    }
    if end.timestamp == timestamp {
        return Ok(end);
    }
    let mut start = provider.block_header(BlockId::number(1)).await?;
    if timestamp <= start.timestamp {
        return Ok(start);
    }

    while end.number - start.number > 1 {
        let span = u128::from(end.number - start.number);
        let offset = span * u128::from(timestamp - start.timestamp)
            / u128::from(end.timestamp - start.timestamp);
        // start.timestamp <= timestamp < end.timestamp, so offset < span
        let next_num = (start.number + offset as u64).clamp(start.number + 1, end.number - 1);
        let next = provider.block_header(BlockId::number(next_num)).await?;
        trace!(next_num, timestamp = next.timestamp, "block search step");
        if next.timestamp > timestamp {
            end = next;
        } else {
            start = next;
        }
    }
    Ok(start)
}
