//! Resolves whether a data-chain block hash can currently be checked by the
//! block-history contract on the execution chain.
//!
//! A block becomes verifiable through one of:
//! - an imported Merkle root (legacy) or beacon block summary covering it,
//! - a trusted hash relayed to an L2,
//! - a precommitted hash on a native L2.
//!
//! None of these are commanded by the client; they are discovered from
//! contract events and read-only calls, and cached once observed.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::BlockId;
use anyhow::{anyhow, Context};
use futures::StreamExt;
use relic_common::network::{is_l2, is_native_l2_deployment, is_proxy_l2_deployment};
use tracing::{debug, info};

use crate::client::ClientContext;
use crate::contracts::{IBlockHistory, PopulatedTransaction};
use crate::error::{RelicError, Result};
use crate::proof::BlockProof;
use crate::provider::{ChainLog, ChainProvider, LogQuery};

pub mod beacon;
pub mod commitments;
pub mod legacy;
pub mod output_root;

pub use beacon::BeaconBlockHistory;
pub use commitments::CommitmentKind;
pub use legacy::LegacyBlockHistory;

/// Which block-history interface a deployment exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAbi {
    /// L1: imported Merkle roots only.
    Main,
    /// L2 proving its L1: roots plus trusted hashes relayed by a bridge.
    Proxy,
    /// L2 proving itself: roots, trusted and precommitted hashes.
    OptimismNative,
}

impl HistoryAbi {
    pub fn for_chains(chain_id: u64, data_chain_id: u64) -> Self {
        if is_proxy_l2_deployment(chain_id, data_chain_id) {
            Self::Proxy
        } else if is_l2(chain_id) {
            Self::OptimismNative
        } else {
            Self::Main
        }
    }

    pub fn has_trusted(self) -> bool {
        matches!(self, Self::Proxy | Self::OptimismNative)
    }

    pub fn has_precommitted(self) -> bool {
        matches!(self, Self::OptimismNative)
    }
}

/// How a block hash is currently verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verifiability {
    /// Covered by an imported Merkle root or block summary.
    ImportedRoot(B256),
    Committed(CommitmentKind),
    Unverifiable,
}

impl Verifiability {
    pub fn is_verifiable(&self) -> bool {
        !matches!(self, Self::Unverifiable)
    }
}

/// The block history of a client, selected once from its address table.
pub enum BlockHistory<P> {
    Legacy(LegacyBlockHistory<P>),
    Beacon(BeaconBlockHistory<P>),
}

impl<P> BlockHistory<P>
where
    P: ChainProvider + Send + Sync,
{
    pub fn new(ctx: Arc<ClientContext<P>>) -> Result<Self> {
        let address = ctx.addresses.block_history;
        Ok(match ctx.addresses.legacy_block_history {
            Some(legacy) => Self::Beacon(BeaconBlockHistory::new(ctx, address, legacy)?),
            None => Self::Legacy(LegacyBlockHistory::new(ctx, address)),
        })
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Legacy(history) => history.address(),
            Self::Beacon(history) => history.address(),
        }
    }

    fn ctx(&self) -> &ClientContext<P> {
        match self {
            Self::Legacy(history) => history.ctx(),
            Self::Beacon(history) => history.ctx(),
        }
    }

    /// Resolves `block` on the data chain and reports how its hash is
    /// currently verifiable.
    pub async fn verifiability(&self, block: BlockId) -> Result<Verifiability> {
        match self {
            Self::Legacy(history) => history.verifiability(block).await,
            Self::Beacon(history) => history.verifiability(block).await,
        }
    }

    pub async fn can_verify_block(&self, block: BlockId) -> Result<bool> {
        Ok(self.verifiability(block).await?.is_verifiable())
    }

    /// Leaves a Merkle proof covered by an imported root untouched, swaps in
    /// the sentinel of a confirmed commitment, or fails.
    pub async fn ensure_valid_proof(&self, proof: &mut BlockProof) -> Result<()> {
        match self {
            Self::Legacy(history) => history.ensure_valid_proof(proof).await,
            Self::Beacon(history) => history.ensure_valid_proof(proof).await,
        }
    }

    /// Highest block number known to be verifiable, or -1 if no mechanism
    /// has recorded anything yet.
    pub async fn last_verifiable_block(&self) -> Result<i64> {
        match self {
            Self::Legacy(history) => history.last_verifiable_block().await,
            Self::Beacon(history) => history.last_verifiable_block().await,
        }
    }

    /// Resolves once `block` is verifiable. Dropping the future drops the
    /// log subscription with it.
    pub async fn wait_until_verifiable(&self, block: BlockId) -> Result<()> {
        match self {
            Self::Legacy(history) => history.wait_until_verifiable(block).await,
            Self::Beacon(history) => history.wait_until_verifiable(block).await,
        }
    }

    fn require_native_l2(&self) -> Result<()> {
        let ctx = self.ctx();
        if !is_native_l2_deployment(ctx.chain_id, ctx.data_chain_id) {
            return Err(RelicError::NotNativeL2 {
                chain_id: ctx.chain_id,
                data_chain_id: ctx.data_chain_id,
            });
        }
        Ok(())
    }

    /// Populates a transaction precommitting a recent block hash.
    pub fn commit_recent(&self, block_num: u64) -> Result<PopulatedTransaction> {
        self.require_native_l2()?;
        Ok(PopulatedTransaction::new(
            self.address(),
            &IBlockHistory::commitRecentCall {
                blockNum: U256::from(block_num),
            },
        ))
    }

    /// Populates a transaction committing the L1 block hash currently known
    /// to the L2.
    pub fn commit_current_l1_block_hash(&self) -> Result<PopulatedTransaction> {
        self.require_native_l2()?;
        Ok(PopulatedTransaction::new(
            self.address(),
            &IBlockHistory::commitCurrentL1BlockHashCall {},
        ))
    }
}

pub(crate) fn topic_to_u64(topic: Option<&B256>) -> Result<u64> {
    let topic = topic.ok_or_else(|| anyhow!("log is missing an indexed topic"))?;
    Ok(u64::try_from(U256::from_be_bytes(topic.0)).context("indexed topic overflows u64")?)
}

pub(crate) fn number_topic(number: u64) -> B256 {
    B256::from(U256::from(number))
}

/// The first word of a log's data.
pub(crate) fn first_word(log: &ChainLog) -> Result<B256> {
    log.data
        .get(..32)
        .map(B256::from_slice)
        .ok_or_else(|| anyhow!("log data shorter than one word").into())
}

pub(crate) fn max_or_unset(values: impl IntoIterator<Item = u64>) -> i64 {
    values
        .into_iter()
        .map(|value| i64::try_from(value).unwrap_or(i64::MAX))
        .max()
        .unwrap_or(-1)
}

/// Subscribes to `query` first, then checks the current state, then
/// re-checks on every relevant log until `check` succeeds. Subscribing
/// before the first check closes the window in which the event could fire
/// unnoticed.
pub(crate) async fn wait_for<P, R, C, F>(
    provider: &P,
    query: LogQuery,
    relevant: R,
    check: C,
) -> Result<()>
where
    P: ChainProvider,
    R: Fn(&ChainLog) -> bool,
    C: Fn() -> F,
    F: Future<Output = Result<bool>>,
{
    let mut logs = provider.watch_logs(query).await?;
    if check().await? {
        return Ok(());
    }
    while let Some(batch) = logs.next().await {
        if !batch.iter().any(&relevant) {
            continue;
        }
        debug!(count = batch.len(), "relevant block history event");
        if check().await? {
            info!("block became verifiable");
            return Ok(());
        }
    }
    Err(anyhow!("block history log subscription ended").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_selection() {
        assert_eq!(HistoryAbi::for_chains(1, 1), HistoryAbi::Main);
        assert_eq!(HistoryAbi::for_chains(10, 1), HistoryAbi::Proxy);
        assert_eq!(HistoryAbi::for_chains(324, 1), HistoryAbi::Proxy);
        assert_eq!(HistoryAbi::for_chains(8453, 8453), HistoryAbi::OptimismNative);
    }

    #[test]
    fn max_of_sources() {
        assert_eq!(max_or_unset([]), -1);
        assert_eq!(max_or_unset([3, 9, 4]), 9);
    }

    #[test]
    fn topics_decode_as_numbers() {
        assert_eq!(topic_to_u64(Some(&number_topic(1831))).unwrap(), 1831);
        assert!(topic_to_u64(None).is_err());
        assert!(topic_to_u64(Some(&B256::repeat_byte(0xff))).is_err());
    }
}
