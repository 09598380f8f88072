use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolEvent;
use anyhow::Context;
use futures::try_join;
use parking_lot::Mutex;
use relic_common::network::{slot_to_timestamp, timestamp_to_slot, ChainId, NetworkError};
use relic_common::BLOCKS_PER_CHUNK;
use tracing::{debug, trace};

use super::commitments::Commitments;
use super::legacy::LegacyBlockHistory;
use super::{first_word, max_or_unset, number_topic, topic_to_u64, wait_for, HistoryAbi, Verifiability};
use crate::block::block_for_timestamp;
use crate::client::ClientContext;
use crate::contracts::IBlockHistory;
use crate::error::{RelicError, Result};
use crate::proof::BlockProof;
use crate::provider::{ChainLog, ChainProvider, LogQuery};

const MAINNET_CAPELLA_BLOCK: u64 = 17_034_870;
const SEPOLIA_CAPELLA_BLOCK: u64 = 2_990_908;

/// First block covered by beacon block summaries on `data_chain_id`.
pub fn upgrade_block(data_chain_id: u64) -> Result<u64> {
    match ChainId::try_from(data_chain_id) {
        Ok(ChainId::EthMainnet) => Ok(MAINNET_CAPELLA_BLOCK),
        Ok(ChainId::EthSepolia) => Ok(SEPOLIA_CAPELLA_BLOCK),
        _ => Err(NetworkError::NotL1Network(data_chain_id).into()),
    }
}

/// The slot keying the block summary that covers `slot`. Summaries are
/// imported once per 8192 slots, after the period ends. `None` past the
/// last representable period.
pub const fn summary_slot(slot: u64) -> Option<u64> {
    (slot / BLOCKS_PER_CHUNK + 1).checked_mul(BLOCKS_PER_CHUNK)
}

/// Block history keyed by beacon block summaries. Blocks before the
/// upgrade are served by the legacy history it replaced.
pub struct BeaconBlockHistory<P> {
    ctx: Arc<ClientContext<P>>,
    address: Address,
    legacy: LegacyBlockHistory<P>,
    upgrade_block: u64,
    commitments: Commitments,
    summaries: Mutex<HashMap<u64, B256>>,
}

impl<P> BeaconBlockHistory<P>
where
    P: ChainProvider + Send + Sync,
{
    pub fn new(ctx: Arc<ClientContext<P>>, address: Address, legacy_address: Address) -> Result<Self> {
        let upgrade_block = upgrade_block(ctx.data_chain_id)?;
        let abi = HistoryAbi::for_chains(ctx.chain_id, ctx.data_chain_id);
        let commitments = Commitments::new(address, ctx.addresses.reliquary, abi);
        let legacy = LegacyBlockHistory::new(ctx.clone(), legacy_address);
        Ok(Self {
            ctx,
            address,
            legacy,
            upgrade_block,
            commitments,
            summaries: Mutex::new(HashMap::new()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn ctx(&self) -> &ClientContext<P> {
        &self.ctx
    }

    pub fn legacy(&self) -> &LegacyBlockHistory<P> {
        &self.legacy
    }

    fn summary_slot_for(&self, timestamp: u64) -> Result<u64> {
        let slot = timestamp_to_slot(timestamp, self.ctx.data_chain_id)?;
        Ok(summary_slot(slot).with_context(|| format!("summary slot for slot {slot} overflows u64"))?)
    }

    fn cached_summary(&self, key: u64) -> Option<B256> {
        self.summaries.lock().get(&key).copied()
    }

    /// Block summary imported under `key`, searching from `block_num`.
    pub async fn block_summary(&self, key: u64, block_num: u64) -> Result<Option<B256>> {
        if let Some(summary) = self.cached_summary(key) {
            trace!(key, "block summary cache hit");
            return Ok(Some(summary));
        }
        let query = LogQuery::new(self.address, vec![IBlockHistory::ImportBlockSummary::SIGNATURE_HASH])
            .topic1(number_topic(key))
            .from_block(block_num);
        let logs = self.ctx.provider.logs(query).await?;
        let Some(log) = logs.last() else {
            debug!(key, block_num, "no block summary imported");
            return Ok(None);
        };
        let summary = first_word(log)?;
        self.summaries.lock().insert(key, summary);
        Ok(Some(summary))
    }

    pub async fn verifiability(&self, block: BlockId) -> Result<Verifiability> {
        let header = self.ctx.data_provider.block_header(block).await?;
        if header.number < self.upgrade_block {
            return self.legacy.verifiability(BlockId::number(header.number)).await;
        }
        let key = self.summary_slot_for(header.timestamp)?;
        if let Some(summary) = self.cached_summary(key) {
            return Ok(Verifiability::ImportedRoot(summary));
        }
        if let Some(kind) = self.commitments.cached(header.number, header.hash) {
            return Ok(Verifiability::Committed(kind));
        }

        let (summary, committed) = try_join!(
            self.block_summary(key, header.number),
            self.commitments
                .check(self.ctx.provider.as_ref(), header.number, header.hash),
        )?;
        Ok(match (summary, committed) {
            (Some(summary), _) => Verifiability::ImportedRoot(summary),
            (None, Some(kind)) => Verifiability::Committed(kind),
            (None, None) => Verifiability::Unverifiable,
        })
    }

    pub async fn ensure_valid_proof(&self, proof: &mut BlockProof) -> Result<()> {
        let number = proof.block_num;
        if number < self.upgrade_block {
            return self.legacy.ensure_valid_proof(proof).await;
        }
        let key = self.summary_slot_for(proof.timestamp()?)?;
        if self.block_summary(key, number).await?.is_some() {
            return Ok(());
        }
        match self
            .commitments
            .check(self.ctx.provider.as_ref(), number, proof.block_hash())
            .await?
        {
            Some(kind) => {
                proof.block_proof = kind.proof_bytes();
                Ok(())
            }
            None => Err(RelicError::BlockNotVerifiable {
                block: number,
                chain_id: self.ctx.chain_id,
            }),
        }
    }

    /// Last block of the most recently summarized period, or -1.
    pub async fn last_summary_block(&self) -> Result<i64> {
        let logs = self
            .ctx
            .provider
            .logs(LogQuery::new(
                self.address,
                vec![IBlockHistory::ImportBlockSummary::SIGNATURE_HASH],
            ))
            .await?;
        let slots = logs
            .iter()
            .map(|log| topic_to_u64(log.topics.get(1)))
            .collect::<Result<Vec<_>>>()?;
        let Some(last_slot) = slots.into_iter().filter(|&slot| slot > 0).max() else {
            return Ok(-1);
        };
        let timestamp = slot_to_timestamp(last_slot - 1, self.ctx.data_chain_id)?;
        let header = block_for_timestamp(self.ctx.data_provider.as_ref(), timestamp).await?;
        Ok(max_or_unset([header.number]))
    }

    pub async fn last_verifiable_block(&self) -> Result<i64> {
        let provider = self.ctx.provider.as_ref();
        let (summary, legacy, trusted, precommitted) = try_join!(
            self.last_summary_block(),
            self.legacy.last_verifiable_block(),
            self.commitments.last_trusted(provider),
            self.commitments.last_precommitted(provider),
        )?;
        Ok(summary.max(legacy).max(trusted).max(precommitted))
    }

    fn relevant(&self, log: &ChainLog, number: u64, key: u64) -> bool {
        match log.topics.first() {
            Some(&sig) if sig == IBlockHistory::ImportBlockSummary::SIGNATURE_HASH => {
                log.topics.get(1) == Some(&number_topic(key))
            }
            _ => self.commitments.commits(log, number),
        }
    }

    pub async fn wait_until_verifiable(&self, block: BlockId) -> Result<()> {
        let header = self.ctx.data_provider.block_header(block).await?;
        if header.number < self.upgrade_block {
            return self
                .legacy
                .wait_until_verifiable(BlockId::number(header.number))
                .await;
        }
        let key = self.summary_slot_for(header.timestamp)?;
        let mut events = vec![IBlockHistory::ImportBlockSummary::SIGNATURE_HASH];
        events.extend(self.commitments.events());
        debug!(number = header.number, key, "waiting for block summary");
        wait_for(
            self.ctx.provider.as_ref(),
            LogQuery::new(self.address, events),
            |log| self.relevant(log, header.number, key),
            || async {
                Ok(self
                    .verifiability(BlockId::number(header.number))
                    .await?
                    .is_verifiable())
            },
        )
        .await
    }
}
