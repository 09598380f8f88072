//! Direct on-chain commitments of individual block hashes: trusted hashes
//! relayed from L1 and precommitted hashes on native L2 deployments.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolEvent, SolValue};
use anyhow::Context;
use parking_lot::Mutex;
use tracing::debug;

use super::{max_or_unset, topic_to_u64, HistoryAbi};
use crate::contracts::{static_call, IBlockHistory};
use crate::error::Result;
use crate::proof::{PRECOMMITTED_BLOCK_PROOF, TRUSTED_HASH_PROOF};
use crate::provider::{ChainLog, ChainProvider, LogQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentKind {
    Trusted,
    Precommitted,
}

impl CommitmentKind {
    /// The sentinel that makes `validBlockHash` check this commitment.
    pub fn proof_bytes(self) -> Bytes {
        match self {
            Self::Trusted => Bytes::from_static(&TRUSTED_HASH_PROOF),
            Self::Precommitted => Bytes::from_static(&PRECOMMITTED_BLOCK_PROOF),
        }
    }
}

/// Confirms commitments with `validBlockHash` and caches the confirmed ones
/// per block number.
#[derive(Debug)]
pub struct Commitments {
    address: Address,
    reliquary: Address,
    abi: HistoryAbi,
    confirmed: Mutex<HashMap<u64, (B256, CommitmentKind)>>,
}

impl Commitments {
    pub fn new(address: Address, reliquary: Address, abi: HistoryAbi) -> Self {
        Self {
            address,
            reliquary,
            abi,
            confirmed: Mutex::new(HashMap::new()),
        }
    }

    fn kinds(&self) -> impl Iterator<Item = CommitmentKind> {
        [
            self.abi.has_trusted().then_some(CommitmentKind::Trusted),
            self.abi
                .has_precommitted()
                .then_some(CommitmentKind::Precommitted),
        ]
        .into_iter()
        .flatten()
    }

    pub fn cached(&self, number: u64, hash: B256) -> Option<CommitmentKind> {
        match self.confirmed.lock().get(&number) {
            Some((confirmed, kind)) if *confirmed == hash => Some(*kind),
            _ => None,
        }
    }

    /// Returns the commitment under which `(hash, number)` is currently
    /// valid, if any. A reverted or negative check means "not yet".
    pub async fn check<P: ChainProvider>(
        &self,
        provider: &P,
        number: u64,
        hash: B256,
    ) -> Result<Option<CommitmentKind>> {
        if let Some(kind) = self.cached(number, hash) {
            return Ok(Some(kind));
        }
        for kind in self.kinds() {
            let call = IBlockHistory::validBlockHashCall {
                hash,
                num: U256::from(number),
                proof: kind.proof_bytes(),
            };
            let valid = static_call(provider, self.address, Some(self.reliquary), &call)
                .await?
                .is_some_and(|ret| ret.valid);
            debug!(number, %hash, ?kind, valid, "checked block commitment");
            if valid {
                self.confirmed.lock().insert(number, (hash, kind));
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    /// Highest block number with a trusted hash, or -1.
    pub async fn last_trusted<P: ChainProvider>(&self, provider: &P) -> Result<i64> {
        if !self.abi.has_trusted() {
            return Ok(-1);
        }
        let logs = provider
            .logs(LogQuery::new(
                self.address,
                vec![IBlockHistory::TrustedBlockHash::SIGNATURE_HASH],
            ))
            .await?;
        let numbers = logs
            .iter()
            .map(trusted_block_number)
            .collect::<Result<Vec<_>>>()?;
        Ok(max_or_unset(numbers))
    }

    /// Highest precommitted block number, or -1.
    pub async fn last_precommitted<P: ChainProvider>(&self, provider: &P) -> Result<i64> {
        if !self.abi.has_precommitted() {
            return Ok(-1);
        }
        let logs = provider
            .logs(LogQuery::new(
                self.address,
                vec![IBlockHistory::PrecomittedBlock::SIGNATURE_HASH],
            ))
            .await?;
        let numbers = logs
            .iter()
            .map(|log| topic_to_u64(log.topics.get(1)))
            .collect::<Result<Vec<_>>>()?;
        Ok(max_or_unset(numbers))
    }

    /// Event signatures announcing a new commitment.
    pub fn events(&self) -> Vec<B256> {
        self.kinds()
            .map(|kind| match kind {
                CommitmentKind::Trusted => IBlockHistory::TrustedBlockHash::SIGNATURE_HASH,
                CommitmentKind::Precommitted => IBlockHistory::PrecomittedBlock::SIGNATURE_HASH,
            })
            .collect()
    }

    /// Whether `log` commits block `number`.
    pub fn commits(&self, log: &ChainLog, number: u64) -> bool {
        match log.topics.first() {
            Some(&sig) if sig == IBlockHistory::TrustedBlockHash::SIGNATURE_HASH => {
                trusted_block_number(log).is_ok_and(|n| n == number)
            }
            Some(&sig) if sig == IBlockHistory::PrecomittedBlock::SIGNATURE_HASH => {
                topic_to_u64(log.topics.get(1)).is_ok_and(|n| n == number)
            }
            _ => false,
        }
    }
}

/// `TrustedBlockHash` keeps both fields in the log data.
fn trusted_block_number(log: &ChainLog) -> Result<u64> {
    let (number, _hash) = <(U256, B256)>::abi_decode_params(&log.data, true)?;
    Ok(u64::try_from(number).context("trusted block number overflows u64")?)
}
