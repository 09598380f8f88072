use alloy::primitives::{B256, U256};
use alloy::rpc::types::{BlockId, Log};
use alloy::sol_types::SolValue;
use tracing::trace;

use super::{ephemeral_prover, prover_contract, ProofData, Prover};
use crate::api::ProofApi;
use crate::error::{RelicError, Result};
use crate::facts;
use crate::provider::ChainProvider;

/// Locates a mined log on the data chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogParams {
    pub block_hash: B256,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    /// Index of the log within its block.
    pub log_index: u64,
}

impl TryFrom<&Log> for LogParams {
    type Error = RelicError;

    fn try_from(log: &Log) -> Result<Self> {
        let pending = || RelicError::InvalidArgument("log is not mined".into());
        Ok(Self {
            block_hash: log.block_hash.ok_or_else(pending)?,
            transaction_hash: log.transaction_hash.ok_or_else(pending)?,
            transaction_index: log.transaction_index.ok_or_else(pending)?,
            log_index: log.log_index.ok_or_else(pending)?,
        })
    }
}

prover_contract!(
    /// Proves that a log was emitted.
    LogProver,
    log_prover
);
ephemeral_prover!(LogProver);

impl<P, A> LogProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    /// The API indexes logs within their transaction, not their block.
    async fn index_in_transaction(&self, params: &LogParams) -> Result<u64> {
        let receipt = self
            .client
            .data_provider()
            .transaction_receipt(params.transaction_hash)
            .await?
            .ok_or_else(|| {
                RelicError::InvalidArgument(format!(
                    "no receipt for transaction {}",
                    params.transaction_hash
                ))
            })?;
        let first = receipt.log_indices.first().copied().ok_or_else(|| {
            RelicError::InvalidArgument(format!(
                "transaction {} emitted no logs",
                params.transaction_hash
            ))
        })?;
        params.log_index.checked_sub(first).ok_or_else(|| {
            RelicError::InvalidArgument(format!(
                "log {} precedes transaction {}",
                params.log_index, params.transaction_hash
            ))
        })
    }
}

impl<P, A> Prover for LogProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = LogParams;

    async fn proof_data(&self, params: LogParams) -> Result<ProofData> {
        let log_idx = self.index_in_transaction(&params).await?;
        trace!(tx = %params.transaction_hash, log_idx, "proving log");
        let proof = self
            .client
            .api()?
            .log_proof(
                BlockId::hash(params.block_hash),
                params.transaction_index,
                log_idx,
            )
            .await?;
        let calldata = (
            U256::from(proof.tx_idx),
            U256::from(proof.log_idx),
            proof.receipt_proof,
            proof.block.header,
            proof.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::log(proof.block.block_num, proof.tx_idx, proof.log_idx),
        })
    }
}
