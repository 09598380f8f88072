use alloy::primitives::{B256, U256};
use alloy::rpc::types::{BlockId, Transaction};
use alloy::sol_types::SolValue;

use super::{ephemeral_prover, prover_contract, ProofData, Prover};
use crate::api::ProofApi;
use crate::error::{RelicError, Result};
use crate::facts;
use crate::provider::ChainProvider;

/// Locates a mined transaction on the data chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionParams {
    pub block_hash: B256,
    pub transaction_index: u64,
    /// Checked against the hash of the proven transaction.
    pub transaction_hash: B256,
}

impl TryFrom<&Transaction> for TransactionParams {
    type Error = RelicError;

    fn try_from(tx: &Transaction) -> Result<Self> {
        let pending = || RelicError::InvalidArgument(format!("transaction {} is not mined", tx.hash));
        Ok(Self {
            block_hash: tx.block_hash.ok_or_else(pending)?,
            transaction_index: tx.transaction_index.ok_or_else(pending)?,
            transaction_hash: tx.hash,
        })
    }
}

prover_contract!(
    /// Proves that a transaction was included in a block.
    TransactionProver,
    transaction_prover
);
ephemeral_prover!(TransactionProver);

impl<P, A> Prover for TransactionProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = TransactionParams;

    async fn proof_data(&self, params: TransactionParams) -> Result<ProofData> {
        let proof = self
            .client
            .api()?
            .transaction_proof(BlockId::hash(params.block_hash), params.transaction_index)
            .await?;
        if proof.tx_hash != params.transaction_hash {
            return Err(RelicError::TransactionHashMismatch {
                actual: proof.tx_hash,
                expected: params.transaction_hash,
            });
        }
        let calldata = (
            U256::from(proof.tx_idx),
            proof.tx_proof,
            proof.block.header,
            proof.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::transaction(proof.tx_hash),
        })
    }
}
