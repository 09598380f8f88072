use alloy::primitives::U256;
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolValue;

use super::{ephemeral_prover, prover_contract, ProofData, Prover};
use crate::api::ProofApi;
use crate::error::Result;
use crate::facts;
use crate::provider::ChainProvider;

prover_contract!(
    /// Proves a block header.
    BlockHeaderProver,
    block_header_prover
);
ephemeral_prover!(BlockHeaderProver);

impl<P, A> Prover for BlockHeaderProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = BlockId;

    async fn proof_data(&self, block: BlockId) -> Result<ProofData> {
        let proof = self.client.api()?.block_proof(block).await?;
        Ok(ProofData {
            sig_data: facts::block_header(proof.block_num),
            proof: (proof.header, proof.block_proof).abi_encode_params().into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalParams {
    pub block: BlockId,
    /// Index of the withdrawal within the block.
    pub idx: u64,
}

prover_contract!(
    /// Proves a beacon-chain withdrawal included in a block.
    WithdrawalProver,
    withdrawal_prover
);
ephemeral_prover!(WithdrawalProver);

impl<P, A> Prover for WithdrawalProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = WithdrawalParams;

    async fn proof_data(&self, params: WithdrawalParams) -> Result<ProofData> {
        let proof = self
            .client
            .api()?
            .withdrawal_proof(params.block, params.idx)
            .await?;
        let calldata = (
            U256::from(params.idx),
            proof.withdrawal_proof,
            proof.block.header,
            proof.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::withdrawal(proof.block.block_num, params.idx),
        })
    }
}
