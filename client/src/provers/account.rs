use alloy::primitives::{Address, U256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolValue;

use super::{ephemeral_prover, prover_contract, ProofData, Prover};
use crate::api::ProofApi;
use crate::error::Result;
use crate::facts;
use crate::provider::ChainProvider;

/// Which account field an account-info proof attests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoType {
    StorageRoot = 0,
    CodeHash = 1,
    Balance = 2,
    Nonce = 3,
    RawHeader = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfoParams {
    pub block: BlockId,
    pub account: Address,
    pub info: InfoType,
}

prover_contract!(
    /// Proves one field of an account at a block.
    AccountInfoProver,
    account_info_prover
);
ephemeral_prover!(AccountInfoProver);

impl<P, A> Prover for AccountInfoProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = AccountInfoParams;

    async fn proof_data(&self, params: AccountInfoParams) -> Result<ProofData> {
        let proof = self
            .client
            .api()?
            .account_proof(params.block, params.account)
            .await?;
        let block = &proof.base.block;
        let calldata = (
            proof.base.account,
            proof.base.account_proof.clone(),
            block.header.clone(),
            block.block_proof.clone(),
            U256::from(params.info as u8),
        )
            .abi_encode_params();

        let sig_data = match params.info {
            InfoType::StorageRoot => facts::account_storage(block.block_num, proof.storage_hash),
            InfoType::CodeHash => facts::account_code_hash(block.block_num, proof.code_hash),
            InfoType::Balance => facts::account_balance(block.block_num),
            InfoType::Nonce => facts::account_nonce(block.block_num),
            InfoType::RawHeader => facts::account(block.block_num),
        };
        Ok(ProofData {
            proof: calldata.into(),
            sig_data,
        })
    }
}

prover_contract!(
    /// Proves an account's storage root at a block.
    AccountStorageProver,
    account_storage_prover
);
ephemeral_prover!(AccountStorageProver);

impl<P, A> Prover for AccountStorageProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    /// `(block, account)`
    type Params = (BlockId, Address);

    async fn proof_data(&self, (block, account): (BlockId, Address)) -> Result<ProofData> {
        let proof = self.client.api()?.account_proof(block, account).await?;
        let base = proof.base;
        let calldata = (
            base.account,
            base.account_proof,
            base.block.header,
            base.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::account_storage(base.block.block_num, proof.storage_hash),
        })
    }
}

prover_contract!(
    /// Proves the block in which an account first appeared.
    BirthCertificateProver,
    birth_certificate_prover
);
ephemeral_prover!(BirthCertificateProver);

impl<P, A> Prover for BirthCertificateProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = Address;

    async fn proof_data(&self, account: Address) -> Result<ProofData> {
        let proof = self.client.api()?.birth_certificate_proof(account).await?;
        let calldata = (
            proof.account,
            proof.account_proof,
            proof.block.header,
            proof.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::birth_certificate(),
        })
    }
}
