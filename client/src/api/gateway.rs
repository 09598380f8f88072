use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::BlockId;
use tracing::trace;

use super::ProofApi;
use crate::block_history::BlockHistory;
use crate::config::RelicAddresses;
use crate::error::Result;
use crate::proof::{
    AccountProof, AttendanceProof, BirthCertificateProof, BlockAnchored, BlockProof, LogProof,
    StorageSlotProof, TransactionProof, WithdrawalProof,
};
use crate::provider::ChainProvider;

/// Wraps a [`ProofApi`] and, when a verifier is attached, passes every
/// block-anchored response through
/// [`BlockHistory::ensure_valid_proof`] before handing it out.
///
/// Proxy deployments attach one: the API serves Merkle proofs against the
/// data chain's history, which the execution chain may only know through
/// trusted or precommitted hashes.
pub struct ProofGateway<A, P> {
    inner: Arc<A>,
    verifier: Option<Arc<BlockHistory<P>>>,
}

impl<A, P> ProofGateway<A, P> {
    pub fn new(inner: Arc<A>, verifier: Option<Arc<BlockHistory<P>>>) -> Self {
        Self { inner, verifier }
    }

    /// The unchecked API.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn is_verifying(&self) -> bool {
        self.verifier.is_some()
    }
}

impl<A, P> ProofGateway<A, P>
where
    P: ChainProvider + Send + Sync,
{
    async fn checked<T: BlockAnchored>(&self, mut response: T) -> Result<T> {
        if let (Some(verifier), Some(proof)) = (&self.verifier, response.block_proof_mut()) {
            verifier.ensure_valid_proof(proof).await?;
            trace!(
                block = proof.block_num,
                commitment = proof.is_sentinel(),
                "validated block proof"
            );
        }
        Ok(response)
    }
}

impl<A, P> ProofApi for ProofGateway<A, P>
where
    A: ProofApi + Send + Sync,
    P: ChainProvider + Send + Sync,
{
    async fn account_proof(&self, block: BlockId, account: Address) -> Result<AccountProof> {
        self.checked(self.inner.account_proof(block, account).await?)
            .await
    }

    async fn block_proof(&self, block: BlockId) -> Result<BlockProof> {
        self.checked(self.inner.block_proof(block).await?).await
    }

    async fn storage_slot_proof(
        &self,
        block: BlockId,
        account: Address,
        slot: U256,
    ) -> Result<StorageSlotProof> {
        self.checked(self.inner.storage_slot_proof(block, account, slot).await?)
            .await
    }

    async fn log_proof(&self, block: BlockId, tx_idx: u64, log_idx: u64) -> Result<LogProof> {
        self.checked(self.inner.log_proof(block, tx_idx, log_idx).await?)
            .await
    }

    async fn transaction_proof(&self, block: BlockId, tx_idx: u64) -> Result<TransactionProof> {
        self.checked(self.inner.transaction_proof(block, tx_idx).await?)
            .await
    }

    async fn withdrawal_proof(&self, block: BlockId, idx: u64) -> Result<WithdrawalProof> {
        self.checked(self.inner.withdrawal_proof(block, idx).await?)
            .await
    }

    async fn attendance_proof(
        &self,
        account: Address,
        event_id: U256,
        code: String,
    ) -> Result<AttendanceProof> {
        self.checked(self.inner.attendance_proof(account, event_id, code).await?)
            .await
    }

    async fn birth_certificate_proof(&self, account: Address) -> Result<BirthCertificateProof> {
        self.checked(self.inner.birth_certificate_proof(account).await?)
            .await
    }

    async fn addresses(&self, chain_id: u64) -> Result<RelicAddresses> {
        self.inner.addresses(chain_id).await
    }
}
