//! Access to the proof-serving API.

use std::future::Future;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::BlockId;
use mockall::automock;

use crate::config::RelicAddresses;
use crate::error::Result;
use crate::proof::{
    AccountProof, AttendanceProof, BirthCertificateProof, BlockProof, LogProof, StorageSlotProof,
    TransactionProof, WithdrawalProof,
};

pub mod gateway;
pub mod http;
pub mod retry;

pub use gateway::ProofGateway;
pub use http::RelicApi;

#[automock]
pub trait ProofApi {
    fn account_proof(
        &self,
        block: BlockId,
        account: Address,
    ) -> impl Future<Output = Result<AccountProof>> + Send;

    fn block_proof(&self, block: BlockId) -> impl Future<Output = Result<BlockProof>> + Send;

    fn storage_slot_proof(
        &self,
        block: BlockId,
        account: Address,
        slot: U256,
    ) -> impl Future<Output = Result<StorageSlotProof>> + Send;

    fn log_proof(
        &self,
        block: BlockId,
        tx_idx: u64,
        log_idx: u64,
    ) -> impl Future<Output = Result<LogProof>> + Send;

    fn transaction_proof(
        &self,
        block: BlockId,
        tx_idx: u64,
    ) -> impl Future<Output = Result<TransactionProof>> + Send;

    fn withdrawal_proof(
        &self,
        block: BlockId,
        idx: u64,
    ) -> impl Future<Output = Result<WithdrawalProof>> + Send;

    fn attendance_proof(
        &self,
        account: Address,
        event_id: U256,
        code: String,
    ) -> impl Future<Output = Result<AttendanceProof>> + Send;

    fn birth_certificate_proof(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<BirthCertificateProof>> + Send;

    fn addresses(&self, chain_id: u64) -> impl Future<Output = Result<RelicAddresses>> + Send;
}
