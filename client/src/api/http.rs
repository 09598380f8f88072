use alloy::primitives::{Address, U256};
use alloy::rpc::types::{BlockId, BlockNumberOrTag};
use futures::future::poll_fn;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tower::Service;
use tracing::debug;

use super::retry::{RetryLayer, RetryPolicy, RetryService};
use super::ProofApi;
use crate::config::RelicAddresses;
use crate::error::{ApiError, RelicError, Result};
use crate::proof::{
    AccountProof, AttendanceProof, BirthCertificateProof, BlockProof, LogProof, StorageSlotProof,
    TransactionProof, WithdrawalProof,
};

#[derive(Debug, Deserialize)]
struct ErrorResult {
    error: String,
}

/// HTTP client for the proof-serving API.
#[derive(Debug, Clone)]
pub struct RelicApi {
    base_url: String,
    service: RetryService<Client>,
}

impl RelicApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry_policy(base_url, RetryPolicy::default())
    }

    pub fn with_retry_policy(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            base_url,
            service: tower::Layer::layer(&RetryLayer::new(policy), Client::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "fetching proof");
        let parsed = url
            .parse::<reqwest::Url>()
            .map_err(|e| RelicError::InvalidArgument(format!("invalid API url {url}: {e}")))?;
        let mut request = reqwest::Request::new(Method::GET, parsed);
        if !query.is_empty() {
            request
                .url_mut()
                .query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut service = self.service.clone();
        poll_fn(|cx| service.poll_ready(cx)).await?;
        let response = service.call(request).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ApiError::EmptyResponse(status.as_u16()).into());
        }
        let err = match serde_json::from_slice::<ErrorResult>(&body) {
            Ok(ErrorResult { error }) => ApiError::from_message(&error),
            Err(_) => ApiError::Unknown(String::from_utf8_lossy(&body).into_owned()),
        };
        Err(err.into())
    }
}

/// Renders a block identifier the way the API expects it in a path segment.
pub fn format_block(block: BlockId) -> String {
    match block {
        BlockId::Number(BlockNumberOrTag::Number(number)) => number.to_string(),
        BlockId::Number(tag) => tag.to_string(),
        BlockId::Hash(hash) => hash.block_hash.to_string(),
    }
}

/// Minimal even-length hex encoding of a storage slot.
pub fn format_slot(slot: U256) -> String {
    let hex = format!("{slot:x}");
    if hex.len() % 2 == 1 {
        format!("0x0{hex}")
    } else {
        format!("0x{hex}")
    }
}

impl ProofApi for RelicApi {
    async fn account_proof(&self, block: BlockId, account: Address) -> Result<AccountProof> {
        self.fetch(
            &format!("/account/{}/{}", format_block(block), account.to_checksum(None)),
            &[],
        )
        .await
    }

    async fn block_proof(&self, block: BlockId) -> Result<BlockProof> {
        self.fetch(&format!("/block/{}", format_block(block)), &[]).await
    }

    async fn storage_slot_proof(
        &self,
        block: BlockId,
        account: Address,
        slot: U256,
    ) -> Result<StorageSlotProof> {
        self.fetch(
            &format!(
                "/storage/{}/{}/{}",
                format_block(block),
                account.to_checksum(None),
                format_slot(slot)
            ),
            &[],
        )
        .await
    }

    async fn log_proof(&self, block: BlockId, tx_idx: u64, log_idx: u64) -> Result<LogProof> {
        self.fetch(
            &format!("/log/{}/{tx_idx}/{log_idx}", format_block(block)),
            &[],
        )
        .await
    }

    async fn transaction_proof(&self, block: BlockId, tx_idx: u64) -> Result<TransactionProof> {
        self.fetch(
            &format!("/transaction/{}/{tx_idx}", format_block(block)),
            &[],
        )
        .await
    }

    async fn withdrawal_proof(&self, block: BlockId, idx: u64) -> Result<WithdrawalProof> {
        self.fetch(&format!("/withdrawal/{}/{idx}", format_block(block)), &[])
            .await
    }

    async fn attendance_proof(
        &self,
        account: Address,
        event_id: U256,
        code: String,
    ) -> Result<AttendanceProof> {
        self.fetch(
            "/attendance",
            &[
                ("event", event_id.to_string()),
                ("code", code),
                ("account", account.to_checksum(None)),
            ],
        )
        .await
    }

    async fn birth_certificate_proof(&self, account: Address) -> Result<BirthCertificateProof> {
        self.fetch(&format!("/birthcert/{}", account.to_checksum(None)), &[])
            .await
    }

    async fn addresses(&self, chain_id: u64) -> Result<RelicAddresses> {
        self.fetch(&format!("/addresses/{chain_id}"), &[]).await
    }
}
