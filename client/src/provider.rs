use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, BlockHash, Bytes, B256, U256};
use alloy::rpc::types::{
    BlockId, BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionRequest,
};
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::transports::RpcError;
use alloy::{providers::Provider, transports::Transport};
use anyhow::Context;
use futures::{Stream, StreamExt};
use mockall::automock;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::debug;

const CACHE_SIZE: usize = 1024;
const MAX_NUMBER_OF_PARALLEL_REQUESTS: usize = 128;
/// JSON-RPC error code nodes use for `eth_call` reverts.
const REVERT_ERROR_CODE: i64 = 3;

/// The subset of a block header the verifier works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
    pub state_root: B256,
}

/// A log filter over one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    /// Event signatures to match in topic 0, any of.
    pub events: Vec<B256>,
    pub topic1: Option<B256>,
    pub from_block: u64,
}

impl LogQuery {
    pub fn new(address: Address, events: Vec<B256>) -> Self {
        Self {
            address,
            events,
            topic1: None,
            from_block: 0,
        }
    }

    pub fn topic1(mut self, topic: B256) -> Self {
        self.topic1 = Some(topic);
        self
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    fn to_filter(&self) -> Filter {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(self.events.clone())
            .from_block(self.from_block);
        match self.topic1 {
            Some(topic) => filter.topic1(topic),
            None => filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub block_number: Option<u64>,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl From<Log> for ChainLog {
    fn from(log: Log) -> Self {
        Self {
            block_number: log.block_number,
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
        }
    }
}

/// A call or transaction to simulate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
}

impl CallRequest {
    pub fn new(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            to,
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

impl From<CallRequest> for TransactionRequest {
    fn from(call: CallRequest) -> Self {
        let tx = TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.input)
            .with_value(call.value);
        match call.from {
            Some(from) => tx.with_from(from),
            None => tx,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub transaction_index: Option<u64>,
    /// Block-level indices of the receipt's logs, in order.
    pub log_indices: Vec<u64>,
}

/// Batches of logs as the node reports them.
pub type LogStream = Pin<Box<dyn Stream<Item = Vec<ChainLog>> + Send>>;

/// Chain queries needed to resolve and package proofs.
#[automock]
pub trait ChainProvider {
    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn block_header(
        &self,
        block_id: BlockId,
    ) -> impl Future<Output = anyhow::Result<BlockHeader>> + Send;

    fn logs(&self, query: LogQuery)
        -> impl Future<Output = anyhow::Result<Vec<ChainLog>>> + Send;

    /// Subscribes to logs matching `query` emitted from now on.
    fn watch_logs(
        &self,
        query: LogQuery,
    ) -> impl Future<Output = anyhow::Result<LogStream>> + Send;

    /// Executes a read-only call. Returns `None` if the call reverts.
    fn call(
        &self,
        request: CallRequest,
    ) -> impl Future<Output = anyhow::Result<Option<Bytes>>> + Send;

    fn estimate_gas(
        &self,
        request: CallRequest,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn gas_price(&self) -> impl Future<Output = anyhow::Result<u128>> + Send;

    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = anyhow::Result<Option<ReceiptInfo>>> + Send;

    /// Storage root of `address` at `block_id`, as reported by `eth_getProof`.
    fn storage_root(
        &self,
        address: Address,
        block_id: BlockId,
    ) -> impl Future<Output = anyhow::Result<B256>> + Send;

    fn raw_request(
        &self,
        method: String,
        params: serde_json::Value,
    ) -> impl Future<Output = anyhow::Result<serde_json::Value>> + Send;
}

/// Wrapper around alloy provider to cache block headers and bound the
/// number of in-flight requests.
pub struct CachedProvider<ProviderT, TransportT> {
    provider: Arc<ProviderT>,
    // `Alloy` provider is using `Reqwest` http client under the hood. It has an unbounded
    // connection pool, so parallel connections are limited here.
    semaphore: Arc<Semaphore>,
    headers_by_number: Arc<Mutex<lru::LruCache<u64, BlockHeader>>>,
    headers_by_hash: Arc<Mutex<lru::LruCache<BlockHash, u64>>>,
    _phantom: std::marker::PhantomData<TransportT>,
}

pub struct ProviderGuard<'a, ProviderT> {
    provider: Arc<ProviderT>,
    _permit: SemaphorePermit<'a>,
}

impl<ProviderT> Deref for ProviderGuard<'_, ProviderT> {
    type Target = Arc<ProviderT>;

    fn deref(&self) -> &Self::Target {
        &self.provider
    }
}

impl<ProviderT, TransportT> CachedProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT) -> Self {
        const CAPACITY: std::num::NonZeroUsize = match std::num::NonZeroUsize::new(CACHE_SIZE) {
            Some(capacity) => capacity,
            None => panic!("cache size must be non-zero"),
        };
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(MAX_NUMBER_OF_PARALLEL_REQUESTS)),
            headers_by_number: Arc::new(Mutex::new(lru::LruCache::new(CAPACITY))),
            headers_by_hash: Arc::new(Mutex::new(lru::LruCache::new(CAPACITY))),
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn get_provider(&self) -> Result<ProviderGuard<ProviderT>, anyhow::Error> {
        Ok(ProviderGuard {
            provider: self.provider.clone(),
            _permit: self.semaphore.acquire().await?,
        })
    }

    async fn cached_header(&self, id: BlockId) -> Option<BlockHeader> {
        match id {
            BlockId::Hash(hash) => {
                let number = self
                    .headers_by_hash
                    .lock()
                    .await
                    .get(&hash.block_hash)
                    .copied()?;
                self.headers_by_number.lock().await.get(&number).copied()
            }
            BlockId::Number(BlockNumberOrTag::Number(number)) => {
                self.headers_by_number.lock().await.get(&number).copied()
            }
            _ => None,
        }
    }
}

impl<ProviderT, TransportT> ChainProvider for CachedProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.get_provider().await?.get_chain_id().await?)
    }

    /// Retrieves a header by number or hash, caching it unless it was
    /// requested by tag.
    async fn block_header(&self, block_id: BlockId) -> anyhow::Result<BlockHeader> {
        if let Some(header) = self.cached_header(block_id).await {
            return Ok(header);
        }

        let block = self
            .get_provider()
            .await?
            .get_block(block_id, BlockTransactionsKind::Hashes)
            .await?
            .with_context(|| format!("target block {:?} does not exist", block_id))?;
        let header = BlockHeader {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
            state_root: block.header.state_root,
        };

        self.headers_by_number.lock().await.put(header.number, header);
        self.headers_by_hash
            .lock()
            .await
            .put(header.hash, header.number);

        Ok(header)
    }

    async fn logs(&self, query: LogQuery) -> anyhow::Result<Vec<ChainLog>> {
        let logs = self
            .get_provider()
            .await?
            .get_logs(&query.to_filter())
            .await?;
        debug!(address = %query.address, from = query.from_block, count = logs.len(), "fetched logs");
        Ok(logs.into_iter().map(ChainLog::from).collect())
    }

    async fn watch_logs(&self, query: LogQuery) -> anyhow::Result<LogStream> {
        let poller = self
            .get_provider()
            .await?
            .watch_logs(&query.to_filter())
            .await?;
        let stream = poller
            .into_stream()
            .map(|logs| logs.into_iter().map(ChainLog::from).collect::<Vec<_>>());
        Ok(Box::pin(stream))
    }

    async fn call(&self, request: CallRequest) -> anyhow::Result<Option<Bytes>> {
        let tx: TransactionRequest = request.into();
        match self.get_provider().await?.call(&tx).await {
            Ok(output) => Ok(Some(output)),
            Err(RpcError::ErrorResp(payload)) if is_revert(&payload) => {
                debug!(code = payload.code, message = %payload.message, "call reverted");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn estimate_gas(&self, request: CallRequest) -> anyhow::Result<u64> {
        let tx: TransactionRequest = request.into();
        let gas = self.get_provider().await?.estimate_gas(&tx).await?;
        u64::try_from(gas).context("gas estimate overflows u64")
    }

    async fn gas_price(&self) -> anyhow::Result<u128> {
        Ok(self.get_provider().await?.get_gas_price().await?)
    }

    async fn transaction_receipt(&self, hash: B256) -> anyhow::Result<Option<ReceiptInfo>> {
        let receipt = self
            .get_provider()
            .await?
            .get_transaction_receipt(hash)
            .await?;
        Ok(receipt.map(|receipt| ReceiptInfo {
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            transaction_index: receipt.transaction_index,
            log_indices: receipt
                .inner
                .logs()
                .iter()
                .filter_map(|log| log.log_index)
                .collect(),
        }))
    }

    async fn storage_root(&self, address: Address, block_id: BlockId) -> anyhow::Result<B256> {
        let proof = self
            .get_provider()
            .await?
            .get_proof(address, vec![])
            .block_id(block_id)
            .await?;
        Ok(proof.storage_hash)
    }

    async fn raw_request(
        &self,
        method: String,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(self
            .get_provider()
            .await?
            .raw_request::<_, serde_json::Value>(method.into(), params)
            .await?)
    }
}

/// Whether an error response reports an EVM revert rather than a node
/// fault such as a rate limit or a missing header.
fn is_revert(payload: &ErrorPayload) -> bool {
    payload.code == REVERT_ERROR_CODE || payload.message.to_lowercase().contains("revert")
}
