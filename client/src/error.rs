use alloy::primitives::{Address, B256, U256};
use relic_common::network::NetworkError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelicError>;

/// Errors reported by the proof-serving API, keyed by the message it returns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Account info not available")]
    AccountNotFound,
    #[error("Invalid eventId")]
    InvalidEventId,
    #[error("EventId not found")]
    EventIdNotFound,
    #[error("Event code mistyped")]
    EventCodeMistyped,
    #[error("Event code not found")]
    EventCodeNotFound,
    #[error("Error parsing request query")]
    InvalidBlock,
    #[error("Block number not available")]
    BlockNumNotFound,
    #[error("Block header not available")]
    BlockNotFound,
    #[error("Invalid root number")]
    InvalidRoot,
    #[error("Root not found")]
    RootNotFound,

    /// The API returned an error message outside the known set.
    #[error("{0}")]
    Unknown(String),

    /// The API failed without a response body.
    #[error("unknown error: empty response with status {0}")]
    EmptyResponse(u16),
}

impl ApiError {
    const KNOWN: [Self; 10] = [
        Self::AccountNotFound,
        Self::InvalidEventId,
        Self::EventIdNotFound,
        Self::EventCodeMistyped,
        Self::EventCodeNotFound,
        Self::InvalidBlock,
        Self::BlockNumNotFound,
        Self::BlockNotFound,
        Self::InvalidRoot,
        Self::RootNotFound,
    ];

    /// Maps an `{error}` message from the API onto its typed kind.
    pub fn from_message(message: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|known| known.to_string() == message)
            .unwrap_or_else(|| Self::Unknown(message.to_owned()))
    }
}

#[derive(Debug, Error)]
pub enum RelicError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("block {block} is not verifiable on chain {chain_id}")]
    BlockNotVerifiable { block: u64, chain_id: u64 },

    #[error("bridging block {0} is not necessary")]
    BridgeNotNecessary(String),

    #[error("unsupported network {0}")]
    UnsupportedNetwork(u64),

    #[error("invalid data provider for chain {chain_id}, supported data chains: {supported:?}")]
    InvalidDataProvider { chain_id: u64, supported: Vec<u64> },

    #[error("no bridge available for chain {chain_id} with data chain {data_chain_id}")]
    NoBridger { chain_id: u64, data_chain_id: u64 },

    #[error("not a native L2 deployment: chain {chain_id} with data chain {data_chain_id}")]
    NotNativeL2 { chain_id: u64, data_chain_id: u64 },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("timestamp {0} is after the current block")]
    TimestampAfterCurrent(u64),

    #[error("slot value didn't match expected: {value} vs {expected}")]
    SlotValueMismatch { value: U256, expected: U256 },

    #[error("transaction hash didn't match expected: {actual} vs {expected}")]
    TransactionHashMismatch { actual: B256, expected: B256 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("prover {0} does not support native fees")]
    NativeFeesUnsupported(Address),

    #[error("checkpoint block is not finalized in most recent verifiable L1 block")]
    CheckpointNotFinalized,

    #[error("call to {0} reverted")]
    CallReverted(Address),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RLP decoding error: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("ABI decoding error: {0}")]
    Abi(#[from] alloy::sol_types::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
