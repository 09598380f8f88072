use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Chains with a known Relic deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ChainId {
    EthMainnet = 1,
    EthSepolia = 11155111,
    ZkSyncMainnet = 324,
    ZkSyncSepolia = 300,
    OpMainnet = 10,
    OpSepolia = 11155420,
    BaseMainnet = 8453,
    BaseSepolia = 84532,
}

impl ChainId {
    pub const fn id(self) -> u64 {
        self as u64
    }
}

impl From<ChainId> for u64 {
    fn from(chain: ChainId) -> Self {
        chain.id()
    }
}

impl TryFrom<u64> for ChainId {
    type Error = NetworkError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Ok(match id {
            1 => Self::EthMainnet,
            11155111 => Self::EthSepolia,
            324 => Self::ZkSyncMainnet,
            300 => Self::ZkSyncSepolia,
            10 => Self::OpMainnet,
            11155420 => Self::OpSepolia,
            8453 => Self::BaseMainnet,
            84532 => Self::BaseSepolia,
            other => return Err(NetworkError::UnknownChain(other)),
        })
    }
}

/// Errors raised by chain classification and beacon time conversion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The operation only makes sense on an L1 chain.
    #[error("network {0} is not an L1 network")]
    NotL1Network(u64),

    /// The timestamp does not fall on a beacon slot boundary.
    #[error("unexpected slot time: {0}")]
    UnexpectedSlotTime(u64),

    #[error("unknown chain id {0}")]
    UnknownChain(u64),
}

/// Rollup family of an L2 chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupFamily {
    ZkSync,
    /// OP-stack chains, Base included.
    Optimism,
}

pub const TIME_PER_SLOT: u64 = 12;

const MAINNET_BEACON_GENESIS: u64 = 1606824023;
const SEPOLIA_BEACON_GENESIS: u64 = 1655733600;

/// Offset added to an L1 contract address when it sends a message to an L2.
const L1_TO_L2_ALIAS_OFFSET: Address = Address::new([
    0x11, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x11, 0x11,
]);

pub fn is_l1(chain_id: u64) -> bool {
    chain_id == ChainId::EthMainnet.id() || chain_id == ChainId::EthSepolia.id()
}

pub fn is_zksync(chain_id: u64) -> bool {
    chain_id == ChainId::ZkSyncMainnet.id() || chain_id == ChainId::ZkSyncSepolia.id()
}

pub fn is_optimism(chain_id: u64) -> bool {
    matches!(
        ChainId::try_from(chain_id),
        Ok(ChainId::OpMainnet | ChainId::OpSepolia | ChainId::BaseMainnet | ChainId::BaseSepolia)
    )
}

pub fn is_l2(chain_id: u64) -> bool {
    rollup_family(chain_id).is_some()
}

pub fn rollup_family(chain_id: u64) -> Option<RollupFamily> {
    if is_zksync(chain_id) {
        Some(RollupFamily::ZkSync)
    } else if is_optimism(chain_id) {
        Some(RollupFamily::Optimism)
    } else {
        None
    }
}

/// An L2 deployment proving facts about its parent L1.
pub fn is_proxy_l2_deployment(chain_id: u64, data_chain_id: u64) -> bool {
    is_l2(chain_id) && is_l1(data_chain_id)
}

/// An L2 deployment proving facts about itself.
pub fn is_native_l2_deployment(chain_id: u64, data_chain_id: u64) -> bool {
    chain_id == data_chain_id && is_l2(chain_id)
}

pub fn beacon_genesis_timestamp(chain_id: u64) -> Result<u64, NetworkError> {
    match ChainId::try_from(chain_id) {
        Ok(ChainId::EthMainnet) => Ok(MAINNET_BEACON_GENESIS),
        Ok(ChainId::EthSepolia) => Ok(SEPOLIA_BEACON_GENESIS),
        _ => Err(NetworkError::NotL1Network(chain_id)),
    }
}

/// Converts a block timestamp into its beacon-chain slot.
pub fn timestamp_to_slot(timestamp: u64, chain_id: u64) -> Result<u64, NetworkError> {
    let genesis = beacon_genesis_timestamp(chain_id)?;
    let diff = timestamp
        .checked_sub(genesis)
        .ok_or(NetworkError::UnexpectedSlotTime(timestamp))?;
    if diff % TIME_PER_SLOT != 0 {
        return Err(NetworkError::UnexpectedSlotTime(timestamp));
    }
    Ok(diff / TIME_PER_SLOT)
}

pub fn slot_to_timestamp(slot: u64, chain_id: u64) -> Result<u64, NetworkError> {
    Ok(beacon_genesis_timestamp(chain_id)? + TIME_PER_SLOT * slot)
}

/// Applies the L1 to L2 address alias used by both rollup families for
/// cross-domain message senders.
pub fn apply_l1_to_l2_alias(address: Address) -> Address {
    let sum = U256::from_be_slice(address.as_slice())
        + U256::from_be_slice(L1_TO_L2_ALIAS_OFFSET.as_slice());
    Address::from_slice(&sum.to_be_bytes::<32>()[12..])
}
