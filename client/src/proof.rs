//! Proof objects returned by the proof-serving API.
//!
//! Every block-anchored proof embeds a [`BlockProof`]. Its `block_proof`
//! bytes are either a Merkle proof against an imported root, or one of the
//! single-byte sentinels telling the verifier contract to check a direct
//! on-chain record instead.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use rlp::Rlp;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stands in for a Merkle proof when the block hash was committed as trusted.
pub const TRUSTED_HASH_PROOF: [u8; 1] = [0x01];

/// Stands in for a Merkle proof when the block hash was precommitted.
pub const PRECOMMITTED_BLOCK_PROOF: [u8; 1] = [0x02];

const HEADER_TIMESTAMP_INDEX: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockProof {
    pub block_num: u64,
    /// RLP-encoded block header.
    pub header: Bytes,
    pub block_proof: Bytes,
}

impl BlockProof {
    /// The block hash claimed by this proof.
    pub fn block_hash(&self) -> B256 {
        keccak256(&self.header)
    }

    pub fn timestamp(&self) -> Result<u64> {
        Ok(Rlp::new(&self.header).val_at(HEADER_TIMESTAMP_INDEX)?)
    }

    pub fn is_sentinel(&self) -> bool {
        self.block_proof[..] == TRUSTED_HASH_PROOF || self.block_proof[..] == PRECOMMITTED_BLOCK_PROOF
    }
}

/// Responses that carry a block-inclusion proof.
pub trait BlockAnchored {
    fn block_proof_mut(&mut self) -> Option<&mut BlockProof>;
}

impl BlockAnchored for BlockProof {
    fn block_proof_mut(&mut self) -> Option<&mut BlockProof> {
        Some(self)
    }
}

macro_rules! block_anchored {
    ($($ty:ty => $($field:ident).+),* $(,)?) => {
        $(
            impl BlockAnchored for $ty {
                fn block_proof_mut(&mut self) -> Option<&mut BlockProof> {
                    Some(&mut self.$($field).+)
                }
            }
        )*
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseAccountProof {
    #[serde(flatten)]
    pub block: BlockProof,
    pub account: Address,
    pub account_proof: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProof {
    #[serde(flatten)]
    pub base: BaseAccountProof,
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: B256,
    pub storage_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSlotProof {
    #[serde(flatten)]
    pub base: BaseAccountProof,
    pub slot: U256,
    pub slot_value: U256,
    /// Concatenated RLP-encoded trie nodes, root first.
    pub slot_proof: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogProof {
    #[serde(flatten)]
    pub block: BlockProof,
    pub tx_idx: u64,
    pub log_idx: u64,
    pub receipt_proof: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionProof {
    #[serde(flatten)]
    pub block: BlockProof,
    pub tx_proof: Bytes,
    pub tx_idx: u64,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProof {
    #[serde(flatten)]
    pub block: BlockProof,
    pub idx: u64,
    pub withdrawal_proof: Bytes,
}

/// Signed attendance claim. Not anchored to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceProof {
    pub account: Address,
    pub event_id: String,
    pub number: U256,
    pub signature_inner: Bytes,
    pub signature_outer: Bytes,
}

/// Proof of the block in which an account first appeared.
pub type BirthCertificateProof = BaseAccountProof;

block_anchored! {
    BaseAccountProof => block,
    AccountProof => base.block,
    StorageSlotProof => base.block,
    LogProof => block,
    TransactionProof => block,
    WithdrawalProof => block,
}

impl BlockAnchored for AttendanceProof {
    fn block_proof_mut(&mut self) -> Option<&mut BlockProof> {
        None
    }
}
