use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolValue;
use futures::future::try_join_all;
use futures::try_join;
use tracing::debug;

use super::{ephemeral_prover, prover_contract, BatchProofData, BatchProver, ProofData, Prover};
use crate::api::ProofApi;
use crate::compress::{check_expected, CompressedProofs};
use crate::error::{RelicError, Result};
use crate::facts;
use crate::proof::{AccountProof, StorageSlotProof};
use crate::provider::ChainProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlotParams {
    pub block: BlockId,
    pub account: Address,
    pub slot: U256,
    /// Fails the proof unless the slot holds exactly this value.
    pub expected: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiStorageSlotParams {
    pub block: BlockId,
    pub account: Address,
    pub slots: Vec<U256>,
    /// Expected values, one per slot; `None` leaves a slot unchecked. Left
    /// empty, no slot is checked.
    pub expected: Vec<Option<U256>>,
    /// Also store the block header fact.
    pub include_header: bool,
}

prover_contract!(
    /// Proves a storage slot value, including the account proof.
    StorageSlotProver,
    storage_slot_prover
);
ephemeral_prover!(StorageSlotProver);

impl<P, A> Prover for StorageSlotProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = StorageSlotParams;

    async fn proof_data(&self, params: StorageSlotParams) -> Result<ProofData> {
        let proof = self
            .client
            .api()?
            .storage_slot_proof(params.block, params.account, params.slot)
            .await?;
        check_expected(&[proof.slot_value], &[params.expected])?;
        let sig_data = facts::storage_slot(proof.slot, proof.base.block.block_num);
        let calldata = (
            proof.base.account,
            proof.base.account_proof,
            B256::from(proof.slot),
            proof.slot_proof,
            proof.base.block.header,
            proof.base.block.block_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data,
        })
    }
}

prover_contract!(
    /// Proves a storage slot of an account whose storage root is already
    /// proven.
    CachedStorageSlotProver,
    cached_storage_slot_prover
);
ephemeral_prover!(CachedStorageSlotProver);

impl<P, A> Prover for CachedStorageSlotProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = StorageSlotParams;

    async fn proof_data(&self, params: StorageSlotParams) -> Result<ProofData> {
        let api = self.client.api()?;
        let (slot_proof, account_proof) = try_join!(
            api.storage_slot_proof(params.block, params.account, params.slot),
            api.account_proof(params.block, params.account),
        )?;
        check_expected(&[slot_proof.slot_value], &[params.expected])?;
        let block_num = account_proof.base.block.block_num;
        let calldata = (
            slot_proof.base.account,
            U256::from(block_num),
            account_proof.storage_hash,
            B256::from(slot_proof.slot),
            slot_proof.slot_proof,
        )
            .abi_encode_params();
        Ok(ProofData {
            proof: calldata.into(),
            sig_data: facts::storage_slot(slot_proof.slot, block_num),
        })
    }
}

/// Fetches the account proof and every slot proof concurrently, enforces
/// the expected values, and compresses the slot proofs.
async fn fetch_compressed<A: ProofApi>(
    api: &A,
    params: &MultiStorageSlotParams,
) -> Result<(AccountProof, Vec<StorageSlotProof>, CompressedProofs)> {
    let (account_proof, slot_proofs) = try_join!(
        api.account_proof(params.block, params.account),
        try_join_all(
            params
                .slots
                .iter()
                .map(|&slot| api.storage_slot_proof(params.block, params.account, slot))
        ),
    )?;
    let values = slot_proofs.iter().map(|p| p.slot_value).collect::<Vec<_>>();
    check_expected(&values, &params.expected)?;

    let compressed = CompressedProofs::new(
        &slot_proofs
            .iter()
            .map(|p| &p.slot_proof)
            .collect::<Vec<_>>(),
    )?;
    debug!(
        slots = slot_proofs.len(),
        nodes = compressed.nodes.len(),
        "compressed slot proofs"
    );
    Ok((account_proof, slot_proofs, compressed))
}

fn sig_datas(slot_proofs: &[StorageSlotProof], block_num: u64) -> Vec<Bytes> {
    slot_proofs
        .iter()
        .map(|p| facts::storage_slot(p.slot, block_num))
        .collect()
}

prover_contract!(
    /// Proves many slots of one account at once, sharing trie nodes.
    MultiStorageSlotProver,
    multi_storage_slot_prover
);

impl<P, A> BatchProver for MultiStorageSlotProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = MultiStorageSlotParams;

    async fn proof_data(&self, params: MultiStorageSlotParams) -> Result<BatchProofData> {
        let (account_proof, slot_proofs, compressed) =
            fetch_compressed(self.client.api()?, &params).await?;
        let base = account_proof.base;
        let sig_datas = sig_datas(&slot_proofs, base.block.block_num);
        let calldata = (
            base.account,
            base.account_proof,
            base.block.header,
            base.block.block_proof,
            compressed.proof_nodes(),
            params.slots,
            compressed.slot_proofs(),
            params.include_header,
        )
            .abi_encode_params();
        Ok(BatchProofData {
            proof: calldata.into(),
            sig_datas,
        })
    }
}

prover_contract!(
    /// Proves many slots of an account whose storage root is already
    /// proven.
    CachedMultiStorageSlotProver,
    cached_multi_storage_slot_prover
);

impl<P, A> BatchProver for CachedMultiStorageSlotProver<'_, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    type Params = MultiStorageSlotParams;

    async fn proof_data(&self, params: MultiStorageSlotParams) -> Result<BatchProofData> {
        if params.include_header {
            return Err(RelicError::InvalidArgument(
                "CachedMultiStorageSlotProver doesn't support include_header".into(),
            ));
        }
        let (account_proof, slot_proofs, compressed) =
            fetch_compressed(self.client.api()?, &params).await?;
        let block_num = account_proof.base.block.block_num;
        let calldata = (
            account_proof.base.account,
            U256::from(block_num),
            U256::from_be_bytes(account_proof.storage_hash.0),
            compressed.proof_nodes(),
            params.slots,
            compressed.slot_proofs(),
        )
            .abi_encode_params();
        Ok(BatchProofData {
            proof: calldata.into(),
            sig_datas: sig_datas(&slot_proofs, block_num),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockProofApi;
    use crate::compress::tests::node;
    use crate::provers::tests::{base_account_proof, client};
    use crate::provider::MockChainProvider;

    const ACCOUNT: Address = Address::repeat_byte(0x0a);
    const BLOCK: u64 = 15_000_000;

    /// Slot `n` holds `n * 10`; its proof shares the first two nodes with
    /// every other slot.
    fn slot_proof(slot: U256) -> StorageSlotProof {
        let tag = slot.to::<u8>();
        StorageSlotProof {
            base: base_account_proof(ACCOUNT, BLOCK),
            slot,
            slot_value: slot * U256::from(10),
            slot_proof: [node(0xf0), node(0xf1), node(tag)].concat().into(),
        }
    }

    fn api() -> MockProofApi {
        let mut api = MockProofApi::new();
        api.expect_account_proof().returning(|_, account| {
            Box::pin(async move {
                Ok(AccountProof {
                    base: base_account_proof(account, BLOCK),
                    balance: U256::ZERO,
                    nonce: 0,
                    code_hash: B256::ZERO,
                    storage_hash: B256::repeat_byte(0x5a),
                })
            })
        });
        api.expect_storage_slot_proof()
            .returning(|_, _, slot| Box::pin(async move { Ok(slot_proof(slot)) }));
        api
    }

    fn params(slots: &[u64], expected: Vec<Option<U256>>) -> MultiStorageSlotParams {
        MultiStorageSlotParams {
            block: BlockId::number(BLOCK),
            account: ACCOUNT,
            slots: slots.iter().map(|&s| U256::from(s)).collect(),
            expected,
            include_header: true,
        }
    }

    #[tokio::test]
    async fn storage_slot_checks_expected() {
        let client = client(api(), MockChainProvider::new());
        let prover = client.storage_slot_prover();
        let params = StorageSlotParams {
            block: BlockId::number(BLOCK),
            account: ACCOUNT,
            slot: U256::from(2),
            expected: Some(U256::from(20)),
        };
        let data = prover.proof_data(params).await.unwrap();
        assert_eq!(data.sig_data, facts::storage_slot(U256::from(2), BLOCK));
        let (account, _, slot, ..) =
            <(Address, Bytes, B256, Bytes, Bytes, Bytes)>::abi_decode_params(&data.proof, true)
                .unwrap();
        assert_eq!(account, ACCOUNT);
        assert_eq!(slot, B256::from(U256::from(2)));

        let err = prover
            .proof_data(StorageSlotParams {
                expected: Some(U256::from(21)),
                ..params
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelicError::SlotValueMismatch { .. }));
    }

    #[tokio::test]
    async fn cached_storage_slot_uses_storage_hash() {
        let client = client(api(), MockChainProvider::new());
        let data = client
            .cached_storage_slot_prover()
            .proof_data(StorageSlotParams {
                block: BlockId::number(BLOCK),
                account: ACCOUNT,
                slot: U256::from(4),
                expected: None,
            })
            .await
            .unwrap();
        let (account, block_num, storage_hash, slot, _) =
            <(Address, U256, B256, B256, Bytes)>::abi_decode_params(&data.proof, true).unwrap();
        assert_eq!(account, ACCOUNT);
        assert_eq!(block_num, U256::from(BLOCK));
        assert_eq!(storage_hash, B256::repeat_byte(0x5a));
        assert_eq!(slot, B256::from(U256::from(4)));
    }

    #[tokio::test]
    async fn multi_slot_shares_nodes() {
        let client = client(api(), MockChainProvider::new());
        let data = client
            .multi_storage_slot_prover()
            .proof_data(params(&[1, 2, 3], vec![None, Some(U256::from(20)), None]))
            .await
            .unwrap();

        let (account, _, _, _, proof_nodes, slots, slot_proofs, include_header) =
            <(Address, Bytes, Bytes, Bytes, Bytes, Vec<U256>, Bytes, bool)>::abi_decode_params(
                &data.proof,
                true,
            )
            .unwrap();
        assert_eq!(account, ACCOUNT);
        assert_eq!(slots, vec![U256::from(1), U256::from(2), U256::from(3)]);
        assert!(include_header);
        // two shared nodes plus one leaf per slot
        assert_eq!(
            proof_nodes,
            Bytes::from([node(0xf0), node(0xf1), node(1), node(2), node(3)].concat())
        );
        let restored = CompressedProofs::decompress(&proof_nodes, &slot_proofs).unwrap();
        for (i, proof) in restored.iter().enumerate() {
            assert_eq!(proof[..], slot_proof(U256::from(i + 1)).slot_proof[..]);
        }
        assert_eq!(data.sig_datas.len(), 3);
        assert_eq!(data.sig_datas[2], facts::storage_slot(U256::from(3), BLOCK));
    }

    #[tokio::test]
    async fn multi_slot_mismatch_fails_batch() {
        let client = client(api(), MockChainProvider::new());
        let err = client
            .multi_storage_slot_prover()
            .proof_data(params(&[1, 2], vec![Some(U256::from(10)), Some(U256::from(99))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelicError::SlotValueMismatch { value, expected }
                if value == U256::from(20) && expected == U256::from(99)
        ));
    }

    #[tokio::test]
    async fn multi_slot_expected_must_match_slot_count() {
        let client = client(api(), MockChainProvider::new());
        let err = client
            .multi_storage_slot_prover()
            .proof_data(params(&[1, 2], vec![Some(U256::from(10))]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelicError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn cached_multi_slot_rejects_header() {
        let client = client(api(), MockChainProvider::new());
        let prover = client.cached_multi_storage_slot_prover();
        let err = prover.proof_data(params(&[1], vec![])).await.unwrap_err();
        assert!(matches!(err, RelicError::InvalidArgument(_)));

        let data = prover
            .proof_data(MultiStorageSlotParams {
                include_header: false,
                ..params(&[1, 2], vec![])
            })
            .await
            .unwrap();
        let (_, block_num, storage_hash, ..) =
            <(Address, U256, U256, Bytes, Vec<U256>, Bytes)>::abi_decode_params(&data.proof, true)
                .unwrap();
        assert_eq!(block_num, U256::from(BLOCK));
        assert_eq!(storage_hash, U256::from_be_bytes([0x5a; 32]));
    }
}
