use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolEvent;
use anyhow::Context;
use futures::try_join;
use parking_lot::Mutex;
use relic_common::{block_number_to_chunk, chunk_last_block};
use tracing::{debug, trace};

use super::commitments::Commitments;
use super::{first_word, max_or_unset, number_topic, topic_to_u64, wait_for, HistoryAbi, Verifiability};
use crate::client::ClientContext;
use crate::contracts::IBlockHistory;
use crate::error::{RelicError, Result};
use crate::proof::BlockProof;
use crate::provider::{ChainLog, ChainProvider, LogQuery};

/// Block history that imports one Merkle root per chunk of 8192 blocks.
pub struct LegacyBlockHistory<P> {
    ctx: Arc<ClientContext<P>>,
    address: Address,
    commitments: Commitments,
    merkle_roots: Mutex<HashMap<u64, B256>>,
}

impl<P> LegacyBlockHistory<P>
where
    P: ChainProvider + Send + Sync,
{
    pub fn new(ctx: Arc<ClientContext<P>>, address: Address) -> Self {
        let abi = HistoryAbi::for_chains(ctx.chain_id, ctx.data_chain_id);
        let commitments = Commitments::new(address, ctx.addresses.reliquary, abi);
        Self {
            ctx,
            address,
            commitments,
            merkle_roots: Mutex::new(HashMap::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn ctx(&self) -> &ClientContext<P> {
        &self.ctx
    }

    fn cached_root(&self, chunk: u64) -> Option<B256> {
        self.merkle_roots.lock().get(&chunk).copied()
    }

    /// Merkle root imported for the chunk containing `block_num`.
    pub async fn merkle_root_for_block(&self, block_num: u64) -> Result<Option<B256>> {
        let chunk = block_number_to_chunk(block_num);
        if let Some(root) = self.cached_root(chunk) {
            trace!(chunk, "merkle root cache hit");
            return Ok(Some(root));
        }

        // roots are only imported once their chunk is complete
        let query = LogQuery::new(self.address, vec![IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH])
            .topic1(number_topic(chunk))
            .from_block(block_num);
        let logs = self.ctx.provider.logs(query).await?;
        let Some(log) = logs.last() else {
            debug!(chunk, block_num, "no merkle root imported");
            return Ok(None);
        };
        let root = first_word(log)?;
        self.merkle_roots.lock().insert(chunk, root);
        debug!(chunk, %root, "merkle root imported");
        Ok(Some(root))
    }

    pub async fn verifiability(&self, block: BlockId) -> Result<Verifiability> {
        let header = self.ctx.data_provider.block_header(block).await?;
        if let Some(root) = self.cached_root(block_number_to_chunk(header.number)) {
            return Ok(Verifiability::ImportedRoot(root));
        }
        if let Some(kind) = self.commitments.cached(header.number, header.hash) {
            return Ok(Verifiability::Committed(kind));
        }

        let (root, committed) = try_join!(
            self.merkle_root_for_block(header.number),
            self.commitments
                .check(self.ctx.provider.as_ref(), header.number, header.hash),
        )?;
        Ok(match (root, committed) {
            (Some(root), _) => Verifiability::ImportedRoot(root),
            (None, Some(kind)) => Verifiability::Committed(kind),
            (None, None) => Verifiability::Unverifiable,
        })
    }

    pub async fn ensure_valid_proof(&self, proof: &mut BlockProof) -> Result<()> {
        let number = proof.block_num;
        if self.merkle_root_for_block(number).await?.is_some() {
            return Ok(());
        }
        let hash = proof.block_hash();
        match self
            .commitments
            .check(self.ctx.provider.as_ref(), number, hash)
            .await?
        {
            Some(kind) => {
                proof.block_proof = kind.proof_bytes();
                Ok(())
            }
            None => Err(RelicError::BlockNotVerifiable {
                block: number,
                chain_id: self.ctx.chain_id,
            }),
        }
    }

    /// Last block of the most recently imported chunk, or -1.
    pub async fn last_merkle_root_block(&self) -> Result<i64> {
        let logs = self
            .ctx
            .provider
            .logs(LogQuery::new(
                self.address,
                vec![IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH],
            ))
            .await?;
        let blocks = logs
            .iter()
            .map(|log| -> Result<u64> {
                let chunk = topic_to_u64(log.topics.get(1))?;
                Ok(chunk_last_block(chunk)
                    .with_context(|| format!("merkle root chunk {chunk} overflows u64"))?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(max_or_unset(blocks))
    }

    pub async fn last_verifiable_block(&self) -> Result<i64> {
        let provider = self.ctx.provider.as_ref();
        let (root, trusted, precommitted) = try_join!(
            self.last_merkle_root_block(),
            self.commitments.last_trusted(provider),
            self.commitments.last_precommitted(provider),
        )?;
        Ok(root.max(trusted).max(precommitted))
    }

    fn relevant(&self, log: &ChainLog, number: u64) -> bool {
        match log.topics.first() {
            Some(&sig) if sig == IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH => {
                log.topics.get(1) == Some(&number_topic(block_number_to_chunk(number)))
            }
            _ => self.commitments.commits(log, number),
        }
    }

    pub async fn wait_until_verifiable(&self, block: BlockId) -> Result<()> {
        let header = self.ctx.data_provider.block_header(block).await?;
        let mut events = vec![IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH];
        events.extend(self.commitments.events());
        debug!(number = header.number, "waiting for block to become verifiable");
        wait_for(
            self.ctx.provider.as_ref(),
            LogQuery::new(self.address, events),
            |log| self.relevant(log, header.number),
            || async {
                Ok(self
                    .verifiability(BlockId::number(header.number))
                    .await?
                    .is_verifiable())
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Bytes, U256};
    use alloy::rpc::types::BlockNumberOrTag;
    use alloy::sol_types::{SolCall, SolValue};

    use super::*;
    use crate::client::tests::{addresses, context};
    use crate::proof::{tests::header_rlp, TRUSTED_HASH_PROOF};
    use crate::provider::{BlockHeader, MockChainProvider};

    const ROOT: B256 = B256::repeat_byte(0x11);

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            number,
            hash: B256::with_last_byte(0x42),
            timestamp: 1_700_000_000,
            state_root: B256::ZERO,
        }
    }

    fn root_log(chunk: u64, root: B256) -> ChainLog {
        ChainLog {
            block_number: Some(15_010_000),
            topics: vec![
                IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH,
                number_topic(chunk),
            ],
            data: root.abi_encode().into(),
        }
    }

    fn data_provider() -> MockChainProvider {
        let mut provider = MockChainProvider::new();
        provider.expect_block_header().returning(|id| {
            let number = match id {
                BlockId::Number(BlockNumberOrTag::Number(n)) => n,
                _ => 15_000_000,
            };
            Box::pin(async move { Ok(header(number)) })
        });
        provider
    }

    fn valid_block_hash_output(valid: bool) -> Bytes {
        IBlockHistory::validBlockHashCall::abi_encode_returns(&(valid,)).into()
    }

    #[tokio::test]
    async fn merkle_root_scans_from_block() {
        let mut provider = MockChainProvider::new();
        provider.expect_logs().times(1).returning(|query| {
            assert_eq!(query.topic1, Some(number_topic(1831)));
            assert_eq!(query.from_block, 15_000_000);
            assert_eq!(query.events, vec![IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH]);
            Box::pin(async { Ok(vec![root_log(1831, ROOT)]) })
        });
        let history = LegacyBlockHistory::new(context(provider, data_provider(), 1, 1), addresses().block_history);

        assert_eq!(history.merkle_root_for_block(15_000_000).await.unwrap(), Some(ROOT));
        // cached for every block of the chunk
        assert_eq!(history.merkle_root_for_block(15_000_001).await.unwrap(), Some(ROOT));
    }

    #[tokio::test]
    async fn can_verify_is_cached_once_true() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .times(1)
            .returning(|_| Box::pin(async { Ok(vec![root_log(1831, ROOT)]) }));
        // proxy deployment: the trusted check runs alongside the log scan once
        provider
            .expect_call()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(valid_block_hash_output(false))) }));
        let history =
            LegacyBlockHistory::new(context(provider, data_provider(), 10, 1), addresses().block_history);

        let block = BlockId::number(15_000_000);
        assert_eq!(
            history.verifiability(block).await.unwrap(),
            Verifiability::ImportedRoot(ROOT)
        );
        assert!(history.verifiability(block).await.unwrap().is_verifiable());
    }

    #[tokio::test]
    async fn trusted_hash_rewrites_proof() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        provider.expect_call().times(1).returning(|request| {
            assert_eq!(request.from, Some(addresses().reliquary));
            let call = IBlockHistory::validBlockHashCall::abi_decode(&request.input, true).unwrap();
            assert_eq!(call.proof.as_ref(), TRUSTED_HASH_PROOF);
            assert_eq!(call.num, U256::from(15_000_000));
            Box::pin(async { Ok(Some(valid_block_hash_output(true))) })
        });
        let history =
            LegacyBlockHistory::new(context(provider, data_provider(), 10, 1), addresses().block_history);

        let mut proof = BlockProof {
            block_num: 15_000_000,
            header: header_rlp(15_000_000, 1_700_000_000),
            block_proof: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        };
        history.ensure_valid_proof(&mut proof).await.unwrap();
        assert_eq!(proof.block_proof.as_ref(), TRUSTED_HASH_PROOF);

        // second pass hits the cache and yields the same bytes
        history.ensure_valid_proof(&mut proof).await.unwrap();
        assert_eq!(proof.block_proof.as_ref(), TRUSTED_HASH_PROOF);
    }

    #[tokio::test]
    async fn imported_root_keeps_proof() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .returning(|_| Box::pin(async { Ok(vec![root_log(1831, ROOT)]) }));
        provider.expect_call().never();
        let history =
            LegacyBlockHistory::new(context(provider, data_provider(), 10, 1), addresses().block_history);

        let original = Bytes::from(vec![0xde, 0xad]);
        let mut proof = BlockProof {
            block_num: 15_000_000,
            header: header_rlp(15_000_000, 1_700_000_000),
            block_proof: original.clone(),
        };
        history.ensure_valid_proof(&mut proof).await.unwrap();
        assert_eq!(proof.block_proof, original);
    }

    #[tokio::test]
    async fn unverifiable_block_fails() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        provider.expect_call().never();
        // L1 deployment: no commitments to check
        let history = LegacyBlockHistory::new(context(provider, data_provider(), 1, 1), addresses().block_history);

        let mut proof = BlockProof {
            block_num: 15_000_000,
            header: header_rlp(15_000_000, 1_700_000_000),
            block_proof: Bytes::from(vec![0xde, 0xad]),
        };
        let err = history.ensure_valid_proof(&mut proof).await.unwrap_err();
        assert!(matches!(
            err,
            RelicError::BlockNotVerifiable { block: 15_000_000, chain_id: 1 }
        ));
        assert!(!history
            .verifiability(BlockId::number(15_000_000))
            .await
            .unwrap()
            .is_verifiable());
    }

    #[tokio::test]
    async fn last_verifiable_is_max_or_unset() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        let history = LegacyBlockHistory::new(
            context(provider, data_provider(), 8453, 8453),
            addresses().block_history,
        );
        assert_eq!(history.last_verifiable_block().await.unwrap(), -1);

        let mut provider = MockChainProvider::new();
        provider.expect_logs().returning(|query| {
            let sig = query.events[0];
            let logs = if sig == IBlockHistory::ImportMerkleRoot::SIGNATURE_HASH {
                vec![root_log(1830, ROOT), root_log(1831, ROOT)]
            } else if sig == IBlockHistory::PrecomittedBlock::SIGNATURE_HASH {
                vec![ChainLog {
                    block_number: Some(15_100_000),
                    topics: vec![sig, number_topic(15_090_000)],
                    data: B256::ZERO.abi_encode().into(),
                }]
            } else {
                vec![]
            };
            Box::pin(async move { Ok(logs) })
        });
        let history = LegacyBlockHistory::new(
            context(provider, data_provider(), 8453, 8453),
            addresses().block_history,
        );
        assert_eq!(history.last_merkle_root_block().await.unwrap(), 15_007_743);
        assert_eq!(history.last_verifiable_block().await.unwrap(), 15_090_000);
    }

    #[tokio::test]
    async fn oversized_chunk_topic_is_an_error() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .times(1)
            .returning(|_| Box::pin(async { Ok(vec![root_log(u64::MAX, ROOT)]) }));
        let history = LegacyBlockHistory::new(
            context(provider, data_provider(), 8453, 8453),
            addresses().block_history,
        );
        let err = history.last_merkle_root_block().await.unwrap_err();
        assert!(matches!(err, RelicError::Provider(_)));
    }

    #[tokio::test]
    async fn wait_subscribes_before_checking() {
        let mut provider = MockChainProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_watch_logs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let batches = vec![
                    vec![root_log(1, ROOT)],
                    vec![root_log(1831, ROOT)],
                ];
                Box::pin(async move { Ok(Box::pin(futures::stream::iter(batches)) as crate::provider::LogStream) })
            });
        // initial check misses, the matching event makes the re-check succeed
        provider
            .expect_logs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        provider
            .expect_logs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Box::pin(async { Ok(vec![root_log(1831, ROOT)]) }));
        let history = LegacyBlockHistory::new(context(provider, data_provider(), 1, 1), addresses().block_history);

        history
            .wait_until_verifiable(BlockId::number(15_000_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_early_when_already_verifiable() {
        let mut provider = MockChainProvider::new();
        provider.expect_watch_logs().times(1).returning(|_| {
            Box::pin(async { Ok(Box::pin(futures::stream::pending::<Vec<ChainLog>>()) as crate::provider::LogStream) })
        });
        provider
            .expect_logs()
            .times(1)
            .returning(|_| Box::pin(async { Ok(vec![root_log(1831, ROOT)]) }));
        let history = LegacyBlockHistory::new(context(provider, data_provider(), 1, 1), addresses().block_history);

        history
            .wait_until_verifiable(BlockId::number(15_000_000))
            .await
            .unwrap();
    }
}
