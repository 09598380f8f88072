//! Relays L1 block hashes to an L2 block history through the L1 messenger.
//!
//! The messenger forwards `importTrustedHash(number, hash)` to the L2 block
//! history. Each rollup family prices that message differently; the
//! resulting `params` and `value` are what `sendBlockHash` expects.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolCall;
use futures::try_join;
use relic_common::network::{is_l1, rollup_family, RollupFamily};
use tracing::info;

use crate::api::ProofApi;
use crate::client::RelicClient;
use crate::contracts::{IBlockHashMessenger, IBlockHistory, PopulatedTransaction};
use crate::error::{RelicError, Result};
use crate::provider::ChainProvider;

mod optimism;
mod zksync;

/// Rollup-specific part of a `sendBlockHash` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerParams {
    pub value: U256,
    pub params: Bytes,
}

pub struct Bridge<'a, P, A> {
    client: &'a RelicClient<P, A>,
    family: RollupFamily,
}

impl<'a, P, A> Bridge<'a, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    /// Fails with `NoBridger` unless the client is an L2 deployment proving
    /// its L1.
    pub fn new(client: &'a RelicClient<P, A>) -> Result<Self> {
        let no_bridger = || RelicError::NoBridger {
            chain_id: client.chain_id(),
            data_chain_id: client.data_chain_id(),
        };
        if !is_l1(client.data_chain_id()) {
            return Err(no_bridger());
        }
        let family = rollup_family(client.chain_id()).ok_or_else(no_bridger)?;
        Ok(Self { client, family })
    }

    pub fn family(&self) -> RollupFamily {
        self.family
    }

    /// The message that imports `(number, hash)` into the L2 block history.
    fn import_call(&self, number: u64, hash: B256) -> Result<(Address, Bytes)> {
        let call = IBlockHistory::importTrustedHashCall {
            number: U256::from(number),
            hash,
        };
        Ok((self.client.block_history()?.address(), call.abi_encode().into()))
    }

    async fn params(&self, number: u64, hash: B256) -> Result<MessengerParams> {
        let (target, calldata) = self.import_call(number, hash)?;
        let messenger = self.client.addresses().messenger;
        match self.family {
            RollupFamily::Optimism => {
                optimism::params(self.client.provider(), messenger, target, calldata).await
            }
            RollupFamily::ZkSync => {
                zksync::params(
                    self.client.provider(),
                    self.client.data_provider(),
                    messenger,
                    target,
                    calldata,
                )
                .await
            }
        }
    }

    /// Populates the L1 messenger transaction relaying `block`. Fails with
    /// `BridgeNotNecessary` if the block is already verifiable, unless
    /// `force` is set.
    pub async fn send_block(&self, block: BlockId, force: bool) -> Result<PopulatedTransaction> {
        let header = self.client.data_provider().block_header(block).await?;
        let number = BlockId::number(header.number);
        if !force && self.client.block_history()?.can_verify_block(number).await? {
            return Err(RelicError::BridgeNotNecessary(header.number.to_string()));
        }

        // the block is not verifiable yet, so the proof must skip the gateway
        let (proof, MessengerParams { value, params }) = try_join!(
            self.client.raw_api().block_proof(number),
            self.params(header.number, header.hash),
        )?;
        info!(
            block = header.number,
            hash = %header.hash,
            family = ?self.family,
            %value,
            "populated block hash relay"
        );
        let call = IBlockHashMessenger::sendBlockHashCall {
            destination: self.client.block_history()?.address(),
            params,
            number: U256::from(header.number),
            blockHash: header.hash,
            proof: proof.block_proof,
        };
        Ok(PopulatedTransaction::new(self.client.addresses().messenger, &call).with_value(value))
    }

    /// Resolves once `block` has been imported on the L2.
    pub async fn wait_until_bridged(&self, block: BlockId) -> Result<()> {
        self.client.block_history()?.wait_until_verifiable(block).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use alloy::rpc::types::BlockNumberOrTag;

    use super::*;
    use crate::api::MockProofApi;
    use crate::client::tests::{addresses, context};
    use crate::provers::tests::block_proof;
    use crate::provider::{BlockHeader, MockChainProvider};

    pub(crate) const BLOCK: u64 = 18_000_000;
    pub(crate) const HASH: B256 = B256::repeat_byte(0x42);

    /// The L1 side: serves the header of any numbered block.
    pub(crate) fn l1_provider() -> MockChainProvider {
        let mut provider = MockChainProvider::new();
        provider.expect_block_header().returning(|id| {
            let number = match id {
                BlockId::Number(BlockNumberOrTag::Number(n)) => n,
                _ => BLOCK,
            };
            Box::pin(async move {
                Ok(BlockHeader {
                    number,
                    hash: HASH,
                    timestamp: 1_700_000_000,
                    state_root: B256::ZERO,
                })
            })
        });
        provider
    }

    /// The L2 side: no imported roots, and `validBlockHash` answers `trusted`.
    pub(crate) fn l2_provider(trusted: bool) -> MockChainProvider {
        let mut provider = MockChainProvider::new();
        provider
            .expect_logs()
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        provider.expect_call().returning(move |_| {
            let out = IBlockHistory::validBlockHashCall::abi_encode_returns(&(trusted,));
            Box::pin(async move { Ok(Some(Bytes::from(out))) })
        });
        provider
    }

    pub(crate) fn api() -> MockProofApi {
        let mut api = MockProofApi::new();
        api.expect_block_proof().returning(|id| {
            assert_eq!(id, BlockId::number(BLOCK));
            Box::pin(async { Ok(block_proof(BLOCK)) })
        });
        api
    }

    fn client(
        provider: MockChainProvider,
        data_provider: MockChainProvider,
        chain_id: u64,
        data_chain_id: u64,
    ) -> RelicClient<MockChainProvider, MockProofApi> {
        RelicClient::from_context(
            context(provider, data_provider, chain_id, data_chain_id),
            Arc::new(api()),
        )
    }

    #[test]
    fn bridges_need_an_l2_over_l1() {
        let bridge = |chain_id, data_chain_id| {
            let client = client(
                MockChainProvider::new(),
                MockChainProvider::new(),
                chain_id,
                data_chain_id,
            );
            Bridge::new(&client).map(|bridge| bridge.family())
        };
        assert_eq!(bridge(10, 1).unwrap(), RollupFamily::Optimism);
        assert_eq!(bridge(84532, 11155111).unwrap(), RollupFamily::Optimism);
        assert_eq!(bridge(324, 1).unwrap(), RollupFamily::ZkSync);
        assert!(matches!(
            bridge(1, 1),
            Err(RelicError::NoBridger { chain_id: 1, data_chain_id: 1 })
        ));
        assert!(matches!(bridge(8453, 8453), Err(RelicError::NoBridger { .. })));
    }

    #[tokio::test]
    async fn verifiable_block_is_not_sent() {
        let client = client(l2_provider(true), l1_provider(), 10, 1);
        let err = client
            .bridge()
            .unwrap()
            .send_block(BlockId::number(BLOCK), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RelicError::BridgeNotNecessary(ref block) if block == "18000000"));
    }

    #[tokio::test]
    async fn forced_send_skips_the_check() {
        let mut provider = MockChainProvider::new();
        provider.expect_logs().never();
        provider.expect_call().never();
        provider
            .expect_estimate_gas()
            .returning(|_| Box::pin(async { Ok(90_000) }));
        let client = client(provider, l1_provider(), 10, 1);

        let tx = client
            .bridge()
            .unwrap()
            .send_block(BlockId::number(BLOCK), true)
            .await
            .unwrap();
        assert_eq!(tx.to, addresses().messenger);
        let call = IBlockHashMessenger::sendBlockHashCall::abi_decode(&tx.data, true).unwrap();
        assert_eq!(call.destination, addresses().block_history);
        assert_eq!(call.blockHash, HASH);
        assert_eq!(call.proof, block_proof(BLOCK).block_proof);
    }
}
