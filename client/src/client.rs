//! Entry point tying the providers, the proof API and the deployed
//! contracts together.

use std::sync::Arc;

use futures::try_join;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::api::{ProofApi, ProofGateway, RelicApi};
use crate::block_history::output_root::import_blockhash_from_output_root;
use crate::block_history::BlockHistory;
use crate::bridges::Bridge;
use crate::config::{resolve_api_url, ConfigOverride, RelicAddresses};
use crate::contracts::PopulatedTransaction;
use crate::error::{RelicError, Result};
use crate::provers::{
    AccountInfoProver, AccountStorageProver, AttendanceProver, BirthCertificateProver,
    BlockHeaderProver, CachedMultiStorageSlotProver, CachedStorageSlotProver, LogProver,
    MultiStorageSlotProver, StorageSlotProver, TransactionProver, WithdrawalProver,
};
use crate::provider::ChainProvider;
use crate::reliquary::Reliquary;

/// Resolved configuration shared by everything derived from one client.
///
/// `provider` talks to the chain where proofs are verified, `data_provider`
/// to the chain whose history is proven. They are the same chain except on
/// L2 deployments proving their L1.
#[derive(Debug)]
pub struct ClientContext<P> {
    pub provider: Arc<P>,
    pub data_provider: Arc<P>,
    pub chain_id: u64,
    pub data_chain_id: u64,
    pub addresses: RelicAddresses,
}

pub struct RelicClient<P, A = RelicApi> {
    ctx: Arc<ClientContext<P>>,
    api: Arc<A>,
    block_history: OnceCell<Arc<BlockHistory<P>>>,
    gateway: OnceCell<ProofGateway<A, P>>,
}

impl<P> RelicClient<P, RelicApi>
where
    P: ChainProvider + Send + Sync,
{
    /// Connects a client verifying on `provider`'s chain facts about
    /// `data_provider`'s chain. Missing configuration is filled in from the
    /// default API table and the API's address listing.
    pub async fn from_providers(
        provider: Arc<P>,
        data_provider: Arc<P>,
        config: ConfigOverride,
    ) -> Result<Self> {
        let (chain_id, data_chain_id) = try_join!(provider.chain_id(), data_provider.chain_id())?;
        let api_url = resolve_api_url(chain_id, data_chain_id, config.api_url.as_deref())?;
        let api = RelicApi::new(api_url);
        let addresses = match config.addresses {
            Some(addresses) => addresses,
            None => api.addresses(chain_id).await?,
        };
        info!(
            chain_id,
            data_chain_id,
            api_url = api.base_url(),
            "relic client connected"
        );

        let ctx = ClientContext {
            provider,
            data_provider,
            chain_id,
            data_chain_id,
            addresses,
        };
        Ok(Self::from_context(Arc::new(ctx), Arc::new(api)))
    }

    /// A client proving facts about the chain it verifies on.
    pub async fn from_provider(provider: Arc<P>, config: ConfigOverride) -> Result<Self> {
        Self::from_providers(provider.clone(), provider, config).await
    }
}

impl<P, A> RelicClient<P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    pub fn from_context(ctx: Arc<ClientContext<P>>, api: Arc<A>) -> Self {
        Self {
            ctx,
            api,
            block_history: OnceCell::new(),
            gateway: OnceCell::new(),
        }
    }

    pub fn ctx(&self) -> &Arc<ClientContext<P>> {
        &self.ctx
    }

    pub fn provider(&self) -> &P {
        &self.ctx.provider
    }

    pub fn data_provider(&self) -> &P {
        &self.ctx.data_provider
    }

    pub fn chain_id(&self) -> u64 {
        self.ctx.chain_id
    }

    pub fn data_chain_id(&self) -> u64 {
        self.ctx.data_chain_id
    }

    pub fn addresses(&self) -> &RelicAddresses {
        &self.ctx.addresses
    }

    /// The proof API without block-history verification.
    pub fn raw_api(&self) -> &A {
        &self.api
    }

    /// The proof API. On cross-chain deployments every block-anchored
    /// response is checked against the block history first.
    pub fn api(&self) -> Result<&ProofGateway<A, P>> {
        self.gateway.get_or_try_init(|| {
            let verifier = if self.ctx.chain_id != self.ctx.data_chain_id {
                Some(self.block_history()?.clone())
            } else {
                None
            };
            Ok::<_, RelicError>(ProofGateway::new(self.api.clone(), verifier))
        })
    }

    pub fn block_history(&self) -> Result<&Arc<BlockHistory<P>>> {
        self.block_history
            .get_or_try_init(|| BlockHistory::new(self.ctx.clone()).map(Arc::new))
    }

    pub fn reliquary(&self) -> Reliquary<'_, P> {
        Reliquary::new(self.provider(), self.ctx.addresses.reliquary)
    }

    /// Bridge relaying L1 block hashes to this L2 deployment.
    pub fn bridge(&self) -> Result<Bridge<'_, P, A>> {
        Bridge::new(self)
    }

    /// Populates `importCheckpointBlockFromL1` on a native OP-stack
    /// deployment. The output root is proven on L1 through a proxy client
    /// verifying on this chain with `l1_provider` as its data chain.
    pub async fn import_blockhash_from_output_root(
        &self,
        l2_block: u64,
        l1_provider: Arc<P>,
        proxy_config: ConfigOverride,
    ) -> Result<PopulatedTransaction> {
        let proxy =
            RelicClient::from_providers(self.ctx.provider.clone(), l1_provider, proxy_config)
                .await?;
        import_blockhash_from_output_root(self.block_history()?, l2_block, &proxy).await
    }

    pub fn account_info_prover(&self) -> AccountInfoProver<'_, P, A> {
        AccountInfoProver::new(self)
    }

    pub fn account_storage_prover(&self) -> AccountStorageProver<'_, P, A> {
        AccountStorageProver::new(self)
    }

    pub fn attendance_prover(&self) -> AttendanceProver<'_, P, A> {
        AttendanceProver::new(self)
    }

    pub fn birth_certificate_prover(&self) -> BirthCertificateProver<'_, P, A> {
        BirthCertificateProver::new(self)
    }

    pub fn block_header_prover(&self) -> BlockHeaderProver<'_, P, A> {
        BlockHeaderProver::new(self)
    }

    pub fn cached_multi_storage_slot_prover(&self) -> CachedMultiStorageSlotProver<'_, P, A> {
        CachedMultiStorageSlotProver::new(self)
    }

    pub fn cached_storage_slot_prover(&self) -> CachedStorageSlotProver<'_, P, A> {
        CachedStorageSlotProver::new(self)
    }

    pub fn log_prover(&self) -> LogProver<'_, P, A> {
        LogProver::new(self)
    }

    pub fn multi_storage_slot_prover(&self) -> MultiStorageSlotProver<'_, P, A> {
        MultiStorageSlotProver::new(self)
    }

    pub fn storage_slot_prover(&self) -> StorageSlotProver<'_, P, A> {
        StorageSlotProver::new(self)
    }

    pub fn transaction_prover(&self) -> TransactionProver<'_, P, A> {
        TransactionProver::new(self)
    }

    pub fn withdrawal_prover(&self) -> WithdrawalProver<'_, P, A> {
        WithdrawalProver::new(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use alloy::primitives::Address;

    use super::*;
    use crate::provider::MockChainProvider;

    /// A distinct address per contract, with no legacy block history.
    pub(crate) fn addresses() -> RelicAddresses {
        RelicAddresses {
            reliquary: Address::repeat_byte(0x01),
            block_history: Address::repeat_byte(0x02),
            legacy_block_history: None,
            messenger: Address::repeat_byte(0x03),
            ephemeral_facts: Address::repeat_byte(0x04),
            account_info_prover: Address::repeat_byte(0x10),
            account_storage_prover: Address::repeat_byte(0x11),
            attendance_prover: Address::repeat_byte(0x12),
            birth_certificate_prover: Address::repeat_byte(0x13),
            block_header_prover: Address::repeat_byte(0x14),
            cached_multi_storage_slot_prover: Address::repeat_byte(0x15),
            cached_storage_slot_prover: Address::repeat_byte(0x16),
            log_prover: Address::repeat_byte(0x17),
            multi_storage_slot_prover: Address::repeat_byte(0x18),
            storage_slot_prover: Address::repeat_byte(0x19),
            transaction_prover: Address::repeat_byte(0x1a),
            withdrawal_prover: Address::repeat_byte(0x1b),
        }
    }

    pub(crate) fn context(
        provider: MockChainProvider,
        data_provider: MockChainProvider,
        chain_id: u64,
        data_chain_id: u64,
    ) -> Arc<ClientContext<MockChainProvider>> {
        context_with(provider, data_provider, chain_id, data_chain_id, addresses())
    }

    pub(crate) fn context_with(
        provider: MockChainProvider,
        data_provider: MockChainProvider,
        chain_id: u64,
        data_chain_id: u64,
        addresses: RelicAddresses,
    ) -> Arc<ClientContext<MockChainProvider>> {
        Arc::new(ClientContext {
            provider: Arc::new(provider),
            data_provider: Arc::new(data_provider),
            chain_id,
            data_chain_id,
            addresses,
        })
    }

    fn on_chain(chain_id: u64) -> Arc<MockChainProvider> {
        let mut provider = MockChainProvider::new();
        provider
            .expect_chain_id()
            .returning(move || Box::pin(async move { Ok(chain_id) }));
        Arc::new(provider)
    }

    fn with_addresses() -> ConfigOverride {
        ConfigOverride {
            api_url: Some("http://localhost:8000/v1/".into()),
            addresses: Some(addresses()),
        }
    }

    #[tokio::test]
    async fn proxy_deployment_verifies_responses() {
        let client = RelicClient::from_providers(on_chain(10), on_chain(1), with_addresses())
            .await
            .unwrap();
        assert_eq!((client.chain_id(), client.data_chain_id()), (10, 1));
        assert_eq!(client.raw_api().base_url(), "http://localhost:8000/v1");
        assert!(client.api().unwrap().is_verifying());
        assert_eq!(client.block_history().unwrap().address(), addresses().block_history);
    }

    #[tokio::test]
    async fn l1_deployment_passes_responses_through() {
        let client = RelicClient::from_provider(on_chain(1), with_addresses())
            .await
            .unwrap();
        assert!(!client.api().unwrap().is_verifying());
        assert_eq!(client.reliquary().address(), addresses().reliquary);
    }

    #[tokio::test]
    async fn unknown_chain_is_unsupported() {
        let err = RelicClient::from_providers(on_chain(137), on_chain(1), ConfigOverride::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelicError::UnsupportedNetwork(137)));
    }

    #[test]
    fn block_history_is_memoized() {
        let client = RelicClient::from_context(
            context(MockChainProvider::new(), MockChainProvider::new(), 1, 1),
            Arc::new(crate::api::MockProofApi::new()),
        );
        let first = client.block_history().unwrap().clone();
        assert!(Arc::ptr_eq(&first, client.block_history().unwrap()));
    }

    #[test]
    fn commits_only_on_native_l2() {
        let native = RelicClient::from_context(
            context(MockChainProvider::new(), MockChainProvider::new(), 8453, 8453),
            Arc::new(crate::api::MockProofApi::new()),
        );
        let tx = native.block_history().unwrap().commit_recent(100).unwrap();
        assert_eq!(tx.to, addresses().block_history);
        assert!(native
            .block_history()
            .unwrap()
            .commit_current_l1_block_hash()
            .is_ok());

        let l1 = RelicClient::from_context(
            context(MockChainProvider::new(), MockChainProvider::new(), 1, 1),
            Arc::new(crate::api::MockProofApi::new()),
        );
        assert!(matches!(
            l1.block_history().unwrap().commit_recent(100),
            Err(RelicError::NotNativeL2 { chain_id: 1, data_chain_id: 1 })
        ));
    }
}
