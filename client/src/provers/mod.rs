//! One prover per fact type.
//!
//! Every prover turns API proofs into the calldata its on-chain verifier
//! expects (`proof`) plus the signature data naming the fact
//! (`sig_data`). `prove` wraps the calldata in a transaction to the
//! verifier's generic entrypoint, paying the reliquary fee, and
//! `prove_ephemeral` routes the same proof through the ephemeral-facts
//! relay to a receiver contract instead of storing it.

#![allow(async_fn_in_trait)]

use alloy::primitives::{Address, Bytes, U256};

use crate::contracts::{IBatchProver, IEphemeralFacts, IProver, PopulatedTransaction};
use crate::error::Result;

mod account;
mod attendance;
mod block;
mod log;
mod storage;
mod transaction;

pub use account::{
    AccountInfoParams, AccountInfoProver, AccountStorageProver, BirthCertificateProver, InfoType,
};
pub use attendance::{AttendanceParams, AttendanceProver};
pub use block::{BlockHeaderProver, WithdrawalParams, WithdrawalProver};
pub use log::{LogParams, LogProver};
pub use storage::{
    CachedMultiStorageSlotProver, CachedStorageSlotProver, MultiStorageSlotParams,
    MultiStorageSlotProver, StorageSlotParams, StorageSlotProver,
};
pub use transaction::{TransactionParams, TransactionProver};

/// Calldata and signature data for a single fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofData {
    pub proof: Bytes,
    pub sig_data: Bytes,
}

/// Calldata and signature data for a batch of facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProofData {
    pub proof: Bytes,
    pub sig_datas: Vec<Bytes>,
}

/// Delivery target for an ephemeral fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverContext {
    pub initiator: Address,
    pub receiver: Address,
    /// Defaults to the fact's signature data, which is what the receiver
    /// SDK contracts decode.
    pub extra: Option<Bytes>,
    pub gas_limit: U256,
}

impl ReceiverContext {
    fn into_abi(self, sig_data: Bytes) -> IEphemeralFacts::ReceiverContext {
        IEphemeralFacts::ReceiverContext {
            initiator: self.initiator,
            receiver: self.receiver,
            extra: self.extra.unwrap_or(sig_data),
            gasLimit: self.gas_limit,
        }
    }
}

/// A verifier contract registered with the reliquary.
pub trait ProverContract {
    fn address(&self) -> Address;

    /// The native fee required by `prove`.
    async fn fee(&self) -> Result<U256>;
}

pub trait Prover: ProverContract {
    type Params;

    async fn proof_data(&self, params: Self::Params) -> Result<ProofData>;

    async fn prove(&self, params: Self::Params) -> Result<PopulatedTransaction> {
        let ProofData { proof, .. } = self.proof_data(params).await?;
        let fee = self.fee().await?;
        Ok(PopulatedTransaction::new(self.address(), &IProver::proveCall { proof, store: true })
            .with_value(fee))
    }
}

pub trait EphemeralProver: Prover {
    fn ephemeral_facts(&self) -> Address;

    async fn prove_ephemeral(
        &self,
        context: ReceiverContext,
        params: Self::Params,
    ) -> Result<PopulatedTransaction> {
        let ProofData { proof, sig_data } = self.proof_data(params).await?;
        let fee = self.fee().await?;
        let call = IEphemeralFacts::proveEphemeralCall {
            context: context.into_abi(sig_data),
            prover: self.address(),
            proof,
        };
        Ok(PopulatedTransaction::new(self.ephemeral_facts(), &call).with_value(fee))
    }
}

pub trait BatchProver: ProverContract {
    type Params;

    async fn proof_data(&self, params: Self::Params) -> Result<BatchProofData>;

    async fn prove(&self, params: Self::Params) -> Result<PopulatedTransaction> {
        let BatchProofData { proof, .. } = self.proof_data(params).await?;
        let fee = self.fee().await?;
        Ok(
            PopulatedTransaction::new(self.address(), &IBatchProver::proveBatchCall { proof, store: true })
                .with_value(fee),
        )
    }
}

/// Declares a prover handle borrowing the client, registered under
/// `$field` of the address table.
macro_rules! prover_contract {
    ($(#[$meta:meta])* $name:ident, $field:ident) => {
        $(#[$meta])*
        pub struct $name<'a, P, A> {
            client: &'a $crate::client::RelicClient<P, A>,
        }

        impl<'a, P, A> $name<'a, P, A> {
            pub fn new(client: &'a $crate::client::RelicClient<P, A>) -> Self {
                Self { client }
            }
        }

        impl<P, A> $crate::provers::ProverContract for $name<'_, P, A>
        where
            P: $crate::provider::ChainProvider + Send + Sync,
            A: $crate::api::ProofApi + Send + Sync,
        {
            fn address(&self) -> alloy::primitives::Address {
                self.client.addresses().$field
            }

            async fn fee(&self) -> $crate::error::Result<alloy::primitives::U256> {
                self.client.reliquary().fee(self.address()).await
            }
        }
    };
}

/// Adds ephemeral delivery to a prover declared with `prover_contract!`.
macro_rules! ephemeral_prover {
    ($name:ident) => {
        impl<P, A> $crate::provers::EphemeralProver for $name<'_, P, A>
        where
            P: $crate::provider::ChainProvider + Send + Sync,
            A: $crate::api::ProofApi + Send + Sync,
        {
            fn ephemeral_facts(&self) -> alloy::primitives::Address {
                self.client.addresses().ephemeral_facts
            }
        }
    };
}

pub(crate) use {ephemeral_prover, prover_contract};
