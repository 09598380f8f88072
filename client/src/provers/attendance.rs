use alloy::primitives::{Address, U256};

use crate::api::ProofApi;
use crate::client::RelicClient;
use crate::contracts::{IAttendanceProver, PopulatedTransaction};
use crate::error::{RelicError, Result};
use crate::provider::ChainProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceParams {
    pub account: Address,
    pub event_id: U256,
    /// Claim code handed out at the event.
    pub code: String,
}

/// Claims an event attendance. Unlike the other provers this submits a
/// signed claim directly, without a reliquary fee or ephemeral delivery.
pub struct AttendanceProver<'a, P, A> {
    client: &'a RelicClient<P, A>,
}

impl<'a, P, A> AttendanceProver<'a, P, A>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    pub fn new(client: &'a RelicClient<P, A>) -> Self {
        Self { client }
    }

    pub fn address(&self) -> Address {
        self.client.addresses().attendance_prover
    }

    pub async fn prove(&self, params: AttendanceParams) -> Result<PopulatedTransaction> {
        let proof = self
            .client
            .api()?
            .attendance_proof(params.account, params.event_id, params.code)
            .await?;
        let event_id = proof.event_id.parse::<u64>().map_err(|_| {
            RelicError::InvalidArgument(format!("invalid event id {}", proof.event_id))
        })?;
        let number = u64::try_from(proof.number)
            .map_err(|_| RelicError::InvalidArgument(format!("invalid claim number {}", proof.number)))?;
        Ok(PopulatedTransaction::new(
            self.address(),
            &IAttendanceProver::claimCall {
                account: proof.account,
                eventId: event_id,
                number,
                signatureInner: proof.signature_inner,
                signatureOuter: proof.signature_outer,
            },
        ))
    }
}
