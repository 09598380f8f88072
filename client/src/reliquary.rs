use alloy::primitives::{Address, Bytes, B256, U256};
use tracing::debug;

use crate::contracts::{static_call, view, IReliquary};
use crate::error::{RelicError, Result};
use crate::provider::ChainProvider;

const FEE_NO_FEE_FLAG: u8 = 1;
const FEE_NATIVE_FLAG: u8 = 2;

/// A fact as stored by the reliquary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactData {
    pub exists: bool,
    pub version: u64,
    pub data: Bytes,
}

/// Read-only access to the reliquary's prover registry and fact store.
#[derive(Debug)]
pub struct Reliquary<'a, P> {
    provider: &'a P,
    address: Address,
}

impl<'a, P: ChainProvider> Reliquary<'a, P> {
    pub fn new(provider: &'a P, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The native fee charged for proving through `prover`.
    pub async fn fee(&self, prover: Address) -> Result<U256> {
        let info = view(self.provider, self.address, &IReliquary::proversCall { prover })
            .await?
            .feeInfo;
        let fee = native_fee(info.flags, info.feeWeiMantissa, info.feeWeiExponent)
            .ok_or(RelicError::NativeFeesUnsupported(prover))?;
        debug!(%prover, %fee, "prover fee");
        Ok(fee)
    }

    /// Reads a stored fact. The reliquary only serves this to the zero
    /// address, so the call is made from there.
    pub async fn get_fact(&self, account: Address, fact_sig: B256) -> Result<FactData> {
        let call = IReliquary::debugVerifyFactCall {
            account,
            factSig: fact_sig,
        };
        let ret = static_call(self.provider, self.address, Some(Address::ZERO), &call)
            .await?
            .ok_or(RelicError::CallReverted(self.address))?;
        Ok(FactData {
            exists: ret.exists,
            version: ret.version,
            data: ret.data,
        })
    }
}

fn native_fee(flags: u8, mantissa: u8, exponent: u8) -> Option<U256> {
    if flags & FEE_NO_FEE_FLAG != 0 {
        Some(U256::ZERO)
    } else if flags & FEE_NATIVE_FLAG != 0 {
        Some(U256::from(mantissa) * U256::from(10).pow(U256::from(exponent)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolCall;

    use super::*;
    use crate::provider::MockChainProvider;

    #[test]
    fn fee_flags() {
        assert_eq!(native_fee(1, 5, 3), Some(U256::ZERO));
        assert_eq!(native_fee(3, 5, 3), Some(U256::ZERO));
        assert_eq!(native_fee(2, 5, 15), Some(U256::from(5_000_000_000_000_000u64)));
        assert_eq!(native_fee(4, 5, 3), None);
    }

    fn provers_output(flags: u8) -> Bytes {
        let fee_info = IReliquary::FeeInfo {
            flags,
            feeCredits: 0,
            feeWeiMantissa: 25,
            feeWeiExponent: 14,
            feeExternalId: 0,
            reserved: 0,
        };
        IReliquary::proversCall::abi_encode_returns(&(1u64, fee_info, false)).into()
    }

    #[tokio::test]
    async fn reads_native_fee() {
        let mut provider = MockChainProvider::new();
        provider.expect_call().times(1).returning(|request| {
            assert_eq!(&request.input[..4], IReliquary::proversCall::SELECTOR);
            Box::pin(async { Ok(Some(provers_output(2))) })
        });
        let reliquary = Reliquary::new(&provider, Address::repeat_byte(1));
        assert_eq!(
            reliquary.fee(Address::repeat_byte(2)).await.unwrap(),
            U256::from(2_500_000_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn rejects_non_native_fee() {
        let mut provider = MockChainProvider::new();
        provider
            .expect_call()
            .returning(|_| Box::pin(async { Ok(Some(provers_output(0))) }));
        let reliquary = Reliquary::new(&provider, Address::repeat_byte(1));
        let err = reliquary.fee(Address::repeat_byte(2)).await.unwrap_err();
        assert!(matches!(err, RelicError::NativeFeesUnsupported(_)));
    }

    #[tokio::test]
    async fn fact_reads_come_from_zero_address() {
        let mut provider = MockChainProvider::new();
        provider.expect_call().times(1).returning(|request| {
            assert_eq!(request.from, Some(Address::ZERO));
            let out = IReliquary::debugVerifyFactCall::abi_encode_returns(&(
                true,
                7u64,
                Bytes::from(vec![1, 2, 3]),
            ));
            Box::pin(async move { Ok(Some(Bytes::from(out))) })
        });
        let reliquary = Reliquary::new(&provider, Address::repeat_byte(1));
        let fact = reliquary
            .get_fact(Address::repeat_byte(3), B256::repeat_byte(4))
            .await
            .unwrap();
        assert_eq!(
            fact,
            FactData {
                exists: true,
                version: 7,
                data: Bytes::from(vec![1, 2, 3]),
            }
        );
    }
}
