use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;
use relic_common::network::apply_l1_to_l2_alias;
use tracing::debug;

use super::MessengerParams;
use crate::error::Result;
use crate::provider::{CallRequest, ChainProvider};

/// OP-stack messages carry their L2 gas limit as `abi.encode(uint64)` and
/// are paid for by L2 execution, so no value is attached.
pub(super) async fn params<P: ChainProvider>(
    l2: &P,
    messenger: Address,
    target: Address,
    calldata: Bytes,
) -> Result<MessengerParams> {
    let request = CallRequest::new(target, calldata).from(apply_l1_to_l2_alias(messenger));
    let gas_limit = l2.estimate_gas(request).await?;
    debug!(gas_limit, "estimated OP-stack relay gas");
    Ok(MessengerParams {
        value: U256::ZERO,
        params: gas_limit.abi_encode().into(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::rpc::types::BlockId;
    use alloy::sol_types::SolCall;

    use super::super::tests::{api, l1_provider, l2_provider, BLOCK, HASH};
    use super::*;
    use crate::client::tests::{addresses, context};
    use crate::client::RelicClient;
    use crate::contracts::{IBlockHashMessenger, IBlockHistory};

    #[tokio::test]
    async fn gas_is_estimated_from_aliased_messenger() {
        let mut l2 = l2_provider(false);
        l2.expect_estimate_gas().times(1).returning(|request| {
            assert_eq!(request.from, Some(apply_l1_to_l2_alias(addresses().messenger)));
            assert_eq!(request.to, addresses().block_history);
            let call = IBlockHistory::importTrustedHashCall::abi_decode(&request.input, true).unwrap();
            assert_eq!(call.number, U256::from(BLOCK));
            assert_eq!(call.hash, HASH);
            Box::pin(async { Ok(123_456) })
        });
        let client = RelicClient::from_context(context(l2, l1_provider(), 10, 1), Arc::new(api()));

        let tx = client
            .bridge()
            .unwrap()
            .send_block(BlockId::number(BLOCK), false)
            .await
            .unwrap();
        assert_eq!(tx.value, U256::ZERO);
        let call = IBlockHashMessenger::sendBlockHashCall::abi_decode(&tx.data, true).unwrap();
        assert_eq!(call.number, U256::from(BLOCK));
        assert_eq!(u64::abi_decode(&call.params, true).unwrap(), 123_456);
    }
}
