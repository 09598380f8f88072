use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;
use relic_common::network::apply_l1_to_l2_alias;
use serde_json::json;
use tracing::debug;

use super::MessengerParams;
use crate::contracts::{view, IZkSyncMailbox};
use crate::error::Result;
use crate::provider::ChainProvider;

/// Gas per pubdata byte the L1 mailbox requires of L1 to L2 transactions.
pub const REQUIRED_L1_TO_L2_GAS_PER_PUBDATA: u64 = 800;

/// zkSync messages carry `abi.encode(uint256 gasLimit, uint256
/// gasPerPubdata)` and prepay the L2 execution in L1 value, quoted by the
/// L1 mailbox at the current L1 gas price.
pub(super) async fn params<P: ChainProvider>(
    l2: &P,
    l1: &P,
    messenger: Address,
    target: Address,
    calldata: Bytes,
) -> Result<MessengerParams> {
    let request = json!([{
        "from": apply_l1_to_l2_alias(messenger),
        "to": target,
        "data": calldata,
        "eip712Meta": { "gasPerPubdata": U256::from(REQUIRED_L1_TO_L2_GAS_PER_PUBDATA) },
    }]);
    let (gas_limit, mailbox, gas_price) = futures::try_join!(
        l2.raw_request("zks_estimateGasL1ToL2".into(), request),
        l2.raw_request("zks_getMainContract".into(), json!([])),
        l1.gas_price(),
    )?;
    let gas_limit: U256 = serde_json::from_value(gas_limit)?;
    let mailbox: Address = serde_json::from_value(mailbox)?;

    let per_pubdata = U256::from(REQUIRED_L1_TO_L2_GAS_PER_PUBDATA);
    let cost = view(
        l1,
        mailbox,
        &IZkSyncMailbox::l2TransactionBaseCostCall {
            gasPrice: U256::from(gas_price),
            l2GasLimit: gas_limit,
            l2GasPerPubdataByteLimit: per_pubdata,
        },
    )
    .await?
    .cost;
    debug!(%gas_limit, %mailbox, %cost, "estimated zkSync relay cost");
    Ok(MessengerParams {
        value: cost,
        params: (gas_limit, per_pubdata).abi_encode_params().into(),
    })
}
