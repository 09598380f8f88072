use alloy::primitives::Address;
use relic_common::network::ChainId;
use serde::{Deserialize, Serialize};

use crate::error::{RelicError, Result};

const MAINNET_API: &str = "https://api.mainnet.relicprotocol.com/v1";
const SEPOLIA_API: &str = "https://api.sepolia.relicprotocol.com/v1";
const OP_MAINNET_API: &str = "https://api.optimism-mainnet.relicprotocol.com/v1";
const OP_SEPOLIA_API: &str = "https://api.optimism-sepolia.relicprotocol.com/v1";
const BASE_MAINNET_API: &str = "https://api.base-mainnet.relicprotocol.com/v1";
const BASE_SEPOLIA_API: &str = "https://api.base-sepolia.relicprotocol.com/v1";

/// Relic contract addresses on one chain, as served by `/addresses/{chainId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelicAddresses {
    pub reliquary: Address,
    pub block_history: Address,
    /// Present once the chain's block history moved to beacon summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_block_history: Option<Address>,
    pub messenger: Address,
    pub ephemeral_facts: Address,
    pub account_info_prover: Address,
    pub account_storage_prover: Address,
    pub attendance_prover: Address,
    pub birth_certificate_prover: Address,
    pub block_header_prover: Address,
    pub cached_multi_storage_slot_prover: Address,
    pub cached_storage_slot_prover: Address,
    pub log_prover: Address,
    pub multi_storage_slot_prover: Address,
    pub storage_slot_prover: Address,
    pub transaction_prover: Address,
    pub withdrawal_prover: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelicConfig {
    pub api_url: String,
    pub addresses: RelicAddresses,
}

/// Partial configuration; missing pieces are resolved from the defaults and
/// the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    pub api_url: Option<String>,
    pub addresses: Option<RelicAddresses>,
}

/// Data chains served for `chain_id`, with their API URLs.
fn default_apis(chain_id: ChainId) -> &'static [(ChainId, &'static str)] {
    use ChainId::*;
    match chain_id {
        EthMainnet => &[(EthMainnet, MAINNET_API)],
        EthSepolia => &[(EthSepolia, SEPOLIA_API)],
        ZkSyncMainnet => &[(EthMainnet, MAINNET_API)],
        ZkSyncSepolia => &[(EthSepolia, SEPOLIA_API)],
        OpMainnet => &[(EthMainnet, MAINNET_API), (OpMainnet, OP_MAINNET_API)],
        OpSepolia => &[(EthSepolia, SEPOLIA_API), (OpSepolia, OP_SEPOLIA_API)],
        BaseMainnet => &[(EthMainnet, MAINNET_API), (BaseMainnet, BASE_MAINNET_API)],
        BaseSepolia => &[(EthSepolia, SEPOLIA_API), (BaseSepolia, BASE_SEPOLIA_API)],
    }
}

/// Resolves the API URL for a deployment on `chain_id` proving facts about
/// `data_chain_id`, honoring an explicit override.
pub fn resolve_api_url(
    chain_id: u64,
    data_chain_id: u64,
    api_override: Option<&str>,
) -> Result<String> {
    let chain = ChainId::try_from(chain_id).map_err(|_| RelicError::UnsupportedNetwork(chain_id))?;
    if let Some(url) = api_override {
        return Ok(url.to_owned());
    }
    let defaults = default_apis(chain);
    defaults
        .iter()
        .find(|(data_chain, _)| data_chain.id() == data_chain_id)
        .map(|(_, url)| (*url).to_owned())
        .ok_or_else(|| RelicError::InvalidDataProvider {
            chain_id,
            supported: defaults.iter().map(|(data_chain, _)| data_chain.id()).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_api() {
        assert_eq!(resolve_api_url(1, 1, None).unwrap(), MAINNET_API);
        assert_eq!(resolve_api_url(324, 1, None).unwrap(), MAINNET_API);
        assert_eq!(resolve_api_url(10, 10, None).unwrap(), OP_MAINNET_API);
        assert_eq!(resolve_api_url(84532, 84532, None).unwrap(), BASE_SEPOLIA_API);
        assert_eq!(resolve_api_url(84532, 11155111, None).unwrap(), SEPOLIA_API);
    }

    #[test]
    fn rejects_unknown_pairs() {
        assert!(matches!(
            resolve_api_url(137, 1, None),
            Err(RelicError::UnsupportedNetwork(137))
        ));
        assert!(matches!(
            resolve_api_url(324, 324, None),
            Err(RelicError::InvalidDataProvider { chain_id: 324, ref supported }) if supported == &[1]
        ));
        // an explicit URL still requires a known chain
        assert_eq!(
            resolve_api_url(1, 11155111, Some("http://localhost:8000")).unwrap(),
            "http://localhost:8000"
        );
    }

    #[test]
    fn addresses_from_api_json() {
        let json = serde_json::json!({
            "reliquary": "0x5E4e65926BA27467555EB562121fac00D24E9dD2",
            "blockHistory": "0x5E4e65926BA27467555EB562121fac00D24E9dD2",
            "legacyBlockHistory": "0x5E4e65926BA27467555EB562121fac00D24E9dD2",
            "messenger": "0x0000000000000000000000000000000000000000",
            "ephemeralFacts": "0x0000000000000000000000000000000000000000",
            "accountInfoProver": "0x0000000000000000000000000000000000000001",
            "accountStorageProver": "0x0000000000000000000000000000000000000002",
            "attendanceProver": "0x0000000000000000000000000000000000000003",
            "birthCertificateProver": "0x0000000000000000000000000000000000000004",
            "blockHeaderProver": "0x0000000000000000000000000000000000000005",
            "cachedMultiStorageSlotProver": "0x0000000000000000000000000000000000000006",
            "cachedStorageSlotProver": "0x0000000000000000000000000000000000000007",
            "logProver": "0x0000000000000000000000000000000000000008",
            "multiStorageSlotProver": "0x0000000000000000000000000000000000000009",
            "storageSlotProver": "0x000000000000000000000000000000000000000a",
            "transactionProver": "0x000000000000000000000000000000000000000b",
            "withdrawalProver": "0x000000000000000000000000000000000000000c"
        });
        let addresses: RelicAddresses = serde_json::from_value(json).unwrap();
        assert!(addresses.legacy_block_history.is_some());
        assert_eq!(addresses.log_prover, Address::with_last_byte(8));
    }
}
