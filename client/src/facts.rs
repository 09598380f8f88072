//! Signature data identifying a proven fact.
//!
//! The reliquary stores facts under a `FactSignature`: the keccak hash of the
//! ABI-encoded signature data, shifted left by one byte, with the fact class
//! in the low byte.

use alloy::primitives::{keccak256, Bytes, B256, U256};
use alloy::sol_types::SolValue;

/// Class of facts proven without a fee-bearing classification.
pub const NO_FEE_CLASS: u8 = 0;

pub fn birth_certificate() -> Bytes {
    (String::from("BirthCertificate"),).abi_encode_params().into()
}

pub fn storage_slot(slot: U256, block_num: u64) -> Bytes {
    (
        String::from("StorageSlot"),
        B256::from(slot),
        U256::from(block_num),
    )
        .abi_encode_params()
        .into()
}

pub fn block_header(block_num: u64) -> Bytes {
    (String::from("BlockHeader"), U256::from(block_num))
        .abi_encode_params()
        .into()
}

pub fn account_storage(block_num: u64, storage_root: B256) -> Bytes {
    (
        String::from("AccountStorage"),
        U256::from(block_num),
        storage_root,
    )
        .abi_encode_params()
        .into()
}

pub fn account_code_hash(block_num: u64, code_hash: B256) -> Bytes {
    (
        String::from("AccountCodeHash"),
        U256::from(block_num),
        code_hash,
    )
        .abi_encode_params()
        .into()
}

pub fn account_balance(block_num: u64) -> Bytes {
    (String::from("AccountBalance"), U256::from(block_num))
        .abi_encode_params()
        .into()
}

pub fn account_nonce(block_num: u64) -> Bytes {
    (String::from("AccountNonce"), U256::from(block_num))
        .abi_encode_params()
        .into()
}

pub fn account(block_num: u64) -> Bytes {
    (String::from("Account"), U256::from(block_num))
        .abi_encode_params()
        .into()
}

pub fn log(block_num: u64, tx_idx: u64, log_idx: u64) -> Bytes {
    (
        String::from("Log"),
        U256::from(block_num),
        U256::from(tx_idx),
        U256::from(log_idx),
    )
        .abi_encode_params()
        .into()
}

pub fn transaction(tx_hash: B256) -> Bytes {
    (String::from("Transaction"), tx_hash)
        .abi_encode_params()
        .into()
}

pub fn withdrawal(block_num: u64, idx: u64) -> Bytes {
    (
        String::from("Withdrawal"),
        U256::from(block_num),
        U256::from(idx),
    )
        .abi_encode_params()
        .into()
}

pub fn event_attendance(event_id: u64) -> Bytes {
    (
        String::from("EventAttendance"),
        String::from("EventID"),
        event_id,
    )
        .abi_encode_params()
        .into()
}

/// Key under which the reliquary stores a fact of class `class`.
pub fn fact_signature(class: u8, sig_data: &[u8]) -> B256 {
    let hash = U256::from_be_bytes(keccak256(sig_data).0);
    B256::from((hash << 8) | U256::from(class))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::hex;

    use super::*;

    #[test]
    fn block_header_sig_data_layout() {
        let data = block_header(15_000_000);
        // string head offset, block number, then the tail
        assert_eq!(data.len(), 32 * 4);
        assert_eq!(U256::from_be_slice(&data[..32]), U256::from(64));
        assert_eq!(U256::from_be_slice(&data[32..64]), U256::from(15_000_000));
        assert_eq!(U256::from_be_slice(&data[64..96]), U256::from(11));
        assert_eq!(&data[96..107], b"BlockHeader");
    }

    #[test]
    fn event_attendance_has_two_strings() {
        let data = event_attendance(7);
        assert_eq!(U256::from_be_slice(&data[64..96]), U256::from(7));
        let decoded = <(String, String, u64)>::abi_decode_params(&data, true).unwrap();
        assert_eq!(decoded, ("EventAttendance".into(), "EventID".into(), 7));
    }

    #[test]
    fn fact_signature_shifts_hash() {
        let data = birth_certificate();
        let sig = fact_signature(NO_FEE_CLASS, &data);
        let hash = keccak256(&data);
        assert_eq!(&sig[..31], &hash[1..]);
        assert_eq!(sig[31], 0);
        assert_eq!(fact_signature(3, &data)[31], 3);
        assert_eq!(hex::encode(&storage_slot(U256::from(1), 2)[32..64]), format!("{:064x}", 1));
    }
}
