//! Solidity storage layout: locating mapping entries, array elements and
//! struct fields from their base slot.

use alloy::primitives::{keccak256, U256};

/// Slot of `mapping[key]` for a mapping declared at `base`.
pub fn map_elem_slot(base: U256, key: U256) -> U256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&key.to_be_bytes::<32>());
    preimage[32..].copy_from_slice(&base.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(preimage).0)
}

pub fn static_array_elem_slot(base: U256, idx: U256, slots_per_elem: U256) -> U256 {
    base.wrapping_add(idx.wrapping_mul(slots_per_elem))
}

/// Slot of element `idx` of a dynamic array whose length lives at `base`.
pub fn dynamic_array_elem_slot(base: U256, idx: U256, slots_per_elem: U256) -> U256 {
    let elems = U256::from_be_bytes(keccak256(base.to_be_bytes::<32>()).0);
    elems.wrapping_add(idx.wrapping_mul(slots_per_elem))
}

pub fn struct_field_slot(base: U256, offset: U256) -> U256 {
    base.wrapping_add(offset)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn map_slot_hashes_key_then_base() {
        assert_eq!(
            map_elem_slot(U256::ZERO, U256::ZERO),
            U256::from_be_bytes(hex!(
                "ad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5"
            ))
        );
        assert_ne!(
            map_elem_slot(U256::from(1), U256::from(2)),
            map_elem_slot(U256::from(2), U256::from(1))
        );
    }

    #[test]
    fn dynamic_array_slots() {
        let first = U256::from_be_bytes(hex!(
            "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        ));
        assert_eq!(dynamic_array_elem_slot(U256::ZERO, U256::ZERO, U256::from(1)), first);
        assert_eq!(
            dynamic_array_elem_slot(U256::ZERO, U256::from(3), U256::from(2)),
            first + U256::from(6)
        );
    }

    #[test]
    fn static_slots() {
        assert_eq!(
            static_array_elem_slot(U256::from(5), U256::from(2), U256::from(3)),
            U256::from(11)
        );
        assert_eq!(struct_field_slot(U256::from(7), U256::from(1)), U256::from(8));
        assert_eq!(struct_field_slot(U256::MAX, U256::from(1)), U256::ZERO);
    }
}
