//! Compact encoding for a batch of storage proofs against one account.
//!
//! Sibling slots usually share the trie nodes near the root. Each per-slot
//! proof is split into its nodes, the distinct nodes are kept once in
//! first-seen order, and every proof becomes a list of indices into that set.

use std::collections::HashMap;

use alloy::primitives::{Bytes, U256};
use rlp::{Rlp, RlpStream};

use crate::error::{RelicError, Result};

/// A batch of slot proofs sharing one node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedProofs {
    /// Distinct RLP-encoded nodes, in first-seen order.
    pub nodes: Vec<Vec<u8>>,
    /// Per-slot node indices, root to leaf.
    pub paths: Vec<Vec<u64>>,
}

impl CompressedProofs {
    /// Builds the shared node set for `proofs`, each a concatenation of
    /// RLP-encoded trie nodes.
    pub fn new<P: AsRef<[u8]>>(proofs: &[P]) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut index: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut paths = Vec::with_capacity(proofs.len());

        for proof in proofs {
            let path: Vec<u64> = split_proof_nodes(proof.as_ref())?
                .into_iter()
                .map(|node| {
                    *index.entry(node.clone()).or_insert_with(|| {
                        nodes.push(node);
                        nodes.len() as u64 - 1
                    })
                })
                .collect();
            paths.push(path);
        }

        Ok(Self { nodes, paths })
    }

    /// The node set, concatenated.
    pub fn proof_nodes(&self) -> Bytes {
        self.nodes.concat().into()
    }

    /// The index lists, as an RLP list of lists of integers.
    pub fn slot_proofs(&self) -> Bytes {
        let mut stream = RlpStream::new_list(self.paths.len());
        for path in &self.paths {
            stream.begin_list(path.len());
            for idx in path {
                stream.append(idx);
            }
        }
        stream.out().to_vec().into()
    }

    /// Rebuilds the original per-slot proofs from the encoded form.
    pub fn decompress(proof_nodes: &[u8], slot_proofs: &[u8]) -> Result<Vec<Vec<u8>>> {
        let nodes = split_proof_nodes(proof_nodes)?;
        let paths = Rlp::new(slot_proofs);
        if !paths.is_list() {
            return Err(rlp::DecoderError::RlpExpectedToBeList.into());
        }
        paths
            .iter()
            .map(|path| -> Result<Vec<u8>> {
                let mut proof = Vec::new();
                for idx in path.as_list::<u64>()? {
                    let node = usize::try_from(idx)
                        .ok()
                        .and_then(|idx| nodes.get(idx))
                        .ok_or(rlp::DecoderError::Custom("node index out of range"))?;
                    proof.extend_from_slice(node);
                }
                Ok(proof)
            })
            .collect()
    }
}

/// Splits a concatenation of RLP items into the items, each re-encoded on
/// its own.
pub fn split_proof_nodes(mut proof: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut nodes = Vec::new();
    while !proof.is_empty() {
        let item = Rlp::new(proof);
        let info = item.payload_info()?;
        let len = info.header_len + info.value_len;
        if len > proof.len() {
            return Err(rlp::DecoderError::RlpIsTooShort.into());
        }
        nodes.push(reencode(&Rlp::new(&proof[..len]))?);
        proof = &proof[len..];
    }
    Ok(nodes)
}

fn reencode(item: &Rlp) -> Result<Vec<u8>> {
    let mut stream = RlpStream::new();
    append_item(&mut stream, item)?;
    Ok(stream.out().to_vec())
}

fn append_item(stream: &mut RlpStream, item: &Rlp) -> Result<()> {
    if item.is_list() {
        stream.begin_list(item.item_count()?);
        for child in item.iter() {
            append_item(stream, &child)?;
        }
    } else {
        stream.append(&item.data()?);
    }
    Ok(())
}

/// Checks fetched slot values against the caller's expectations, position
/// by position. `None` skips a slot and an empty `expected` skips them all.
pub fn check_expected(values: &[U256], expected: &[Option<U256>]) -> Result<()> {
    if !expected.is_empty() && expected.len() != values.len() {
        return Err(RelicError::InvalidArgument(format!(
            "{} expected values for {} slots",
            expected.len(),
            values.len()
        )));
    }
    for (value, expected) in values.iter().zip(expected) {
        if let Some(expected) = expected {
            if value != expected {
                return Err(RelicError::SlotValueMismatch {
                    value: *value,
                    expected: *expected,
                });
            }
        }
    }
    Ok(())
}
