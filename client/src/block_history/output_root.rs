//! Imports an OP-stack L2 block hash from the output root its L1
//! `L2OutputOracle` recorded, for native L2 deployments.

use alloy::primitives::{address, keccak256, Address, B256, U256};
use alloy::rpc::types::BlockId;
use alloy::sol_types::SolValue;
use futures::try_join;
use relic_common::network::{is_l2, NetworkError};
use tracing::info;

use super::BlockHistory;
use crate::api::ProofApi;
use crate::client::RelicClient;
use crate::contracts::{view, IBlockHistory, IL2OutputOracle, OutputRootProof, PopulatedTransaction};
use crate::error::{RelicError, Result};
use crate::provider::ChainProvider;
use crate::provers::{BatchProver, MultiStorageSlotParams};

/// The L2ToL1MessagePasser predeploy.
pub const MESSAGE_PASSER: Address = address!("4200000000000000000000000000000000000016");

/// Index of the output checkpointing `l2_block`, which must sit exactly on
/// a submission boundary past the first stored output.
pub fn checkpoint_index(l2_block: U256, starting_block: U256, interval: U256) -> Result<U256> {
    if interval.is_zero() {
        return Err(RelicError::InvalidArgument("zero submission interval".into()));
    }
    if l2_block < starting_block + interval {
        return Err(RelicError::InvalidArgument(format!(
            "l2 block {l2_block} is below the first stored output root"
        )));
    }
    let offset = l2_block - starting_block;
    if !(offset % interval).is_zero() {
        return Err(RelicError::InvalidArgument(format!(
            "l2 block number must be a multiple of SUBMISSION_INTERVAL ({interval})"
        )));
    }
    Ok(offset / interval - U256::from(1))
}

pub fn hash_output_root_proof(proof: &OutputRootProof) -> B256 {
    keccak256(
        (
            proof.version,
            proof.stateRoot,
            proof.messagePasserStorageRoot,
            proof.latestBlockhash,
        )
            .abi_encode_params(),
    )
}

/// Storage slot of output `index` in the oracle's `l2Outputs` array.
pub fn output_slot(base: B256, index: U256) -> U256 {
    U256::from_be_bytes(keccak256(base).0) + index * U256::from(2)
}

async fn output_root_proof<P: ChainProvider>(provider: &P, l2_block: u64) -> Result<OutputRootProof> {
    let block = BlockId::number(l2_block);
    let (header, message_passer_root) = try_join!(
        provider.block_header(block),
        provider.storage_root(MESSAGE_PASSER, block),
    )?;
    Ok(OutputRootProof {
        version: B256::ZERO,
        stateRoot: header.state_root,
        messagePasserStorageRoot: message_passer_root,
        latestBlockhash: header.hash,
    })
}

/// Populates `importCheckpointBlockFromL1` for `l2_block`. `proxy` is a
/// client executing on this L2 whose data chain is the parent L1.
pub async fn import_blockhash_from_output_root<P, A>(
    history: &BlockHistory<P>,
    l2_block: u64,
    proxy: &RelicClient<P, A>,
) -> Result<PopulatedTransaction>
where
    P: ChainProvider + Send + Sync,
    A: ProofApi + Send + Sync,
{
    history.require_native_l2()?;
    if is_l2(proxy.data_chain_id()) {
        return Err(NetworkError::NotL1Network(proxy.data_chain_id()).into());
    }
    let ctx = history.ctx();
    let l1 = proxy.data_provider();
    let oracle = view(
        ctx.provider.as_ref(),
        history.address(),
        &IBlockHistory::l2OutputOracleCall {},
    )
    .await?
    .oracle;

    let (interval, starting_block, base, last_verifiable) = try_join!(
        view(l1, oracle, &IL2OutputOracle::SUBMISSION_INTERVALCall {}),
        view(l1, oracle, &IL2OutputOracle::startingBlockNumberCall {}),
        view(
            ctx.provider.as_ref(),
            history.address(),
            &IBlockHistory::OUTPUT_ROOTS_BASE_SLOTCall {}
        ),
        async { proxy.block_history()?.last_verifiable_block().await },
    )?;
    let l1_block = u64::try_from(last_verifiable).map_err(|_| RelicError::BlockNotVerifiable {
        block: 0,
        chain_id: proxy.chain_id(),
    })?;
    let index = checkpoint_index(U256::from(l2_block), starting_block.number, interval.interval)?;

    let get_output = IL2OutputOracle::getL2OutputCall { index };
    let (output, l1_header, finalization) = try_join!(
        view(l1, oracle, &get_output),
        async {
            l1.block_header(BlockId::number(l1_block))
                .await
                .map_err(RelicError::from)
        },
        view(l1, oracle, &IL2OutputOracle::FINALIZATION_PERIOD_SECONDSCall {}),
    )?;
    if U256::from(output.timestamp) + finalization.period > U256::from(l1_header.timestamp) {
        return Err(RelicError::CheckpointNotFinalized);
    }

    let output_root_proof = output_root_proof(ctx.provider.as_ref(), l2_block).await?;
    let slot = output_slot(base.slot, index);
    let params = MultiStorageSlotParams {
        block: BlockId::number(l1_block),
        account: oracle,
        slots: vec![slot, slot + U256::from(1)],
        expected: vec![
            Some(U256::from_be_bytes(hash_output_root_proof(&output_root_proof).0)),
            None,
        ],
        include_header: true,
    };
    let proof = proxy.multi_storage_slot_prover().proof_data(params).await?.proof;

    info!(l2_block, l1_block, %index, "populated output root import");
    Ok(PopulatedTransaction::new(
        history.address(),
        &IBlockHistory::importCheckpointBlockFromL1Call {
            proof,
            index,
            l1BlockNumber: U256::from(l1_block),
            outputRootProof: output_root_proof,
        },
    ))
}
