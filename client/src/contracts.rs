//! ABI of the Relic contracts and the helpers used to call them.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::error::Result;
use crate::provider::{CallRequest, ChainProvider};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    /// Block history, in its L1, proxy L2 and native L2 flavours. Every
    /// deployment exposes a subset of these events.
    interface IBlockHistory {
        event ImportMerkleRoot(uint256 indexed index, bytes32 merkleRoot);
        event TrustedBlockHash(uint256 number, bytes32 blockHash);
        // misspelled on chain
        event PrecomittedBlock(uint256 indexed blockNum, bytes32 blockHash);
        event ImportBlockSummary(uint256 indexed slot, bytes32 summary);

        function validBlockHash(bytes32 hash, uint256 num, bytes calldata proof) external view returns (bool valid);
        function commitRecent(uint256 blockNum) external;
        function commitCurrentL1BlockHash() external;
        function importTrustedHash(uint256 number, bytes32 hash) external;
        function importCheckpointBlockFromL1(
            bytes calldata proof,
            uint256 index,
            uint256 l1BlockNumber,
            OutputRootProof calldata outputRootProof
        ) external;
        function l2OutputOracle() external view returns (address oracle);
        function OUTPUT_ROOTS_BASE_SLOT() external view returns (bytes32 slot);
    }

    interface IReliquary {
        #[derive(Debug)]
        struct FeeInfo {
            uint8 flags;
            uint16 feeCredits;
            uint8 feeWeiMantissa;
            uint8 feeWeiExponent;
            uint32 feeExternalId;
            uint64 reserved;
        }

        function provers(address prover) external view returns (uint64 version, FeeInfo feeInfo, bool revoked);
        function debugVerifyFact(address account, bytes32 factSig) external view returns (bool exists, uint64 version, bytes data);
    }

    interface IProver {
        function prove(bytes calldata proof, bool store) external payable;
    }

    interface IBatchProver {
        function proveBatch(bytes calldata proof, bool store) external payable;
    }

    interface IEphemeralFacts {
        #[derive(Debug, PartialEq, Eq)]
        struct ReceiverContext {
            address initiator;
            address receiver;
            bytes extra;
            uint256 gasLimit;
        }

        function proveEphemeral(ReceiverContext calldata context, address prover, bytes calldata proof) external payable;
    }

    interface IAttendanceProver {
        function claim(address account, uint64 eventId, uint64 number, bytes signatureInner, bytes signatureOuter) external payable;
    }

    interface IBlockHashMessenger {
        function sendBlockHash(
            address destination,
            bytes calldata params,
            uint256 number,
            bytes32 blockHash,
            bytes calldata proof
        ) external payable;
    }

    interface IL2OutputOracle {
        function SUBMISSION_INTERVAL() external view returns (uint256 interval);
        function FINALIZATION_PERIOD_SECONDS() external view returns (uint256 period);
        function startingBlockNumber() external view returns (uint256 number);
        function getL2Output(uint256 index) external view returns (bytes32 outputRoot, uint128 timestamp, uint128 l2BlockNumber);
    }

    interface IZkSyncMailbox {
        function l2TransactionBaseCost(uint256 gasPrice, uint256 l2GasLimit, uint256 l2GasPerPubdataByteLimit) external view returns (uint256 cost);
    }
}

/// An unsigned transaction, ready to be signed and sent by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl PopulatedTransaction {
    pub fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode().into(),
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

impl From<PopulatedTransaction> for TransactionRequest {
    fn from(tx: PopulatedTransaction) -> Self {
        TransactionRequest::default()
            .with_to(tx.to)
            .with_input(tx.data)
            .with_value(tx.value)
    }
}

impl From<PopulatedTransaction> for CallRequest {
    fn from(tx: PopulatedTransaction) -> Self {
        CallRequest {
            from: None,
            to: tx.to,
            input: tx.data,
            value: tx.value,
        }
    }
}

/// Executes `call` against `to` without sending a transaction. A revert
/// yields `None`.
pub async fn static_call<P, C>(
    provider: &P,
    to: Address,
    from: Option<Address>,
    call: &C,
) -> Result<Option<C::Return>>
where
    P: ChainProvider,
    C: SolCall,
{
    let request = CallRequest {
        from,
        ..CallRequest::new(to, call.abi_encode())
    };
    match provider.call(request).await? {
        Some(output) => Ok(Some(C::abi_decode_returns(&output, true)?)),
        None => Ok(None),
    }
}

/// Like [`static_call`], but a revert is an error.
pub async fn view<P, C>(provider: &P, to: Address, call: &C) -> Result<C::Return>
where
    P: ChainProvider,
    C: SolCall,
{
    static_call(provider, to, None, call)
        .await?
        .ok_or(crate::error::RelicError::CallReverted(to))
}
