//! Error types for public transaction execution.

use alloy_primitives::{Address, B256, U256};

use crate::{RevertReason, TxExecutionPhase};

/// The kind of side effect bounded by a per-transaction limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SideEffectKind {
    /// Public data writes issued by user code.
    #[display("public data writes")]
    PublicDataWrite,
    /// Public data writes issued by the protocol.
    #[display("protocol public data writes")]
    ProtocolPublicDataWrite,
    /// Note hashes.
    #[display("note hashes")]
    NoteHash,
    /// Nullifiers.
    #[display("nullifiers")]
    Nullifier,
    /// L2-to-L1 messages.
    #[display("L2-to-L1 messages")]
    L2ToL1Message,
    /// Public logs.
    #[display("public logs")]
    PublicLog,
    /// Distinct contract classes whose bytecode was retrieved.
    #[display("contract calls to unique class IDs")]
    UniqueContractClassId,
}

/// Errors raised by a public state view.
///
/// Database failures are type-erased into strings so the error does not depend on the concrete
/// collaborator types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The siloed nullifier is already in the nullifier tree or pending in this transaction.
    #[error("Nullifier collision: siloed nullifier {siloed_nullifier} already exists")]
    NullifierCollision {
        /// The colliding siloed nullifier.
        siloed_nullifier: U256,
    },
    /// A per-transaction side effect limit was reached.
    #[error("Reached the limit on number of {kind} per tx ({limit})")]
    SideEffectLimitReached {
        /// The limited side effect.
        kind: SideEffectKind,
        /// The limit.
        limit: usize,
    },
    /// A public log has more fields than a log can carry.
    #[error("Public log of {size} fields exceeds the maximum of {max} fields")]
    PublicLogTooLarge {
        /// Number of fields in the log.
        size: usize,
        /// Maximum number of fields.
        max: usize,
    },
    /// A static call attempted to modify state.
    #[error("Static call cannot update the state of {contract}")]
    StaticCallModification {
        /// The contract whose state the call tried to modify.
        contract: Address,
    },
    /// The trees database failed.
    #[error("Trees database error: {0}")]
    TreesDb(String),
    /// The contracts database failed.
    #[error("Contracts database error: {0}")]
    ContractsDb(String),
}

impl StateError {
    /// Wraps a trees database error.
    pub fn trees_db(err: impl core::fmt::Display) -> Self {
        Self::TreesDb(err.to_string())
    }

    /// Wraps a contracts database error.
    pub fn contracts_db(err: impl core::fmt::Display) -> Self {
        Self::ContractsDb(err.to_string())
    }

    /// Returns true if the error is caused by the executing code rather than by infrastructure.
    /// Such errors revert the call that caused them.
    pub const fn is_revert(&self) -> bool {
        matches!(
            self,
            Self::NullifierCollision { .. } |
                Self::SideEffectLimitReached { .. } |
                Self::PublicLogTooLarge { .. } |
                Self::StaticCallModification { .. }
        )
    }
}

/// Errors escaping [`crate::PublicTxSimulator::simulate`].
///
/// Every variant means the transaction must be discarded: nothing it did is committed and nothing
/// is charged. Recoverable reverts never surface as errors; they are reported in the result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// A setup call reverted.
    #[error("{phase} phase reverted in {culprit}: {reason}")]
    SetupReverted {
        /// Always [`TxExecutionPhase::Setup`].
        phase: TxExecutionPhase,
        /// The reason of the revert.
        reason: RevertReason,
        /// A description of the call that reverted.
        culprit: String,
    },
    /// A non-revertible nullifier from private execution already exists.
    #[error(
        "Nullifier collision encountered when inserting non-revertible nullifiers from private: {0}"
    )]
    NonRevertibleNullifierCollision(StateError),
    /// The fee payer cannot afford the transaction fee.
    #[error("Not enough balance for fee payer to pay for transaction (got {balance} needs {fee})")]
    InsufficientFeePayerBalance {
        /// The fee payer.
        fee_payer: Address,
        /// Balance of the fee payer.
        balance: U256,
        /// The transaction fee.
        fee: U256,
    },
    /// The transaction carries no nullifier to make it unique.
    #[error("Transaction {tx_hash} has no first nullifier")]
    MissingFirstNullifier {
        /// The transaction hash.
        tx_hash: B256,
    },
    /// A call request refers to calldata the transaction does not carry.
    #[error("Calldata not found for hash {calldata_hash}")]
    CalldataNotFound {
        /// The calldata hash of the request.
        calldata_hash: B256,
    },
    /// The transaction enqueues more public calls than the circuit supports.
    #[error("Too many enqueued calls: {count} (max {max})")]
    TooManyEnqueuedCalls {
        /// Number of enqueued calls.
        count: usize,
        /// Maximum number of enqueued calls.
        max: usize,
    },
    /// The fee payer could not afford the fee, which was charged anyway because fee enforcement
    /// is skipped. Such a result is only good for estimation.
    #[error("Transaction {tx_hash} is not eligible for inclusion")]
    IneligibleForInclusion {
        /// The transaction hash.
        tx_hash: B256,
    },
    /// A state error that cannot be attributed to user code.
    #[error(transparent)]
    State(#[from] StateError),
}

impl SimulationError {
    /// Returns true if the error is a reverted setup call.
    pub const fn is_setup_revert(&self) -> bool {
        matches!(self, Self::SetupReverted { .. })
    }
}
