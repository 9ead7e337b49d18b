//! The fixed-shape public inputs of the public VM circuit.
//!
//! The circuit consumes fixed-size arrays. Every array here is padded with zero sentinels to its
//! circuit size, and is accompanied by the number of meaningful entries.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        MAX_ENQUEUED_CALLS_PER_TX, MAX_L2_TO_L1_MSGS_PER_TX, MAX_NOTE_HASHES_PER_TX,
        MAX_NULLIFIERS_PER_TX, MAX_PUBLIC_LOGS_PER_TX, MAX_TOTAL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
        PUBLIC_LOG_SIZE_IN_FIELDS,
    },
    ExecutionHints, Gas, GasFees, GasSettings, GlobalVariables, PrivateToPublicAccumulatedData,
    PublicCallRequest, PublicDataWrite, PublicLog, ScopedL2ToL1Message, TreeSnapshots,
};

/// Pads `items` with default values up to `len`.
///
/// # Panics
///
/// Panics if there are more than `len` items. Side effect limits are enforced long before public
/// inputs are generated, so this indicates a bug.
pub fn pad_to<T: Default + Clone>(mut items: Vec<T>, len: usize) -> Vec<T> {
    assert!(items.len() <= len, "cannot pad {} items to {len}", items.len());
    items.resize(len, T::default());
    items
}

/// Number of call requests in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCallRequestArrayLengths {
    /// Setup calls.
    pub setup_calls: usize,
    /// App logic calls.
    pub app_logic_calls: usize,
    /// Whether there is a teardown call.
    pub teardown_call: bool,
}

/// Number of side effects in each array of [`PrivateToAvmAccumulatedData`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateToAvmAccumulatedDataArrayLengths {
    /// Note hashes.
    pub note_hashes: usize,
    /// Nullifiers.
    pub nullifiers: usize,
    /// L2-to-L1 messages.
    pub l2_to_l1_msgs: usize,
}

/// Side effects of private execution, padded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateToAvmAccumulatedData {
    /// Note hashes, padded to [`MAX_NOTE_HASHES_PER_TX`].
    pub note_hashes: Vec<U256>,
    /// Nullifiers, padded to [`MAX_NULLIFIERS_PER_TX`].
    pub nullifiers: Vec<U256>,
    /// L2-to-L1 messages, padded to [`MAX_L2_TO_L1_MSGS_PER_TX`].
    pub l2_to_l1_msgs: Vec<ScopedL2ToL1Message>,
}

impl PrivateToAvmAccumulatedData {
    /// Pads private side effects, returning them with their lengths.
    pub fn from_private(
        data: &PrivateToPublicAccumulatedData,
    ) -> (Self, PrivateToAvmAccumulatedDataArrayLengths) {
        let lengths = PrivateToAvmAccumulatedDataArrayLengths {
            note_hashes: data.note_hash_count(),
            nullifiers: data.nullifier_count(),
            l2_to_l1_msgs: data.l2_to_l1_msg_count(),
        };
        let padded = Self {
            note_hashes: pad_to(data.note_hashes.clone(), MAX_NOTE_HASHES_PER_TX),
            nullifiers: pad_to(data.nullifiers.clone(), MAX_NULLIFIERS_PER_TX),
            l2_to_l1_msgs: pad_to(data.l2_to_l1_msgs.clone(), MAX_L2_TO_L1_MSGS_PER_TX),
        };
        (padded, lengths)
    }
}

/// Number of side effects in each array of [`AvmAccumulatedData`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvmAccumulatedDataArrayLengths {
    /// Note hashes.
    pub note_hashes: usize,
    /// Nullifiers.
    pub nullifiers: usize,
    /// L2-to-L1 messages.
    pub l2_to_l1_msgs: usize,
    /// Public logs.
    pub public_logs: usize,
    /// Squashed public data writes.
    pub public_data_writes: usize,
}

/// Side effects of the whole transaction after public execution, padded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvmAccumulatedData {
    /// Note hashes, padded to [`MAX_NOTE_HASHES_PER_TX`].
    pub note_hashes: Vec<U256>,
    /// Nullifiers, padded to [`MAX_NULLIFIERS_PER_TX`].
    pub nullifiers: Vec<U256>,
    /// L2-to-L1 messages, padded to [`MAX_L2_TO_L1_MSGS_PER_TX`].
    pub l2_to_l1_msgs: Vec<ScopedL2ToL1Message>,
    /// Public logs, padded to [`MAX_PUBLIC_LOGS_PER_TX`]. Each log has exactly
    /// [`PUBLIC_LOG_SIZE_IN_FIELDS`] fields.
    pub public_logs: Vec<PublicLog>,
    /// Squashed public data writes, padded to [`MAX_TOTAL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX`].
    pub public_data_writes: Vec<PublicDataWrite>,
}

impl AvmAccumulatedData {
    /// Pads accumulated side effects, returning them with their lengths.
    pub fn padded(
        note_hashes: Vec<U256>,
        nullifiers: Vec<U256>,
        l2_to_l1_msgs: Vec<ScopedL2ToL1Message>,
        public_logs: Vec<PublicLog>,
        public_data_writes: Vec<PublicDataWrite>,
    ) -> (Self, AvmAccumulatedDataArrayLengths) {
        let lengths = AvmAccumulatedDataArrayLengths {
            note_hashes: note_hashes.len(),
            nullifiers: nullifiers.len(),
            l2_to_l1_msgs: l2_to_l1_msgs.len(),
            public_logs: public_logs.len(),
            public_data_writes: public_data_writes.len(),
        };
        let mut public_logs: Vec<PublicLog> = public_logs
            .into_iter()
            .map(|log| PublicLog {
                contract_address: log.contract_address,
                fields: pad_to(log.fields, PUBLIC_LOG_SIZE_IN_FIELDS),
            })
            .collect();
        let empty_log = PublicLog {
            contract_address: Address::ZERO,
            fields: vec![U256::ZERO; PUBLIC_LOG_SIZE_IN_FIELDS],
        };
        assert!(public_logs.len() <= MAX_PUBLIC_LOGS_PER_TX, "too many public logs to pad");
        public_logs.resize(MAX_PUBLIC_LOGS_PER_TX, empty_log);

        let padded = Self {
            note_hashes: pad_to(note_hashes, MAX_NOTE_HASHES_PER_TX),
            nullifiers: pad_to(nullifiers, MAX_NULLIFIERS_PER_TX),
            l2_to_l1_msgs: pad_to(l2_to_l1_msgs, MAX_L2_TO_L1_MSGS_PER_TX),
            public_logs,
            public_data_writes: pad_to(
                public_data_writes,
                MAX_TOTAL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
            ),
        };
        (padded, lengths)
    }
}

/// The public inputs of the public VM circuit for one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvmCircuitPublicInputs {
    /// Block-level values.
    pub global_variables: GlobalVariables,
    /// Tree snapshots before public execution.
    pub start_tree_snapshots: TreeSnapshots,
    /// Gas used by private execution.
    pub start_gas_used: Gas,
    /// Gas settings after clamping to what the public VM can process.
    pub gas_settings: GasSettings,
    /// Prices actually paid per unit of gas.
    pub effective_gas_fees: GasFees,
    /// The fee payer.
    pub fee_payer: Address,
    /// Number of call requests per phase.
    pub public_call_request_array_lengths: PublicCallRequestArrayLengths,
    /// Setup call requests, padded to [`MAX_ENQUEUED_CALLS_PER_TX`].
    pub public_setup_call_requests: Vec<PublicCallRequest>,
    /// App logic call requests, padded to [`MAX_ENQUEUED_CALLS_PER_TX`].
    pub public_app_logic_call_requests: Vec<PublicCallRequest>,
    /// The teardown call request, or the empty request.
    pub public_teardown_call_request: PublicCallRequest,
    /// Lengths of the non-revertible private side effects.
    pub previous_non_revertible_accumulated_data_array_lengths:
        PrivateToAvmAccumulatedDataArrayLengths,
    /// Lengths of the revertible private side effects.
    pub previous_revertible_accumulated_data_array_lengths: PrivateToAvmAccumulatedDataArrayLengths,
    /// Non-revertible private side effects.
    pub previous_non_revertible_accumulated_data: PrivateToAvmAccumulatedData,
    /// Revertible private side effects.
    pub previous_revertible_accumulated_data: PrivateToAvmAccumulatedData,
    /// Tree snapshots after public execution and padding.
    pub end_tree_snapshots: TreeSnapshots,
    /// Gas used by the whole transaction, with teardown counted at its limit.
    pub end_gas_used: Gas,
    /// Lengths of the accumulated side effects.
    pub accumulated_data_array_lengths: AvmAccumulatedDataArrayLengths,
    /// Side effects of the whole transaction.
    pub accumulated_data: AvmAccumulatedData,
    /// The transaction fee.
    pub transaction_fee: U256,
    /// Whether app logic or teardown reverted.
    pub reverted: bool,
}

impl AvmCircuitPublicInputs {
    /// Pads call requests to [`MAX_ENQUEUED_CALLS_PER_TX`].
    pub fn pad_call_requests(requests: Vec<PublicCallRequest>) -> Vec<PublicCallRequest> {
        pad_to(requests, MAX_ENQUEUED_CALLS_PER_TX)
    }
}

/// The kind of circuit a proving request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvingRequestType {
    /// The public VM circuit.
    PublicVm,
}

/// Everything the public VM prover needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvmCircuitInputs {
    /// Hints for replaying execution.
    pub hints: ExecutionHints,
    /// The public inputs.
    pub public_inputs: AvmCircuitPublicInputs,
}

/// A request to prove a transaction's public execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvmProvingRequest {
    /// Always [`ProvingRequestType::PublicVm`].
    pub request_type: ProvingRequestType,
    /// The circuit inputs.
    pub inputs: AvmCircuitInputs,
}

impl AvmProvingRequest {
    /// Creates a public VM proving request.
    pub const fn new(hints: ExecutionHints, public_inputs: AvmCircuitPublicInputs) -> Self {
        Self {
            request_type: ProvingRequestType::PublicVm,
            inputs: AvmCircuitInputs { hints, public_inputs },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_to() {
        assert_eq!(pad_to(vec![1u8, 2], 4), vec![1, 2, 0, 0]);
        assert_eq!(pad_to(Vec::<u8>::new(), 2), vec![0, 0]);
    }

    #[test]
    #[should_panic(expected = "cannot pad 3 items to 2")]
    fn test_pad_to_overflow_panics() {
        pad_to(vec![1u8, 2, 3], 2);
    }

    #[test]
    fn test_accumulated_data_is_padded_to_circuit_sizes() {
        let log =
            PublicLog { contract_address: Address::with_last_byte(1), fields: vec![U256::from(1)] };
        let (data, lengths) = AvmAccumulatedData::padded(
            vec![U256::from(1)],
            vec![U256::from(2), U256::from(3)],
            vec![],
            vec![log],
            vec![PublicDataWrite::new(U256::from(4), U256::from(5))],
        );
        assert_eq!(
            lengths,
            AvmAccumulatedDataArrayLengths {
                note_hashes: 1,
                nullifiers: 2,
                l2_to_l1_msgs: 0,
                public_logs: 1,
                public_data_writes: 1,
            }
        );
        assert_eq!(data.note_hashes.len(), MAX_NOTE_HASHES_PER_TX);
        assert_eq!(data.nullifiers.len(), MAX_NULLIFIERS_PER_TX);
        assert_eq!(data.l2_to_l1_msgs.len(), MAX_L2_TO_L1_MSGS_PER_TX);
        assert_eq!(data.public_data_writes.len(), MAX_TOTAL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX);
        assert_eq!(data.public_logs.len(), MAX_PUBLIC_LOGS_PER_TX);
        assert!(data.public_logs.iter().all(|log| log.fields.len() == PUBLIC_LOG_SIZE_IN_FIELDS));
        assert!(data.nullifiers[2..].iter().all(|n| n.is_zero()));
        assert!(data.public_data_writes[1..].iter().all(PublicDataWrite::is_empty));
    }
}
