//! Transaction data model: phases, revert codes, call requests and private outputs.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{hash::compute_calldata_hash, Gas, GasFees, GasSettings, SimulationError};

/// A phase of the public portion of a transaction. Phases run strictly in declaration order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxExecutionPhase {
    /// Non-revertible phase, typically used for fee payment setup. A revert here is fatal.
    #[display("SETUP")]
    Setup,
    /// The revertible body of the transaction.
    #[display("APP_LOGIC")]
    AppLogic,
    /// Revertible clean-up phase with its own gas budget, typically used for refunds.
    #[display("TEARDOWN")]
    Teardown,
}

impl TxExecutionPhase {
    /// All phases in execution order.
    pub const ALL: [Self; 3] = [Self::Setup, Self::AppLogic, Self::Teardown];
}

/// The outcome of a transaction's revertible phases.
///
/// Revert codes only move forward: `Ok -> AppLogicReverted -> BothReverted` or
/// `Ok -> TeardownReverted`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevertCode {
    /// Nothing reverted.
    #[default]
    #[display("OK")]
    Ok,
    /// App logic reverted, teardown (if any) succeeded.
    #[display("APP_LOGIC_REVERTED")]
    AppLogicReverted,
    /// Teardown reverted after app logic succeeded.
    #[display("TEARDOWN_REVERTED")]
    TeardownReverted,
    /// App logic reverted and teardown reverted as well.
    #[display("BOTH_REVERTED")]
    BothReverted,
}

impl RevertCode {
    /// Returns true if nothing reverted.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The code as it appears in the public inputs.
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::AppLogicReverted => 1,
            Self::TeardownReverted => 2,
            Self::BothReverted => 3,
        }
    }

    /// The code after a revert in `phase`, or `None` for setup where reverts are not recoverable.
    pub const fn on_revert(self, phase: TxExecutionPhase) -> Option<Self> {
        match phase {
            TxExecutionPhase::Setup => None,
            TxExecutionPhase::AppLogic => Some(match self {
                Self::Ok | Self::AppLogicReverted => Self::AppLogicReverted,
                Self::TeardownReverted | Self::BothReverted => self,
            }),
            TxExecutionPhase::Teardown => Some(match self {
                Self::Ok | Self::TeardownReverted => Self::TeardownReverted,
                Self::AppLogicReverted | Self::BothReverted => Self::BothReverted,
            }),
        }
    }
}

/// Why a call or a phase reverted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
#[display("{message}")]
pub struct RevertReason {
    /// Human readable description.
    pub message: String,
    /// Raw revert data returned by the call, if any.
    pub revert_data: Vec<U256>,
}

impl RevertReason {
    /// Creates a revert reason with a message and no revert data.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), revert_data: Vec::new() }
    }

    /// Sets the revert data.
    pub fn with_revert_data(mut self, revert_data: Vec<U256>) -> Self {
        self.revert_data = revert_data;
        self
    }
}

/// A request to call a public function, as emitted by private execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCallRequest {
    /// The caller as seen by the public function.
    pub msg_sender: Address,
    /// The contract being called.
    pub contract_address: Address,
    /// Whether the call may not modify state.
    pub is_static_call: bool,
    /// Hash of the calldata, resolved against [`Tx::public_function_calldata`].
    pub calldata_hash: B256,
}

impl PublicCallRequest {
    /// Returns true if this is the zero request used for padding.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A call request with its calldata resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCallRequestWithCalldata {
    /// The request.
    pub request: PublicCallRequest,
    /// The calldata whose hash is `request.calldata_hash`.
    pub calldata: Vec<U256>,
}

impl PublicCallRequestWithCalldata {
    /// Builds a request for `calldata`, computing its hash.
    pub fn new(
        msg_sender: Address,
        contract_address: Address,
        is_static_call: bool,
        calldata: Vec<U256>,
    ) -> Self {
        let calldata_hash = compute_calldata_hash(&calldata);
        Self {
            request: PublicCallRequest {
                msg_sender,
                contract_address,
                is_static_call,
                calldata_hash,
            },
            calldata,
        }
    }

    /// The function selector, which is the first calldata field.
    pub fn function_selector(&self) -> Option<U256> {
        self.calldata.first().copied()
    }
}

/// A list of values together with its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashedValues {
    /// The preimage.
    pub values: Vec<U256>,
    /// `compute_calldata_hash(values)`.
    pub hash: B256,
}

impl HashedValues {
    /// Hashes `values` as calldata.
    pub fn from_calldata(values: Vec<U256>) -> Self {
        let hash = compute_calldata_hash(&values);
        Self { values, hash }
    }
}

/// A message to an L1 contract, scoped by the L2 contract that sent it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedL2ToL1Message {
    /// The L1 recipient.
    pub recipient: Address,
    /// The message content.
    pub content: U256,
    /// The L2 sender.
    pub contract_address: Address,
}

impl ScopedL2ToL1Message {
    /// Returns true if this is the zero message used for padding.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A log emitted by public code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLog {
    /// The emitting contract.
    pub contract_address: Address,
    /// Log fields, zero-padded to the fixed log size when public inputs are generated.
    pub fields: Vec<U256>,
}

/// Side effects produced by private execution and handed over to the public portion.
///
/// The arrays may carry zero padding. Padding is skipped on insertion and is not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateToPublicAccumulatedData {
    /// Note hashes. Non-revertible ones are already unique. Revertible ones are siloed only and
    /// are made unique when inserted, since their nonce depends on their final position.
    pub note_hashes: Vec<U256>,
    /// Siloed nullifiers.
    pub nullifiers: Vec<U256>,
    /// L2-to-L1 messages.
    pub l2_to_l1_msgs: Vec<ScopedL2ToL1Message>,
}

impl PrivateToPublicAccumulatedData {
    /// Number of non-zero note hashes.
    pub fn note_hash_count(&self) -> usize {
        self.note_hashes.iter().filter(|note_hash| !note_hash.is_zero()).count()
    }

    /// Number of non-zero nullifiers.
    pub fn nullifier_count(&self) -> usize {
        self.nullifiers.iter().filter(|nullifier| !nullifier.is_zero()).count()
    }

    /// Number of non-empty L2-to-L1 messages.
    pub fn l2_to_l1_msg_count(&self) -> usize {
        self.l2_to_l1_msgs.iter().filter(|message| !message.is_empty()).count()
    }
}

/// A deployed contract instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInstance {
    /// The instance address.
    pub address: Address,
    /// The deployer.
    pub deployer: Address,
    /// The class the instance currently runs.
    pub current_class_id: B256,
    /// The class the instance was deployed with.
    pub original_class_id: B256,
}

/// A registered contract class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractClass {
    /// The class id.
    pub id: B256,
    /// Public bytecode of the class.
    pub bytecode: Bytes,
}

/// Contracts published by a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployments {
    /// Newly registered classes.
    pub classes: Vec<ContractClass>,
    /// Newly deployed instances.
    pub instances: Vec<ContractInstance>,
}

impl ContractDeployments {
    /// Returns true if nothing is deployed.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.instances.is_empty()
    }
}

/// Block-level values visible to every public call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalVariables {
    /// The chain id.
    pub chain_id: u64,
    /// The protocol version.
    pub version: u64,
    /// The block number.
    pub block_number: u64,
    /// The slot number.
    pub slot_number: u64,
    /// The block timestamp.
    pub timestamp: u64,
    /// The L1 address receiving block rewards.
    pub coinbase: Address,
    /// The L2 address receiving fees.
    pub fee_recipient: Address,
    /// The base gas fees of the block.
    pub gas_fees: GasFees,
}

/// A transaction after private execution, ready for its public portion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    /// The transaction hash.
    pub hash: B256,
    /// Gas limits and fee caps.
    pub gas_settings: GasSettings,
    /// Gas used by private execution. Includes the reserved teardown gas limit when the
    /// transaction has a teardown call.
    pub gas_used_by_private: Gas,
    /// The account paying the fee. The zero address means nobody pays.
    pub fee_payer: Address,
    /// Private side effects that survive any revert.
    pub non_revertible_accumulated_data: PrivateToPublicAccumulatedData,
    /// Private side effects dropped if app logic or teardown reverts.
    pub revertible_accumulated_data: PrivateToPublicAccumulatedData,
    /// Setup call requests, in order.
    pub setup_call_requests: Vec<PublicCallRequest>,
    /// App logic call requests, in order.
    pub app_logic_call_requests: Vec<PublicCallRequest>,
    /// The teardown call request, if any.
    pub teardown_call_request: Option<PublicCallRequest>,
    /// Calldata preimages for all call requests.
    pub public_function_calldata: Vec<HashedValues>,
    /// Contracts deployed by the non-revertible part.
    pub non_revertible_contracts: ContractDeployments,
    /// Contracts deployed by the revertible part.
    pub revertible_contracts: ContractDeployments,
}

impl Tx {
    /// The first nullifier, which makes the transaction unique.
    pub fn first_nullifier(&self) -> Option<U256> {
        self.non_revertible_accumulated_data.nullifiers.first().copied()
    }

    /// The call requests of `phase`, without calldata.
    pub fn call_requests_for_phase(&self, phase: TxExecutionPhase) -> Vec<PublicCallRequest> {
        match phase {
            TxExecutionPhase::Setup => self.setup_call_requests.clone(),
            TxExecutionPhase::AppLogic => self.app_logic_call_requests.clone(),
            TxExecutionPhase::Teardown => self.teardown_call_request.into_iter().collect(),
        }
    }

    /// The call requests of `phase` with their calldata resolved.
    pub fn call_requests_with_calldata_for_phase(
        &self,
        phase: TxExecutionPhase,
    ) -> Result<Vec<PublicCallRequestWithCalldata>, SimulationError> {
        self.call_requests_for_phase(phase)
            .into_iter()
            .map(|request| {
                let calldata = self
                    .public_function_calldata
                    .iter()
                    .find(|values| values.hash == request.calldata_hash)
                    .ok_or(SimulationError::CalldataNotFound {
                        calldata_hash: request.calldata_hash,
                    })?
                    .values
                    .clone();
                Ok(PublicCallRequestWithCalldata { request, calldata })
            })
            .collect()
    }

    /// Returns true if the transaction has no public call requests.
    pub fn is_private_only(&self) -> bool {
        self.setup_call_requests.is_empty() &&
            self.app_logic_call_requests.is_empty() &&
            self.teardown_call_request.is_none()
    }
}
