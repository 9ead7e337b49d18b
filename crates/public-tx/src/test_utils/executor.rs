use std::collections::VecDeque;

use alloy_primitives::{Address, U256};

use crate::{
    CallEnv, CallExecutor, CallOutcome, Gas, PublicContractsDb, PublicStateView, PublicTreesDb,
    RevertReason, StateError, TxExecutionPhase,
};

/// A state access performed by a [`ScriptedCall`] on behalf of the called contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAction {
    /// Writes a storage slot.
    WriteStorage {
        /// The slot.
        slot: U256,
        /// The value.
        value: U256,
    },
    /// Reads a storage slot and appends the value to the output.
    ReadStorage {
        /// The slot.
        slot: U256,
    },
    /// Emits a nullifier.
    EmitNullifier(U256),
    /// Emits a note hash.
    EmitNoteHash(U256),
    /// Sends an L2-to-L1 message.
    SendL2ToL1Message {
        /// The L1 recipient.
        recipient: Address,
        /// The content.
        content: U256,
    },
    /// Emits a public log.
    EmitPublicLog(Vec<U256>),
    /// Appends the transaction fee visible to the call to the output.
    ReadTransactionFee,
    /// Resolves the bytecode of a contract and appends its length to the output, or nothing if
    /// the contract is unknown.
    GetBytecode(Address),
}

impl CallAction {
    const fn modifies_state(&self) -> bool {
        !matches!(
            self,
            Self::ReadStorage { .. } | Self::ReadTransactionFee | Self::GetBytecode(_)
        )
    }
}

/// The scripted behavior of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedCall {
    /// State accesses, in order.
    pub actions: Vec<CallAction>,
    /// Gas the call spends. A call that would spend more than it is allocated runs out of gas.
    pub gas_used: Gas,
    /// Revert message, if the call reverts after performing its actions.
    pub revert: Option<String>,
}

impl ScriptedCall {
    /// A call spending `gas_used` and doing nothing else.
    pub fn new(gas_used: Gas) -> Self {
        Self { gas_used, ..Default::default() }
    }

    /// Adds a storage write.
    pub fn write_storage(mut self, slot: u64, value: u64) -> Self {
        self.actions
            .push(CallAction::WriteStorage { slot: U256::from(slot), value: U256::from(value) });
        self
    }

    /// Adds a storage read.
    pub fn read_storage(mut self, slot: u64) -> Self {
        self.actions.push(CallAction::ReadStorage { slot: U256::from(slot) });
        self
    }

    /// Adds a nullifier.
    pub fn emit_nullifier(mut self, nullifier: u64) -> Self {
        self.actions.push(CallAction::EmitNullifier(U256::from(nullifier)));
        self
    }

    /// Adds a note hash.
    pub fn emit_note_hash(mut self, note_hash: u64) -> Self {
        self.actions.push(CallAction::EmitNoteHash(U256::from(note_hash)));
        self
    }

    /// Adds an L2-to-L1 message.
    pub fn send_l2_to_l1_message(mut self, recipient: Address, content: u64) -> Self {
        self.actions
            .push(CallAction::SendL2ToL1Message { recipient, content: U256::from(content) });
        self
    }

    /// Adds a public log.
    pub fn emit_public_log(mut self, fields: Vec<U256>) -> Self {
        self.actions.push(CallAction::EmitPublicLog(fields));
        self
    }

    /// Adds a read of the transaction fee.
    pub fn read_transaction_fee(mut self) -> Self {
        self.actions.push(CallAction::ReadTransactionFee);
        self
    }

    /// Adds a bytecode lookup of `address`.
    pub fn get_bytecode(mut self, address: Address) -> Self {
        self.actions.push(CallAction::GetBytecode(address));
        self
    }

    /// Makes the call revert with `message`.
    pub fn reverting(mut self, message: &str) -> Self {
        self.revert = Some(message.to_string());
        self
    }
}

/// What a [`ScriptedCallExecutor`] was asked to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The phase.
    pub phase: TxExecutionPhase,
    /// The called contract.
    pub contract_address: Address,
    /// The caller.
    pub sender: Address,
    /// The transaction fee visible to the call.
    pub transaction_fee: U256,
    /// Whether the call was static.
    pub is_static_call: bool,
    /// The calldata.
    pub calldata: Vec<U256>,
    /// The gas allocated to the call.
    pub allocated_gas: Gas,
}

/// A [`CallExecutor`] that plays back [`ScriptedCall`]s in invocation order.
///
/// Once the scripts run out, calls succeed spending the default gas.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCallExecutor {
    scripts: VecDeque<ScriptedCall>,
    default_gas_used: Gas,
    calls: Vec<RecordedCall>,
}

impl ScriptedCallExecutor {
    /// Creates an executor whose unscripted calls spend `default_gas_used`.
    pub fn new(default_gas_used: Gas) -> Self {
        Self { default_gas_used, ..Default::default() }
    }

    /// Queues the script of the next call.
    pub fn push(&mut self, call: ScriptedCall) {
        self.scripts.push_back(call);
    }

    /// Queues the script of the next call.
    pub fn call(mut self, call: ScriptedCall) -> Self {
        self.push(call);
        self
    }

    /// The calls executed so far.
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// The calls executed so far in `phase`.
    pub fn calls_in_phase(&self, phase: TxExecutionPhase) -> Vec<&RecordedCall> {
        self.calls.iter().filter(|call| call.phase == phase).collect()
    }

    fn apply<T: PublicTreesDb, C: PublicContractsDb>(
        state: &mut PublicStateView<'_, T, C>,
        env: &CallEnv<'_>,
        action: CallAction,
        output: &mut Vec<U256>,
    ) -> Result<(), StateError> {
        let contract = env.contract_address;
        if env.is_static_call && action.modifies_state() {
            return Err(StateError::StaticCallModification { contract });
        }
        match action {
            CallAction::WriteStorage { slot, value } => {
                state.write_storage(contract, slot, value, false)?;
            }
            CallAction::ReadStorage { slot } => output.push(state.read_storage(contract, slot)?),
            CallAction::EmitNullifier(nullifier) => state.write_nullifier(contract, nullifier)?,
            CallAction::EmitNoteHash(note_hash) => state.write_note_hash(contract, note_hash)?,
            CallAction::SendL2ToL1Message { recipient, content } => {
                state.write_l2_to_l1_message(contract, recipient, content)?;
            }
            CallAction::EmitPublicLog(fields) => state.write_public_log(contract, fields)?,
            CallAction::ReadTransactionFee => output.push(env.transaction_fee),
            CallAction::GetBytecode(address) => {
                if let Some(bytecode) = state.bytecode(address)? {
                    output.push(U256::from(bytecode.len()));
                }
            }
        }
        Ok(())
    }
}

impl CallExecutor for ScriptedCallExecutor {
    fn execute<T: PublicTreesDb, C: PublicContractsDb>(
        &mut self,
        state: &mut PublicStateView<'_, T, C>,
        env: &CallEnv<'_>,
    ) -> Result<CallOutcome, StateError> {
        self.calls.push(RecordedCall {
            phase: env.phase,
            contract_address: env.contract_address,
            sender: env.sender,
            transaction_fee: env.transaction_fee,
            is_static_call: env.is_static_call,
            calldata: env.calldata.to_vec(),
            allocated_gas: env.allocated_gas,
        });
        let script =
            self.scripts.pop_front().unwrap_or_else(|| ScriptedCall::new(self.default_gas_used));

        if script.gas_used.exceeds(&env.allocated_gas) {
            let reason = RevertReason::new("Out of gas");
            return Ok(CallOutcome::revert(Gas::empty(), reason, Vec::new()));
        }
        let gas_left = env.allocated_gas - script.gas_used;

        let mut output = Vec::new();
        for action in script.actions {
            match Self::apply(state, env, action, &mut output) {
                Ok(()) => {}
                Err(err) if err.is_revert() => {
                    let reason = RevertReason::new(err.to_string());
                    return Ok(CallOutcome::revert(gas_left, reason, output));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(match script.revert {
            Some(message) => CallOutcome::revert(gas_left, RevertReason::new(message), output),
            None => CallOutcome::success(gas_left, output),
        })
    }
}
