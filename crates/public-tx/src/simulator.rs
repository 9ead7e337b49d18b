//! The three-phase simulator of a transaction's public portion.
//!
//! [`PublicTxSimulator::simulate`] runs the following steps:
//!
//! 1. Wrap the collaborators in hint-recording decorators and create the [`PublicTxContext`].
//! 2. Insert the non-revertible side effects of private execution. A nullifier collision here is
//!    fatal.
//! 3. Run setup. Any revert is fatal.
//! 4. Fork, then insert the revertible side effects of private execution. A nullifier collision
//!    here reverts app logic, which is then skipped.
//! 5. Run app logic. A revert discards the fork. Without teardown, success merges it.
//! 6. Run teardown in the fork (re-forking if app logic discarded it). A revert discards the fork,
//!    which also undoes app logic.
//! 7. Halt, charge the fee payer, pad the trees and assemble the public inputs.
//!
//! The whole transaction runs inside its own trees checkpoint: a fatal error leaves the
//! collaborators exactly as they were. [`PublicTxSimulator::simulate_for_inclusion`] also treats a
//! result that is not eligible for inclusion as fatal.

use std::time::{Duration, Instant};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    constants::FEE_JUICE_ADDRESS, hash::compute_fee_payer_balance_slot, AvmProvingRequest,
    CallEnv, CallExecutor, CallOutcome, ExecutionHints, Gas, GlobalVariables, HintingContractsDb,
    HintingTreesDb, PublicCallRequestWithCalldata, PublicContractsDb, PublicTreesDb,
    PublicTxContext, PublicTxSimulatorConfig, RevertCode, RevertReason, SimulationError,
    StateError, Tx, TxExecutionPhase,
};

/// The outcome of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedPhase {
    /// The phase.
    pub phase: TxExecutionPhase,
    /// Whether a call of the phase reverted. Later calls of the phase did not run.
    pub reverted: bool,
    /// Why the phase reverted.
    pub revert_reason: Option<RevertReason>,
    /// Return values of each call that ran.
    pub return_values: Vec<Vec<U256>>,
    /// Gas spent by the phase.
    pub gas_used: Gas,
    /// Wall-clock time spent in the phase.
    pub duration: Duration,
}

/// Gas accounting of a simulated transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTxGasUsed {
    /// Gas actually used by the whole transaction, with teardown counted at what it spent.
    pub actual_gas: Gas,
    /// Gas spent by teardown.
    pub teardown_gas: Gas,
    /// Gas spent by public execution, teardown included.
    pub public_gas: Gas,
    /// Gas the fee is computed on, with teardown counted at its reserved limit.
    pub billed_gas: Gas,
}

/// The result of a transaction that can be included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTxResult {
    /// The request to prove the public execution.
    pub avm_proving_request: AvmProvingRequest,
    /// Gas accounting.
    pub gas_used: PublicTxGasUsed,
    /// The fee charged to the fee payer.
    pub transaction_fee: U256,
    /// The revert code.
    pub revert_code: RevertCode,
    /// The first revert reason.
    pub revert_reason: Option<RevertReason>,
    /// The phases that ran, in order.
    pub processed_phases: Vec<ProcessedPhase>,
    /// False if the fee payer could not afford the fee and fee enforcement was skipped. Such a
    /// result is only good for fee estimation.
    pub eligible_for_inclusion: bool,
}

/// Simulates the public portion of transactions against world state.
#[derive(Debug)]
pub struct PublicTxSimulator<T, C, E> {
    trees: T,
    contracts: C,
    executor: E,
    globals: GlobalVariables,
    config: PublicTxSimulatorConfig,
}

impl<T: PublicTreesDb, C: PublicContractsDb, E: CallExecutor> PublicTxSimulator<T, C, E> {
    /// Creates a simulator for transactions of the block described by `globals`.
    pub const fn new(
        trees: T,
        contracts: C,
        executor: E,
        globals: GlobalVariables,
        config: PublicTxSimulatorConfig,
    ) -> Self {
        Self { trees, contracts, executor, globals, config }
    }

    /// The trees.
    pub const fn trees(&self) -> &T {
        &self.trees
    }

    /// The contracts store.
    pub const fn contracts(&self) -> &C {
        &self.contracts
    }

    /// The call executor.
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// The call executor, mutably.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// The block-level values.
    pub const fn globals(&self) -> &GlobalVariables {
        &self.globals
    }

    /// The configuration.
    pub const fn config(&self) -> &PublicTxSimulatorConfig {
        &self.config
    }

    /// Unwraps the simulator into its collaborators.
    pub fn into_parts(self) -> (T, C, E) {
        (self.trees, self.contracts, self.executor)
    }

    /// Simulates the public portion of `tx`.
    ///
    /// Returns an error if the transaction must be discarded: a setup revert, a non-revertible
    /// nullifier collision, an unaffordable fee or an infrastructure failure. Nothing is committed
    /// in that case. Reverts of app logic or teardown are reported in the result.
    pub fn simulate(&mut self, tx: &Tx) -> Result<PublicTxResult, SimulationError> {
        self.simulate_and_commit(tx, false)
    }

    /// Simulates `tx` for inclusion in a block. Same as [`Self::simulate`], except that a result
    /// that is not eligible for inclusion is discarded with
    /// [`SimulationError::IneligibleForInclusion`] instead of being committed.
    pub fn simulate_for_inclusion(&mut self, tx: &Tx) -> Result<PublicTxResult, SimulationError> {
        self.simulate_and_commit(tx, true)
    }

    fn simulate_and_commit(
        &mut self,
        tx: &Tx,
        require_eligible: bool,
    ) -> Result<PublicTxResult, SimulationError> {
        let start = Instant::now();
        tracing::debug!(
            target: "public_tx::simulator",
            tx_hash = %tx.hash,
            "Simulating public calls"
        );

        self.trees.fork().map_err(StateError::trees_db)?;
        match self.simulate_in_checkpoint(tx, require_eligible) {
            Ok(result) => {
                self.trees.merge().map_err(StateError::trees_db)?;
                tracing::debug!(
                    target: "public_tx::simulator",
                    tx_hash = %tx.hash,
                    revert_code = %result.revert_code,
                    actual_gas = ?result.gas_used.actual_gas,
                    fee = %result.transaction_fee,
                    duration = ?start.elapsed(),
                    "Simulated public calls"
                );
                Ok(result)
            }
            Err(CheckpointFailure { error, can_roll_back }) => {
                tracing::warn!(
                    target: "public_tx::simulator",
                    tx_hash = %tx.hash,
                    %error,
                    "Public tx simulation failed"
                );
                // A failed phase fork leaves the checkpoint stack in an unknown state, so the tx
                // checkpoint cannot be told apart from the fork.
                if can_roll_back {
                    if let Err(reject_err) = self.trees.reject() {
                        tracing::warn!(
                            target: "public_tx::simulator",
                            tx_hash = %tx.hash,
                            %reject_err,
                            "Failed to roll back tx checkpoint"
                        );
                    }
                }
                self.contracts.clear_contracts_for_tx();
                Err(error)
            }
        }
    }

    fn simulate_in_checkpoint(
        &mut self,
        tx: &Tx,
        require_eligible: bool,
    ) -> Result<PublicTxResult, CheckpointFailure> {
        let Self { trees, contracts, executor, globals, config } = self;

        // Step 1: wrap the collaborators and create the context
        let mut context = PublicTxContext::create(
            HintingTreesDb::new(&mut *trees),
            HintingContractsDb::new(&mut *contracts),
            tx,
            *globals,
            config,
        )?;

        // Steps 2-6: run the phases
        let processed_phases = match simulate_phases(executor, &mut context, tx) {
            Ok(processed_phases) => processed_phases,
            Err(err) => {
                if let Err(abort_err) = context.state_mut().abort() {
                    tracing::warn!(
                        target: "public_tx::simulator",
                        tx_hash = %tx.hash,
                        %err,
                        %abort_err,
                        "Failed to discard fork"
                    );
                    return Err(CheckpointFailure { error: abort_err.into(), can_roll_back: false });
                }
                return Err(err.into());
            }
        };

        // Step 7: halt, charge the fee and assemble the outputs
        context.halt()?;
        let eligible_for_inclusion = pay_fee(&mut context, config.skip_fee_enforcement)?;
        if require_eligible && !eligible_for_inclusion {
            return Err(SimulationError::IneligibleForInclusion { tx_hash: tx.hash }.into());
        }
        let end_tree_snapshots = context.pad_trees()?;
        let public_inputs = context.generate_avm_circuit_public_inputs(end_tree_snapshots);

        let gas_used = PublicTxGasUsed {
            actual_gas: context.actual_gas_used(),
            teardown_gas: context.teardown_gas_used(),
            public_gas: context.actual_public_gas_used(),
            billed_gas: context.total_gas_used(),
        };
        let revert_code = context.revert_code();
        let revert_reason = context.revert_reason().cloned();
        let transaction_fee = public_inputs.transaction_fee;

        let (trees, mut contracts, enqueued_calls) = context.into_parts();
        if !revert_code.is_ok() {
            contracts.clear_contracts_for_tx();
            contracts.add_new_non_revertible_contracts(tx).map_err(StateError::contracts_db)?;
        }
        contracts.commit_contracts_for_tx().map_err(StateError::contracts_db)?;

        let hints = ExecutionHints {
            tx_hash: tx.hash,
            enqueued_calls,
            trees: trees.into_hints(),
            contracts: contracts.into_hints(),
        };

        Ok(PublicTxResult {
            avm_proving_request: AvmProvingRequest::new(hints, public_inputs),
            gas_used,
            transaction_fee,
            revert_code,
            revert_reason,
            processed_phases,
            eligible_for_inclusion,
        })
    }
}

/// A simulation that failed inside the transaction checkpoint.
#[derive(Debug)]
struct CheckpointFailure {
    error: SimulationError,
    /// False if the checkpoint stack of the trees can no longer be trusted.
    can_roll_back: bool,
}

impl From<SimulationError> for CheckpointFailure {
    fn from(error: SimulationError) -> Self {
        Self { error, can_roll_back: true }
    }
}

impl From<StateError> for CheckpointFailure {
    fn from(error: StateError) -> Self {
        SimulationError::from(error).into()
    }
}

fn simulate_phases<T, C, E>(
    executor: &mut E,
    context: &mut PublicTxContext<T, C>,
    tx: &Tx,
) -> Result<Vec<ProcessedPhase>, SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
    E: CallExecutor,
{
    let mut processed_phases = Vec::new();

    insert_non_revertibles_from_private(context, tx)?;

    if context.has_phase(TxExecutionPhase::Setup) {
        processed_phases.push(simulate_phase(executor, context, TxExecutionPhase::Setup)?);
    }

    let revertibles_inserted = insert_revertibles_from_private(context, tx)?;

    if revertibles_inserted && context.has_phase(TxExecutionPhase::AppLogic) {
        let result = simulate_phase(executor, context, TxExecutionPhase::AppLogic)?;
        if result.reverted {
            context.state_mut().discard_forked_state()?;
        } else if !context.has_phase(TxExecutionPhase::Teardown) {
            context.state_mut().merge_forked_state()?;
        }
        processed_phases.push(result);
    }

    if context.has_phase(TxExecutionPhase::Teardown) {
        if !context.state().is_forked() {
            context.state_mut().fork()?;
        }
        let result = simulate_phase(executor, context, TxExecutionPhase::Teardown)?;
        if result.reverted {
            context.state_mut().discard_forked_state()?;
        } else {
            context.state_mut().merge_forked_state()?;
        }
        processed_phases.push(result);
    }

    Ok(processed_phases)
}

/// Inserts private side effects that survive any revert into the transaction-level state.
fn insert_non_revertibles_from_private<T, C>(
    context: &mut PublicTxContext<T, C>,
    tx: &Tx,
) -> Result<(), SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
{
    let data = context.non_revertible_accumulated_data_from_private().clone();
    let state = context.state_mut();
    state.contracts_mut().add_new_non_revertible_contracts(tx).map_err(StateError::contracts_db)?;

    let mut view = state.active_state_view();
    for nullifier in data.nullifiers.into_iter().filter(|nullifier| !nullifier.is_zero()) {
        view.write_siloed_nullifier(nullifier).map_err(|err| match err {
            StateError::NullifierCollision { .. } => {
                SimulationError::NonRevertibleNullifierCollision(err)
            }
            err => err.into(),
        })?;
    }
    for note_hash in data.note_hashes.into_iter().filter(|note_hash| !note_hash.is_zero()) {
        view.write_unique_note_hash(note_hash)?;
    }
    Ok(())
}

/// Forks the state and inserts the revertible private side effects into the fork.
///
/// Returns false if a nullifier collided. App logic is then reverted without running and the fork
/// is discarded.
fn insert_revertibles_from_private<T, C>(
    context: &mut PublicTxContext<T, C>,
    tx: &Tx,
) -> Result<bool, SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
{
    let data = context.revertible_accumulated_data_from_private().clone();
    context.state_mut().fork()?;

    let collision = {
        let mut view = context.state_mut().active_state_view();
        let mut collision = None;
        for nullifier in data.nullifiers.iter().copied().filter(|nullifier| !nullifier.is_zero()) {
            match view.write_siloed_nullifier(nullifier) {
                Ok(()) => {}
                Err(err @ StateError::NullifierCollision { .. }) => {
                    collision = Some(err);
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        collision
    };
    if let Some(err) = collision {
        tracing::debug!(
            target: "public_tx::simulator",
            tx_hash = %context.tx_hash(),
            %err,
            "Revertible nullifier collision"
        );
        context.state_mut().discard_forked_state()?;
        let reason = RevertReason::new(format!(
            "Nullifier collision encountered when inserting revertible nullifiers from private: \
             {err}"
        ));
        context.revert(TxExecutionPhase::AppLogic, reason, "revertible private nullifiers")?;
        return Ok(false);
    }

    let state = context.state_mut();
    let mut view = state.active_state_view();
    for note_hash in data.note_hashes.into_iter().filter(|note_hash| !note_hash.is_zero()) {
        view.write_siloed_note_hash(note_hash)?;
    }
    for message in data.l2_to_l1_msgs.into_iter().filter(|message| !message.is_empty()) {
        view.write_scoped_l2_to_l1_message(message)?;
    }
    state.contracts_mut().add_new_revertible_contracts(tx).map_err(StateError::contracts_db)?;
    Ok(true)
}

/// Runs the calls of `phase` in order, stopping at the first one that reverts.
fn simulate_phase<T, C, E>(
    executor: &mut E,
    context: &mut PublicTxContext<T, C>,
    phase: TxExecutionPhase,
) -> Result<ProcessedPhase, SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
    E: CallExecutor,
{
    let start = Instant::now();
    let calls = context.call_requests_for_phase(phase).to_vec();
    tracing::debug!(
        target: "public_tx::simulator",
        tx_hash = %context.tx_hash(),
        %phase,
        calls = calls.len(),
        "Simulating phase"
    );

    let mut processed = ProcessedPhase {
        phase,
        reverted: false,
        revert_reason: None,
        return_values: Vec::with_capacity(calls.len()),
        gas_used: Gas::empty(),
        duration: Duration::ZERO,
    };
    for call in &calls {
        let (outcome, gas_used) = simulate_enqueued_call(executor, context, phase, call)?;
        processed.gas_used += gas_used;
        processed.return_values.push(outcome.output);
        if outcome.reverted {
            processed.reverted = true;
            processed.revert_reason = outcome.revert_reason;
            break;
        }
    }
    processed.duration = start.elapsed();
    Ok(processed)
}

/// Runs one call with the gas left in `phase`, and records its gas and revert.
fn simulate_enqueued_call<T, C, E>(
    executor: &mut E,
    context: &mut PublicTxContext<T, C>,
    phase: TxExecutionPhase,
    call: &PublicCallRequestWithCalldata,
) -> Result<(CallOutcome, Gas), SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
    E: CallExecutor,
{
    let allocated_gas = context.gas_left_at_phase(phase);
    let globals = *context.globals();
    let env = CallEnv {
        phase,
        contract_address: call.request.contract_address,
        sender: call.request.msg_sender,
        transaction_fee: context.transaction_fee(phase),
        globals: &globals,
        is_static_call: call.request.is_static_call,
        calldata: &call.calldata,
        allocated_gas,
    };
    context.record_enqueued_call(phase, call);

    let outcome = executor.execute(&mut context.state_mut().active_state_view(), &env)?;
    let gas_used = allocated_gas.saturating_sub(outcome.gas_left);
    context.consume_gas(phase, gas_used);
    tracing::trace!(
        target: "public_tx::simulator",
        %phase,
        contract = %call.request.contract_address,
        reverted = outcome.reverted,
        ?gas_used,
        "Simulated enqueued call"
    );

    if outcome.reverted {
        let reason = outcome
            .revert_reason
            .clone()
            .unwrap_or_else(|| RevertReason::new("Reverted without a reason"));
        let culprit = match call.function_selector() {
            Some(selector) => format!("{}:{selector:#x}", call.request.contract_address),
            None => call.request.contract_address.to_string(),
        };
        context.revert(phase, reason, &culprit)?;
    }
    Ok((outcome, gas_used))
}

/// Debits the transaction fee from the fee payer's Fee Juice balance.
///
/// Returns false if the balance was short and fee enforcement was skipped.
fn pay_fee<T, C>(
    context: &mut PublicTxContext<T, C>,
    skip_fee_enforcement: bool,
) -> Result<bool, SimulationError>
where
    T: PublicTreesDb,
    C: PublicContractsDb,
{
    let fee = context.transaction_fee(TxExecutionPhase::Teardown);
    let fee_payer = context.fee_payer();
    let tx_hash = context.tx_hash();
    if fee_payer.is_zero() {
        tracing::debug!(target: "public_tx::simulator", %tx_hash, %fee, "No one is paying the fee");
        return Ok(true);
    }

    let balance_slot = compute_fee_payer_balance_slot(fee_payer);
    let mut view = context.state_mut().active_state_view();
    let balance = view.read_storage(FEE_JUICE_ADDRESS, balance_slot)?;
    let mut eligible_for_inclusion = true;
    if balance < fee {
        if !skip_fee_enforcement {
            return Err(SimulationError::InsufficientFeePayerBalance { fee_payer, balance, fee });
        }
        tracing::warn!(
            target: "public_tx::simulator",
            %tx_hash,
            %fee_payer,
            %balance,
            %fee,
            "Fee payer cannot afford the fee, skipping enforcement"
        );
        eligible_for_inclusion = false;
    }
    tracing::debug!(target: "public_tx::simulator", %tx_hash, %fee_payer, %fee, "Deducting fee");
    view.write_storage(FEE_JUICE_ADDRESS, balance_slot, balance.saturating_sub(fee), true)?;
    Ok(eligible_for_inclusion)
}
