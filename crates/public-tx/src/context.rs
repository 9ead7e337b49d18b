//! Per-transaction state of public execution.
//!
//! [`PublicTxContext`] is created once per transaction, mutated through the phases and halted
//! exactly once. It owns the gas counters, the revert code, the per-phase call requests and the
//! [`PhaseStateManager`], and assembles the circuit public inputs once halted.
//!
//! ## Gas
//!
//! Private execution already spent some gas, and reserved the full teardown limit. The public
//! portion gets `gas_limits - gas_used_by_private` (clamped) for setup and app logic, which share
//! one running budget. Teardown always gets its own limit. Teardown gas is tracked separately so
//! that the actual gas used can replace the reserved limit with what teardown really spent.

use alloy_primitives::{Address, B256, U256};

use crate::{
    clamp_gas_settings_for_avm, compute_effective_gas_fees, compute_transaction_fee,
    constants::{MAX_ENQUEUED_CALLS_PER_TX, MAX_L2_TO_L1_MSGS_PER_TX, MAX_NOTE_HASHES_PER_TX,
        MAX_NULLIFIERS_PER_TX},
    AvmAccumulatedData, AvmCircuitPublicInputs, EnqueuedCallHint, Gas, GasFees, GasSettings,
    GlobalVariables, PhaseStateManager, PrivateToAvmAccumulatedData, PrivateToPublicAccumulatedData,
    PublicCallRequest, PublicCallRequestArrayLengths, PublicCallRequestWithCalldata,
    PublicContractsDb, PublicTreesDb, PublicTxSimulatorConfig, RevertCode, RevertReason,
    SideEffectArrayLengths, SideEffectKind, SideEffectTrace, SimulationError, StateError,
    StateJournal, TreeSnapshots, Tx, TxExecutionPhase,
};

/// The per-transaction aggregate of public execution.
#[derive(Debug)]
pub struct PublicTxContext<T, C> {
    tx_hash: B256,
    state: PhaseStateManager<T, C>,
    globals: GlobalVariables,
    start_tree_snapshots: TreeSnapshots,
    gas_settings: GasSettings,
    clamped_gas_settings: GasSettings,
    effective_gas_fees: GasFees,
    gas_used_by_private: Gas,
    gas_allocated_to_public: Gas,
    gas_used_by_public: Gas,
    teardown_gas_used: Gas,
    setup_call_requests: Vec<PublicCallRequestWithCalldata>,
    app_logic_call_requests: Vec<PublicCallRequestWithCalldata>,
    teardown_call_requests: Vec<PublicCallRequestWithCalldata>,
    non_revertible_accumulated_data_from_private: PrivateToPublicAccumulatedData,
    revertible_accumulated_data_from_private: PrivateToPublicAccumulatedData,
    fee_payer: Address,
    revert_code: RevertCode,
    revert_reason: Option<RevertReason>,
    halted: bool,
    enqueued_call_hints: Vec<EnqueuedCallHint>,
}

impl<T: PublicTreesDb, C: PublicContractsDb> PublicTxContext<T, C> {
    /// Creates the context of `tx`.
    ///
    /// The state view is tagged with the transaction's first nullifier, which makes note hashes
    /// emitted by public code unique.
    pub fn create(
        trees: T,
        contracts: C,
        tx: &Tx,
        globals: GlobalVariables,
        config: &PublicTxSimulatorConfig,
    ) -> Result<Self, SimulationError> {
        let first_nullifier = tx
            .first_nullifier()
            .ok_or(SimulationError::MissingFirstNullifier { tx_hash: tx.hash })?;

        let setup_call_requests =
            tx.call_requests_with_calldata_for_phase(TxExecutionPhase::Setup)?;
        let app_logic_call_requests =
            tx.call_requests_with_calldata_for_phase(TxExecutionPhase::AppLogic)?;
        let teardown_call_requests =
            tx.call_requests_with_calldata_for_phase(TxExecutionPhase::Teardown)?;
        let enqueued_calls = setup_call_requests.len() +
            app_logic_call_requests.len() +
            teardown_call_requests.len();
        if enqueued_calls > MAX_ENQUEUED_CALLS_PER_TX {
            return Err(SimulationError::TooManyEnqueuedCalls {
                count: enqueued_calls,
                max: MAX_ENQUEUED_CALLS_PER_TX,
            });
        }
        check_private_lengths(tx)?;

        // Non-revertible L2-to-L1 messages from private are not re-emitted, but count towards the
        // per-tx limit.
        let previous_lengths = SideEffectArrayLengths {
            l2_to_l1_msgs: tx.non_revertible_accumulated_data.l2_to_l1_msg_count(),
            ..Default::default()
        };
        let journal = StateJournal::new(SideEffectTrace::new(0, previous_lengths));
        let mut state = PhaseStateManager::new(
            trees,
            contracts,
            journal,
            first_nullifier,
            config.do_merkle_operations,
        );
        let start_tree_snapshots = state.active_state_view().tree_snapshots()?;

        let clamped_gas_settings = clamp_gas_settings_for_avm(
            &tx.gas_settings,
            tx.gas_used_by_private,
            config.max_processable_l2_gas,
        );
        let gas_allocated_to_public =
            clamped_gas_settings.gas_limits.saturating_sub(tx.gas_used_by_private);
        let effective_gas_fees = compute_effective_gas_fees(&globals.gas_fees, &tx.gas_settings);

        tracing::debug!(
            target: "public_tx::context",
            tx_hash = %tx.hash,
            ?gas_allocated_to_public,
            teardown_gas_limits = ?clamped_gas_settings.teardown_gas_limits,
            setup_calls = setup_call_requests.len(),
            app_logic_calls = app_logic_call_requests.len(),
            has_teardown = !teardown_call_requests.is_empty(),
            "Created public tx context"
        );

        Ok(Self {
            tx_hash: tx.hash,
            state,
            globals,
            start_tree_snapshots,
            gas_settings: tx.gas_settings,
            clamped_gas_settings,
            effective_gas_fees,
            gas_used_by_private: tx.gas_used_by_private,
            gas_allocated_to_public,
            gas_used_by_public: Gas::empty(),
            teardown_gas_used: Gas::empty(),
            setup_call_requests,
            app_logic_call_requests,
            teardown_call_requests,
            non_revertible_accumulated_data_from_private: tx
                .non_revertible_accumulated_data
                .clone(),
            revertible_accumulated_data_from_private: tx.revertible_accumulated_data.clone(),
            fee_payer: tx.fee_payer,
            revert_code: RevertCode::Ok,
            revert_reason: None,
            halted: false,
            enqueued_call_hints: Vec::new(),
        })
    }

    /// The transaction hash.
    pub const fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    /// Block-level values.
    pub const fn globals(&self) -> &GlobalVariables {
        &self.globals
    }

    /// The fee payer.
    pub const fn fee_payer(&self) -> Address {
        self.fee_payer
    }

    /// The world state across phases.
    pub const fn state(&self) -> &PhaseStateManager<T, C> {
        &self.state
    }

    /// The world state across phases, mutably.
    pub fn state_mut(&mut self) -> &mut PhaseStateManager<T, C> {
        &mut self.state
    }

    /// Side effects handed over by the non-revertible part of private execution.
    pub const fn non_revertible_accumulated_data_from_private(
        &self,
    ) -> &PrivateToPublicAccumulatedData {
        &self.non_revertible_accumulated_data_from_private
    }

    /// Side effects handed over by the revertible part of private execution.
    pub const fn revertible_accumulated_data_from_private(
        &self,
    ) -> &PrivateToPublicAccumulatedData {
        &self.revertible_accumulated_data_from_private
    }

    /// The revert code so far.
    pub const fn revert_code(&self) -> RevertCode {
        self.revert_code
    }

    /// The first revert reason, if anything reverted.
    pub const fn revert_reason(&self) -> Option<&RevertReason> {
        self.revert_reason.as_ref()
    }

    /// Returns true once [`Self::halt`] was called.
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns true if `phase` has call requests.
    pub fn has_phase(&self, phase: TxExecutionPhase) -> bool {
        !self.call_requests_for_phase(phase).is_empty()
    }

    /// The call requests of `phase`, in order.
    pub fn call_requests_for_phase(
        &self,
        phase: TxExecutionPhase,
    ) -> &[PublicCallRequestWithCalldata] {
        match phase {
            TxExecutionPhase::Setup => &self.setup_call_requests,
            TxExecutionPhase::AppLogic => &self.app_logic_call_requests,
            TxExecutionPhase::Teardown => &self.teardown_call_requests,
        }
    }

    /// The gas an enqueued call in `phase` may spend.
    pub fn gas_left_at_phase(&self, phase: TxExecutionPhase) -> Gas {
        match phase {
            TxExecutionPhase::Teardown => {
                self.clamped_gas_settings.teardown_gas_limits.saturating_sub(self.teardown_gas_used)
            }
            TxExecutionPhase::Setup | TxExecutionPhase::AppLogic => {
                self.gas_allocated_to_public.saturating_sub(self.gas_used_by_public)
            }
        }
    }

    /// Records gas spent by an enqueued call in `phase`.
    pub fn consume_gas(&mut self, phase: TxExecutionPhase, gas: Gas) {
        if phase == TxExecutionPhase::Teardown {
            self.teardown_gas_used += gas;
        } else {
            self.gas_used_by_public += gas;
        }
    }

    /// Records a revert in `phase`.
    ///
    /// A setup revert is returned as [`SimulationError::SetupReverted`]. Otherwise the revert code
    /// moves forward and the first revert reason is kept.
    pub fn revert(
        &mut self,
        phase: TxExecutionPhase,
        reason: RevertReason,
        culprit: &str,
    ) -> Result<(), SimulationError> {
        tracing::debug!(
            target: "public_tx::context",
            tx_hash = %self.tx_hash,
            %phase,
            culprit,
            %reason,
            "Phase reverted"
        );
        let Some(revert_code) = self.revert_code.on_revert(phase) else {
            return Err(SimulationError::SetupReverted {
                phase,
                reason,
                culprit: culprit.to_string(),
            });
        };
        self.revert_code = revert_code;
        if self.revert_reason.is_none() {
            self.revert_reason = Some(reason);
        }
        Ok(())
    }

    /// Records an enqueued call for the prover.
    pub fn record_enqueued_call(
        &mut self,
        phase: TxExecutionPhase,
        call: &PublicCallRequestWithCalldata,
    ) {
        self.enqueued_call_hints.push(EnqueuedCallHint {
            phase,
            msg_sender: call.request.msg_sender,
            contract_address: call.request.contract_address,
            calldata: call.calldata.clone(),
            is_static_call: call.request.is_static_call,
        });
    }

    /// Merges any open fork and ends execution. Gas and fee totals are final afterwards.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn halt(&mut self) -> Result<(), StateError> {
        assert!(!self.halted, "public tx context halted twice");
        if self.state.is_forked() {
            self.state.merge_forked_state()?;
        }
        self.halted = true;
        Ok(())
    }

    /// Gas used by the transaction so far, with teardown counted at its reserved limit.
    pub fn total_gas_used(&self) -> Gas {
        self.gas_used_by_private + self.gas_used_by_public
    }

    /// Gas used by the transaction, with teardown counted at what it actually spent.
    ///
    /// # Panics
    ///
    /// Panics if the context is not halted.
    pub fn actual_gas_used(&self) -> Gas {
        assert!(self.halted, "actual gas used queried before halt");
        let requires_teardown = !self.teardown_call_requests.is_empty();
        let reserved_teardown =
            if requires_teardown { self.gas_settings.teardown_gas_limits } else { Gas::empty() };
        self.total_gas_used().saturating_sub(reserved_teardown) + self.teardown_gas_used
    }

    /// Gas used by public execution, teardown included.
    ///
    /// # Panics
    ///
    /// Panics if the context is not halted.
    pub fn actual_public_gas_used(&self) -> Gas {
        assert!(self.halted, "actual public gas used queried before halt");
        self.gas_used_by_public + self.teardown_gas_used
    }

    /// Gas used by setup and app logic.
    pub const fn gas_used_by_public(&self) -> Gas {
        self.gas_used_by_public
    }

    /// Gas used by teardown.
    pub const fn teardown_gas_used(&self) -> Gas {
        self.teardown_gas_used
    }

    /// The transaction fee as visible in `phase`: zero before teardown, the fee on
    /// [`Self::total_gas_used`] from teardown on.
    pub fn transaction_fee(&self, phase: TxExecutionPhase) -> U256 {
        match phase {
            TxExecutionPhase::Setup | TxExecutionPhase::AppLogic => U256::ZERO,
            TxExecutionPhase::Teardown => compute_transaction_fee(
                &self.globals.gas_fees,
                &self.gas_settings,
                self.total_gas_used(),
            ),
        }
    }

    /// Pads the trees to their fixed per-transaction growth and returns the end snapshots.
    ///
    /// # Panics
    ///
    /// Panics if the context is not halted.
    pub fn pad_trees(&mut self) -> Result<TreeSnapshots, StateError> {
        assert!(self.halted, "trees padded before halt");
        self.state.pad_trees()
    }

    /// Assembles the circuit public inputs from the transaction-level trace.
    ///
    /// # Panics
    ///
    /// Panics if the context is not halted.
    pub fn generate_avm_circuit_public_inputs(
        &self,
        end_tree_snapshots: TreeSnapshots,
    ) -> AvmCircuitPublicInputs {
        assert!(self.halted, "public inputs generated before halt");
        let trace = self.state.tx_journal().trace();

        let l2_to_l1_msgs = self
            .non_revertible_accumulated_data_from_private
            .l2_to_l1_msgs
            .iter()
            .copied()
            .filter(|message| !message.is_empty())
            .chain(trace.l2_to_l1_msgs().iter().map(|message| message.inner))
            .collect();
        let (accumulated_data, accumulated_data_array_lengths) = AvmAccumulatedData::padded(
            trace.note_hashes().iter().map(|note_hash| note_hash.inner).collect(),
            trace.nullifiers().iter().map(|nullifier| nullifier.inner).collect(),
            l2_to_l1_msgs,
            trace.public_logs().iter().map(|log| log.inner.clone()).collect(),
            trace.squashed_public_data_writes(),
        );
        let (previous_non_revertible_accumulated_data, previous_non_revertible_lengths) =
            PrivateToAvmAccumulatedData::from_private(
                &self.non_revertible_accumulated_data_from_private,
            );
        let (previous_revertible_accumulated_data, previous_revertible_lengths) =
            PrivateToAvmAccumulatedData::from_private(
                &self.revertible_accumulated_data_from_private,
            );

        let requests = |calls: &[PublicCallRequestWithCalldata]| -> Vec<PublicCallRequest> {
            calls.iter().map(|call| call.request).collect()
        };

        AvmCircuitPublicInputs {
            global_variables: self.globals,
            start_tree_snapshots: self.start_tree_snapshots,
            start_gas_used: self.gas_used_by_private,
            gas_settings: self.clamped_gas_settings,
            effective_gas_fees: self.effective_gas_fees,
            fee_payer: self.fee_payer,
            public_call_request_array_lengths: PublicCallRequestArrayLengths {
                setup_calls: self.setup_call_requests.len(),
                app_logic_calls: self.app_logic_call_requests.len(),
                teardown_call: !self.teardown_call_requests.is_empty(),
            },
            public_setup_call_requests: AvmCircuitPublicInputs::pad_call_requests(requests(
                &self.setup_call_requests,
            )),
            public_app_logic_call_requests: AvmCircuitPublicInputs::pad_call_requests(requests(
                &self.app_logic_call_requests,
            )),
            public_teardown_call_request: self
                .teardown_call_requests
                .first()
                .map(|call| call.request)
                .unwrap_or_default(),
            previous_non_revertible_accumulated_data_array_lengths: previous_non_revertible_lengths,
            previous_revertible_accumulated_data_array_lengths: previous_revertible_lengths,
            previous_non_revertible_accumulated_data,
            previous_revertible_accumulated_data,
            end_tree_snapshots,
            end_gas_used: self.total_gas_used(),
            accumulated_data_array_lengths,
            accumulated_data,
            transaction_fee: self.transaction_fee(TxExecutionPhase::Teardown),
            reverted: !self.revert_code.is_ok(),
        }
    }

    /// Unwraps the context into its collaborators and the recorded enqueued calls.
    pub fn into_parts(self) -> (T, C, Vec<EnqueuedCallHint>) {
        let (trees, contracts) = self.state.into_parts();
        (trees, contracts, self.enqueued_call_hints)
    }
}

fn check_private_lengths(tx: &Tx) -> Result<(), StateError> {
    let non_revertible = &tx.non_revertible_accumulated_data;
    let revertible = &tx.revertible_accumulated_data;
    let checks = [
        (
            non_revertible.note_hash_count() + revertible.note_hash_count(),
            MAX_NOTE_HASHES_PER_TX,
            SideEffectKind::NoteHash,
        ),
        (
            non_revertible.nullifier_count() + revertible.nullifier_count(),
            MAX_NULLIFIERS_PER_TX,
            SideEffectKind::Nullifier,
        ),
        (
            non_revertible.l2_to_l1_msg_count() + revertible.l2_to_l1_msg_count(),
            MAX_L2_TO_L1_MSGS_PER_TX,
            SideEffectKind::L2ToL1Message,
        ),
    ];
    for (len, limit, kind) in checks {
        if len > limit {
            return Err(StateError::SideEffectLimitReached { kind, limit });
        }
    }
    Ok(())
}
