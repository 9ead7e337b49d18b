//! Tests for the phase lifecycle of the public transaction simulator.

use alloy_primitives::{address, Address, B256, U256};
use public_tx::{
    constants::{
        MAX_ENQUEUED_CALLS_PER_TX, MAX_L2_TO_L1_MSGS_PER_TX, MAX_NOTE_HASHES_PER_TX,
        MAX_NULLIFIERS_PER_TX, MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS,
        MAX_PUBLIC_LOGS_PER_TX, PUBLIC_LOG_SIZE_IN_FIELDS,
    },
    hash::{
        compute_note_hash_nonce, compute_public_data_leaf_slot, compute_unique_note_hash,
        silo_note_hash, silo_nullifier,
    },
    test_utils::{
        MemoryContractsDb, MemoryTreesDb, ScriptedCall, ScriptedCallExecutor, TxBuilder,
        TEST_FIRST_NULLIFIER,
    },
    CheckpointAction, ContractClass, ContractInstance, Gas, GasFees, GasSettings, GlobalVariables,
    PublicDataWrite, PublicTxResult, PublicTxSimulator, PublicTxSimulatorConfig, RevertCode,
    ScopedL2ToL1Message, SimulationError, StateError, Tx, TxExecutionPhase,
};

const CONTRACT: Address = address!("1000000000000000000000000000000000000001");
const OTHER_CONTRACT: Address = address!("1000000000000000000000000000000000000002");
const RECIPIENT: Address = address!("2000000000000000000000000000000000000002");

const CALL_GAS: Gas = Gas::new(1, 10);

type Simulator = PublicTxSimulator<MemoryTreesDb, MemoryContractsDb, ScriptedCallExecutor>;

fn gas_settings() -> GasSettings {
    GasSettings::new(
        Gas::new(1_000, 10_000),
        Gas::new(100, 1_000),
        GasFees::new(2, 3),
        GasFees::default(),
    )
}

fn globals() -> GlobalVariables {
    GlobalVariables {
        chain_id: 1,
        block_number: 7,
        gas_fees: GasFees::new(2, 3),
        ..Default::default()
    }
}

/// A transaction builder with generous gas settings.
fn tx() -> TxBuilder {
    TxBuilder::new().gas_settings(gas_settings()).gas_used_by_private(Gas::new(10, 100))
}

fn simulator_with(
    trees: MemoryTreesDb,
    contracts: MemoryContractsDb,
    scripts: Vec<ScriptedCall>,
    config: PublicTxSimulatorConfig,
) -> Simulator {
    let mut executor = ScriptedCallExecutor::new(CALL_GAS);
    for script in scripts {
        executor.push(script);
    }
    PublicTxSimulator::new(trees, contracts, executor, globals(), config)
}

fn simulator(trees: MemoryTreesDb, scripts: Vec<ScriptedCall>) -> Simulator {
    simulator_with(trees, MemoryContractsDb::default(), scripts, Default::default())
}

fn simulate(simulator: &mut Simulator, tx: &Tx) -> PublicTxResult {
    simulator.simulate(tx).expect("simulation failed")
}

fn storage(simulator: &Simulator, slot: u64) -> U256 {
    simulator.trees().storage(CONTRACT, U256::from(slot))
}

fn phases(result: &PublicTxResult) -> Vec<TxExecutionPhase> {
    result.processed_phases.iter().map(|phase| phase.phase).collect()
}

#[test]
fn test_all_phases_succeed() {
    let tx = tx()
        .setup_call(CONTRACT, vec![U256::from(1)])
        .app_logic_call(CONTRACT, vec![U256::from(2)])
        .app_logic_call(CONTRACT, vec![U256::from(3)])
        .teardown_call(CONTRACT, vec![U256::from(4)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 11),
            ScriptedCall::new(CALL_GAS).write_storage(2, 22),
            ScriptedCall::new(CALL_GAS).write_storage(3, 33),
            ScriptedCall::new(CALL_GAS).write_storage(4, 44),
        ],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::Ok);
    assert_eq!(result.revert_reason, None);
    assert!(result.eligible_for_inclusion);
    assert_eq!(
        phases(&result),
        [TxExecutionPhase::Setup, TxExecutionPhase::AppLogic, TxExecutionPhase::Teardown]
    );
    assert_eq!(result.processed_phases[1].return_values.len(), 2);
    assert_eq!(simulator.executor().calls().len(), 4);
    for (slot, value) in [(1, 11u64), (2, 22), (3, 33), (4, 44)] {
        assert_eq!(storage(&simulator, slot), U256::from(value));
    }
    assert_eq!(simulator.trees().checkpoint_depth(), 0);

    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert!(!public_inputs.reverted);
    assert_eq!(public_inputs.accumulated_data_array_lengths.public_data_writes, 4);
    assert_eq!(public_inputs.public_call_request_array_lengths.setup_calls, 1);
    assert_eq!(public_inputs.public_call_request_array_lengths.app_logic_calls, 2);
    assert!(public_inputs.public_call_request_array_lengths.teardown_call);
}

#[test]
fn test_app_logic_revert_rolls_back_to_end_of_setup() {
    let tx = tx()
        .setup_call(CONTRACT, vec![U256::from(1)])
        .app_logic_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(5, 10),
            ScriptedCall::new(CALL_GAS).write_storage(5, 20).reverting("Assertion failed"),
        ],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert_eq!(result.revert_reason.as_ref().unwrap().message, "Assertion failed");
    assert_eq!(storage(&simulator, 5), U256::from(10));
    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert!(public_inputs.reverted);
    assert_eq!(
        public_inputs.accumulated_data.public_data_writes[0],
        PublicDataWrite::new(compute_public_data_leaf_slot(CONTRACT, U256::from(5)), U256::from(10))
    );
    assert_eq!(public_inputs.accumulated_data_array_lengths.public_data_writes, 1);
}

#[test]
fn test_app_logic_stops_at_first_revert() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .app_logic_call(CONTRACT, vec![U256::from(2)])
        .app_logic_call(CONTRACT, vec![U256::from(3)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS), ScriptedCall::new(CALL_GAS).reverting("boom")],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert_eq!(simulator.executor().calls().len(), 2);
    let app_logic = &result.processed_phases[0];
    assert!(app_logic.reverted);
    assert_eq!(app_logic.return_values.len(), 2);
    assert_eq!(app_logic.gas_used, CALL_GAS + CALL_GAS);
}

#[test]
fn test_app_logic_without_teardown_merges_fork() {
    let tx = tx().app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator =
        simulator(MemoryTreesDb::default(), vec![ScriptedCall::new(CALL_GAS).write_storage(1, 9)]);

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::Ok);
    assert_eq!(storage(&simulator, 1), U256::from(9));
    assert_eq!(
        result.avm_proving_request.inputs.hints.trees.checkpoint_actions,
        [CheckpointAction::Create, CheckpointAction::Commit]
    );
}

#[test]
fn test_teardown_revert_discards_app_logic() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 7).emit_nullifier(3),
            ScriptedCall::new(CALL_GAS).reverting("teardown failed"),
        ],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::TeardownReverted);
    assert_eq!(result.revert_reason.as_ref().unwrap().message, "teardown failed");
    assert_eq!(storage(&simulator, 1), U256::ZERO);
    assert!(!simulator.trees().contains_nullifier(silo_nullifier(CONTRACT, U256::from(3))));
    assert!(simulator.trees().contains_nullifier(TEST_FIRST_NULLIFIER));
}

#[test]
fn test_both_phases_revert() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).reverting("app logic failed"),
            ScriptedCall::new(CALL_GAS).write_storage(2, 2).reverting("teardown failed"),
        ],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::BothReverted);
    // The first revert reason sticks.
    assert_eq!(result.revert_reason.as_ref().unwrap().message, "app logic failed");
    assert_eq!(storage(&simulator, 2), U256::ZERO);
    assert_eq!(phases(&result), [TxExecutionPhase::AppLogic, TxExecutionPhase::Teardown]);
}

#[test]
fn test_teardown_runs_after_app_logic_revert() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 1).reverting("app logic failed"),
            ScriptedCall::new(CALL_GAS).write_storage(2, 2),
        ],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert_eq!(storage(&simulator, 1), U256::ZERO);
    assert_eq!(storage(&simulator, 2), U256::from(2));
}

#[test]
fn test_setup_revert_is_fatal_and_leaves_no_state() {
    let tx = tx()
        .non_revertible_note_hash(U256::from(77))
        .setup_call(CONTRACT, vec![U256::from(1)])
        .app_logic_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS).write_storage(1, 1).reverting("setup failed")],
    );

    let err = simulator.simulate(&tx).unwrap_err();

    assert!(err.is_setup_revert());
    let SimulationError::SetupReverted { phase, reason, .. } = err else { unreachable!() };
    assert_eq!(phase, TxExecutionPhase::Setup);
    assert_eq!(reason.message, "setup failed");
    assert_eq!(simulator.executor().calls().len(), 1);
    assert_eq!(storage(&simulator, 1), U256::ZERO);
    assert!(!simulator.trees().contains_nullifier(TEST_FIRST_NULLIFIER));
    assert!(simulator.trees().note_hashes().is_empty());
    assert_eq!(simulator.trees().checkpoint_depth(), 0);
}

#[test]
fn test_non_revertible_nullifier_collision_is_fatal() {
    let tx = tx().app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator = simulator(MemoryTreesDb::default().nullifier(TEST_FIRST_NULLIFIER), vec![]);

    let err = simulator.simulate(&tx).unwrap_err();

    assert!(matches!(
        err,
        SimulationError::NonRevertibleNullifierCollision(StateError::NullifierCollision {
            siloed_nullifier
        }) if siloed_nullifier == TEST_FIRST_NULLIFIER
    ));
    assert!(simulator.executor().calls().is_empty());
    assert_eq!(simulator.trees().checkpoint_depth(), 0);
}

#[test]
fn test_revertible_nullifier_collision_skips_app_logic() {
    let colliding = U256::from(0xc011);
    let tx = tx()
        .revertible_nullifier(U256::from(6))
        .revertible_nullifier(colliding)
        .revertible_note_hash(U256::from(5))
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(MemoryTreesDb::default().nullifier(colliding), vec![]);

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert!(result.revert_reason.as_ref().unwrap().message.contains("Nullifier collision"));
    assert!(simulator.executor().calls_in_phase(TxExecutionPhase::AppLogic).is_empty());
    assert_eq!(simulator.executor().calls_in_phase(TxExecutionPhase::Teardown).len(), 1);
    assert_eq!(phases(&result), [TxExecutionPhase::Teardown]);
    // Revertible private effects inserted before the collision are gone too.
    assert!(!simulator.trees().contains_nullifier(U256::from(6)));
    assert!(!simulator.trees().note_hashes().contains(&U256::from(5)));
}

#[test]
fn test_missing_first_nullifier() {
    let tx = tx().without_first_nullifier().app_logic_call(CONTRACT, vec![]).build();
    let mut simulator = simulator(MemoryTreesDb::default(), vec![]);

    let err = simulator.simulate(&tx).unwrap_err();

    assert_eq!(err, SimulationError::MissingFirstNullifier { tx_hash: tx.hash });
    assert_eq!(simulator.trees().checkpoint_depth(), 0);
}

#[test]
fn test_infrastructure_error_is_fatal() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default().failing(),
        vec![ScriptedCall::new(CALL_GAS).write_storage(1, 1)],
    );

    let err = simulator.simulate(&tx).unwrap_err();

    assert!(matches!(err, SimulationError::State(StateError::TreesDb(_))));
    assert_eq!(simulator.executor().calls().len(), 1);
    assert_eq!(simulator.trees().checkpoint_depth(), 0);
    assert!(!simulator.trees().contains_nullifier(TEST_FIRST_NULLIFIER));
}

#[test]
fn test_failed_fork_rollback_keeps_tx_checkpoint() {
    let tx = tx().app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator = simulator(
        MemoryTreesDb::default().failing().failing_rejects(),
        vec![ScriptedCall::new(CALL_GAS).write_storage(1, 1)],
    );

    let err = simulator.simulate(&tx).unwrap_err();

    assert_eq!(err, SimulationError::State(StateError::TreesDb("rollback unavailable".into())));
    // Only the app logic fork was rolled back; the tx checkpoint under it is left alone.
    assert_eq!(simulator.trees().reject_attempts(), 1);
    assert_eq!(simulator.trees().checkpoint_depth(), 2);
}

#[test]
fn test_static_call_modification_reverts() {
    let tx = tx().static_app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator =
        simulator(MemoryTreesDb::default(), vec![ScriptedCall::new(CALL_GAS).write_storage(1, 1)]);

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert!(simulator.executor().calls()[0].is_static_call);
    assert_eq!(storage(&simulator, 1), U256::ZERO);
}

#[test]
fn test_user_nullifier_collision_reverts_the_call() {
    let tx = tx().app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS).emit_nullifier(3).emit_nullifier(3)],
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert!(!simulator.trees().contains_nullifier(silo_nullifier(CONTRACT, U256::from(3))));
}

#[test]
fn test_squashed_public_data_writes() {
    let slot_a = 0xa;
    let slot_c = 0xc;
    let tx = tx().app_logic_call(CONTRACT, vec![U256::from(1)]).build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS)
            .write_storage(slot_a, 0x101)
            .write_storage(slot_c, 0x201)
            .write_storage(slot_a, 0x103)
            .write_storage(slot_c, 0x102)
            .write_storage(slot_c, 0x152)],
    );

    let result = simulate(&mut simulator, &tx);

    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert_eq!(public_inputs.accumulated_data_array_lengths.public_data_writes, 2);
    let leaf_slot = |slot: u64| compute_public_data_leaf_slot(CONTRACT, U256::from(slot));
    assert_eq!(
        public_inputs.accumulated_data.public_data_writes[..3],
        [
            PublicDataWrite::new(leaf_slot(slot_a), U256::from(0x103)),
            PublicDataWrite::new(leaf_slot(slot_c), U256::from(0x152)),
            PublicDataWrite::default(),
        ]
    );
    assert_eq!(storage(&simulator, slot_c), U256::from(0x152));
}

#[test]
fn test_public_inputs_are_padded() {
    let message = ScopedL2ToL1Message {
        recipient: RECIPIENT,
        content: U256::from(8),
        contract_address: OTHER_CONTRACT,
    };
    let tx = tx()
        .non_revertible_l2_to_l1_message(message)
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS)
            .emit_note_hash(1)
            .emit_nullifier(2)
            .send_l2_to_l1_message(RECIPIENT, 9)
            .emit_public_log(vec![U256::from(1), U256::from(2)])],
    );

    let result = simulate(&mut simulator, &tx);

    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    let lengths = public_inputs.accumulated_data_array_lengths;
    assert_eq!(lengths.note_hashes, 1);
    assert_eq!(lengths.nullifiers, 2);
    assert_eq!(lengths.l2_to_l1_msgs, 2);
    assert_eq!(lengths.public_logs, 1);

    let data = &public_inputs.accumulated_data;
    assert_eq!(data.note_hashes.len(), MAX_NOTE_HASHES_PER_TX);
    assert_eq!(data.nullifiers.len(), MAX_NULLIFIERS_PER_TX);
    assert_eq!(data.nullifiers[0], TEST_FIRST_NULLIFIER);
    assert_eq!(data.l2_to_l1_msgs.len(), MAX_L2_TO_L1_MSGS_PER_TX);
    // Non-revertible private messages come first.
    assert_eq!(data.l2_to_l1_msgs[0], message);
    assert_eq!(data.l2_to_l1_msgs[1].content, U256::from(9));
    assert_eq!(data.public_logs.len(), MAX_PUBLIC_LOGS_PER_TX);
    assert!(data.public_logs.iter().all(|log| log.fields.len() == PUBLIC_LOG_SIZE_IN_FIELDS));
    assert_eq!(public_inputs.public_setup_call_requests.len(), MAX_ENQUEUED_CALLS_PER_TX);
    assert_eq!(public_inputs.public_app_logic_call_requests.len(), MAX_ENQUEUED_CALLS_PER_TX);
    assert!(public_inputs.public_teardown_call_request.is_empty());

    // The trees grow by a fixed number of leaves per transaction.
    assert_eq!(simulator.trees().note_hashes().len(), MAX_NOTE_HASHES_PER_TX);
    assert_eq!(simulator.trees().nullifiers().len(), MAX_NULLIFIERS_PER_TX);
    assert_eq!(
        public_inputs.end_tree_snapshots.nullifier_tree.next_available_leaf_index,
        MAX_NULLIFIERS_PER_TX as u64
    );
    assert_eq!(public_inputs.start_tree_snapshots.nullifier_tree.next_available_leaf_index, 0);
}

#[test]
fn test_padding_in_private_messages_is_not_counted() {
    let message = |content: u64| ScopedL2ToL1Message {
        recipient: RECIPIENT,
        content: U256::from(content),
        contract_address: OTHER_CONTRACT,
    };
    let mut builder = tx();
    for content in 1..MAX_L2_TO_L1_MSGS_PER_TX as u64 {
        builder = builder.non_revertible_l2_to_l1_message(message(content));
    }
    let tx = builder
        .non_revertible_l2_to_l1_message(ScopedL2ToL1Message::default())
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default(),
        vec![ScriptedCall::new(CALL_GAS).send_l2_to_l1_message(RECIPIENT, 100)],
    );

    let result = simulate(&mut simulator, &tx);

    // The public message takes the last free slot.
    assert_eq!(result.revert_code, RevertCode::Ok);
    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert_eq!(
        public_inputs.previous_non_revertible_accumulated_data_array_lengths.l2_to_l1_msgs,
        MAX_L2_TO_L1_MSGS_PER_TX - 1
    );
    assert_eq!(
        public_inputs.accumulated_data_array_lengths.l2_to_l1_msgs,
        MAX_L2_TO_L1_MSGS_PER_TX
    );
    let messages = &public_inputs.accumulated_data.l2_to_l1_msgs;
    assert_eq!(messages[MAX_L2_TO_L1_MSGS_PER_TX - 2], message(7));
    assert_eq!(messages[MAX_L2_TO_L1_MSGS_PER_TX - 1].content, U256::from(100));
}

#[test]
fn test_revertible_private_note_hashes_are_made_unique() {
    let tx = tx()
        .non_revertible_note_hash(U256::from(77))
        .revertible_note_hash(U256::from(5))
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .build();
    let mut simulator =
        simulator(MemoryTreesDb::default(), vec![ScriptedCall::new(CALL_GAS).emit_note_hash(1)]);

    let result = simulate(&mut simulator, &tx);

    let unique = |index, siloed| {
        compute_unique_note_hash(compute_note_hash_nonce(TEST_FIRST_NULLIFIER, index), siloed)
    };
    let expected = [
        U256::from(77),
        unique(1, U256::from(5)),
        unique(2, silo_note_hash(CONTRACT, U256::from(1))),
    ];
    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert_eq!(public_inputs.accumulated_data_array_lengths.note_hashes, 3);
    assert_eq!(public_inputs.accumulated_data.note_hashes[..3], expected);
    assert_eq!(simulator.trees().note_hashes()[..3], expected);
}

#[test]
fn test_private_only_tx() {
    let tx =
        tx().non_revertible_note_hash(U256::from(4)).revertible_nullifier(U256::from(5)).build();
    let mut simulator = simulator(MemoryTreesDb::default(), vec![]);

    let result = simulate(&mut simulator, &tx);

    assert!(tx.is_private_only());
    assert!(result.processed_phases.is_empty());
    assert_eq!(result.revert_code, RevertCode::Ok);
    assert_eq!(result.gas_used.actual_gas, tx.gas_used_by_private);
    assert!(simulator.trees().contains_nullifier(TEST_FIRST_NULLIFIER));
    assert!(simulator.trees().contains_nullifier(U256::from(5)));
    assert_eq!(simulator.trees().note_hashes()[0], U256::from(4));
}

#[test]
fn test_execution_hints() {
    let tx = tx()
        .setup_call(CONTRACT, vec![U256::from(1)])
        .teardown_call(OTHER_CONTRACT, vec![U256::from(2), U256::from(3)])
        .build();
    let mut simulator = simulator(
        MemoryTreesDb::default().public_storage(CONTRACT, U256::from(1), U256::from(42)),
        vec![ScriptedCall::new(CALL_GAS).read_storage(1)],
    );

    let result = simulate(&mut simulator, &tx);

    let hints = &result.avm_proving_request.inputs.hints;
    assert_eq!(hints.tx_hash, tx.hash);
    assert_eq!(hints.enqueued_calls.len(), 2);
    assert_eq!(hints.enqueued_calls[0].phase, TxExecutionPhase::Setup);
    assert_eq!(hints.enqueued_calls[1].contract_address, OTHER_CONTRACT);
    assert_eq!(hints.enqueued_calls[1].calldata, [U256::from(2), U256::from(3)]);
    assert_eq!(hints.trees.public_data_reads[0].value, U256::from(42));
    assert_eq!(hints.trees.nullifier_writes[0], TEST_FIRST_NULLIFIER);
    assert_eq!(result.processed_phases[0].return_values, [vec![U256::from(42)]]);
}

fn contract(address: Address, class_byte: u8) -> (ContractInstance, ContractClass) {
    let class_id = B256::with_last_byte(class_byte);
    let instance = ContractInstance {
        address,
        current_class_id: class_id,
        original_class_id: class_id,
        ..Default::default()
    };
    (instance, ContractClass { id: class_id, ..Default::default() })
}

#[test]
fn test_contracts_committed_on_success() {
    let (instance, class) = contract(CONTRACT, 1);
    let (other_instance, other_class) = contract(OTHER_CONTRACT, 2);
    let tx = tx()
        .non_revertible_contract(instance, class)
        .revertible_contract(other_instance, other_class)
        .app_logic_call(CONTRACT, vec![])
        .build();
    let mut simulator = simulator(MemoryTreesDb::default(), vec![]);

    simulate(&mut simulator, &tx);

    assert!(simulator.contracts().is_committed(CONTRACT));
    assert!(simulator.contracts().is_committed(OTHER_CONTRACT));
}

#[test]
fn test_only_non_revertible_contracts_committed_on_revert() {
    let (instance, class) = contract(CONTRACT, 1);
    let (other_instance, other_class) = contract(OTHER_CONTRACT, 2);
    let tx = tx()
        .non_revertible_contract(instance, class)
        .revertible_contract(other_instance, other_class)
        .app_logic_call(CONTRACT, vec![])
        .build();
    let mut simulator =
        simulator(MemoryTreesDb::default(), vec![ScriptedCall::new(CALL_GAS).reverting("no")]);

    simulate(&mut simulator, &tx);

    assert!(simulator.contracts().is_committed(CONTRACT));
    assert!(!simulator.contracts().is_committed(OTHER_CONTRACT));
    assert!(!simulator.contracts().is_pending(OTHER_CONTRACT));
}

#[test]
fn test_no_contracts_committed_on_fatal_error() {
    let (instance, class) = contract(CONTRACT, 1);
    let tx = tx().non_revertible_contract(instance, class).setup_call(CONTRACT, vec![]).build();
    let mut simulator =
        simulator(MemoryTreesDb::default(), vec![ScriptedCall::new(CALL_GAS).reverting("no")]);

    simulator.simulate(&tx).unwrap_err();

    assert!(!simulator.contracts().is_committed(CONTRACT));
    assert!(!simulator.contracts().is_pending(CONTRACT));
}

#[test]
fn test_without_merkle_operations_trees_are_only_read() {
    let tx = tx()
        .app_logic_call(CONTRACT, vec![U256::from(1)])
        .app_logic_call(CONTRACT, vec![U256::from(2)])
        .build();
    let mut simulator = simulator_with(
        MemoryTreesDb::default(),
        MemoryContractsDb::default(),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 5).emit_nullifier(6),
            ScriptedCall::new(CALL_GAS).read_storage(1),
        ],
        PublicTxSimulatorConfig::default().with_do_merkle_operations(false),
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::Ok);
    // The second call sees the pending write of the first one.
    assert_eq!(result.processed_phases[0].return_values[1], [U256::from(5)]);
    assert_eq!(storage(&simulator, 1), U256::ZERO);
    assert!(simulator.trees().nullifiers().is_empty());
    let public_inputs = &result.avm_proving_request.inputs.public_inputs;
    assert_eq!(public_inputs.accumulated_data_array_lengths.nullifiers, 2);
    assert_eq!(public_inputs.accumulated_data_array_lengths.public_data_writes, 1);
}

#[test]
fn test_unique_contract_class_limit_reverts_app_logic() {
    let address = |index: usize| Address::with_last_byte(0x40 + index as u8);
    let mut contracts = MemoryContractsDb::default();
    for index in 0..=MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS {
        let (instance, class) = contract(address(index), index as u8 + 1);
        contracts.set_contract_instance(instance);
        contracts.set_contract_class(class);
    }
    let mut setup = ScriptedCall::new(CALL_GAS);
    for index in 0..MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS {
        setup = setup.get_bytecode(address(index));
    }
    let tx = tx()
        .setup_call(CONTRACT, vec![])
        .app_logic_call(CONTRACT, vec![])
        .teardown_call(CONTRACT, vec![])
        .build();
    let mut simulator = simulator_with(
        MemoryTreesDb::default(),
        contracts,
        vec![
            setup,
            ScriptedCall::new(CALL_GAS)
                .write_storage(1, 1)
                .get_bytecode(address(MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS)),
            ScriptedCall::new(CALL_GAS).get_bytecode(address(0)),
        ],
        Default::default(),
    );

    let result = simulate(&mut simulator, &tx);

    assert_eq!(result.revert_code, RevertCode::AppLogicReverted);
    assert!(result.revert_reason.as_ref().unwrap().message.contains("unique class IDs"));
    assert_eq!(storage(&simulator, 1), U256::ZERO);
    // Bytecode of a class already retrieved is still available.
    assert_eq!(result.processed_phases[2].phase, TxExecutionPhase::Teardown);
    assert!(!result.processed_phases[2].reverted);
    assert_eq!(result.processed_phases[2].return_values, [vec![U256::ZERO]]);
}
