//! Tests for batch processing of transactions.

use std::time::Duration;

use alloy_primitives::{address, Address, B256, U256};
use public_tx::{
    constants::FEE_JUICE_ADDRESS,
    hash::compute_fee_payer_balance_slot,
    test_utils::{MemoryContractsDb, MemoryTreesDb, ScriptedCall, ScriptedCallExecutor, TxBuilder},
    Gas, GasFees, GasSettings, GlobalVariables, PublicProcessor, PublicProcessorConfig,
    PublicTxSimulator, PublicTxSimulatorConfig, RevertCode, SimulationError, Tx,
};

const CONTRACT: Address = address!("1000000000000000000000000000000000000001");
const FEE_PAYER: Address = address!("3000000000000000000000000000000000000003");
const CALL_GAS: Gas = Gas::new(1, 10);
const PRIVATE_GAS_USED: Gas = Gas::new(5, 5);

type Processor = PublicProcessor<MemoryTreesDb, MemoryContractsDb, ScriptedCallExecutor>;

/// A transaction with a unique hash and first nullifier that writes `value` to slot `id`.
fn tx(id: u8, value: u64) -> Tx {
    TxBuilder::new()
        .without_first_nullifier()
        .non_revertible_nullifier(U256::from(id))
        .hash(B256::with_last_byte(id))
        .gas_settings(GasSettings::new(
            Gas::new(1_000, 1_000),
            Gas::empty(),
            GasFees::new(1, 1),
            GasFees::default(),
        ))
        .gas_used_by_private(PRIVATE_GAS_USED)
        .app_logic_call(CONTRACT, vec![U256::from(id), U256::from(value)])
        .build()
}

fn processor_with(
    trees: MemoryTreesDb,
    scripts: Vec<ScriptedCall>,
    simulator_config: PublicTxSimulatorConfig,
    config: PublicProcessorConfig,
) -> Processor {
    let mut executor = ScriptedCallExecutor::new(CALL_GAS);
    for script in scripts {
        executor.push(script);
    }
    let globals = GlobalVariables { gas_fees: GasFees::new(1, 1), ..Default::default() };
    let simulator = PublicTxSimulator::new(
        trees,
        MemoryContractsDb::default(),
        executor,
        globals,
        simulator_config,
    );
    PublicProcessor::new(simulator, config)
}

fn processor(scripts: Vec<ScriptedCall>, config: PublicProcessorConfig) -> Processor {
    processor_with(MemoryTreesDb::default(), scripts, Default::default(), config)
}

fn storage(processor: &Processor, slot: u64) -> U256 {
    processor.simulator().trees().storage(CONTRACT, U256::from(slot))
}

#[test]
fn test_processes_all_transactions_in_order() {
    let mut processor = processor(
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 10),
            ScriptedCall::new(CALL_GAS).read_storage(1).write_storage(1, 20),
            ScriptedCall::new(CALL_GAS).write_storage(3, 30).reverting("nope"),
        ],
        PublicProcessorConfig::default(),
    );

    let outcome = processor.process([tx(1, 10), tx(2, 20), tx(3, 30)]);

    let hashes: Vec<_> = outcome.processed.iter().map(|tx| tx.hash).collect();
    assert_eq!(hashes, [B256::with_last_byte(1), B256::with_last_byte(2), B256::with_last_byte(3)]);
    assert!(outcome.failed.is_empty());
    assert!(outcome.unprocessed.is_empty());
    // The second transaction sees the write of the first one.
    assert_eq!(outcome.processed[1].result.processed_phases[0].return_values[0], [U256::from(10)]);
    assert_eq!(outcome.processed[2].result.revert_code, RevertCode::AppLogicReverted);
    assert_eq!(storage(&processor, 1), U256::from(20));
    assert_eq!(storage(&processor, 3), U256::ZERO);

    let per_tx_gas = PRIVATE_GAS_USED + CALL_GAS;
    assert_eq!(outcome.total_gas, per_tx_gas + per_tx_gas + per_tx_gas);
    assert_eq!(outcome.total_fees, U256::from(3 * (6 + 15)));
}

#[test]
fn test_failed_transaction_is_isolated() {
    let mut processor = processor(
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 10),
            ScriptedCall::new(CALL_GAS).write_storage(2, 20),
        ],
        PublicProcessorConfig::default(),
    );
    // Same first nullifier as the first transaction.
    let duplicate = Tx { hash: B256::with_last_byte(0xdd), ..tx(1, 10) };

    let outcome = processor.process([tx(1, 10), duplicate, tx(2, 20)]);

    assert_eq!(outcome.processed.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].hash, B256::with_last_byte(0xdd));
    assert!(matches!(outcome.failed[0].error, SimulationError::NonRevertibleNullifierCollision(_)));
    assert_eq!(storage(&processor, 2), U256::from(20));
    assert_eq!(processor.simulator().trees().checkpoint_depth(), 0);
}

#[test]
fn test_unaffordable_fee_is_not_included_when_enforcement_is_skipped() {
    let balance_slot = compute_fee_payer_balance_slot(FEE_PAYER);
    let mut processor = processor_with(
        MemoryTreesDb::default().public_storage(FEE_JUICE_ADDRESS, balance_slot, U256::from(30)),
        vec![
            ScriptedCall::new(CALL_GAS).write_storage(1, 10),
            ScriptedCall::new(CALL_GAS).write_storage(2, 20),
        ],
        PublicTxSimulatorConfig::default().with_skip_fee_enforcement(true),
        PublicProcessorConfig::default(),
    );
    let paid = |tx: Tx| Tx { fee_payer: FEE_PAYER, ..tx };

    let outcome = processor.process([paid(tx(1, 10)), paid(tx(2, 20))]);

    // Each transaction costs 21: the first one leaves 9, which the second cannot afford.
    assert_eq!(outcome.processed.len(), 1);
    assert!(outcome.processed[0].result.eligible_for_inclusion);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(
        outcome.failed[0].error,
        SimulationError::IneligibleForInclusion { tx_hash: B256::with_last_byte(2) }
    );
    assert_eq!(outcome.total_fees, U256::from(21));
    assert_eq!(outcome.total_gas, PRIVATE_GAS_USED + CALL_GAS);
    let trees = processor.simulator().trees();
    assert_eq!(trees.storage(FEE_JUICE_ADDRESS, balance_slot), U256::from(9));
    assert_eq!(storage(&processor, 2), U256::ZERO);
    assert!(!trees.contains_nullifier(U256::from(2)));
    assert_eq!(trees.checkpoint_depth(), 0);
}

#[test]
fn test_max_transactions() {
    let mut processor =
        processor(vec![], PublicProcessorConfig::default().with_max_transactions(2));

    let outcome = processor.process([tx(1, 1), tx(2, 2), tx(3, 3), tx(4, 4)]);

    assert_eq!(outcome.processed.len(), 2);
    assert_eq!(outcome.unprocessed, [B256::with_last_byte(3), B256::with_last_byte(4)]);
    assert_eq!(processor.simulator().executor().calls().len(), 2);
}

#[test]
fn test_expired_deadline_leaves_everything_unprocessed() {
    let mut processor =
        processor(vec![], PublicProcessorConfig::default().with_deadline(Duration::ZERO));

    let outcome = processor.process([tx(1, 1), tx(2, 2)]);

    assert!(outcome.processed.is_empty());
    assert_eq!(outcome.unprocessed.len(), 2);
    assert_eq!(outcome.total_gas, Gas::empty());
    assert!(processor.simulator().executor().calls().is_empty());
}
