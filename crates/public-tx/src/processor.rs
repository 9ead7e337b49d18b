//! Batch processing of transactions against one world state.

use std::time::Instant;

use alloy_primitives::{B256, U256};

use crate::{
    CallExecutor, Gas, PublicContractsDb, PublicProcessorConfig, PublicTreesDb, PublicTxResult,
    PublicTxSimulator, SimulationError, Tx,
};

/// A transaction that made it into the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTx {
    /// The transaction hash.
    pub hash: B256,
    /// The simulation result.
    pub result: PublicTxResult,
}

/// A transaction that was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTx {
    /// The transaction hash.
    pub hash: B256,
    /// Why it was discarded.
    pub error: SimulationError,
}

/// The outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedTxs {
    /// Transactions that made it into the batch, in order.
    pub processed: Vec<ProcessedTx>,
    /// Transactions that were discarded, in order.
    pub failed: Vec<FailedTx>,
    /// Hashes of transactions not started because a batch limit was hit.
    pub unprocessed: Vec<B256>,
    /// Sum of the actual gas used by the processed transactions.
    pub total_gas: Gas,
    /// Sum of the fees of the processed transactions.
    pub total_fees: U256,
}

/// Runs transactions one after the other through a [`PublicTxSimulator`].
///
/// Every processed transaction sees the effects of the ones before it. A failed transaction leaves
/// no trace in the collaborators.
#[derive(Debug)]
pub struct PublicProcessor<T, C, E> {
    simulator: PublicTxSimulator<T, C, E>,
    config: PublicProcessorConfig,
}

impl<T: PublicTreesDb, C: PublicContractsDb, E: CallExecutor> PublicProcessor<T, C, E> {
    /// Creates a processor.
    pub const fn new(simulator: PublicTxSimulator<T, C, E>, config: PublicProcessorConfig) -> Self {
        Self { simulator, config }
    }

    /// The simulator.
    pub const fn simulator(&self) -> &PublicTxSimulator<T, C, E> {
        &self.simulator
    }

    /// Unwraps the processor into its simulator.
    pub fn into_simulator(self) -> PublicTxSimulator<T, C, E> {
        self.simulator
    }

    /// Processes `txs` in order until they run out or a batch limit is hit.
    pub fn process(&mut self, txs: impl IntoIterator<Item = Tx>) -> ProcessedTxs {
        let start = Instant::now();
        let mut outcome = ProcessedTxs::default();

        for tx in txs {
            if let Some(reason) = self.limit_reached(&outcome, start) {
                if outcome.unprocessed.is_empty() {
                    tracing::info!(target: "public_tx::processor", reason, "Stopping batch");
                }
                outcome.unprocessed.push(tx.hash);
                continue;
            }

            match self.simulator.simulate_for_inclusion(&tx) {
                Ok(result) => {
                    outcome.total_gas += result.gas_used.actual_gas;
                    outcome.total_fees += result.transaction_fee;
                    outcome.processed.push(ProcessedTx { hash: tx.hash, result });
                }
                Err(error) => {
                    tracing::warn!(
                        target: "public_tx::processor",
                        tx_hash = %tx.hash,
                        %error,
                        "Discarding transaction"
                    );
                    outcome.failed.push(FailedTx { hash: tx.hash, error });
                }
            }
        }

        tracing::info!(
            target: "public_tx::processor",
            processed = outcome.processed.len(),
            failed = outcome.failed.len(),
            unprocessed = outcome.unprocessed.len(),
            total_gas = ?outcome.total_gas,
            total_fees = %outcome.total_fees,
            elapsed = ?start.elapsed(),
            "Processed batch"
        );
        outcome
    }

    fn limit_reached(&self, outcome: &ProcessedTxs, start: Instant) -> Option<&'static str> {
        if self.config.max_transactions.is_some_and(|max| outcome.processed.len() >= max) {
            return Some("max transactions");
        }
        if self.config.deadline.is_some_and(|deadline| start.elapsed() >= deadline) {
            return Some("deadline");
        }
        None
    }
}
