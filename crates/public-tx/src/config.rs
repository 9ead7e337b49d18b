//! Configuration of the simulator and the batch processor.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_PROCESSABLE_L2_GAS;

/// Configuration of a [`crate::PublicTxSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PublicTxSimulatorConfig {
    /// Whether side effects are applied to the trees. When disabled, storage writes and
    /// nullifiers are kept in memory for the duration of the transaction and the trees are only
    /// read.
    pub do_merkle_operations: bool,
    /// Whether a fee payer without enough balance may still be charged. Only meant for fee
    /// estimation: results produced this way are not eligible for inclusion.
    pub skip_fee_enforcement: bool,
    /// The maximum L2 gas the public portion of a transaction may use.
    pub max_processable_l2_gas: u64,
}

impl Default for PublicTxSimulatorConfig {
    fn default() -> Self {
        Self {
            do_merkle_operations: true,
            skip_fee_enforcement: false,
            max_processable_l2_gas: MAX_PROCESSABLE_L2_GAS,
        }
    }
}

impl PublicTxSimulatorConfig {
    /// Sets whether side effects are applied to the trees.
    pub const fn with_do_merkle_operations(mut self, do_merkle_operations: bool) -> Self {
        self.do_merkle_operations = do_merkle_operations;
        self
    }

    /// Sets whether fee enforcement is skipped.
    pub const fn with_skip_fee_enforcement(mut self, skip_fee_enforcement: bool) -> Self {
        self.skip_fee_enforcement = skip_fee_enforcement;
        self
    }

    /// Sets the maximum processable L2 gas.
    pub const fn with_max_processable_l2_gas(mut self, max_processable_l2_gas: u64) -> Self {
        self.max_processable_l2_gas = max_processable_l2_gas;
        self
    }
}

/// Limits of a [`crate::PublicProcessor`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PublicProcessorConfig {
    /// The maximum number of transactions to process. `None` means no limit.
    pub max_transactions: Option<usize>,
    /// How long the batch may take. Transactions are never interrupted: once the deadline has
    /// passed, the remaining ones are left unprocessed.
    pub deadline: Option<Duration>,
}

impl PublicProcessorConfig {
    /// Sets the maximum number of transactions.
    pub const fn with_max_transactions(mut self, max_transactions: usize) -> Self {
        self.max_transactions = Some(max_transactions);
        self
    }

    /// Sets the deadline.
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
