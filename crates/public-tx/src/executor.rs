//! The seam to the bytecode interpreter that runs a single public call.

use alloy_primitives::{Address, U256};
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{
    Gas, GlobalVariables, PublicContractsDb, PublicStateView, PublicTreesDb, RevertReason,
    StateError, TxExecutionPhase,
};

/// The environment of one enqueued call.
#[derive(Debug, Clone, Copy)]
pub struct CallEnv<'a> {
    /// The phase the call runs in.
    pub phase: TxExecutionPhase,
    /// The called contract.
    pub contract_address: Address,
    /// The caller.
    pub sender: Address,
    /// The transaction fee as visible to the call. Zero outside of teardown.
    pub transaction_fee: U256,
    /// Block-level values.
    pub globals: &'a GlobalVariables,
    /// Whether the call may not modify state.
    pub is_static_call: bool,
    /// The calldata.
    pub calldata: &'a [U256],
    /// The gas the call may spend.
    pub allocated_gas: Gas,
}

/// The result of one enqueued call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    /// Whether the call reverted.
    pub reverted: bool,
    /// Why the call reverted.
    pub revert_reason: Option<RevertReason>,
    /// Gas not spent by the call. Never more than the allocated gas.
    pub gas_left: Gas,
    /// Return values.
    pub output: Vec<U256>,
}

impl CallOutcome {
    /// A successful outcome.
    pub const fn success(gas_left: Gas, output: Vec<U256>) -> Self {
        Self { reverted: false, revert_reason: None, gas_left, output }
    }

    /// A reverted outcome.
    pub const fn revert(gas_left: Gas, reason: RevertReason, output: Vec<U256>) -> Self {
        Self { reverted: true, revert_reason: Some(reason), gas_left, output }
    }
}

/// Executes a single public call against the active state view.
///
/// Implementations enforce the allocated gas themselves: running out of gas is reported as an
/// ordinary revert. Errors that user code can trigger ([`StateError::is_revert`]) must also be
/// turned into reverts. Returning an error aborts the whole simulation.
#[auto_impl(&mut, Box)]
pub trait CallExecutor {
    /// Executes the call described by `env`.
    ///
    /// # Arguments
    ///
    /// * `state` - The active state view. Mutations made through it are visible to later calls.
    /// * `env` - The call environment.
    ///
    /// # Returns
    ///
    /// The outcome of the call, or an infrastructure error.
    fn execute<T: PublicTreesDb, C: PublicContractsDb>(
        &mut self,
        state: &mut PublicStateView<'_, T, C>,
        env: &CallEnv<'_>,
    ) -> Result<CallOutcome, StateError>;
}
