use alloy_primitives::{Address, B256, U256};

use crate::{
    ContractClass, ContractInstance, Gas, GasSettings, HashedValues, PublicCallRequestWithCalldata,
    ScopedL2ToL1Message, Tx,
};

/// The first nullifier of transactions built by [`TxBuilder`].
pub const TEST_FIRST_NULLIFIER: U256 = U256::from_limbs([0xf1, 0, 0, 0]);

/// The sender of call requests built by [`TxBuilder`].
pub const TEST_SENDER: Address = Address::with_last_byte(0x5e);

/// Builds [`Tx`]s for tests.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    tx: Tx,
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TxBuilder {
    /// A transaction with [`TEST_FIRST_NULLIFIER`] and nothing else.
    pub fn new() -> Self {
        let mut tx = Tx { hash: B256::with_last_byte(0x7a), ..Default::default() };
        tx.non_revertible_accumulated_data.nullifiers.push(TEST_FIRST_NULLIFIER);
        Self { tx }
    }

    /// Sets the hash.
    pub fn hash(mut self, hash: B256) -> Self {
        self.tx.hash = hash;
        self
    }

    /// Sets the gas settings.
    pub fn gas_settings(mut self, gas_settings: GasSettings) -> Self {
        self.tx.gas_settings = gas_settings;
        self
    }

    /// Sets the gas used by private execution.
    pub fn gas_used_by_private(mut self, gas: Gas) -> Self {
        self.tx.gas_used_by_private = gas;
        self
    }

    /// Sets the fee payer.
    pub fn fee_payer(mut self, fee_payer: Address) -> Self {
        self.tx.fee_payer = fee_payer;
        self
    }

    fn call(
        &mut self,
        contract: Address,
        calldata: Vec<U256>,
        is_static_call: bool,
    ) -> PublicCallRequestWithCalldata {
        let call =
            PublicCallRequestWithCalldata::new(TEST_SENDER, contract, is_static_call, calldata);
        let known = &self.tx.public_function_calldata;
        if !known.iter().any(|values| values.hash == call.request.calldata_hash) {
            let values = HashedValues::from_calldata(call.calldata.clone());
            self.tx.public_function_calldata.push(values);
        }
        call
    }

    /// Adds a setup call.
    pub fn setup_call(mut self, contract: Address, calldata: Vec<U256>) -> Self {
        let call = self.call(contract, calldata, false);
        self.tx.setup_call_requests.push(call.request);
        self
    }

    /// Adds an app logic call.
    pub fn app_logic_call(mut self, contract: Address, calldata: Vec<U256>) -> Self {
        let call = self.call(contract, calldata, false);
        self.tx.app_logic_call_requests.push(call.request);
        self
    }

    /// Adds a static app logic call.
    pub fn static_app_logic_call(mut self, contract: Address, calldata: Vec<U256>) -> Self {
        let call = self.call(contract, calldata, true);
        self.tx.app_logic_call_requests.push(call.request);
        self
    }

    /// Sets the teardown call.
    pub fn teardown_call(mut self, contract: Address, calldata: Vec<U256>) -> Self {
        let call = self.call(contract, calldata, false);
        self.tx.teardown_call_request = Some(call.request);
        self
    }

    /// Adds a non-revertible siloed nullifier.
    pub fn non_revertible_nullifier(mut self, siloed_nullifier: U256) -> Self {
        self.tx.non_revertible_accumulated_data.nullifiers.push(siloed_nullifier);
        self
    }

    /// Adds a revertible siloed nullifier.
    pub fn revertible_nullifier(mut self, siloed_nullifier: U256) -> Self {
        self.tx.revertible_accumulated_data.nullifiers.push(siloed_nullifier);
        self
    }

    /// Adds a non-revertible unique note hash.
    pub fn non_revertible_note_hash(mut self, note_hash: U256) -> Self {
        self.tx.non_revertible_accumulated_data.note_hashes.push(note_hash);
        self
    }

    /// Adds a revertible siloed note hash.
    pub fn revertible_note_hash(mut self, note_hash: U256) -> Self {
        self.tx.revertible_accumulated_data.note_hashes.push(note_hash);
        self
    }

    /// Adds a non-revertible L2-to-L1 message.
    pub fn non_revertible_l2_to_l1_message(mut self, message: ScopedL2ToL1Message) -> Self {
        self.tx.non_revertible_accumulated_data.l2_to_l1_msgs.push(message);
        self
    }

    /// Adds a revertible L2-to-L1 message.
    pub fn revertible_l2_to_l1_message(mut self, message: ScopedL2ToL1Message) -> Self {
        self.tx.revertible_accumulated_data.l2_to_l1_msgs.push(message);
        self
    }

    /// Deploys a contract in the non-revertible part.
    pub fn non_revertible_contract(
        mut self,
        instance: ContractInstance,
        class: ContractClass,
    ) -> Self {
        self.tx.non_revertible_contracts.instances.push(instance);
        self.tx.non_revertible_contracts.classes.push(class);
        self
    }

    /// Deploys a contract in the revertible part.
    pub fn revertible_contract(mut self, instance: ContractInstance, class: ContractClass) -> Self {
        self.tx.revertible_contracts.instances.push(instance);
        self.tx.revertible_contracts.classes.push(class);
        self
    }

    /// Removes all non-revertible nullifiers, the first one included.
    pub fn without_first_nullifier(mut self) -> Self {
        self.tx.non_revertible_accumulated_data.nullifiers.clear();
        self
    }

    /// Builds the transaction.
    pub fn build(self) -> Tx {
        self.tx
    }
}
