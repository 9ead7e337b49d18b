//! The public state view handed to the call executor, and its fork lifecycle.

use alloy_primitives::{
    map::{HashMap, HashSet},
    Address, Bytes, B256, U256,
};

use crate::{
    hash::{
        compute_note_hash_nonce, compute_public_data_leaf_slot, compute_unique_note_hash,
        silo_note_hash, silo_nullifier,
    },
    ContractClass, ContractInstance, PublicContractsDb, PublicLog, PublicTreesDb,
    ScopedL2ToL1Message, StateError, TreeSnapshots,
};

mod phase;
pub use phase::*;

mod trace;
pub use trace::*;

/// Per-view state: the side effect trace and, when merkle operations are disabled, the writes
/// that are not applied to the trees.
#[derive(Debug, Clone, Default)]
pub struct StateJournal {
    trace: SideEffectTrace,
    pending_storage: HashMap<(Address, U256), U256>,
    pending_nullifiers: HashSet<U256>,
}

impl StateJournal {
    /// Creates a journal around `trace`.
    pub fn new(trace: SideEffectTrace) -> Self {
        Self { trace, ..Default::default() }
    }

    /// The side effect trace.
    pub const fn trace(&self) -> &SideEffectTrace {
        &self.trace
    }

    /// Creates a child journal that sees everything this one has pending.
    pub fn fork(&self) -> Self {
        Self {
            trace: self.trace.fork(),
            pending_storage: self.pending_storage.clone(),
            pending_nullifiers: self.pending_nullifiers.clone(),
        }
    }

    /// Merges a child created by [`Self::fork`].
    pub fn merge(&mut self, child: Self, reverted: bool) {
        self.trace.merge(child.trace, reverted);
        if !reverted {
            self.pending_storage = child.pending_storage;
            self.pending_nullifiers = child.pending_nullifiers;
        }
    }
}

/// The active view of world state during public execution.
///
/// Borrows the collaborators and the journal of the active fork. Every mutation is checked against
/// the per-transaction limits and traced before it reaches the trees.
#[derive(Debug)]
pub struct PublicStateView<'a, T, C> {
    trees: &'a mut T,
    contracts: &'a mut C,
    journal: &'a mut StateJournal,
    first_nullifier: U256,
    do_merkle_ops: bool,
}

impl<'a, T: PublicTreesDb, C: PublicContractsDb> PublicStateView<'a, T, C> {
    /// Creates a view over the given collaborators and journal.
    pub fn new(
        trees: &'a mut T,
        contracts: &'a mut C,
        journal: &'a mut StateJournal,
        first_nullifier: U256,
        do_merkle_ops: bool,
    ) -> Self {
        Self { trees, contracts, journal, first_nullifier, do_merkle_ops }
    }

    /// The first nullifier of the transaction.
    pub const fn first_nullifier(&self) -> U256 {
        self.first_nullifier
    }

    /// The side effect trace of this view.
    pub fn trace(&self) -> &SideEffectTrace {
        self.journal.trace()
    }

    /// Reads a public storage slot.
    pub fn read_storage(&mut self, contract: Address, slot: U256) -> Result<U256, StateError> {
        if !self.do_merkle_ops {
            if let Some(value) = self.journal.pending_storage.get(&(contract, slot)) {
                return Ok(*value);
            }
        }
        let value = self.trees.storage_read(contract, slot).map_err(StateError::trees_db)?;
        tracing::trace!(target: "public_tx::state", %contract, %slot, %value, "Storage read");
        Ok(value)
    }

    /// Writes a public storage slot. Protocol writes (the fee payment) count against their own
    /// limit.
    pub fn write_storage(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
        protocol_write: bool,
    ) -> Result<(), StateError> {
        let leaf_slot = compute_public_data_leaf_slot(contract, slot);
        self.journal
            .trace
            .trace_public_data_write(PublicDataWrite::new(leaf_slot, value), protocol_write)?;
        if self.do_merkle_ops {
            self.trees.storage_write(contract, slot, value).map_err(StateError::trees_db)?;
        } else {
            self.journal.pending_storage.insert((contract, slot), value);
        }
        tracing::trace!(
            target: "public_tx::state",
            %contract,
            %slot,
            %value,
            protocol_write,
            "Storage write"
        );
        Ok(())
    }

    /// Checks whether `contract` emitted `nullifier`, in this transaction or before.
    pub fn check_nullifier_exists(
        &mut self,
        contract: Address,
        nullifier: U256,
    ) -> Result<bool, StateError> {
        self.check_siloed_nullifier_exists(silo_nullifier(contract, nullifier))
    }

    fn check_siloed_nullifier_exists(
        &mut self,
        siloed_nullifier: U256,
    ) -> Result<bool, StateError> {
        if !self.do_merkle_ops && self.journal.pending_nullifiers.contains(&siloed_nullifier) {
            return Ok(true);
        }
        self.trees.nullifier_exists(siloed_nullifier).map_err(StateError::trees_db)
    }

    /// Emits a nullifier of `contract`.
    pub fn write_nullifier(
        &mut self,
        contract: Address,
        nullifier: U256,
    ) -> Result<(), StateError> {
        self.write_siloed_nullifier(silo_nullifier(contract, nullifier))
    }

    /// Inserts a siloed nullifier, failing with [`StateError::NullifierCollision`] if it exists.
    pub fn write_siloed_nullifier(&mut self, siloed_nullifier: U256) -> Result<(), StateError> {
        if self.check_siloed_nullifier_exists(siloed_nullifier)? {
            return Err(StateError::NullifierCollision { siloed_nullifier });
        }
        self.journal.trace.trace_nullifier(siloed_nullifier)?;
        if self.do_merkle_ops {
            self.trees.write_siloed_nullifier(siloed_nullifier).map_err(StateError::trees_db)?;
        } else {
            self.journal.pending_nullifiers.insert(siloed_nullifier);
        }
        tracing::trace!(target: "public_tx::state", %siloed_nullifier, "Nullifier write");
        Ok(())
    }

    /// Emits a note hash of `contract`, siloed and then made unique.
    pub fn write_note_hash(
        &mut self,
        contract: Address,
        note_hash: U256,
    ) -> Result<(), StateError> {
        self.write_siloed_note_hash(silo_note_hash(contract, note_hash))
    }

    /// Inserts a siloed note hash, making it unique with a nonce derived from the first nullifier
    /// and the number of note hashes emitted so far.
    pub fn write_siloed_note_hash(&mut self, siloed_note_hash: U256) -> Result<(), StateError> {
        let index = self.journal.trace.cumulative_lengths().note_hashes;
        let nonce = compute_note_hash_nonce(self.first_nullifier, index);
        self.write_unique_note_hash(compute_unique_note_hash(nonce, siloed_note_hash))
    }

    /// Inserts a note hash that is already siloed and unique.
    pub fn write_unique_note_hash(&mut self, unique_note_hash: U256) -> Result<(), StateError> {
        self.journal.trace.trace_note_hash(unique_note_hash)?;
        if self.do_merkle_ops {
            self.trees.write_unique_note_hash(unique_note_hash).map_err(StateError::trees_db)?;
        }
        tracing::trace!(target: "public_tx::state", %unique_note_hash, "Note hash write");
        Ok(())
    }

    /// Checks whether the note hash tree holds `note_hash` at `leaf_index`.
    pub fn check_note_hash_exists(
        &mut self,
        note_hash: U256,
        leaf_index: u64,
    ) -> Result<bool, StateError> {
        let leaf = self.trees.note_hash_at(leaf_index).map_err(StateError::trees_db)?;
        Ok(leaf == Some(note_hash))
    }

    /// Checks whether the L1-to-L2 message tree holds `message_hash` at `leaf_index`.
    pub fn check_l1_to_l2_message_exists(
        &mut self,
        message_hash: U256,
        leaf_index: u64,
    ) -> Result<bool, StateError> {
        let leaf = self.trees.l1_to_l2_message_at(leaf_index).map_err(StateError::trees_db)?;
        Ok(leaf == Some(message_hash))
    }

    /// Sends a message from `contract` to `recipient` on L1.
    pub fn write_l2_to_l1_message(
        &mut self,
        contract: Address,
        recipient: Address,
        content: U256,
    ) -> Result<(), StateError> {
        self.write_scoped_l2_to_l1_message(ScopedL2ToL1Message {
            recipient,
            content,
            contract_address: contract,
        })
    }

    /// Sends an already scoped L2-to-L1 message.
    pub fn write_scoped_l2_to_l1_message(
        &mut self,
        message: ScopedL2ToL1Message,
    ) -> Result<(), StateError> {
        self.journal.trace.trace_l2_to_l1_message(message)
    }

    /// Emits a public log of `contract`.
    pub fn write_public_log(
        &mut self,
        contract: Address,
        fields: Vec<U256>,
    ) -> Result<(), StateError> {
        self.journal.trace.trace_public_log(PublicLog { contract_address: contract, fields })
    }

    /// Looks up a contract instance.
    pub fn contract_instance(
        &mut self,
        address: Address,
    ) -> Result<Option<ContractInstance>, StateError> {
        self.contracts.contract_instance(address).map_err(StateError::contracts_db)
    }

    /// Looks up a contract class.
    pub fn contract_class(&mut self, class_id: B256) -> Result<Option<ContractClass>, StateError> {
        self.contracts.contract_class(class_id).map_err(StateError::contracts_db)
    }

    /// Resolves the bytecode currently run by the contract at `address`.
    ///
    /// Each distinct class whose bytecode is resolved counts against the per-transaction limit on
    /// unique contract classes.
    pub fn bytecode(&mut self, address: Address) -> Result<Option<Bytes>, StateError> {
        let Some(instance) = self.contract_instance(address)? else {
            return Ok(None);
        };
        let Some(class) = self.contract_class(instance.current_class_id)? else {
            return Ok(None);
        };
        self.journal.trace.trace_bytecode_retrieval(instance.current_class_id)?;
        tracing::trace!(
            target: "public_tx::state",
            %address,
            class_id = %instance.current_class_id,
            "Bytecode retrieval"
        );
        Ok(Some(class.bytecode))
    }

    /// The current snapshots of all trees.
    pub fn tree_snapshots(&mut self) -> Result<TreeSnapshots, StateError> {
        self.trees.tree_snapshots().map_err(StateError::trees_db)
    }
}
