//! Hint-recording decorators for the world state collaborators.
//!
//! The prover replays public execution without access to live state, so every value the engine
//! observes has to be handed over as a hint. [`HintingTreesDb`] and [`HintingContractsDb`] wrap a
//! collaborator, forward every call and log what was read or written. Hints are never rolled back:
//! a rejected checkpoint still leaves its reads in the log, because the prover replays the
//! reverted execution as well.

use alloy_primitives::{map::HashSet, Address, B256, U256};
use delegate::delegate;
use serde::{Deserialize, Serialize};

use crate::{
    hash::compute_public_data_leaf_slot, ContractClass, ContractInstance, MerkleTreeId,
    PublicContractsDb, PublicTreesDb, TreeSnapshots, Tx, TxExecutionPhase,
};

/// A public storage read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDataHint {
    /// The contract whose storage was accessed.
    pub contract: Address,
    /// The contract storage slot.
    pub slot: U256,
    /// The public data tree leaf slot.
    pub leaf_slot: U256,
    /// The value read or written.
    pub value: U256,
}

/// A nullifier existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NullifierCheckHint {
    /// The siloed nullifier.
    pub siloed_nullifier: U256,
    /// Whether it was found.
    pub exists: bool,
}

/// A leaf read from an append-only tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafReadHint {
    /// The leaf index.
    pub leaf_index: u64,
    /// The leaf value, if the index is populated.
    pub value: Option<U256>,
}

/// A checkpoint operation on the trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointAction {
    /// A checkpoint was opened.
    Create,
    /// The newest checkpoint was committed.
    Commit,
    /// The newest checkpoint was reverted.
    Revert,
}

/// Padding appended to a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePaddingHint {
    /// The padded tree.
    pub tree: MerkleTreeId,
    /// Number of empty leaves appended.
    pub leaves: usize,
}

/// Everything observed through a [`HintingTreesDb`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreesHints {
    /// Public storage reads.
    pub public_data_reads: Vec<PublicDataHint>,
    /// Public storage writes.
    pub public_data_writes: Vec<PublicDataHint>,
    /// Nullifier existence checks.
    pub nullifier_checks: Vec<NullifierCheckHint>,
    /// Nullifier insertions.
    pub nullifier_writes: Vec<U256>,
    /// Note hash reads.
    pub note_hash_reads: Vec<LeafReadHint>,
    /// Note hash insertions.
    pub note_hash_writes: Vec<U256>,
    /// L1-to-L2 message reads.
    pub l1_to_l2_message_reads: Vec<LeafReadHint>,
    /// Checkpoint operations, in order.
    pub checkpoint_actions: Vec<CheckpointAction>,
    /// Tree padding.
    pub tree_padding: Vec<TreePaddingHint>,
}

/// A contract instance lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInstanceHint {
    /// The looked up address.
    pub address: Address,
    /// The instance, if deployed.
    pub instance: Option<ContractInstance>,
}

/// Everything observed through a [`HintingContractsDb`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsHints {
    /// Contract instance lookups.
    pub contract_instances: Vec<ContractInstanceHint>,
    /// Contract classes that were found, each recorded once.
    pub contract_classes: Vec<ContractClass>,
}

/// An enqueued call dispatched to the call executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedCallHint {
    /// The phase the call ran in.
    pub phase: TxExecutionPhase,
    /// The caller.
    pub msg_sender: Address,
    /// The called contract.
    pub contract_address: Address,
    /// The calldata.
    pub calldata: Vec<U256>,
    /// Whether the call was static.
    pub is_static_call: bool,
}

/// The hints a prover needs to replay a transaction's public execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHints {
    /// The transaction hash.
    pub tx_hash: B256,
    /// Enqueued calls in execution order.
    pub enqueued_calls: Vec<EnqueuedCallHint>,
    /// World state observations.
    pub trees: TreesHints,
    /// Contract observations.
    pub contracts: ContractsHints,
}

/// A [`PublicTreesDb`] that records [`TreesHints`].
#[derive(Debug)]
pub struct HintingTreesDb<T> {
    inner: T,
    hints: TreesHints,
}

impl<T> HintingTreesDb<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner, hints: TreesHints::default() }
    }

    /// The hints recorded so far.
    pub const fn hints(&self) -> &TreesHints {
        &self.hints
    }

    /// Unwraps the database, returning the recorded hints.
    pub fn into_hints(self) -> TreesHints {
        self.hints
    }
}

impl<T: PublicTreesDb> PublicTreesDb for HintingTreesDb<T> {
    type Error = T::Error;

    fn fork(&mut self) -> Result<(), Self::Error> {
        self.inner.fork()?;
        self.hints.checkpoint_actions.push(CheckpointAction::Create);
        Ok(())
    }

    fn merge(&mut self) -> Result<(), Self::Error> {
        self.inner.merge()?;
        self.hints.checkpoint_actions.push(CheckpointAction::Commit);
        Ok(())
    }

    fn reject(&mut self) -> Result<(), Self::Error> {
        self.inner.reject()?;
        self.hints.checkpoint_actions.push(CheckpointAction::Revert);
        Ok(())
    }

    fn storage_read(&mut self, contract: Address, slot: U256) -> Result<U256, Self::Error> {
        let value = self.inner.storage_read(contract, slot)?;
        let leaf_slot = compute_public_data_leaf_slot(contract, slot);
        self.hints.public_data_reads.push(PublicDataHint { contract, slot, leaf_slot, value });
        Ok(value)
    }

    fn storage_write(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), Self::Error> {
        self.inner.storage_write(contract, slot, value)?;
        let leaf_slot = compute_public_data_leaf_slot(contract, slot);
        self.hints.public_data_writes.push(PublicDataHint { contract, slot, leaf_slot, value });
        Ok(())
    }

    fn nullifier_exists(&mut self, siloed_nullifier: U256) -> Result<bool, Self::Error> {
        let exists = self.inner.nullifier_exists(siloed_nullifier)?;
        self.hints.nullifier_checks.push(NullifierCheckHint { siloed_nullifier, exists });
        Ok(exists)
    }

    fn write_siloed_nullifier(&mut self, siloed_nullifier: U256) -> Result<(), Self::Error> {
        self.inner.write_siloed_nullifier(siloed_nullifier)?;
        self.hints.nullifier_writes.push(siloed_nullifier);
        Ok(())
    }

    fn write_unique_note_hash(&mut self, unique_note_hash: U256) -> Result<(), Self::Error> {
        self.inner.write_unique_note_hash(unique_note_hash)?;
        self.hints.note_hash_writes.push(unique_note_hash);
        Ok(())
    }

    fn note_hash_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error> {
        let value = self.inner.note_hash_at(leaf_index)?;
        self.hints.note_hash_reads.push(LeafReadHint { leaf_index, value });
        Ok(value)
    }

    fn l1_to_l2_message_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error> {
        let value = self.inner.l1_to_l2_message_at(leaf_index)?;
        self.hints.l1_to_l2_message_reads.push(LeafReadHint { leaf_index, value });
        Ok(value)
    }

    fn pad_tree(&mut self, tree: MerkleTreeId, leaves: usize) -> Result<(), Self::Error> {
        self.inner.pad_tree(tree, leaves)?;
        self.hints.tree_padding.push(TreePaddingHint { tree, leaves });
        Ok(())
    }

    delegate! {
        to self.inner {
            fn tree_snapshots(&mut self) -> Result<TreeSnapshots, Self::Error>;
        }
    }
}

/// A [`PublicContractsDb`] that records [`ContractsHints`].
#[derive(Debug)]
pub struct HintingContractsDb<C> {
    inner: C,
    hints: ContractsHints,
    hinted_classes: HashSet<B256>,
}

impl<C> HintingContractsDb<C> {
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner, hints: ContractsHints::default(), hinted_classes: HashSet::default() }
    }

    /// The hints recorded so far.
    pub const fn hints(&self) -> &ContractsHints {
        &self.hints
    }

    /// Unwraps the database, returning the recorded hints.
    pub fn into_hints(self) -> ContractsHints {
        self.hints
    }
}

impl<C: PublicContractsDb> PublicContractsDb for HintingContractsDb<C> {
    type Error = C::Error;

    fn contract_instance(
        &mut self,
        address: Address,
    ) -> Result<Option<ContractInstance>, Self::Error> {
        let instance = self.inner.contract_instance(address)?;
        self.hints.contract_instances.push(ContractInstanceHint { address, instance });
        Ok(instance)
    }

    fn contract_class(&mut self, class_id: B256) -> Result<Option<ContractClass>, Self::Error> {
        let class = self.inner.contract_class(class_id)?;
        if let Some(class) = &class {
            if self.hinted_classes.insert(class_id) {
                self.hints.contract_classes.push(class.clone());
            }
        }
        Ok(class)
    }

    delegate! {
        to self.inner {
            fn add_new_non_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error>;
            fn add_new_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error>;
            fn commit_contracts_for_tx(&mut self) -> Result<(), Self::Error>;
            fn clear_contracts_for_tx(&mut self);
        }
    }
}
