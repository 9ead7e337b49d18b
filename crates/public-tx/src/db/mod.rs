//! World state collaborators: the merkle trees and the contracts store.
//!
//! Both are external to the engine. They are synchronous and report failures through an
//! associated `Error` type. The engine type-erases those errors into [`crate::StateError`].

use alloy_primitives::{Address, B256, U256};
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{ContractClass, ContractInstance, Tx};

mod hinting;
pub use hinting::*;

/// The merkle trees of world state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerkleTreeId {
    /// Nullifiers of spent notes and other uniqueness markers.
    #[display("NULLIFIER_TREE")]
    NullifierTree,
    /// Note hashes.
    #[display("NOTE_HASH_TREE")]
    NoteHashTree,
    /// Public contract storage.
    #[display("PUBLIC_DATA_TREE")]
    PublicDataTree,
    /// Messages from L1.
    #[display("L1_TO_L2_MESSAGE_TREE")]
    L1ToL2MessageTree,
}

/// The root and size of an append-only tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOnlyTreeSnapshot {
    /// The tree root.
    pub root: B256,
    /// The index the next leaf is inserted at.
    pub next_available_leaf_index: u64,
}

/// Snapshots of all trees touched by public execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshots {
    /// The L1-to-L2 message tree.
    pub l1_to_l2_message_tree: AppendOnlyTreeSnapshot,
    /// The note hash tree.
    pub note_hash_tree: AppendOnlyTreeSnapshot,
    /// The nullifier tree.
    pub nullifier_tree: AppendOnlyTreeSnapshot,
    /// The public data tree.
    pub public_data_tree: AppendOnlyTreeSnapshot,
}

/// The merkle-tree-backed world state.
///
/// Speculative views are nested checkpoints: [`PublicTreesDb::fork`] opens one,
/// [`PublicTreesDb::merge`] folds the newest one into its parent and [`PublicTreesDb::reject`]
/// rolls the state back to where the newest one was opened.
#[auto_impl(&mut, Box)]
pub trait PublicTreesDb {
    /// The database error.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Opens a checkpoint.
    fn fork(&mut self) -> Result<(), Self::Error>;

    /// Commits the newest checkpoint into its parent.
    fn merge(&mut self) -> Result<(), Self::Error>;

    /// Reverts everything written since the newest checkpoint was opened.
    fn reject(&mut self) -> Result<(), Self::Error>;

    /// Reads a public storage slot of `contract`. Unwritten slots read as zero.
    fn storage_read(&mut self, contract: Address, slot: U256) -> Result<U256, Self::Error>;

    /// Writes a public storage slot of `contract`.
    fn storage_write(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), Self::Error>;

    /// Checks whether a siloed nullifier is in the nullifier tree.
    fn nullifier_exists(&mut self, siloed_nullifier: U256) -> Result<bool, Self::Error>;

    /// Inserts a siloed nullifier. The caller checks for collisions first.
    fn write_siloed_nullifier(&mut self, siloed_nullifier: U256) -> Result<(), Self::Error>;

    /// Appends a unique note hash to the note hash tree.
    fn write_unique_note_hash(&mut self, unique_note_hash: U256) -> Result<(), Self::Error>;

    /// Reads the note hash at `leaf_index`, if any.
    fn note_hash_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error>;

    /// Reads the L1-to-L2 message at `leaf_index`, if any.
    fn l1_to_l2_message_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error>;

    /// Returns the current snapshots of all trees.
    fn tree_snapshots(&mut self) -> Result<TreeSnapshots, Self::Error>;

    /// Appends `leaves` empty leaves to `tree` so that it grows by a fixed amount per transaction.
    fn pad_tree(&mut self, tree: MerkleTreeId, leaves: usize) -> Result<(), Self::Error>;
}

/// The store of deployed contract instances and registered classes.
///
/// Contracts published by the transaction being simulated live in a per-transaction cache until
/// [`PublicContractsDb::commit_contracts_for_tx`] or [`PublicContractsDb::clear_contracts_for_tx`]
/// is called.
#[auto_impl(&mut, Box)]
pub trait PublicContractsDb {
    /// The database error.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Looks up a contract instance.
    fn contract_instance(
        &mut self,
        address: Address,
    ) -> Result<Option<ContractInstance>, Self::Error>;

    /// Looks up a contract class.
    fn contract_class(&mut self, class_id: B256) -> Result<Option<ContractClass>, Self::Error>;

    /// Adds the contracts deployed by the non-revertible part of `tx` to the transaction cache.
    fn add_new_non_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error>;

    /// Adds the contracts deployed by the revertible part of `tx` to the transaction cache.
    fn add_new_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error>;

    /// Moves the transaction cache into the block-level cache.
    fn commit_contracts_for_tx(&mut self) -> Result<(), Self::Error>;

    /// Drops the transaction cache.
    fn clear_contracts_for_tx(&mut self);
}
