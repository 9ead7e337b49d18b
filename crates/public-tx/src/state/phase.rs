//! Fork lifecycle of the world state across transaction phases.
//!
//! Setup runs against the transaction-level view. Before the revertible part of a transaction runs,
//! the view is forked; app logic and teardown then either merge the fork (their effects become part
//! of the transaction) or discard it (everything rolls back to the end of setup). At most one fork
//! exists at a time:
//!
//! ```text
//! Unforked --fork()--> Forked --merge_forked_state() / discard_forked_state()--> Unforked
//! ```
//!
//! Any other transition is a bug in the caller and panics.

use alloy_primitives::U256;

use crate::{
    constants::{MAX_NOTE_HASHES_PER_TX, MAX_NULLIFIERS_PER_TX},
    MerkleTreeId, PublicContractsDb, PublicStateView, PublicTreesDb, StateError, StateJournal,
    TreeSnapshots,
};

#[derive(Debug)]
enum Views {
    Unforked(StateJournal),
    Forked(StateJournal, StateJournal),
}

impl Default for Views {
    fn default() -> Self {
        Self::Unforked(StateJournal::default())
    }
}

/// Owns the transaction-level state view and the single allowed fork of it.
#[derive(Debug)]
pub struct PhaseStateManager<T, C> {
    trees: T,
    contracts: C,
    first_nullifier: U256,
    do_merkle_ops: bool,
    views: Views,
}

impl<T: PublicTreesDb, C: PublicContractsDb> PhaseStateManager<T, C> {
    /// Creates an unforked manager whose transaction-level view starts from `journal`.
    pub fn new(
        trees: T,
        contracts: C,
        journal: StateJournal,
        first_nullifier: U256,
        do_merkle_ops: bool,
    ) -> Self {
        Self { trees, contracts, first_nullifier, do_merkle_ops, views: Views::Unforked(journal) }
    }

    /// Returns true if a fork is alive.
    pub const fn is_forked(&self) -> bool {
        matches!(self.views, Views::Forked(..))
    }

    /// Forks the transaction-level view. The fork becomes the active view.
    ///
    /// # Panics
    ///
    /// Panics if a fork is already alive.
    pub fn fork(&mut self) -> Result<(), StateError> {
        let Views::Unforked(tx) = &self.views else {
            panic!("fork() called while a fork is already alive");
        };
        let fork = tx.fork();
        self.trees.fork().map_err(StateError::trees_db)?;
        let Views::Unforked(tx) = core::mem::take(&mut self.views) else { unreachable!() };
        self.views = Views::Forked(tx, fork);
        tracing::trace!(target: "public_tx::state", "Forked state");
        Ok(())
    }

    /// The fork if one is alive, else the transaction-level view.
    pub fn active_state_view(&mut self) -> PublicStateView<'_, T, C> {
        let journal = match &mut self.views {
            Views::Unforked(tx) => tx,
            Views::Forked(_, fork) => fork,
        };
        PublicStateView::new(
            &mut self.trees,
            &mut self.contracts,
            journal,
            self.first_nullifier,
            self.do_merkle_ops,
        )
    }

    /// The contracts store, for registering contracts deployed by the transaction.
    pub fn contracts_mut(&mut self) -> &mut C {
        &mut self.contracts
    }

    /// Commits the fork into the transaction-level view.
    ///
    /// # Panics
    ///
    /// Panics if no fork is alive.
    pub fn merge_forked_state(&mut self) -> Result<(), StateError> {
        self.close_fork(false)
    }

    /// Rolls the fork back and drops it.
    ///
    /// # Panics
    ///
    /// Panics if no fork is alive.
    pub fn discard_forked_state(&mut self) -> Result<(), StateError> {
        self.close_fork(true)
    }

    fn close_fork(&mut self, reverted: bool) -> Result<(), StateError> {
        assert!(self.is_forked(), "no fork to {}", if reverted { "discard" } else { "merge" });
        if reverted {
            self.trees.reject().map_err(StateError::trees_db)?;
        } else {
            self.trees.merge().map_err(StateError::trees_db)?;
        }
        let Views::Forked(mut tx, fork) = core::mem::take(&mut self.views) else { unreachable!() };
        tx.merge(fork, reverted);
        self.views = Views::Unforked(tx);
        tracing::trace!(target: "public_tx::state", reverted, "Closed fork");
        Ok(())
    }

    /// Discards the fork if one is alive. Used on error paths, where the whole transaction is
    /// about to be thrown away.
    pub fn abort(&mut self) -> Result<(), StateError> {
        if self.is_forked() {
            self.discard_forked_state()?;
        }
        Ok(())
    }

    /// The transaction-level journal.
    ///
    /// # Panics
    ///
    /// Panics if a fork is alive.
    pub fn tx_journal(&self) -> &StateJournal {
        match &self.views {
            Views::Unforked(tx) => tx,
            Views::Forked(..) => panic!("tx_journal() called while a fork is alive"),
        }
    }

    /// Pads the note hash and nullifier trees so that every transaction grows them by the same
    /// number of leaves, and returns the resulting snapshots.
    ///
    /// # Panics
    ///
    /// Panics if a fork is alive.
    pub fn pad_trees(&mut self) -> Result<TreeSnapshots, StateError> {
        if self.do_merkle_ops {
            let emitted = self.tx_journal().trace().cumulative_lengths();
            let note_hash_padding = MAX_NOTE_HASHES_PER_TX.saturating_sub(emitted.note_hashes);
            let nullifier_padding = MAX_NULLIFIERS_PER_TX.saturating_sub(emitted.nullifiers);
            self.trees
                .pad_tree(MerkleTreeId::NoteHashTree, note_hash_padding)
                .map_err(StateError::trees_db)?;
            self.trees
                .pad_tree(MerkleTreeId::NullifierTree, nullifier_padding)
                .map_err(StateError::trees_db)?;
        }
        self.trees.tree_snapshots().map_err(StateError::trees_db)
    }

    /// Unwraps the manager into its collaborators.
    pub fn into_parts(self) -> (T, C) {
        (self.trees, self.contracts)
    }
}
