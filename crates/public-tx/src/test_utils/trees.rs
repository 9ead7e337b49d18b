use alloy_primitives::{
    keccak256,
    map::{HashMap, HashSet},
    Address, B256, U256,
};

use crate::{
    hash::compute_public_data_leaf_slot, AppendOnlyTreeSnapshot, MerkleTreeId, PublicTreesDb,
    TreeSnapshots,
};

/// Error of the in-memory databases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MemoryDbError(pub String);

#[derive(Debug, Clone, Default)]
struct Trees {
    public_data: HashMap<U256, U256>,
    nullifiers: Vec<U256>,
    nullifier_set: HashSet<U256>,
    note_hashes: Vec<U256>,
    l1_to_l2_messages: Vec<U256>,
}

fn root_of<'a>(leaves: impl IntoIterator<Item = &'a U256>) -> B256 {
    let mut preimage = Vec::new();
    for leaf in leaves {
        preimage.extend_from_slice(&leaf.to_be_bytes::<32>());
    }
    keccak256(preimage)
}

fn snapshot(leaves: &[U256]) -> AppendOnlyTreeSnapshot {
    AppendOnlyTreeSnapshot { root: root_of(leaves), next_available_leaf_index: leaves.len() as u64 }
}

/// An in-memory [`PublicTreesDb`] with nested checkpoints.
///
/// Roots are hashes of all leaves, which is enough to tell states apart in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTreesDb {
    trees: Trees,
    checkpoints: Vec<Trees>,
    failing: bool,
    failing_rejects: bool,
    reject_attempts: usize,
}

impl MemoryTreesDb {
    /// Reads a public storage slot without going through the trait.
    pub fn storage(&self, contract: Address, slot: U256) -> U256 {
        self.trees
            .public_data
            .get(&compute_public_data_leaf_slot(contract, slot))
            .copied()
            .unwrap_or_default()
    }

    /// Sets a public storage slot.
    pub fn set_public_storage(&mut self, contract: Address, slot: U256, value: U256) {
        self.trees.public_data.insert(compute_public_data_leaf_slot(contract, slot), value);
    }

    /// Sets a public storage slot.
    pub fn public_storage(mut self, contract: Address, slot: U256, value: U256) -> Self {
        self.set_public_storage(contract, slot, value);
        self
    }

    /// Inserts a siloed nullifier.
    pub fn set_nullifier(&mut self, siloed_nullifier: U256) {
        self.trees.nullifiers.push(siloed_nullifier);
        self.trees.nullifier_set.insert(siloed_nullifier);
    }

    /// Inserts a siloed nullifier.
    pub fn nullifier(mut self, siloed_nullifier: U256) -> Self {
        self.set_nullifier(siloed_nullifier);
        self
    }

    /// Appends an L1-to-L2 message.
    pub fn l1_to_l2_message(mut self, message_hash: U256) -> Self {
        self.trees.l1_to_l2_messages.push(message_hash);
        self
    }

    /// Makes every storage access fail, to exercise infrastructure errors.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Makes every checkpoint rollback fail, leaving the checkpoint in place.
    pub fn failing_rejects(mut self) -> Self {
        self.failing_rejects = true;
        self
    }

    /// Number of checkpoint rollbacks attempted, failed ones included.
    pub const fn reject_attempts(&self) -> usize {
        self.reject_attempts
    }

    /// Returns true if the siloed nullifier is in the tree.
    pub fn contains_nullifier(&self, siloed_nullifier: U256) -> bool {
        self.trees.nullifier_set.contains(&siloed_nullifier)
    }

    /// Leaves of the nullifier tree, padding included.
    pub fn nullifiers(&self) -> &[U256] {
        &self.trees.nullifiers
    }

    /// Leaves of the note hash tree, padding included.
    pub fn note_hashes(&self) -> &[U256] {
        &self.trees.note_hashes
    }

    /// Number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    fn check_failing(&self) -> Result<(), MemoryDbError> {
        if self.failing {
            return Err(MemoryDbError("storage unavailable".to_string()));
        }
        Ok(())
    }
}

impl PublicTreesDb for MemoryTreesDb {
    type Error = MemoryDbError;

    fn fork(&mut self) -> Result<(), Self::Error> {
        self.checkpoints.push(self.trees.clone());
        Ok(())
    }

    fn merge(&mut self) -> Result<(), Self::Error> {
        self.checkpoints
            .pop()
            .map(drop)
            .ok_or_else(|| MemoryDbError("no checkpoint to merge".to_string()))
    }

    fn reject(&mut self) -> Result<(), Self::Error> {
        self.reject_attempts += 1;
        if self.failing_rejects {
            return Err(MemoryDbError("rollback unavailable".to_string()));
        }
        self.trees = self
            .checkpoints
            .pop()
            .ok_or_else(|| MemoryDbError("no checkpoint to reject".to_string()))?;
        Ok(())
    }

    fn storage_read(&mut self, contract: Address, slot: U256) -> Result<U256, Self::Error> {
        self.check_failing()?;
        Ok(self.storage(contract, slot))
    }

    fn storage_write(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), Self::Error> {
        self.check_failing()?;
        self.set_public_storage(contract, slot, value);
        Ok(())
    }

    fn nullifier_exists(&mut self, siloed_nullifier: U256) -> Result<bool, Self::Error> {
        Ok(self.contains_nullifier(siloed_nullifier))
    }

    fn write_siloed_nullifier(&mut self, siloed_nullifier: U256) -> Result<(), Self::Error> {
        self.set_nullifier(siloed_nullifier);
        Ok(())
    }

    fn write_unique_note_hash(&mut self, unique_note_hash: U256) -> Result<(), Self::Error> {
        self.trees.note_hashes.push(unique_note_hash);
        Ok(())
    }

    fn note_hash_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error> {
        Ok(self.trees.note_hashes.get(leaf_index as usize).copied())
    }

    fn l1_to_l2_message_at(&mut self, leaf_index: u64) -> Result<Option<U256>, Self::Error> {
        Ok(self.trees.l1_to_l2_messages.get(leaf_index as usize).copied())
    }

    fn tree_snapshots(&mut self) -> Result<TreeSnapshots, Self::Error> {
        let mut public_data: Vec<_> = self.trees.public_data.iter().collect();
        public_data.sort();
        let public_data_leaves: Vec<U256> =
            public_data.into_iter().flat_map(|(slot, value)| [*slot, *value]).collect();
        Ok(TreeSnapshots {
            l1_to_l2_message_tree: snapshot(&self.trees.l1_to_l2_messages),
            note_hash_tree: snapshot(&self.trees.note_hashes),
            nullifier_tree: snapshot(&self.trees.nullifiers),
            public_data_tree: AppendOnlyTreeSnapshot {
                root: root_of(&public_data_leaves),
                next_available_leaf_index: self.trees.public_data.len() as u64,
            },
        })
    }

    fn pad_tree(&mut self, tree: MerkleTreeId, leaves: usize) -> Result<(), Self::Error> {
        let padded = match tree {
            MerkleTreeId::NoteHashTree => &mut self.trees.note_hashes,
            MerkleTreeId::NullifierTree => &mut self.trees.nullifiers,
            MerkleTreeId::PublicDataTree | MerkleTreeId::L1ToL2MessageTree => {
                return Err(MemoryDbError(format!("{tree} cannot be padded")));
            }
        };
        padded.extend(core::iter::repeat_n(U256::ZERO, leaves));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_trees_db_checkpoints_nest() {
        let contract = Address::with_last_byte(1);
        let mut db = MemoryTreesDb::default();
        db.storage_write(contract, U256::from(1), U256::from(1)).unwrap();

        db.fork().unwrap();
        db.storage_write(contract, U256::from(1), U256::from(2)).unwrap();
        db.fork().unwrap();
        db.storage_write(contract, U256::from(1), U256::from(3)).unwrap();
        db.reject().unwrap();
        assert_eq!(db.storage(contract, U256::from(1)), U256::from(2));
        db.merge().unwrap();
        assert_eq!(db.storage(contract, U256::from(1)), U256::from(2));
        assert_eq!(db.checkpoint_depth(), 0);
        assert!(db.merge().is_err());
    }

    #[test]
    fn test_memory_trees_db_snapshots_change_with_state() {
        let mut db = MemoryTreesDb::default();
        let before = db.tree_snapshots().unwrap();
        db.write_unique_note_hash(U256::from(9)).unwrap();
        let after = db.tree_snapshots().unwrap();
        assert_ne!(before.note_hash_tree, after.note_hash_tree);
        assert_eq!(before.nullifier_tree, after.nullifier_tree);
        assert_eq!(after.note_hash_tree.next_available_leaf_index, 1);
    }
}
