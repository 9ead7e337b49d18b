//! The side effect trace of a transaction.
//!
//! Every state mutation is appended with a strictly increasing counter. A trace can be forked for a
//! speculative phase: the child continues the counter and inherits the cumulative array lengths so
//! that per-transaction limits hold across forks. Merging a child back always adopts its counter,
//! and adopts its side effects only if the child was not reverted. Contract classes whose bytecode
//! was retrieved are adopted even from a reverted child, since that bytecode was still processed.

use alloy_primitives::{
    map::{HashMap, HashSet},
    B256, U256,
};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        MAX_L2_TO_L1_MSGS_PER_TX, MAX_NOTE_HASHES_PER_TX, MAX_NULLIFIERS_PER_TX,
        MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS, MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
        MAX_PUBLIC_LOGS_PER_TX, PROTOCOL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
        PUBLIC_LOG_SIZE_IN_FIELDS,
    },
    PublicLog, ScopedL2ToL1Message, SideEffectKind, StateError,
};

/// A write to the public data tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDataWrite {
    /// The public data tree leaf slot.
    pub leaf_slot: U256,
    /// The written value.
    pub value: U256,
}

impl PublicDataWrite {
    /// Creates a new write.
    pub const fn new(leaf_slot: U256, value: U256) -> Self {
        Self { leaf_slot, value }
    }

    /// Returns true if this is the zero write used for padding.
    pub fn is_empty(&self) -> bool {
        self.leaf_slot.is_zero() && self.value.is_zero()
    }
}

/// A side effect tagged with its position in the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counted<T> {
    /// The side effect.
    pub inner: T,
    /// The side effect counter at the time it was traced.
    pub counter: u32,
}

/// Number of side effects of each kind.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Add,
)]
#[serde(rename_all = "camelCase")]
pub struct SideEffectArrayLengths {
    /// Public data writes issued by user code.
    pub public_data_writes: usize,
    /// Public data writes issued by the protocol.
    pub protocol_public_data_writes: usize,
    /// Note hashes.
    pub note_hashes: usize,
    /// Nullifiers.
    pub nullifiers: usize,
    /// L2-to-L1 messages.
    pub l2_to_l1_msgs: usize,
    /// Public logs.
    pub public_logs: usize,
}

/// The ordered, counter-keyed record of a transaction's side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideEffectTrace {
    side_effect_counter: u32,
    previous_lengths: SideEffectArrayLengths,
    protocol_public_data_writes: usize,
    public_data_writes: Vec<Counted<PublicDataWrite>>,
    note_hashes: Vec<Counted<U256>>,
    nullifiers: Vec<Counted<U256>>,
    l2_to_l1_msgs: Vec<Counted<ScopedL2ToL1Message>>,
    public_logs: Vec<Counted<PublicLog>>,
    retrieved_class_ids: HashSet<B256>,
}

impl SideEffectTrace {
    /// Creates an empty trace, counting `previous_lengths` side effects as already emitted.
    pub fn new(start_counter: u32, previous_lengths: SideEffectArrayLengths) -> Self {
        Self { side_effect_counter: start_counter, previous_lengths, ..Default::default() }
    }

    /// The counter the next side effect gets.
    pub const fn counter(&self) -> u32 {
        self.side_effect_counter
    }

    /// Side effects emitted before this trace was created.
    pub const fn previous_lengths(&self) -> SideEffectArrayLengths {
        self.previous_lengths
    }

    /// Side effects in this trace.
    pub fn lengths(&self) -> SideEffectArrayLengths {
        SideEffectArrayLengths {
            public_data_writes: self.public_data_writes.len() - self.protocol_public_data_writes,
            protocol_public_data_writes: self.protocol_public_data_writes,
            note_hashes: self.note_hashes.len(),
            nullifiers: self.nullifiers.len(),
            l2_to_l1_msgs: self.l2_to_l1_msgs.len(),
            public_logs: self.public_logs.len(),
        }
    }

    /// Side effects emitted so far in the transaction.
    pub fn cumulative_lengths(&self) -> SideEffectArrayLengths {
        self.previous_lengths + self.lengths()
    }

    /// Creates a child trace that continues after this one.
    pub fn fork(&self) -> Self {
        Self {
            retrieved_class_ids: self.retrieved_class_ids.clone(),
            ..Self::new(self.side_effect_counter, self.cumulative_lengths())
        }
    }

    /// Merges a child created by [`Self::fork`]. The child's counter is always adopted so that
    /// counters stay unique across reverted forks.
    pub fn merge(&mut self, child: Self, reverted: bool) {
        self.side_effect_counter = child.side_effect_counter;
        self.retrieved_class_ids = child.retrieved_class_ids;
        if reverted {
            return;
        }
        self.protocol_public_data_writes += child.protocol_public_data_writes;
        self.public_data_writes.extend(child.public_data_writes);
        self.note_hashes.extend(child.note_hashes);
        self.nullifiers.extend(child.nullifiers);
        self.l2_to_l1_msgs.extend(child.l2_to_l1_msgs);
        self.public_logs.extend(child.public_logs);
    }

    const fn next_counter(&mut self) -> u32 {
        let counter = self.side_effect_counter;
        self.side_effect_counter += 1;
        counter
    }

    /// Traces a public data write. Protocol writes have their own limit.
    pub fn trace_public_data_write(
        &mut self,
        write: PublicDataWrite,
        protocol_write: bool,
    ) -> Result<(), StateError> {
        let cumulative = self.cumulative_lengths();
        if protocol_write {
            check_limit(
                cumulative.protocol_public_data_writes,
                PROTOCOL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
                SideEffectKind::ProtocolPublicDataWrite,
            )?;
            self.protocol_public_data_writes += 1;
        } else {
            check_limit(
                cumulative.public_data_writes,
                MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX,
                SideEffectKind::PublicDataWrite,
            )?;
        }
        let counter = self.next_counter();
        self.public_data_writes.push(Counted { inner: write, counter });
        Ok(())
    }

    /// Traces a unique note hash.
    pub fn trace_note_hash(&mut self, note_hash: U256) -> Result<(), StateError> {
        check_limit(
            self.cumulative_lengths().note_hashes,
            MAX_NOTE_HASHES_PER_TX,
            SideEffectKind::NoteHash,
        )?;
        let counter = self.next_counter();
        self.note_hashes.push(Counted { inner: note_hash, counter });
        Ok(())
    }

    /// Traces a siloed nullifier.
    pub fn trace_nullifier(&mut self, siloed_nullifier: U256) -> Result<(), StateError> {
        check_limit(
            self.cumulative_lengths().nullifiers,
            MAX_NULLIFIERS_PER_TX,
            SideEffectKind::Nullifier,
        )?;
        let counter = self.next_counter();
        self.nullifiers.push(Counted { inner: siloed_nullifier, counter });
        Ok(())
    }

    /// Traces an L2-to-L1 message.
    pub fn trace_l2_to_l1_message(
        &mut self,
        message: ScopedL2ToL1Message,
    ) -> Result<(), StateError> {
        check_limit(
            self.cumulative_lengths().l2_to_l1_msgs,
            MAX_L2_TO_L1_MSGS_PER_TX,
            SideEffectKind::L2ToL1Message,
        )?;
        let counter = self.next_counter();
        self.l2_to_l1_msgs.push(Counted { inner: message, counter });
        Ok(())
    }

    /// Traces a public log.
    pub fn trace_public_log(&mut self, log: PublicLog) -> Result<(), StateError> {
        if log.fields.len() > PUBLIC_LOG_SIZE_IN_FIELDS {
            return Err(StateError::PublicLogTooLarge {
                size: log.fields.len(),
                max: PUBLIC_LOG_SIZE_IN_FIELDS,
            });
        }
        check_limit(
            self.cumulative_lengths().public_logs,
            MAX_PUBLIC_LOGS_PER_TX,
            SideEffectKind::PublicLog,
        )?;
        let counter = self.next_counter();
        self.public_logs.push(Counted { inner: log, counter });
        Ok(())
    }

    /// Traces the retrieval of the bytecode of contract class `class_id`. Retrieving bytecode of a
    /// class seen before in the transaction is free; each new class counts against the limit.
    pub fn trace_bytecode_retrieval(&mut self, class_id: B256) -> Result<(), StateError> {
        if self.retrieved_class_ids.contains(&class_id) {
            return Ok(());
        }
        check_limit(
            self.retrieved_class_ids.len(),
            MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS,
            SideEffectKind::UniqueContractClassId,
        )?;
        self.retrieved_class_ids.insert(class_id);
        Ok(())
    }

    /// Number of distinct contract classes whose bytecode was retrieved.
    pub fn unique_class_ids(&self) -> usize {
        self.retrieved_class_ids.len()
    }

    /// Public data writes in trace order, unsquashed.
    pub fn public_data_writes(&self) -> &[Counted<PublicDataWrite>] {
        &self.public_data_writes
    }

    /// Note hashes in trace order.
    pub fn note_hashes(&self) -> &[Counted<U256>] {
        &self.note_hashes
    }

    /// Nullifiers in trace order.
    pub fn nullifiers(&self) -> &[Counted<U256>] {
        &self.nullifiers
    }

    /// L2-to-L1 messages in trace order.
    pub fn l2_to_l1_msgs(&self) -> &[Counted<ScopedL2ToL1Message>] {
        &self.l2_to_l1_msgs
    }

    /// Public logs in trace order.
    pub fn public_logs(&self) -> &[Counted<PublicLog>] {
        &self.public_logs
    }

    /// Public data writes with repeated writes to a slot collapsed.
    pub fn squashed_public_data_writes(&self) -> Vec<PublicDataWrite> {
        squash_public_data_writes(self.public_data_writes.iter().map(|write| write.inner))
    }
}

const fn check_limit(current: usize, limit: usize, kind: SideEffectKind) -> Result<(), StateError> {
    if current >= limit {
        return Err(StateError::SideEffectLimitReached { kind, limit });
    }
    Ok(())
}

/// Collapses repeated writes to the same leaf slot into one write that sits at the slot's first
/// position and carries the slot's last value.
pub fn squash_public_data_writes(
    writes: impl IntoIterator<Item = PublicDataWrite>,
) -> Vec<PublicDataWrite> {
    let mut positions: HashMap<U256, usize> = HashMap::default();
    let mut squashed: Vec<PublicDataWrite> = Vec::new();
    for write in writes {
        match positions.get(&write.leaf_slot) {
            Some(&position) => squashed[position].value = write.value,
            None => {
                positions.insert(write.leaf_slot, squashed.len());
                squashed.push(write);
            }
        }
    }
    squashed
}
