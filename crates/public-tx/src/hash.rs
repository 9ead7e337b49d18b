//! Hash derivations for siloing side effects and locating storage.
//!
//! Every derivation hashes a generator index (for domain separation) followed by the 32-byte
//! big-endian words of its inputs with keccak256. Addresses are left-padded to a full word.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::constants::{generator_index, FEE_JUICE_BALANCES_SLOT};

fn hash_words(generator: u32, words: &[U256]) -> U256 {
    let mut preimage = Vec::with_capacity(4 + words.len() * 32);
    preimage.extend_from_slice(&generator.to_be_bytes());
    for word in words {
        preimage.extend_from_slice(&word.to_be_bytes::<32>());
    }
    U256::from_be_bytes(keccak256(preimage).0)
}

/// Converts an address to a field word.
pub fn address_to_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

/// Silos a nullifier with the address of the contract that emitted it.
pub fn silo_nullifier(contract: Address, nullifier: U256) -> U256 {
    hash_words(generator_index::OUTER_NULLIFIER, &[address_to_word(contract), nullifier])
}

/// Silos a note hash with the address of the contract that emitted it.
pub fn silo_note_hash(contract: Address, note_hash: U256) -> U256 {
    hash_words(generator_index::SILOED_NOTE_HASH, &[address_to_word(contract), note_hash])
}

/// Computes the nonce of the `index`-th note hash of a transaction, scoped by the transaction's
/// first nullifier.
pub fn compute_note_hash_nonce(first_nullifier: U256, index: usize) -> U256 {
    hash_words(generator_index::NOTE_HASH_NONCE, &[first_nullifier, U256::from(index)])
}

/// Makes a siloed note hash unique by binding it to its nonce.
pub fn compute_unique_note_hash(nonce: U256, siloed_note_hash: U256) -> U256 {
    hash_words(generator_index::UNIQUE_NOTE_HASH, &[nonce, siloed_note_hash])
}

/// Computes the public data tree leaf slot of a contract storage slot.
pub fn compute_public_data_leaf_slot(contract: Address, slot: U256) -> U256 {
    hash_words(generator_index::PUBLIC_LEAF_INDEX, &[address_to_word(contract), slot])
}

/// Computes the storage slot of `key` in a map rooted at `map_slot`.
pub fn derive_storage_slot_in_map(map_slot: U256, key: U256) -> U256 {
    hash_words(generator_index::MAP_SLOT, &[map_slot, key])
}

/// Computes the Fee Juice storage slot holding the balance of `fee_payer`.
pub fn compute_fee_payer_balance_slot(fee_payer: Address) -> U256 {
    derive_storage_slot_in_map(FEE_JUICE_BALANCES_SLOT, address_to_word(fee_payer))
}

/// Hashes public function calldata.
pub fn compute_calldata_hash(calldata: &[U256]) -> B256 {
    B256::from(hash_words(generator_index::PUBLIC_CALLDATA, calldata).to_be_bytes::<32>())
}
