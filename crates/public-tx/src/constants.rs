//! Protocol constants for public transaction execution.
//!
//! It groups the constants by the concern they bound as sub-modules, and re-exports all of them at
//! the top level.

/// Sizes of the fixed arrays consumed by the public VM circuit.
pub mod circuit {
    /// The maximum number of note hashes a transaction may emit.
    pub const MAX_NOTE_HASHES_PER_TX: usize = 64;
    /// The maximum number of nullifiers a transaction may emit, the first nullifier included.
    pub const MAX_NULLIFIERS_PER_TX: usize = 64;
    /// The maximum number of L2-to-L1 messages a transaction may emit.
    pub const MAX_L2_TO_L1_MSGS_PER_TX: usize = 8;
    /// The maximum number of public logs a transaction may emit.
    pub const MAX_PUBLIC_LOGS_PER_TX: usize = 8;
    /// The number of fields in a public log. Shorter logs are zero-padded to this size.
    pub const PUBLIC_LOG_SIZE_IN_FIELDS: usize = 13;
    /// The maximum number of public data writes issued by user code.
    pub const MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX: usize = 63;
    /// The number of public data writes reserved for the protocol (the fee payment).
    pub const PROTOCOL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX: usize = 1;
    /// The total number of public data writes after squashing.
    pub const MAX_TOTAL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX: usize =
        MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX + PROTOCOL_PUBLIC_DATA_UPDATE_REQUESTS_PER_TX;
    /// The maximum number of distinct contract classes whose bytecode a transaction may run.
    pub const MAX_PUBLIC_CALLS_TO_UNIQUE_CONTRACT_CLASS_IDS: usize = 21;
    /// The maximum number of enqueued public calls across all phases.
    pub const MAX_ENQUEUED_CALLS_PER_TX: usize = 32;
}

/// Gas related constants.
pub mod gas {
    /// The maximum L2 gas that the public VM can process for a single transaction. L2 gas
    /// allocated to the public portion never exceeds this, whatever the gas limits say.
    pub const MAX_PROCESSABLE_L2_GAS: u64 = 6_000_000;
}

/// Protocol contracts and storage layout.
pub mod protocol {
    use alloy_primitives::{address, Address, U256};

    /// The address of the Fee Juice contract, which holds fee payer balances.
    pub const FEE_JUICE_ADDRESS: Address = address!("0000000000000000000000000000000000000005");
    /// The storage slot of the balances map in the Fee Juice contract.
    pub const FEE_JUICE_BALANCES_SLOT: U256 = U256::from_limbs([1, 0, 0, 0]);
}

/// Generator indices used for domain separation in [`crate::hash`].
pub mod generator_index {
    /// Siloing a nullifier with its contract address.
    pub const OUTER_NULLIFIER: u32 = 7;
    /// Siloing a note hash with its contract address.
    pub const SILOED_NOTE_HASH: u32 = 3;
    /// Deriving the nonce of a note hash.
    pub const NOTE_HASH_NONCE: u32 = 2;
    /// Deriving a unique note hash from its nonce.
    pub const UNIQUE_NOTE_HASH: u32 = 4;
    /// Deriving a public data tree leaf slot.
    pub const PUBLIC_LEAF_INDEX: u32 = 23;
    /// Deriving a storage slot inside a map.
    pub const MAP_SLOT: u32 = 29;
    /// Hashing public function calldata.
    pub const PUBLIC_CALLDATA: u32 = 43;
}

pub use circuit::*;
pub use gas::*;
pub use protocol::*;
