//! Execution engine for the public part of L2 rollup transactions.
//!
//! A transaction's public portion runs in three strictly ordered phases (setup, app logic and
//! teardown) against a speculative view of world state. The engine meters gas per phase, keeps a
//! monotonic revert code, charges the fee payer and assembles the fixed-shape public inputs that
//! the proving backend replays.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod config;
pub use config::*;

mod context;
pub use context::*;

mod db;
pub use db::*;

mod error;
pub use error::*;

mod executor;
pub use executor::*;

mod gas;
pub use gas::*;

pub mod hash;

mod processor;
pub use processor::*;

mod public_inputs;
pub use public_inputs::*;

mod simulator;
pub use simulator::*;

mod state;
pub use state::*;

mod tx;
pub use tx::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
