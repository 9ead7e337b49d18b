//! Test utilities for public transaction execution.

mod contracts;
mod executor;
mod trees;
mod tx;

pub use contracts::*;
pub use executor::*;
pub use trees::*;
pub use tx::*;
