//! Client for the Relic protocol: fetches historical-state proofs from the
//! proof API, checks that the target chain's block history can verify them,
//! and populates the prover, bridge and commitment transactions that put
//! the facts on chain.
//!
//! Transactions are returned unsigned as [`contracts::PopulatedTransaction`];
//! signing and sending is left to the caller.

pub mod api;
pub mod block;
pub mod block_history;
pub mod bridges;
pub mod client;
pub mod compress;
pub mod config;
pub mod contracts;
pub mod error;
pub mod facts;
pub mod proof;
pub mod provers;
pub mod provider;
pub mod reliquary;
pub mod tracing;

pub use client::{ClientContext, RelicClient};
pub use config::{ConfigOverride, RelicAddresses};
pub use error::{ApiError, RelicError, Result};
