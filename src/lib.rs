//! Balance-drift reconciler.
//!
//! Compares what an aggregator API reports for an account against what each
//! chain's own LCD node reports, for spendable, staking and unbonding
//! balances, and collects every disagreement with its provenance.

pub mod address;
pub mod api;
pub mod balances;
pub mod bootstrap;
pub mod chains;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod server;
pub mod sources;
pub mod telemetry;
