//! Balance snapshots and the comparison rule every check applies.

pub mod snapshot;

pub use snapshot::{normalize_height, unbonding_key, BalanceSnapshot, Category, Mismatch};
