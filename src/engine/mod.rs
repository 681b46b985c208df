//! Fan-out/fan-in reconciliation across chains and balance categories.
//!
//! - [`check::run_balance_check`] compares one category on one chain
//! - [`reconciler::ReconciliationEngine`] schedules every (chain, category)
//!   check under a shared concurrency limit and joins them all
//! - [`handle::ReconcileHandle`] lets a caller await, poll or cancel a run
//! - [`reporter::CheckReporter`] receives per-check outcomes

pub mod check;
pub mod handle;
pub mod reconciler;
pub mod reporter;
pub mod result;

pub use check::run_balance_check;
pub use handle::ReconcileHandle;
pub use reconciler::{ReconciliationEngine, DEFAULT_MAX_CONCURRENT_CHECKS};
pub use reporter::{CheckReporter, TracingReporter};
pub use result::AggregateResult;
