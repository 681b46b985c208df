use tracing::{error, info};

use crate::error::{CheckContext, CheckError};

/// Receives the outcome of every check. Passed explicitly into the engine so
/// callers decide where outcomes go.
pub trait CheckReporter: Send + Sync {
    fn check_started(&self, _context: &CheckContext) {}

    fn check_passed(&self, _context: &CheckContext) {}

    fn check_failed(&self, error: &CheckError);
}

/// Default reporter: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl CheckReporter for TracingReporter {
    fn check_started(&self, context: &CheckContext) {
        info!(
            check = context.category.check_name(),
            chain = %context.chain,
            lcd_url = context.expected_url.as_deref().unwrap_or(""),
            api_url = context.actual_url.as_deref().unwrap_or(""),
            "started testing"
        );
    }

    fn check_failed(&self, err: &CheckError) {
        let context = &err.context;
        let outcome = if err.failure.is_mismatch() {
            "mismatch"
        } else {
            "check failed"
        };
        error!(
            check = context.category.check_name(),
            chain = %context.chain,
            lcd_url = context.expected_url.as_deref().unwrap_or(""),
            api_url = context.actual_url.as_deref().unwrap_or(""),
            kind = err.failure.kind(),
            error = %err.failure,
            "{} {}",
            context.category.check_name(),
            outcome
        );
    }
}
