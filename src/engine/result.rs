use crate::address::CanonicalAddress;
use crate::error::CheckError;

/// Everything one run found. Empty `errors` means both sources agree on every
/// chain and category; entry order carries no meaning.
#[derive(Debug)]
pub struct AggregateResult {
    pub address: CanonicalAddress,
    pub chains_checked: usize,
    pub checks_run: usize,
    pub errors: Vec<CheckError>,
}

impl AggregateResult {
    pub fn new(
        address: CanonicalAddress,
        chains_checked: usize,
        checks_run: usize,
        errors: Vec<CheckError>,
    ) -> Self {
        Self {
            address,
            chains_checked,
            checks_run,
            errors,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Checks that ran to completion and found a disagreement
    pub fn mismatches(&self) -> impl Iterator<Item = &CheckError> {
        self.errors.iter().filter(|e| e.failure.is_mismatch())
    }

    /// Checks that could not verify anything (fetch, codec or task failures)
    pub fn unverified(&self) -> impl Iterator<Item = &CheckError> {
        self.errors.iter().filter(|e| !e.failure.is_mismatch())
    }
}
