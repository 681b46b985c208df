use async_trait::async_trait;
use std::sync::Arc;

use crate::address::CanonicalAddress;
use crate::balances::{BalanceSnapshot, Category};
use crate::chains::Chain;
use crate::error::SourceError;

/// One side of a comparison. Both implementations normalize their responses
/// into the same snapshot key space so they can be compared directly.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Short label used in logs ("aggregator", "node")
    fn name(&self) -> &'static str;

    /// URL queried for `category`, reported as provenance on failure.
    fn url(&self, category: Category, address: &CanonicalAddress) -> Result<String, SourceError>;

    async fn fetch_spendable(&self, address: &CanonicalAddress)
        -> Result<BalanceSnapshot, SourceError>;

    async fn fetch_staking(&self, address: &CanonicalAddress)
        -> Result<BalanceSnapshot, SourceError>;

    async fn fetch_unbonding(&self, address: &CanonicalAddress)
        -> Result<BalanceSnapshot, SourceError>;

    async fn fetch(
        &self,
        category: Category,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        match category {
            Category::Spendable => self.fetch_spendable(address).await,
            Category::Staking => self.fetch_staking(address).await,
            Category::Unbonding => self.fetch_unbonding(address).await,
        }
    }
}

/// Builds the per-chain node source. One instance per chain, shared by that
/// chain's three category checks.
pub trait NodeSourceFactory: Send + Sync {
    fn for_chain(&self, chain: &Chain) -> Arc<dyn BalanceSource>;
}
