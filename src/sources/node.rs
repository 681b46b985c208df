use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::address::{to_canonical, CanonicalAddress};
use crate::balances::{unbonding_key, BalanceSnapshot, Category};
use crate::chains::Chain;
use crate::client::JsonClient;
use crate::error::SourceError;
use crate::sources::traits::{BalanceSource, NodeSourceFactory};

pub const DEFAULT_MAX_BALANCE_PAGES: usize = 20;

/// A chain's own LCD endpoint, the reference side of every check.
pub struct NodeSource {
    client: JsonClient,
    chain: Chain,
    max_pages: usize,
}

impl NodeSource {
    pub fn new(client: JsonClient, chain: Chain) -> Self {
        Self {
            client,
            chain,
            max_pages: DEFAULT_MAX_BALANCE_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn balances_url(&self, address: &CanonicalAddress) -> Result<String, SourceError> {
        let native = address.to_native(&self.chain.address_prefix)?;
        Ok(format!(
            "{}/cosmos/bank/v1beta1/balances/{}",
            self.chain.node_endpoint, native
        ))
    }

    pub fn delegations_url(&self, address: &CanonicalAddress) -> Result<String, SourceError> {
        let native = address.to_native(&self.chain.address_prefix)?;
        Ok(format!(
            "{}/cosmos/staking/v1beta1/delegations/{}",
            self.chain.node_endpoint, native
        ))
    }

    pub fn unbonding_delegations_url(
        &self,
        address: &CanonicalAddress,
    ) -> Result<String, SourceError> {
        let native = address.to_native(&self.chain.address_prefix)?;
        Ok(format!(
            "{}/cosmos/staking/v1beta1/delegators/{}/unbonding_delegations",
            self.chain.node_endpoint, native
        ))
    }
}

#[async_trait]
impl BalanceSource for NodeSource {
    fn name(&self) -> &'static str {
        "node"
    }

    fn url(&self, category: Category, address: &CanonicalAddress) -> Result<String, SourceError> {
        match category {
            Category::Spendable => self.balances_url(address),
            Category::Staking => self.delegations_url(address),
            Category::Unbonding => self.unbonding_delegations_url(address),
        }
    }

    /// Follows `pagination.next_key` until exhausted. Hitting the page cap
    /// with pages left is an error rather than a silently short snapshot.
    #[instrument(skip_all, fields(chain = %self.chain.name, address = %address))]
    async fn fetch_spendable(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.balances_url(address)?;
        info!(url = %url, "fetching balances from node");

        let mut snapshot = BalanceSnapshot::new();
        let mut next_key: Option<String> = None;

        for page in 0..self.max_pages {
            let response: BankBalancesResponse = match next_key.as_deref() {
                None => self.client.get_json(&url).await?,
                Some(key) => {
                    self.client
                        .get_json_with_query(&url, &[("pagination.key", key)])
                        .await?
                }
            };

            for coin in response.balances {
                snapshot.insert(coin.denom, coin.amount);
            }

            next_key = response
                .pagination
                .and_then(|p| p.next_key)
                .filter(|key| !key.is_empty());

            match next_key {
                None => return Ok(snapshot),
                Some(_) => debug!(page = page + 1, "following balances pagination"),
            }
        }

        warn!(url = %url, pages = self.max_pages, "balances still paginated at page cap");
        Err(SourceError::Truncated {
            url,
            pages: self.max_pages,
        })
    }

    /// A 404 means the address never transacted on this chain.
    #[instrument(skip_all, fields(chain = %self.chain.name, address = %address))]
    async fn fetch_staking(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.delegations_url(address)?;

        let Some(response) = self
            .client
            .get_json_or_not_found::<DelegationsResponse>(&url)
            .await?
        else {
            debug!(url = %url, "no delegation history on chain");
            return Ok(BalanceSnapshot::new());
        };

        response
            .delegation_responses
            .into_iter()
            .map(|d| {
                let validator = to_canonical(&d.delegation.validator_address)?;
                Ok::<_, SourceError>((validator, d.balance.amount))
            })
            .collect()
    }

    #[instrument(skip_all, fields(chain = %self.chain.name, address = %address))]
    async fn fetch_unbonding(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.unbonding_delegations_url(address)?;
        let response: UnbondingResponse = self.client.get_json(&url).await?;

        let mut snapshot = BalanceSnapshot::new();
        for unbonding in response.unbonding_responses {
            let validator = to_canonical(&unbonding.validator_address)?;
            for entry in unbonding.entries {
                snapshot.insert(
                    unbonding_key(&validator, &entry.creation_height),
                    entry.balance,
                );
            }
        }

        Ok(snapshot)
    }
}

/// Builds `NodeSource`s that share one HTTP client.
#[derive(Clone)]
pub struct HttpNodeSourceFactory {
    client: JsonClient,
    max_pages: usize,
}

impl HttpNodeSourceFactory {
    pub fn new(client: JsonClient, max_pages: usize) -> Self {
        Self { client, max_pages }
    }
}

impl NodeSourceFactory for HttpNodeSourceFactory {
    fn for_chain(&self, chain: &Chain) -> Arc<dyn BalanceSource> {
        Arc::new(NodeSource::new(self.client.clone(), chain.clone()).with_max_pages(self.max_pages))
    }
}

// ========== LCD RESPONSE MODELS ==========

#[derive(Debug, Deserialize)]
struct BankBalancesResponse {
    #[serde(default)]
    balances: Vec<Coin>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    next_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DelegationsResponse {
    #[serde(default)]
    delegation_responses: Vec<DelegationResponse>,
}

#[derive(Debug, Deserialize)]
struct DelegationResponse {
    delegation: Delegation,
    #[serde(default)]
    balance: DelegationBalance,
}

#[derive(Debug, Deserialize)]
struct Delegation {
    validator_address: String,
}

#[derive(Debug, Default, Deserialize)]
struct DelegationBalance {
    #[serde(default)]
    amount: String,
}

#[derive(Debug, Deserialize)]
struct UnbondingResponse {
    #[serde(default)]
    unbonding_responses: Vec<Unbonding>,
}

#[derive(Debug, Deserialize)]
struct Unbonding {
    validator_address: String,
    #[serde(default)]
    entries: Vec<UnbondingEntry>,
}

#[derive(Debug, Deserialize)]
struct UnbondingEntry {
    balance: String,
    creation_height: String,
}
