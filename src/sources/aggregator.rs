use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::{info, instrument};

use crate::address::CanonicalAddress;
use crate::balances::{unbonding_key, BalanceSnapshot, Category};
use crate::client::JsonClient;
use crate::error::SourceError;
use crate::sources::traits::BalanceSource;

const IBC_MARKER: &str = "ibc/";

/// Aggregator API client. Chain-agnostic: keyed only by address, so a single
/// instance serves every chain and category of a run.
#[derive(Clone)]
pub struct AggregatorSource {
    client: JsonClient,
    base_url: String,
}

impl AggregatorSource {
    pub fn new(client: JsonClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn balances_url(&self, address: &CanonicalAddress) -> String {
        format!("{}/v1/account/{}/balance", self.base_url, address)
    }

    pub fn staking_balances_url(&self, address: &CanonicalAddress) -> String {
        format!("{}/v1/account/{}/stakingbalances", self.base_url, address)
    }

    pub fn unbonding_delegations_url(&self, address: &CanonicalAddress) -> String {
        format!("{}/v1/account/{}/unbondingdelegations", self.base_url, address)
    }
}

#[async_trait]
impl BalanceSource for AggregatorSource {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn url(&self, category: Category, address: &CanonicalAddress) -> Result<String, SourceError> {
        Ok(match category {
            Category::Spendable => self.balances_url(address),
            Category::Staking => self.staking_balances_url(address),
            Category::Unbonding => self.unbonding_delegations_url(address),
        })
    }

    #[instrument(skip_all, fields(address = %address))]
    async fn fetch_spendable(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.balances_url(address);
        info!(url = %url, "fetching balances from aggregator");

        let response: BalancesResponse = self.client.get_json(&url).await?;
        response
            .balances
            .iter()
            .map(|entry| split_amount(&entry.base_denom, &entry.amount))
            .collect()
    }

    #[instrument(skip_all, fields(address = %address))]
    async fn fetch_staking(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.staking_balances_url(address);
        let response: StakingBalancesResponse = self.client.get_json(&url).await?;

        Ok(response
            .staking_balances
            .into_iter()
            .map(|entry| {
                let amount = strip_fraction(&entry.amount).to_string();
                (entry.validator_address, amount)
            })
            .collect())
    }

    #[instrument(skip_all, fields(address = %address))]
    async fn fetch_unbonding(
        &self,
        address: &CanonicalAddress,
    ) -> Result<BalanceSnapshot, SourceError> {
        let url = self.unbonding_delegations_url(address);
        let response: UnbondingDelegationsResponse = self.client.get_json(&url).await?;

        Ok(response
            .unbonding_delegations
            .iter()
            .flat_map(|delegation| {
                delegation.entries.iter().map(move |entry| {
                    (
                        unbonding_key(&delegation.validator_address, &entry.creation_height),
                        entry.balance.clone(),
                    )
                })
            })
            .collect())
    }
}

/// The aggregator reports amounts with the denom glued on (`100uatom`,
/// `250ibc/27394F...`). Split on the denom itself, never on a fixed delimiter.
pub fn split_amount(base_denom: &str, amount: &str) -> Result<(String, String), SourceError> {
    if !base_denom.is_empty() {
        if let Some(numeric) = amount.strip_suffix(base_denom) {
            return Ok((base_denom.to_string(), numeric.to_string()));
        }
    }

    if let Some((numeric, hash)) = amount.split_once(IBC_MARKER) {
        return Ok((format!("{}{}", IBC_MARKER, hash), numeric.to_string()));
    }

    Err(SourceError::UnrecognizedAmount {
        denom: base_denom.to_string(),
        amount: amount.to_string(),
    })
}

/// Staking amounts may carry decimals the node never reports.
fn strip_fraction(amount: &str) -> &str {
    amount.split('.').next().unwrap_or(amount)
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    base_denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct StakingBalancesResponse {
    #[serde(default)]
    staking_balances: Vec<StakingBalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct StakingBalanceEntry {
    validator_address: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct UnbondingDelegationsResponse {
    #[serde(default)]
    unbonding_delegations: Vec<UnbondingDelegation>,
}

#[derive(Debug, Deserialize)]
struct UnbondingDelegation {
    validator_address: String,
    #[serde(default)]
    entries: Vec<UnbondingEntry>,
}

#[derive(Debug, Deserialize)]
struct UnbondingEntry {
    balance: String,
    #[serde(deserialize_with = "height_as_string")]
    creation_height: String,
}

/// Accept a height encoded either as a JSON number or a string.
fn height_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Height {
        Number(u64),
        Text(String),
    }

    Ok(match Height::deserialize(deserializer)? {
        Height::Number(n) => n.to_string(),
        Height::Text(s) => s,
    })
}
